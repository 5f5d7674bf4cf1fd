//! Chapter session handlers
//!
//! 13101 enters a chapter, 13103 applies an in-session command, 13106 polls the
//! session during a battle. The 13000 base sync is sent after join.

use std::sync::Arc;

use anyhow::Result;
use prost::Message;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::chapter::{
    apply_op, battle_result_snapshot, build_current_chapter, build_current_chapter_kr, failed_response,
    find_operation_buff, oil_cost, operation_cost_rate, BenefitBuff, ChapterOp, ChapterTemplate, ItemStatistics,
    OpContext, OpOutcome, Rejection, TemplateError, TemplateVariant, BENEFIT_BUFF_CATEGORY,
    ITEM_STATISTICS_CATEGORY,
};
use crate::config::Region;
use crate::constants::*;
use crate::db::{self, DbPool};
use crate::game::ClientSession;
use crate::protocol::{
    CurrentChapterInfo, Cs13101, Cs13101Kr, Cs13103, Cs13106, Outgoing, Preserved, Sc13000, Sc13102, Sc13104,
};
use crate::Server;

use super::{require_commander, unix_now};

// =============================================================================
// Static data lookups
// =============================================================================

/// Load a chapter template. A chapter missing from the table is `None`.
pub async fn load_chapter_template(pool: &DbPool, chapter_id: u32, loop_flag: u32) -> Result<Option<ChapterTemplate>> {
    let category = TemplateVariant::from_loop_flag(loop_flag).category();
    let Some(data) = db::get_config_entry(pool, category, &chapter_id.to_string()).await? else {
        return Ok(None);
    };
    Ok(Some(ChapterTemplate::from_json(&data)?))
}

async fn load_benefit_buff(pool: &DbPool, buff_id: u32) -> Result<Option<BenefitBuff>> {
    let Some(data) = db::get_config_entry(pool, BENEFIT_BUFF_CATEGORY, &buff_id.to_string()).await? else {
        return Ok(None);
    };
    Ok(Some(BenefitBuff::from_json(&data)?))
}

/// Oil multiplier for entering with `item_id`; 1 without an item.
async fn operation_item_cost_rate(pool: &DbPool, item_id: u32) -> Result<f64> {
    if item_id == 0 {
        return Ok(1.0);
    }
    let Some(data) = db::get_config_entry(pool, ITEM_STATISTICS_CATEGORY, &item_id.to_string()).await? else {
        return Ok(1.0);
    };

    let mut buffs = Vec::new();
    for buff_id in ItemStatistics::from_json(&data)?.usage_buff_ids()? {
        if let Some(buff) = load_benefit_buff(pool, buff_id).await? {
            buffs.push(buff);
        }
    }
    Ok(operation_cost_rate(&buffs))
}

/// Buff granted for the duration of the session by `item_id`; 0 if none.
async fn operation_buff_id(pool: &DbPool, item_id: u32) -> Result<u32> {
    if item_id == 0 {
        return Ok(0);
    }
    let buffs = db::list_config_entries(pool, BENEFIT_BUFF_CATEGORY)
        .await?
        .iter()
        .map(|entry| BenefitBuff::from_json(&entry.data))
        .collect::<Result<Vec<_>, TemplateError>>()?;
    Ok(find_operation_buff(&buffs, item_id).unwrap_or(0))
}

/// Decode a stored session blob. An empty blob holds no session.
fn decode_session(state: &[u8]) -> Result<Option<CurrentChapterInfo>> {
    if state.is_empty() {
        return Ok(None);
    }
    Ok(Some(CurrentChapterInfo::decode(state)?))
}

// =============================================================================
// 13101 - chapter entry
// =============================================================================

fn tracking_failed() -> Vec<Outgoing> {
    vec![Outgoing::message(
        MSG_SC_CHAPTER_TRACKING,
        &Sc13102 {
            result: RESULT_FAILED,
            current_chapter: None,
        },
    )]
}

/// Chapter entry request. KR clients send pre-formed elite groups instead of
/// ship lists.
pub async fn handle_chapter_tracking(
    payload: &[u8],
    server: &Arc<Server>,
    session: Arc<RwLock<ClientSession>>,
) -> Result<Vec<Outgoing>> {
    let commander_id = require_commander(&session).await?;

    if server.config.server.server.region == Region::Kr {
        let request = Cs13101Kr::decode(payload)?;
        let entry = ChapterEntry {
            commander_id,
            chapter_id: request.id,
            loop_flag: request.loop_flag(),
            operation_item: request.operation_item(),
        };
        return enter_chapter(server, entry, |template, buff_id, now| {
            build_current_chapter_kr(template, &request, buff_id, now)
        })
        .await;
    }

    let request = Cs13101::decode(payload)?;
    if request.fleet.is_none() {
        debug!("Commander {} entered chapter {} without a fleet", commander_id, request.id);
        return Ok(tracking_failed());
    }
    let entry = ChapterEntry {
        commander_id,
        chapter_id: request.id,
        loop_flag: request.loop_flag(),
        operation_item: request.operation_item(),
    };
    enter_chapter(server, entry, |template, buff_id, now| {
        build_current_chapter(template, &request, buff_id, now)
    })
    .await
}

struct ChapterEntry {
    commander_id: u32,
    chapter_id: u32,
    loop_flag: u32,
    operation_item: u32,
}

async fn enter_chapter<F>(server: &Arc<Server>, entry: ChapterEntry, build: F) -> Result<Vec<Outgoing>>
where
    F: FnOnce(&ChapterTemplate, u32, u32) -> Result<(CurrentChapterInfo, u32), TemplateError>,
{
    let pool = &server.db;
    let commander = i64::from(entry.commander_id);
    let item_id = entry.operation_item;

    let Some(template) = load_chapter_template(pool, entry.chapter_id, entry.loop_flag).await? else {
        warn!(
            "Commander {} requested unknown chapter {} (loop {})",
            entry.commander_id, entry.chapter_id, entry.loop_flag
        );
        return Ok(tracking_failed());
    };

    let cost = oil_cost(template.oil, operation_item_cost_rate(pool, item_id).await?);
    if db::get_resource_amount(pool, commander, RESOURCE_OIL).await? < i64::from(cost) {
        debug!("Commander {} lacks {} oil for chapter {}", entry.commander_id, cost, entry.chapter_id);
        return Ok(tracking_failed());
    }
    if item_id != 0 && db::get_item_count(pool, commander, item_id).await? < 1 {
        debug!("Commander {} lacks operation item {}", entry.commander_id, item_id);
        return Ok(tracking_failed());
    }

    let buff_id = operation_buff_id(pool, item_id).await?;
    let now = unix_now();
    let (current, ship_count) = build(&template, buff_id, now as u32)?;
    let state = current.encode_to_vec();

    let mut tx = pool.begin().await?;
    if cost > 0 && !db::consume_resource(&mut *tx, commander, RESOURCE_OIL, cost).await? {
        tx.rollback().await?;
        return Ok(tracking_failed());
    }
    if item_id != 0 && !db::consume_item(&mut *tx, commander, item_id, 1).await? {
        tx.rollback().await?;
        return Ok(tracking_failed());
    }
    db::upsert_chapter_state(&mut *tx, commander, i64::from(entry.chapter_id), &state, now).await?;
    db::ensure_chapter_progress(&mut *tx, commander, i64::from(entry.chapter_id), now).await?;
    tx.commit().await?;

    info!(
        "Commander {} entered chapter {} with {} ships ({} oil)",
        entry.commander_id, entry.chapter_id, ship_count, cost
    );

    Ok(vec![Outgoing::message(
        MSG_SC_CHAPTER_TRACKING,
        &Sc13102 {
            result: RESULT_OK,
            current_chapter: Some(current),
        },
    )])
}

// =============================================================================
// 13103 - chapter operation
// =============================================================================

fn op_response(response: &Sc13104) -> Vec<Outgoing> {
    vec![Outgoing::message(MSG_SC_CHAPTER_OP, response)]
}

pub async fn handle_chapter_op(
    payload: &[u8],
    server: &Arc<Server>,
    session: Arc<RwLock<ClientSession>>,
) -> Result<Vec<Outgoing>> {
    let commander_id = require_commander(&session).await?;
    let request = Cs13103::decode(payload)?;
    let op = ChapterOp::from_request(&request);

    let pool = &server.db;
    let commander = i64::from(commander_id);
    let now = unix_now();
    // An empty blob is no session, same as on the read paths
    let row = db::get_chapter_state(pool, commander, server.config.chapter.session.ttl_secs, now)
        .await?
        .filter(|row| !row.state.is_empty());
    let Some(row) = row else {
        debug!("Rejected {:?} from commander {}: {}", op, commander_id, Rejection::NoSession);
        return Ok(op_response(&failed_response()));
    };

    // Decoded with unknown fields kept so elite fleet records survive the rewrite
    let mut state = Preserved::<CurrentChapterInfo>::decode(&row.state)?;
    let template = if op.needs_template() {
        load_chapter_template(pool, state.message.id, state.message.loop_flag).await?
    } else {
        None
    };

    let outcome = {
        let mut roll = server.roll();
        let mut ctx = OpContext {
            template: template.as_ref(),
            odds: &server.config.chapter.ambush,
            roll: &mut **roll,
        };
        apply_op(&mut state.message, op, &mut ctx)?
    };

    match &outcome {
        OpOutcome::Updated(_) => {
            db::upsert_chapter_state(pool, commander, row.chapter_id, &state.encode_to_vec(), now).await?;
        }
        OpOutcome::Retreated(_) => {
            db::delete_chapter_state(pool, commander).await?;
            info!("Commander {} retreated from chapter {}", commander_id, row.chapter_id);
        }
        OpOutcome::Unchanged(_) => {}
        OpOutcome::Rejected(reason) => {
            debug!("Rejected {:?} from commander {}: {}", op, commander_id, reason);
        }
    }

    Ok(op_response(&outcome.response()))
}

// =============================================================================
// 13106 - battle result poll
// =============================================================================

pub async fn handle_battle_result(
    payload: &[u8],
    server: &Arc<Server>,
    session: Arc<RwLock<ClientSession>>,
) -> Result<Vec<Outgoing>> {
    let commander_id = require_commander(&session).await?;
    Cs13106::decode(payload)?;

    let row = db::get_chapter_state(
        &server.db,
        i64::from(commander_id),
        server.config.chapter.session.ttl_secs,
        unix_now(),
    )
    .await?;
    let current = match row {
        Some(row) => decode_session(&row.state)?,
        None => None,
    };

    Ok(vec![Outgoing::message(
        MSG_SC_CHAPTER_BATTLE_RESULT,
        &battle_result_snapshot(current.as_ref()),
    )])
}

// =============================================================================
// 13000 - chapter base sync
// =============================================================================

/// Base chapter data pushed after join, including the live session if any.
pub async fn chapter_base_sync(server: &Arc<Server>, commander_id: u32) -> Result<Outgoing> {
    let row = db::get_chapter_state(
        &server.db,
        i64::from(commander_id),
        server.config.chapter.session.ttl_secs,
        unix_now(),
    )
    .await?;
    let current_chapter = match row {
        Some(row) => decode_session(&row.state)?,
        None => None,
    };

    Ok(Outgoing::message(
        MSG_SC_CHAPTER_BASE_SYNC,
        &Sc13000 {
            daily_repair_count: 0,
            current_chapter,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chapter::elite_fleet::{parse_elite_fleets, set_elite_fleets};
    use crate::config::GameConfig;
    use crate::handlers::test_support::*;
    use crate::protocol::{
        ChapterCellPos, EliteFleetInfo, FleetInfo, Sc13105, TeamInfo,
    };

    fn entry_request(chapter_id: u32, ships: Vec<u32>, operation_item: Option<u32>) -> Vec<u8> {
        Cs13101 {
            id: chapter_id,
            fleet: Some(FleetInfo {
                id: 1,
                main_team: vec![TeamInfo {
                    id: 1,
                    ship_list: ships,
                    commander_main: None,
                    commander_sub: None,
                }],
                submarine_team: Vec::new(),
                support_team: Vec::new(),
            }),
            operation_item,
            loop_flag: None,
            fleet_duties: Vec::new(),
        }
        .encode_to_vec()
    }

    fn move_request(group_id: u32, row: u32, column: u32) -> Vec<u8> {
        Cs13103 {
            act: 1,
            group_id: Some(group_id),
            act_arg_1: Some(row),
            act_arg_2: Some(column),
        }
        .encode_to_vec()
    }

    fn act_request(act: u32) -> Vec<u8> {
        Cs13103 {
            act,
            group_id: None,
            act_arg_1: None,
            act_arg_2: None,
        }
        .encode_to_vec()
    }

    async fn stored_state(server: &Arc<Server>) -> Option<Vec<u8>> {
        db::get_chapter_state(&server.db, 1, DEFAULT_SESSION_TTL_SECS, unix_now())
            .await
            .unwrap()
            .map(|row| row.state)
    }

    #[tokio::test]
    async fn test_enter_then_move() {
        let server = seeded_server().await;
        let session = joined_session(1);

        let out = handle_chapter_tracking(&entry_request(101, vec![11, 12], None), &server, session.clone())
            .await
            .unwrap();
        assert_eq!(out[0].id, MSG_SC_CHAPTER_TRACKING);
        let entered: Sc13102 = out[0].decode();
        assert_eq!(entered.result, RESULT_OK);
        let current = entered.current_chapter.unwrap();
        assert_eq!(current.main_group_list.len(), 1);
        let group = &current.main_group_list[0];
        assert_eq!(group.pos, Some(ChapterCellPos { row: 1, column: 1 }));
        assert_eq!(group.bullet, 5);
        assert_eq!(db::get_resource_amount(&server.db, 1, RESOURCE_OIL).await.unwrap(), 90);
        assert!(db::get_chapter_progress(&server.db, 1, 101).await.unwrap().is_some());

        let out = handle_chapter_op(&move_request(group.id, 1, 2), &server, session)
            .await
            .unwrap();
        let moved: Sc13104 = out[0].decode();
        assert_eq!(moved.result, RESULT_OK);
        assert_eq!(
            moved.move_path,
            vec![ChapterCellPos { row: 1, column: 1 }, ChapterCellPos { row: 1, column: 2 }]
        );

        let stored = CurrentChapterInfo::decode(stored_state(&server).await.unwrap().as_slice()).unwrap();
        assert_eq!(stored.main_group_list[0].pos, Some(ChapterCellPos { row: 1, column: 2 }));
        assert_eq!(stored.main_group_list[0].step_count, 1);
        assert_eq!(stored.move_step_count, 1);
    }

    #[tokio::test]
    async fn test_entry_rejections_leave_no_trace() {
        let server = seeded_server().await;
        let session = joined_session(1);

        // Unknown chapter
        let out = handle_chapter_tracking(&entry_request(999, vec![11], None), &server, session.clone())
            .await
            .unwrap();
        assert_eq!(out[0].decode::<Sc13102>().result, RESULT_FAILED);

        // Operation item not owned
        let out = handle_chapter_tracking(&entry_request(101, vec![11], Some(300)), &server, session.clone())
            .await
            .unwrap();
        assert_eq!(out[0].decode::<Sc13102>().result, RESULT_FAILED);

        // Not enough oil
        db::fixtures::set_resource(&server.db, 1, RESOURCE_OIL, 9).await;
        let out = handle_chapter_tracking(&entry_request(101, vec![11], None), &server, session.clone())
            .await
            .unwrap();
        assert_eq!(out[0].decode::<Sc13102>().result, RESULT_FAILED);

        // No fleet at all
        let no_fleet = Cs13101 {
            id: 101,
            fleet: None,
            operation_item: None,
            loop_flag: None,
            fleet_duties: Vec::new(),
        };
        let out = handle_chapter_tracking(&no_fleet.encode_to_vec(), &server, session)
            .await
            .unwrap();
        assert_eq!(out[0].decode::<Sc13102>().result, RESULT_FAILED);

        assert!(stored_state(&server).await.is_none());
        assert_eq!(db::get_resource_amount(&server.db, 1, RESOURCE_OIL).await.unwrap(), 9);
    }

    #[tokio::test]
    async fn test_operation_item_raises_cost_and_grants_buff() {
        let server = seeded_server().await;
        db::fixtures::set_item(&server.db, 1, 300, 1).await;
        db::upsert_config_entry(&server.db, ITEM_STATISTICS_CATEGORY, "300", r#"{"id": 300, "usage_arg": "[41]"}"#)
            .await
            .unwrap();
        db::upsert_config_entry(
            &server.db,
            BENEFIT_BUFF_CATEGORY,
            "41",
            r#"{"id": 41, "benefit_type": "more_oil", "benefit_effect": "50"}"#,
        )
        .await
        .unwrap();
        db::upsert_config_entry(
            &server.db,
            BENEFIT_BUFF_CATEGORY,
            "42",
            r#"{"id": 42, "benefit_type": "desc", "benefit_condition": "300"}"#,
        )
        .await
        .unwrap();

        let out = handle_chapter_tracking(&entry_request(101, vec![11], Some(300)), &server, joined_session(1))
            .await
            .unwrap();
        let entered: Sc13102 = out[0].decode();
        assert_eq!(entered.result, RESULT_OK);
        assert_eq!(entered.current_chapter.unwrap().operation_buff, vec![42]);
        assert_eq!(db::get_resource_amount(&server.db, 1, RESOURCE_OIL).await.unwrap(), 85);
        assert_eq!(db::get_item_count(&server.db, 1, 300).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_kr_entry_uses_elite_groups() {
        let mut config = GameConfig::default();
        config.server.server.region = Region::Kr;
        let server = test_server(config, Vec::new()).await;
        seed_commander(&server.db).await;
        db::upsert_config_entry(&server.db, "sharecfgdata/chapter_template.json", "101", SIMPLE_TEMPLATE)
            .await
            .unwrap();

        let request = Cs13101Kr {
            id: 101,
            group_id_list: vec![1],
            operation_item: None,
            loop_flag: None,
            elite_fleet_list: vec![EliteFleetInfo {
                ship_id_list: vec![11, 12, 13],
                commanders: Vec::new(),
            }],
            fleet_duties: Vec::new(),
        };
        let out = handle_chapter_tracking(&request.encode_to_vec(), &server, joined_session(1))
            .await
            .unwrap();
        let entered: Sc13102 = out[0].decode();
        assert_eq!(entered.result, RESULT_OK);
        let current = entered.current_chapter.unwrap();
        assert_eq!(current.main_group_list.len(), 1);
        assert_eq!(current.init_ship_count, 3);
    }

    #[tokio::test]
    async fn test_rejected_move_keeps_blob_identical() {
        let server = seeded_server().await;
        let session = joined_session(1);
        handle_chapter_tracking(&entry_request(101, vec![11], None), &server, session.clone())
            .await
            .unwrap();
        let before = stored_state(&server).await.unwrap();

        let out = handle_chapter_op(&move_request(1, 5, 5), &server, session.clone())
            .await
            .unwrap();
        assert_eq!(out[0].decode::<Sc13104>().result, RESULT_FAILED);

        let out = handle_chapter_op(&act_request(77), &server, session)
            .await
            .unwrap();
        assert_eq!(out[0].decode::<Sc13104>().result, RESULT_FAILED);

        assert_eq!(stored_state(&server).await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_move_keeps_elite_fleet_records() {
        let server = seeded_server().await;
        let session = joined_session(1);
        handle_chapter_tracking(&entry_request(101, vec![11], None), &server, session.clone())
            .await
            .unwrap();

        let fleet = FleetInfo {
            id: 7,
            main_team: vec![TeamInfo {
                id: 1,
                ship_list: vec![11],
                commander_main: None,
                commander_sub: None,
            }],
            submarine_team: Vec::new(),
            support_team: Vec::new(),
        };
        let state = set_elite_fleets(&stored_state(&server).await.unwrap(), &[fleet.clone()]).unwrap();
        db::upsert_chapter_state(&server.db, 1, 101, &state, unix_now())
            .await
            .unwrap();

        let out = handle_chapter_op(&act_request(8), &server, session.clone())
            .await
            .unwrap();
        assert_eq!(out[0].decode::<Sc13104>().result, RESULT_OK);

        let state = stored_state(&server).await.unwrap();
        assert_eq!(parse_elite_fleets(&state).unwrap(), vec![fleet]);
        assert_eq!(CurrentChapterInfo::decode(state.as_slice()).unwrap().round, 1);
    }

    #[tokio::test]
    async fn test_retreat_and_missing_session() {
        let server = seeded_server().await;
        let session = joined_session(1);

        let out = handle_chapter_op(&act_request(49), &server, session.clone())
            .await
            .unwrap();
        assert_eq!(out[0].decode::<Sc13104>().result, RESULT_FAILED);

        handle_chapter_tracking(&entry_request(101, vec![11], None), &server, session.clone())
            .await
            .unwrap();
        let out = handle_chapter_op(&act_request(0), &server, session.clone())
            .await
            .unwrap();
        assert_eq!(out[0].decode::<Sc13104>().result, RESULT_OK);
        assert!(stored_state(&server).await.is_none());

        let out = handle_battle_result(&Cs13106 { arg: None }.encode_to_vec(), &server, session)
            .await
            .unwrap();
        assert_eq!(out[0].id, MSG_SC_CHAPTER_BATTLE_RESULT);
        assert_eq!(out[0].decode::<Sc13105>(), Sc13105::default());
    }

    #[tokio::test]
    async fn test_empty_session_blob_rejects_ops() {
        let server = seeded_server().await;
        let session = joined_session(1);
        db::upsert_chapter_state(&server.db, 1, 101, &[], unix_now())
            .await
            .unwrap();

        for act in [8, 49, 0] {
            let out = handle_chapter_op(&act_request(act), &server, session.clone())
                .await
                .unwrap();
            assert_eq!(out[0].decode::<Sc13104>().result, RESULT_FAILED);
        }

        assert_eq!(stored_state(&server).await.unwrap(), Vec::<u8>::new());
        let sync: Sc13000 = chapter_base_sync(&server, 1).await.unwrap().decode();
        assert!(sync.current_chapter.is_none());
    }

    #[tokio::test]
    async fn test_battle_result_and_base_sync_snapshot() {
        let server = seeded_server().await;
        let session = joined_session(1);
        handle_chapter_tracking(&entry_request(101, vec![11, 12], None), &server, session.clone())
            .await
            .unwrap();

        let out = handle_battle_result(&[], &server, session).await.unwrap();
        let snapshot: Sc13105 = out[0].decode();
        assert_eq!(snapshot.ship_update.len(), 2);
        assert_eq!(snapshot.map_update.len(), 1);

        let sync: Sc13000 = chapter_base_sync(&server, 1).await.unwrap().decode();
        assert_eq!(sync.current_chapter.unwrap().id, 101);
        let sync: Sc13000 = chapter_base_sync(&server, 2).await.unwrap().decode();
        assert!(sync.current_chapter.is_none());
    }

    #[tokio::test]
    async fn test_chapter_message_before_join_is_an_error() {
        let server = seeded_server().await;
        let result = handle_chapter_op(&act_request(49), &server, fresh_session()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_malformed_payload_is_an_error() {
        let server = seeded_server().await;
        let result = handle_chapter_op(&[0xff, 0xff], &server, joined_session(1)).await;
        assert!(result.is_err());
    }
}
