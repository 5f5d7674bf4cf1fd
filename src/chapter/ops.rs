//! In-session operation dispatcher
//!
//! Applies one 13103 command to a decoded session. Persistence is left to the
//! caller: the outcome says whether the session changed, must be deleted, or
//! stays as it was.

use thiserror::Error;

use crate::constants::{RESULT_FAILED, RESULT_OK};
use crate::protocol::{CurrentChapterInfo, Cs13103, Sc13104, Sc13105};

use super::ambush::{maybe_trigger_ambush, AmbushOdds, ChanceRoll};
use super::grid::{Attachment, CellFlagKind, ChapterPos};
use super::pathfind::find_move_path;
use super::template::ChapterTemplate;
use super::TemplateError;

const OP_RETREAT: u32 = 0;
const OP_MOVE: u32 = 1;
const OP_AMBUSH: u32 = 4;
const OP_ENEMY_ROUND: u32 = 8;
const OP_REQUEST: u32 = 49;

/// `act_arg_1` of an ambush command asking to slip past it
const AMBUSH_TRY_AVOID: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChapterOp {
    Retreat,
    Move { group_id: u32, to: ChapterPos },
    Ambush { group_id: u32, try_avoid: bool },
    EnemyRound,
    Request,
    Unknown(u32),
}

impl ChapterOp {
    pub fn from_request(request: &Cs13103) -> Self {
        match request.act {
            OP_RETREAT => ChapterOp::Retreat,
            OP_MOVE => ChapterOp::Move {
                group_id: request.group_id(),
                to: ChapterPos::new(request.act_arg_1(), request.act_arg_2()),
            },
            OP_AMBUSH => ChapterOp::Ambush {
                group_id: request.group_id(),
                try_avoid: request.act_arg_1() == AMBUSH_TRY_AVOID,
            },
            OP_ENEMY_ROUND => ChapterOp::EnemyRound,
            OP_REQUEST => ChapterOp::Request,
            other => ChapterOp::Unknown(other),
        }
    }

    /// Whether the chapter template must be loaded to apply this op.
    pub fn needs_template(&self) -> bool {
        matches!(self, ChapterOp::Move { .. } | ChapterOp::Ambush { .. })
    }
}

/// Why an op was refused. The client only ever sees `result = 1`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    #[error("no active chapter session")]
    NoSession,

    #[error("group {0} is not in the session")]
    UnknownGroup(u32),

    #[error("chapter template {0} not found")]
    MissingTemplate(u32),

    #[error("no path from {from} to {to}")]
    NoPath { from: ChapterPos, to: ChapterPos },

    #[error("no ambush at {0}")]
    NotAnAmbush(ChapterPos),

    #[error("unknown operation {0}")]
    UnknownOp(u32),
}

#[derive(Debug, Clone, PartialEq)]
pub enum OpOutcome {
    /// Session changed and must be persisted before replying
    Updated(Sc13104),
    /// Session untouched
    Unchanged(Sc13104),
    /// Session must be deleted
    Retreated(Sc13104),
    Rejected(Rejection),
}

impl OpOutcome {
    pub fn response(&self) -> Sc13104 {
        match self {
            OpOutcome::Updated(response) | OpOutcome::Unchanged(response) | OpOutcome::Retreated(response) => {
                response.clone()
            }
            OpOutcome::Rejected(_) => failed_response(),
        }
    }
}

/// Collaborators an op may need besides the session itself.
pub struct OpContext<'a> {
    pub template: Option<&'a ChapterTemplate>,
    pub odds: &'a AmbushOdds,
    pub roll: &'a mut dyn ChanceRoll,
}

/// Apply `op` to `session`.
///
/// A rejected op leaves the session exactly as it was. Errors are structural:
/// the template exists but its grid cannot be parsed.
pub fn apply_op(
    session: &mut CurrentChapterInfo,
    op: ChapterOp,
    ctx: &mut OpContext<'_>,
) -> Result<OpOutcome, TemplateError> {
    match op {
        ChapterOp::Retreat => Ok(OpOutcome::Retreated(Sc13104 {
            result: RESULT_OK,
            ..Default::default()
        })),
        ChapterOp::Move { group_id, to } => apply_move(session, group_id, to, ctx),
        ChapterOp::Ambush { group_id, try_avoid } => Ok(apply_ambush(session, group_id, try_avoid, ctx)),
        ChapterOp::EnemyRound => {
            session.round += 1;
            Ok(OpOutcome::Updated(snapshot_response(session)))
        }
        ChapterOp::Request => Ok(OpOutcome::Unchanged(snapshot_response(session))),
        ChapterOp::Unknown(code) => Ok(OpOutcome::Rejected(Rejection::UnknownOp(code))),
    }
}

fn apply_move(
    session: &mut CurrentChapterInfo,
    group_id: u32,
    to: ChapterPos,
    ctx: &mut OpContext<'_>,
) -> Result<OpOutcome, TemplateError> {
    let chapter_id = session.id;
    let Some(from) = session.find_group_mut(group_id).map(|group| group.position()) else {
        return Ok(OpOutcome::Rejected(Rejection::UnknownGroup(group_id)));
    };
    let Some(template) = ctx.template else {
        return Ok(OpOutcome::Rejected(Rejection::MissingTemplate(chapter_id)));
    };

    let grids = template.parse_grids()?;
    let Some(path) = find_move_path(&grids, from, to) else {
        return Ok(OpOutcome::Rejected(Rejection::NoPath { from, to }));
    };

    let step_delta = path.len() as u32 - 1;
    let moved = match session.find_group_mut(group_id) {
        Some(group) => {
            group.pos = Some(to.into());
            group.step_count += step_delta;
            group.clone()
        }
        None => return Ok(OpOutcome::Rejected(Rejection::UnknownGroup(group_id))),
    };
    session.move_step_count += step_delta;

    let map_update = maybe_trigger_ambush(ctx.odds, template, session, &moved, to, &mut *ctx.roll)
        .into_iter()
        .collect();

    Ok(OpOutcome::Updated(Sc13104 {
        result: RESULT_OK,
        move_path: path.into_iter().map(Into::into).collect(),
        map_update,
        ..Default::default()
    }))
}

fn apply_ambush(
    session: &mut CurrentChapterInfo,
    group_id: u32,
    try_avoid: bool,
    ctx: &mut OpContext<'_>,
) -> OpOutcome {
    let chapter_id = session.id;
    let Some(group) = session.find_group_mut(group_id).map(|group| group.clone()) else {
        return OpOutcome::Rejected(Rejection::UnknownGroup(group_id));
    };
    let Some(template) = ctx.template else {
        return OpOutcome::Rejected(Rejection::MissingTemplate(chapter_id));
    };

    let pos = group.position();
    let index = match session.cell_index_at(pos) {
        Some(index) if session.cell_list[index].item_type == Attachment::Ambush.code() => index,
        _ => return OpOutcome::Rejected(Rejection::NotAnAmbush(pos)),
    };

    let avoided = try_avoid && {
        let threshold = ctx.odds.dodge_threshold(template, &group);
        threshold > 0 && ctx.roll.roll(ctx.odds.chance_base) < threshold
    };

    let mut map_update = Vec::new();
    if avoided {
        session.cell_list.remove(index);
    } else {
        let cell = &mut session.cell_list[index];
        if cell.item_id() == 0 {
            cell.item_id = template.ambush_expedition();
        }
        cell.item_flag = CellFlagKind::Active.code();
        map_update.push(cell.clone());
    }

    OpOutcome::Updated(Sc13104 {
        map_update,
        ..snapshot_response(session)
    })
}

/// Full state reply used by round advance and snapshot requests.
pub fn snapshot_response(session: &CurrentChapterInfo) -> Sc13104 {
    Sc13104 {
        result: RESULT_OK,
        move_path: Vec::new(),
        map_update: session.cell_list.clone(),
        ship_update: session.collect_ships(),
        ai_list: session.ai_list.clone(),
        buff_list: session.buff_list.clone(),
        cell_flag_list: session.cell_flag_list.clone(),
    }
}

pub fn failed_response() -> Sc13104 {
    Sc13104 {
        result: RESULT_FAILED,
        ..Default::default()
    }
}

/// Mid-battle poll. A missing session yields an empty snapshot.
pub fn battle_result_snapshot(session: Option<&CurrentChapterInfo>) -> Sc13105 {
    match session {
        Some(session) => Sc13105 {
            map_update: session.cell_list.clone(),
            ai_list: session.ai_list.clone(),
            buff_list: session.buff_list.clone(),
            cell_flag_list: session.cell_flag_list.clone(),
            ship_update: session.collect_ships(),
        },
        None => Sc13105::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chapter::ambush::FixedRoll;
    use crate::chapter::builder::build_current_chapter;
    use crate::protocol::{ChapterCellInfo, FleetInfo, TeamInfo};
    use prost::Message;
    use serde_json::json;

    fn scenario_template() -> ChapterTemplate {
        ChapterTemplate {
            id: 101,
            grids: serde_json::from_value(json!([[1, 1, true, 1], [1, 2, true, 0]])).unwrap(),
            ammo_total: 5,
            ..Default::default()
        }
    }

    fn scenario_session(template: &ChapterTemplate) -> CurrentChapterInfo {
        let request = crate::protocol::Cs13101 {
            id: 101,
            fleet: Some(FleetInfo {
                id: 1,
                main_team: vec![TeamInfo {
                    id: 1,
                    ship_list: vec![11, 12],
                    commander_main: None,
                    commander_sub: None,
                }],
                submarine_team: vec![],
                support_team: vec![],
            }),
            operation_item: None,
            loop_flag: None,
            fleet_duties: vec![],
        };
        build_current_chapter(template, &request, 0, 0).unwrap().0
    }

    fn run(
        session: &mut CurrentChapterInfo,
        op: ChapterOp,
        template: Option<&ChapterTemplate>,
        rolls: Vec<u32>,
    ) -> OpOutcome {
        let odds = AmbushOdds::default();
        let mut roll = FixedRoll(rolls);
        let mut ctx = OpContext {
            template,
            odds: &odds,
            roll: &mut roll,
        };
        apply_op(session, op, &mut ctx).unwrap()
    }

    fn move_to(group_id: u32, row: u32, column: u32) -> ChapterOp {
        ChapterOp::Move {
            group_id,
            to: ChapterPos::new(row, column),
        }
    }

    #[test]
    fn test_op_codes() {
        let request = |act, arg1| Cs13103 {
            act,
            group_id: Some(2),
            act_arg_1: Some(arg1),
            act_arg_2: Some(5),
        };
        assert_eq!(ChapterOp::from_request(&request(0, 0)), ChapterOp::Retreat);
        assert_eq!(
            ChapterOp::from_request(&request(1, 4)),
            ChapterOp::Move {
                group_id: 2,
                to: ChapterPos::new(4, 5)
            }
        );
        assert_eq!(
            ChapterOp::from_request(&request(4, 1)),
            ChapterOp::Ambush {
                group_id: 2,
                try_avoid: true
            }
        );
        assert_eq!(ChapterOp::from_request(&request(8, 0)), ChapterOp::EnemyRound);
        assert_eq!(ChapterOp::from_request(&request(49, 0)), ChapterOp::Request);
        assert_eq!(ChapterOp::from_request(&request(77, 0)), ChapterOp::Unknown(77));
        assert!(!ChapterOp::Request.needs_template());
    }

    #[test]
    fn test_two_cell_move_scenario() {
        let template = scenario_template();
        let mut session = scenario_session(&template);

        let OpOutcome::Updated(response) = run(&mut session, move_to(1, 1, 2), Some(&template), vec![]) else {
            panic!("move should succeed");
        };
        assert_eq!(response.result, RESULT_OK);
        let path: Vec<ChapterPos> = response.move_path.into_iter().map(ChapterPos::from).collect();
        assert_eq!(path, vec![ChapterPos::new(1, 1), ChapterPos::new(1, 2)]);
        assert!(response.map_update.is_empty());

        let group = &session.main_group_list[0];
        assert_eq!(group.position(), ChapterPos::new(1, 2));
        assert_eq!(group.step_count, 1);
        assert_eq!(session.move_step_count, 1);
    }

    #[test]
    fn test_move_leaves_other_groups_untouched() {
        let template = ChapterTemplate {
            grids: serde_json::from_value(json!([
                [1, 1, true, 1], [1, 2, true, 1], [1, 3, true, 0], [2, 3, true, 0]
            ]))
            .unwrap(),
            ..scenario_template()
        };
        let mut session = scenario_session(&template);
        let mut other = session.main_group_list[0].clone();
        other.id = 2;
        other.pos = Some(ChapterPos::new(1, 2).into());
        session.main_group_list.push(other.clone());

        let outcome = run(&mut session, move_to(1, 2, 3), Some(&template), vec![]);
        assert!(matches!(outcome, OpOutcome::Updated(_)));
        // Groups do not block each other; the path walks through (1, 2)
        assert_eq!(session.main_group_list[0].step_count, 3);
        assert_eq!(session.move_step_count, 3);
        assert_eq!(session.main_group_list[1], other);
    }

    #[test]
    fn test_rejected_move_is_byte_identical() {
        let template = ChapterTemplate {
            grids: serde_json::from_value(json!([[1, 1, true, 1], [1, 2, false, 0], [1, 3, true, 0]]))
                .unwrap(),
            ..scenario_template()
        };
        let mut session = scenario_session(&template);
        let before = session.encode_to_vec();

        for op in [move_to(1, 1, 2), move_to(1, 1, 3), move_to(1, 9, 9), move_to(7, 1, 3)] {
            let outcome = run(&mut session, op, Some(&template), vec![]);
            assert!(matches!(outcome, OpOutcome::Rejected(_)), "{:?}", op);
            assert_eq!(outcome.response(), failed_response());
            assert_eq!(session.encode_to_vec(), before);
        }

        let outcome = run(&mut session, move_to(1, 1, 3), None, vec![]);
        assert_eq!(outcome, OpOutcome::Rejected(Rejection::MissingTemplate(101)));
        assert_eq!(session.encode_to_vec(), before);
    }

    #[test]
    fn test_move_can_reveal_ambush() {
        let template = ChapterTemplate {
            is_ambush: 1,
            ambush_expeditions: vec![5001],
            ..scenario_template()
        };
        let mut session = scenario_session(&template);

        let OpOutcome::Updated(response) = run(&mut session, move_to(1, 1, 2), Some(&template), vec![0]) else {
            panic!("move should succeed");
        };
        assert_eq!(response.map_update.len(), 1);
        assert_eq!(response.map_update[0].item_type, Attachment::Ambush.code());
        assert_eq!(response.map_update[0].item_flag, CellFlagKind::Armed.code());
        assert!(session.cell_at(ChapterPos::new(1, 2)).is_some());
    }

    fn session_on_ambush(template: &ChapterTemplate, item_id: Option<u32>) -> CurrentChapterInfo {
        let mut session = scenario_session(template);
        session.upsert_cell(ChapterCellInfo {
            pos: Some(ChapterPos::new(1, 1).into()),
            item_type: Attachment::Ambush.code(),
            item_id,
            item_flag: CellFlagKind::Armed.code(),
            item_data: 0,
        });
        session
    }

    #[test]
    fn test_ambush_avoided_removes_cell() {
        let template = ChapterTemplate {
            avoid_ratio: 0,
            ..scenario_template()
        };
        let mut session = session_on_ambush(&template, Some(5001));
        let op = ChapterOp::Ambush {
            group_id: 1,
            try_avoid: true,
        };

        let OpOutcome::Updated(response) = run(&mut session, op, Some(&template), vec![9999]) else {
            panic!("ambush should resolve");
        };
        assert!(response.map_update.is_empty());
        assert!(session.cell_at(ChapterPos::new(1, 1)).is_none());
        assert_eq!(response.ship_update.len(), 2);
    }

    #[test]
    fn test_ambush_fought_activates_cell() {
        let template = ChapterTemplate {
            avoid_ratio: u32::MAX,
            ambush_expeditions: vec![5002],
            ..scenario_template()
        };
        for try_avoid in [true, false] {
            let mut session = session_on_ambush(&template, None);
            let op = ChapterOp::Ambush { group_id: 1, try_avoid };

            let OpOutcome::Updated(response) = run(&mut session, op, Some(&template), vec![0]) else {
                panic!("ambush should resolve");
            };
            assert_eq!(response.map_update.len(), 1);
            let cell = &response.map_update[0];
            assert_eq!(cell.item_flag, CellFlagKind::Active.code());
            assert_eq!(cell.item_id, Some(5002));
            assert_eq!(session.cell_at(ChapterPos::new(1, 1)), Some(cell));
        }
    }

    #[test]
    fn test_ambush_requires_ambush_cell() {
        let template = scenario_template();
        let mut session = scenario_session(&template);
        let before = session.clone();
        let op = ChapterOp::Ambush {
            group_id: 1,
            try_avoid: false,
        };
        assert_eq!(
            run(&mut session, op, Some(&template), vec![]),
            OpOutcome::Rejected(Rejection::NotAnAmbush(ChapterPos::new(1, 1)))
        );
        assert_eq!(session, before);
    }

    #[test]
    fn test_round_request_retreat_unknown() {
        let template = scenario_template();
        let mut session = scenario_session(&template);

        let OpOutcome::Updated(round) = run(&mut session, ChapterOp::EnemyRound, None, vec![]) else {
            panic!("round should update");
        };
        assert_eq!(session.round, 1);
        assert_eq!(round.map_update, session.cell_list);
        assert_eq!(round.ship_update.len(), 2);

        let snapshot = run(&mut session, ChapterOp::Request, None, vec![]);
        assert_eq!(snapshot, OpOutcome::Unchanged(round));
        assert_eq!(session.round, 1);

        assert!(matches!(
            run(&mut session, ChapterOp::Retreat, None, vec![]),
            OpOutcome::Retreated(Sc13104 { result: 0, .. })
        ));

        let before = session.clone();
        assert_eq!(
            run(&mut session, ChapterOp::Unknown(3), None, vec![]),
            OpOutcome::Rejected(Rejection::UnknownOp(3))
        );
        assert_eq!(session, before);
    }

    #[test]
    fn test_battle_result_snapshot() {
        assert_eq!(battle_result_snapshot(None), Sc13105::default());

        let session = scenario_session(&scenario_template());
        let snapshot = battle_result_snapshot(Some(&session));
        assert_eq!(snapshot.map_update, session.cell_list);
        assert_eq!(snapshot.ship_update.len(), 2);
    }
}
