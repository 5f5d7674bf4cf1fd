//! Elite fleet maintenance (13111)

use std::sync::Arc;

use anyhow::{bail, Result};
use prost::Message;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::chapter::elite_fleet::{elite_fleets, remove_ship_from_fleets, replace_elite_fleets};
use crate::constants::*;
use crate::db;
use crate::game::ClientSession;
use crate::protocol::{CurrentChapterInfo, Cs13111, Outgoing, Preserved, Sc13112};
use crate::Server;

use super::{require_commander, unix_now};

/// Remove a ship from every elite fleet stored with the commander's session.
///
/// The reply lists the fleets as they are after the removal.
pub async fn handle_remove_elite_target_ship(
    payload: &[u8],
    server: &Arc<Server>,
    session: Arc<RwLock<ClientSession>>,
) -> Result<Vec<Outgoing>> {
    let commander_id = require_commander(&session).await?;
    let request = Cs13111::decode(payload)?;

    let pool = &server.db;
    let commander = i64::from(commander_id);
    if !db::owns_ship(pool, commander, request.ship_id).await? {
        bail!("commander {} does not own ship {}", commander_id, request.ship_id);
    }

    let now = unix_now();
    let row = db::get_chapter_state(pool, commander, server.config.chapter.session.ttl_secs, now).await?;
    let Some(row) = row.filter(|row| !row.state.is_empty()) else {
        debug!("Commander {} has no session holding elite fleets", commander_id);
        return Ok(vec![Outgoing::message(MSG_SC_REMOVE_ELITE_SHIP, &Sc13112::default())]);
    };

    let mut state = Preserved::<CurrentChapterInfo>::decode(&row.state)?;
    let mut fleets = elite_fleets(&state)?;
    remove_ship_from_fleets(&mut fleets, request.ship_id);
    replace_elite_fleets(&mut state, &fleets)?;
    db::upsert_chapter_state(pool, commander, row.chapter_id, &state.encode_to_vec(), now).await?;

    info!(
        "Removed ship {} from {} elite fleets of commander {}",
        request.ship_id,
        fleets.len(),
        commander_id
    );

    Ok(vec![Outgoing::message(
        MSG_SC_REMOVE_ELITE_SHIP,
        &Sc13112 { fleet_list: fleets },
    )])
}
