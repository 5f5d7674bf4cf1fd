//! Join handler (10022)
//!
//! Binds the connection to the commander owning the account. Tickets are not
//! checked; account registration happens elsewhere.

use std::sync::Arc;

use anyhow::Result;
use prost::Message;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::constants::*;
use crate::db;
use crate::game::ClientSession;
use crate::protocol::{Cs10022, Outgoing, Sc10023};
use crate::Server;

use super::chapter::chapter_base_sync;

pub async fn handle_join_server(
    payload: &[u8],
    server: &Arc<Server>,
    session: Arc<RwLock<ClientSession>>,
) -> Result<Vec<Outgoing>> {
    let request = Cs10022::decode(payload)?;

    let Some(commander) = db::get_commander_by_account(&server.db, i64::from(request.account_id)).await? else {
        warn!("Join with unknown account {}", request.account_id);
        return Ok(vec![Outgoing::message(
            MSG_SC_JOIN_SERVER,
            &Sc10023 {
                result: RESULT_FAILED,
                user_id: 0,
            },
        )]);
    };
    let commander_id = u32::try_from(commander.commander_id)?;

    let session_id = {
        let mut session_guard = session.write().await;
        if let Some(previous) = session_guard.commander_id.filter(|&id| id != commander_id) {
            server.online.unbind(previous, session_guard.session_id);
        }
        session_guard.commander_id = Some(commander_id);
        session_guard.session_id
    };
    if let Some(previous) = server.online.bind(commander_id, session_id) {
        warn!("Commander {} joined again, replacing connection {}", commander_id, previous);
    }

    info!("Commander {} ({}) joined", commander.name, commander_id);

    Ok(vec![
        Outgoing::message(
            MSG_SC_JOIN_SERVER,
            &Sc10023 {
                result: RESULT_OK,
                user_id: commander_id,
            },
        ),
        chapter_base_sync(server, commander_id).await?,
    ])
}
