//! Message handlers for the chapter server

use std::sync::Arc;

use anyhow::{bail, Result};
use tokio::sync::RwLock;

use crate::game::ClientSession;

pub mod chapter;
mod connection;
pub mod elite;
pub mod join;

pub use connection::handle_connection;

/// Commander bound to the connection. Chapter messages before a join are a
/// protocol violation.
async fn require_commander(session: &Arc<RwLock<ClientSession>>) -> Result<u32> {
    let session = session.read().await;
    match session.commander_id {
        Some(commander_id) => Ok(commander_id),
        None => bail!("connection {} sent a chapter message before joining", session.connection_id),
    }
}

/// Unix time in seconds.
fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}
