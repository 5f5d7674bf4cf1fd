//! Connection state for the chapter server

use std::time::Instant;

use dashmap::DashMap;
use uuid::Uuid;

use crate::constants::*;

/// Per-connection state (in-memory only, not persisted)
#[derive(Debug)]
pub struct ClientSession {
    pub session_id: Uuid,
    /// Sequential id used in logs
    pub connection_id: u32,
    pub commander_id: Option<u32>,
    pub ip_address: String,
    pub connected_at: Instant,
    pub last_activity: Instant,
    timeout_secs: u64,
}

impl ClientSession {
    pub fn new(connection_id: u32, ip_address: String, timeout_secs: u64) -> Self {
        let now = Instant::now();
        Self {
            session_id: Uuid::new_v4(),
            connection_id,
            commander_id: None,
            ip_address,
            connected_at: now,
            last_activity: now,
            timeout_secs,
        }
    }

    pub fn is_joined(&self) -> bool {
        self.commander_id.is_some()
    }

    pub fn update_activity(&mut self) {
        self.last_activity = Instant::now();
    }

    pub fn seconds_since_activity(&self) -> u64 {
        self.last_activity.elapsed().as_secs()
    }

    pub fn is_timed_out(&self) -> bool {
        if self.is_joined() {
            self.seconds_since_activity() > self.timeout_secs
        } else {
            self.seconds_since_activity() > UNAUTHENTICATED_TIMEOUT_SECS
        }
    }
}

/// Which connection each joined commander is bound to.
#[derive(Debug, Default)]
pub struct OnlineCommanders {
    by_commander: DashMap<u32, Uuid>,
}

impl OnlineCommanders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a commander to a connection, returning the connection it replaced.
    pub fn bind(&self, commander_id: u32, session_id: Uuid) -> Option<Uuid> {
        self.by_commander
            .insert(commander_id, session_id)
            .filter(|previous| *previous != session_id)
    }

    /// Unbind only if the commander is still bound to `session_id`.
    pub fn unbind(&self, commander_id: u32, session_id: Uuid) {
        self.by_commander
            .remove_if(&commander_id, |_, bound| *bound == session_id);
    }

    pub fn session_of(&self, commander_id: u32) -> Option<Uuid> {
        self.by_commander.get(&commander_id).map(|r| *r)
    }

    pub fn len(&self) -> usize {
        self.by_commander.len()
    }
}
