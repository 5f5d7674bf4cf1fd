//! Chapter Server
//!
//! Game server for campaign chapter sessions over the binary client protocol.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use anyhow::Result;
use dashmap::DashMap;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};
use uuid::Uuid;

mod admin;
mod chapter;
mod config;
mod constants;
mod db;
mod game;
mod handlers;
mod protocol;

use chapter::ChanceRoll;
use config::GameConfig;
use constants::*;
use db::DbPool;
use game::{ClientSession, OnlineCommanders};

/// Shared server state
pub struct Server {
    pub config: GameConfig,
    pub db: DbPool,
    pub sessions: DashMap<Uuid, Arc<RwLock<ClientSession>>>,
    pub online: OnlineCommanders,
    pub connections_by_ip: DashMap<String, usize>,
    next_connection_id: AtomicU32,
    roll: Mutex<Box<dyn ChanceRoll + Send>>,
}

impl Server {
    /// Create a new server instance.
    pub async fn new(config: GameConfig) -> Result<Self> {
        let db = db::create_pool(&config.server.server.database_url).await?;
        db::init_database(&db).await?;

        Ok(Self::with_pool(config, db))
    }

    pub fn with_pool(config: GameConfig, db: DbPool) -> Self {
        Self {
            config,
            db,
            sessions: DashMap::new(),
            online: OnlineCommanders::new(),
            connections_by_ip: DashMap::new(),
            next_connection_id: AtomicU32::new(1),
            roll: Mutex::new(Box::new(StdRng::from_entropy())),
        }
    }

    /// Replace the ambush dice.
    #[cfg(test)]
    pub fn with_roll(self, roll: impl ChanceRoll + Send + 'static) -> Self {
        Self {
            roll: Mutex::new(Box::new(roll)),
            ..self
        }
    }

    /// Ambush dice shared by all connections. Never hold across an await.
    pub fn roll(&self) -> MutexGuard<'_, Box<dyn ChanceRoll + Send>> {
        self.roll.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn next_connection_id(&self) -> u32 {
        self.next_connection_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Get total connection count.
    pub fn connection_count(&self) -> usize {
        self.sessions.len()
    }

    /// Get connection count for an IP.
    pub fn ip_connection_count(&self, ip: &str) -> usize {
        self.connections_by_ip.get(ip).map(|r| *r).unwrap_or(0)
    }

    /// Increment IP connection count.
    pub fn add_ip_connection(&self, ip: &str) {
        self.connections_by_ip
            .entry(ip.to_string())
            .and_modify(|c| *c += 1)
            .or_insert(1);
    }

    /// Decrement IP connection count.
    pub fn remove_ip_connection(&self, ip: &str) {
        if let Some(mut count) = self.connections_by_ip.get_mut(ip) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                drop(count);
                self.connections_by_ip.remove(ip);
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config_dir = std::env::var("CHAPTER_SERVER_CONFIG").unwrap_or_else(|_| "config".to_string());
    let config = GameConfig::load(&config_dir)?;

    // RUST_LOG overrides the configured level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.server.logging.level));

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting Chapter Server v{}", env!("CARGO_PKG_VERSION"));

    let server = Arc::new(Server::new(config.clone()).await?);
    info!("Database initialized");

    let settings = &config.server.server;
    let addr = format!("{}:{}", settings.host, settings.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {} (region {:?})", addr, settings.region);

    spawn_background_tasks(server.clone());

    let admin = &config.server.admin;
    if admin.enabled {
        if admin.api_key.is_empty() {
            warn!("Admin API enabled without an api_key; every request will be refused");
        }
        let state = Arc::new(admin::AdminState {
            server: server.clone(),
            api_key: admin.api_key.clone(),
        });
        let (host, port) = (admin.host.clone(), admin.port);
        tokio::spawn(async move {
            if let Err(e) = admin::start_server(&host, port, state).await {
                error!("Admin API stopped: {}", e);
            }
        });
    }

    loop {
        match listener.accept().await {
            Ok((socket, addr)) => {
                let server = server.clone();

                if server.connection_count() >= settings.max_connections {
                    warn!("Connection limit reached, rejecting {}", addr);
                    continue;
                }

                let ip = addr.ip().to_string();
                if server.ip_connection_count(&ip) >= settings.max_connections_per_ip {
                    warn!("IP connection limit reached for {}", ip);
                    continue;
                }

                tokio::spawn(async move {
                    if let Err(e) = handlers::handle_connection(socket, addr, server).await {
                        error!("Connection handler error for {}: {:#}", addr, e);
                    }
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}

/// Spawn background maintenance tasks.
fn spawn_background_tasks(server: Arc<Server>) {
    // Expired chapter sessions
    let sweep_server = server.clone();
    tokio::spawn(async move {
        let session_config = &sweep_server.config.chapter.session;
        let mut interval = tokio::time::interval(Duration::from_secs(session_config.sweep_interval_secs.max(1)));
        loop {
            interval.tick().await;
            let now = chrono::Utc::now().timestamp();
            match db::delete_expired_chapter_states(&sweep_server.db, session_config.ttl_secs, now).await {
                Ok(0) => {}
                Ok(removed) => info!("Removed {} expired chapter sessions", removed),
                Err(e) => error!("Failed to sweep expired chapter sessions: {}", e),
            }
        }
    });

    // Stale connections
    let cleanup_server = server;
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(CLEANUP_INTERVAL_SECS));
        loop {
            interval.tick().await;

            let mut stale_sessions = Vec::new();
            for session_ref in cleanup_server.sessions.iter() {
                let timed_out = session_ref
                    .value()
                    .try_read()
                    .map(|s| s.is_timed_out())
                    .unwrap_or(false);
                if timed_out {
                    stale_sessions.push(*session_ref.key());
                }
            }

            for session_id in stale_sessions {
                if let Some((_, session)) = cleanup_server.sessions.remove(&session_id) {
                    let session_guard = session.read().await;
                    if let Some(commander_id) = session_guard.commander_id {
                        info!("Cleaning up stale session for commander {}", commander_id);
                        cleanup_server.online.unbind(commander_id, session_id);
                    }
                    cleanup_server.remove_ip_connection(&session_guard.ip_address);
                }
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connection_bookkeeping() {
        let server = Server::with_pool(GameConfig::default(), db::test_pool().await);
        assert_eq!(server.next_connection_id(), 1);
        assert_eq!(server.next_connection_id(), 2);

        server.add_ip_connection("10.0.0.1");
        server.add_ip_connection("10.0.0.1");
        assert_eq!(server.ip_connection_count("10.0.0.1"), 2);
        server.remove_ip_connection("10.0.0.1");
        server.remove_ip_connection("10.0.0.1");
        assert_eq!(server.ip_connection_count("10.0.0.1"), 0);
        assert!(server.connections_by_ip.is_empty());
    }
}
