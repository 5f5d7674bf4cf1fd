//! Configuration module for the chapter server
//!
//! Loads server and chapter-engine settings from TOML files. Static game data
//! (chapter templates, item tables) lives in the `config_entries` table instead.

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use crate::chapter::AmbushOdds;
use crate::constants::*;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    IoError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    ParseError {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

/// Complete configuration loaded from all TOML files
#[derive(Debug, Clone, Default)]
pub struct GameConfig {
    pub server: ServerConfig,
    pub chapter: ChapterConfig,
}

// =============================================================================
// server.toml
// =============================================================================

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: ServerSettingsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub admin: AdminConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettingsConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    #[serde(default = "default_max_connections_per_ip")]
    pub max_connections_per_ip: usize,
    #[serde(default)]
    pub region: Region,
}

impl Default for ServerSettingsConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            database_url: default_database_url(),
            max_connections: default_max_connections(),
            max_connections_per_ip: default_max_connections_per_ip(),
            region: Region::default(),
        }
    }
}

/// Client build the server answers. Only KR submits chapter fleets as elite groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Region {
    Cn,
    #[default]
    En,
    Jp,
    Kr,
    Tw,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            max_message_size: default_max_message_size(),
            connection_timeout_secs: default_connection_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdminConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_admin_port")]
    pub port: u16,
    #[serde(default = "default_admin_host")]
    pub host: String,
    #[serde(default)]
    pub api_key: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_admin_port(),
            host: default_admin_host(),
            api_key: String::new(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_database_url() -> String {
    "sqlite:chapter_server.db?mode=rwc".to_string()
}

fn default_max_connections() -> usize {
    MAX_TOTAL_CONNECTIONS
}

fn default_max_connections_per_ip() -> usize {
    MAX_CONNECTIONS_PER_IP
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_message_size() -> usize {
    MAX_MESSAGE_SIZE
}

fn default_connection_timeout() -> u64 {
    CONNECTION_TIMEOUT_SECS
}

fn default_admin_port() -> u16 {
    DEFAULT_ADMIN_PORT
}

fn default_admin_host() -> String {
    "127.0.0.1".to_string()
}

// =============================================================================
// chapter.toml
// =============================================================================

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ChapterConfig {
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub ambush: AmbushOdds,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Idle sessions older than this are discarded unless the chapter is cleared
    #[serde(default = "default_session_ttl")]
    pub ttl_secs: u64,
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_session_ttl(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

fn default_session_ttl() -> u64 {
    DEFAULT_SESSION_TTL_SECS
}

fn default_sweep_interval() -> u64 {
    DEFAULT_SWEEP_INTERVAL_SECS
}

// =============================================================================
// Config Loading
// =============================================================================

impl GameConfig {
    /// Load all configuration files from the given directory.
    ///
    /// A missing file falls back to defaults; a malformed one is an error.
    pub fn load(config_dir: &str) -> Result<Self, ConfigError> {
        let dir = Path::new(config_dir);

        let server = load_toml_or_default::<ServerConfig>(&dir.join("server.toml"))?;
        let chapter = load_toml_or_default::<ChapterConfig>(&dir.join("chapter.toml"))?;

        Ok(Self { server, chapter })
    }
}

fn load_toml_or_default<T>(path: &Path) -> Result<T, ConfigError>
where
    T: for<'de> Deserialize<'de> + Default,
{
    if !path.exists() {
        warn!("Config file {} not found, using defaults", path.display());
        return Ok(T::default());
    }
    load_toml(path)
}

fn load_toml<T>(path: &Path) -> Result<T, ConfigError>
where
    T: for<'de> Deserialize<'de>,
{
    let path_str = path.display().to_string();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::IoError {
        path: path_str.clone(),
        source: e,
    })?;

    toml::from_str(&content).map_err(|e| ConfigError::ParseError {
        path: path_str,
        source: e,
    })
}
