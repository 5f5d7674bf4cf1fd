//! Protocol and game constants
//!
//! Message ids and enum values are fixed by the client and cannot be changed.

// =============================================================================
// SERVER CONFIGURATION
// =============================================================================

pub const DEFAULT_PORT: u16 = 7000;
pub const DEFAULT_ADMIN_PORT: u16 = 7080;

/// Bytes before the protobuf payload: size (2), reserved (1), id (2), index (2)
pub const PACKET_HEADER_SIZE: usize = 7;
/// The size field counts the payload plus everything after itself
pub const PACKET_SIZE_OVERHEAD: usize = 5;

// =============================================================================
// MESSAGE IDS
// =============================================================================

// Join (2)
pub const MSG_CS_JOIN_SERVER: u16 = 10022;
pub const MSG_SC_JOIN_SERVER: u16 = 10023;

// Chapter base (1)
pub const MSG_SC_CHAPTER_BASE_SYNC: u16 = 13000;

// Chapter session (8)
pub const MSG_CS_CHAPTER_TRACKING: u16 = 13101;
pub const MSG_SC_CHAPTER_TRACKING: u16 = 13102;
pub const MSG_CS_CHAPTER_OP: u16 = 13103;
pub const MSG_SC_CHAPTER_OP: u16 = 13104;
pub const MSG_SC_CHAPTER_BATTLE_RESULT: u16 = 13105;
pub const MSG_CS_CHAPTER_BATTLE_RESULT: u16 = 13106;
pub const MSG_CS_REMOVE_ELITE_SHIP: u16 = 13111;
pub const MSG_SC_REMOVE_ELITE_SHIP: u16 = 13112;

// =============================================================================
// RESULT CODES
// =============================================================================

pub const RESULT_OK: u32 = 0;
pub const RESULT_FAILED: u32 = 1;

// =============================================================================
// ECONOMY
// =============================================================================

/// Resource id of oil, the fuel spent on chapter entry
pub const RESOURCE_OIL: u32 = 2;

// =============================================================================
// CHAPTER SESSION
// =============================================================================

/// Placeholder health ratio for ships entering a chapter (combat is client-side)
pub const FULL_HP_RANT: u32 = 10000;

/// Reserved top-level field number carrying elite fleet records in the session blob
pub const ELITE_FLEET_FIELD: u32 = 1001;

/// Progress value marking a cleared chapter
pub const CHAPTER_PROGRESS_CLEARED: u32 = 100;

pub const DEFAULT_SESSION_TTL_SECS: u64 = 60 * 60 * 24;
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 600;

// =============================================================================
// NETWORK
// =============================================================================

pub const MAX_MESSAGE_SIZE: usize = 65535;
pub const MAX_TOTAL_CONNECTIONS: usize = 500;
pub const MAX_CONNECTIONS_PER_IP: usize = 8;
pub const CONNECTION_TIMEOUT_SECS: u64 = 300;
pub const UNAUTHENTICATED_TIMEOUT_SECS: u64 = 30;
pub const CLEANUP_INTERVAL_SECS: u64 = 60;
