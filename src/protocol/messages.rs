//! Protobuf message definitions for the chapter protocol
//!
//! The client speaks proto2: scalars it treats as required are always encoded
//! and repeated scalars are never packed.

use prost::Message;

// =============================================================================
// Shared chapter structures
// =============================================================================

#[derive(Clone, Copy, PartialEq, Eq, Hash, Message)]
pub struct ChapterCellPos {
    #[prost(uint32, required, tag = "1")]
    pub row: u32,
    #[prost(uint32, required, tag = "2")]
    pub column: u32,
}

/// A hazard-bearing map cell as the client sees it.
#[derive(Clone, PartialEq, Message)]
pub struct ChapterCellInfo {
    #[prost(message, optional, tag = "1")]
    pub pos: Option<ChapterCellPos>,
    #[prost(uint32, required, tag = "2")]
    pub item_type: u32,
    /// Expedition resolved for the hazard, absent when none applies
    #[prost(uint32, optional, tag = "3")]
    pub item_id: Option<u32>,
    #[prost(uint32, required, tag = "4")]
    pub item_flag: u32,
    #[prost(uint32, required, tag = "5")]
    pub item_data: u32,
}

#[derive(Clone, PartialEq, Message)]
pub struct ShipInChapter {
    #[prost(uint32, required, tag = "1")]
    pub id: u32,
    #[prost(uint32, required, tag = "2")]
    pub hp_rant: u32,
}

#[derive(Clone, PartialEq, Message)]
pub struct CommanderInfo {
    #[prost(uint32, required, tag = "1")]
    pub pos: u32,
    #[prost(uint32, required, tag = "2")]
    pub id: u32,
}

#[derive(Clone, PartialEq, Message)]
pub struct StrategyInfo {
    #[prost(uint32, required, tag = "1")]
    pub id: u32,
    #[prost(uint32, required, tag = "2")]
    pub count: u32,
}

#[derive(Clone, PartialEq, Message)]
pub struct CellFlag {
    #[prost(message, optional, tag = "1")]
    pub pos: Option<ChapterCellPos>,
    #[prost(uint32, repeated, packed = "false", tag = "2")]
    pub flag_list: Vec<u32>,
}

#[derive(Clone, PartialEq, Message)]
pub struct FleetDutyPair {
    #[prost(uint32, required, tag = "1")]
    pub key: u32,
    #[prost(uint32, required, tag = "2")]
    pub value: u32,
}

/// One fleet unit moving on the chapter grid.
#[derive(Clone, PartialEq, Message)]
pub struct GroupInChapter {
    #[prost(uint32, required, tag = "1")]
    pub id: u32,
    #[prost(message, repeated, tag = "2")]
    pub ship_list: Vec<ShipInChapter>,
    #[prost(message, optional, tag = "3")]
    pub pos: Option<ChapterCellPos>,
    #[prost(uint32, required, tag = "4")]
    pub step_count: u32,
    #[prost(message, repeated, tag = "5")]
    pub box_strategy_list: Vec<StrategyInfo>,
    #[prost(message, repeated, tag = "6")]
    pub ship_strategy_list: Vec<StrategyInfo>,
    #[prost(uint32, repeated, packed = "false", tag = "7")]
    pub strategy_ids: Vec<u32>,
    #[prost(uint32, required, tag = "8")]
    pub bullet: u32,
    #[prost(message, optional, tag = "9")]
    pub start_pos: Option<ChapterCellPos>,
    #[prost(message, repeated, tag = "10")]
    pub commander_list: Vec<CommanderInfo>,
    #[prost(uint32, required, tag = "11")]
    pub move_step_down: u32,
    #[prost(uint32, required, tag = "12")]
    pub kill_count: u32,
    #[prost(uint32, required, tag = "13")]
    pub fleet_id: u32,
    #[prost(uint32, required, tag = "14")]
    pub vision_lv: u32,
}

/// The live campaign session. Persisted verbatim as the `chapter_states.state` blob.
#[derive(Clone, PartialEq, Message)]
pub struct CurrentChapterInfo {
    #[prost(uint32, required, tag = "1")]
    pub id: u32,
    /// Unix time at which the session expires on the client
    #[prost(uint32, required, tag = "2")]
    pub time: u32,
    #[prost(message, repeated, tag = "3")]
    pub cell_list: Vec<ChapterCellInfo>,
    #[prost(message, repeated, tag = "4")]
    pub main_group_list: Vec<GroupInChapter>,
    #[prost(message, repeated, tag = "5")]
    pub ai_list: Vec<ChapterCellInfo>,
    #[prost(message, repeated, tag = "6")]
    pub escort_list: Vec<ChapterCellInfo>,
    #[prost(uint32, required, tag = "7")]
    pub round: u32,
    #[prost(uint32, required, tag = "8")]
    pub is_submarine_auto_attack: u32,
    #[prost(uint32, repeated, packed = "false", tag = "9")]
    pub operation_buff: Vec<u32>,
    #[prost(uint32, required, tag = "10")]
    pub model_act_count: u32,
    #[prost(uint32, repeated, packed = "false", tag = "11")]
    pub buff_list: Vec<u32>,
    #[prost(uint32, required, tag = "12")]
    pub loop_flag: u32,
    #[prost(uint32, repeated, packed = "false", tag = "13")]
    pub extra_flag_list: Vec<u32>,
    #[prost(message, repeated, tag = "14")]
    pub cell_flag_list: Vec<CellFlag>,
    #[prost(uint32, required, tag = "15")]
    pub chapter_hp: u32,
    #[prost(message, repeated, tag = "16")]
    pub chapter_strategy_list: Vec<StrategyInfo>,
    #[prost(uint32, required, tag = "17")]
    pub kill_count: u32,
    #[prost(uint32, required, tag = "18")]
    pub init_ship_count: u32,
    #[prost(uint32, required, tag = "19")]
    pub continuous_kill_count: u32,
    #[prost(message, repeated, tag = "20")]
    pub battle_statistics: Vec<StrategyInfo>,
    #[prost(message, repeated, tag = "21")]
    pub fleet_duties: Vec<FleetDutyPair>,
    #[prost(uint32, required, tag = "22")]
    pub move_step_count: u32,
    #[prost(message, repeated, tag = "23")]
    pub submarine_group_list: Vec<GroupInChapter>,
    #[prost(message, repeated, tag = "24")]
    pub support_group_list: Vec<GroupInChapter>,
}

// =============================================================================
// Fleet submissions
// =============================================================================

#[derive(Clone, PartialEq, Message)]
pub struct TeamInfo {
    #[prost(uint32, required, tag = "1")]
    pub id: u32,
    #[prost(uint32, repeated, packed = "false", tag = "2")]
    pub ship_list: Vec<u32>,
    #[prost(uint32, optional, tag = "3")]
    pub commander_main: Option<u32>,
    #[prost(uint32, optional, tag = "4")]
    pub commander_sub: Option<u32>,
}

#[derive(Clone, PartialEq, Message)]
pub struct FleetInfo {
    #[prost(uint32, required, tag = "1")]
    pub id: u32,
    #[prost(message, repeated, tag = "2")]
    pub main_team: Vec<TeamInfo>,
    #[prost(message, repeated, tag = "3")]
    pub submarine_team: Vec<TeamInfo>,
    #[prost(message, repeated, tag = "4")]
    pub support_team: Vec<TeamInfo>,
}

#[derive(Clone, PartialEq, Message)]
pub struct EliteFleetInfo {
    #[prost(uint32, repeated, packed = "false", tag = "1")]
    pub ship_id_list: Vec<u32>,
    #[prost(message, repeated, tag = "2")]
    pub commanders: Vec<CommanderInfo>,
}

// =============================================================================
// 10022 / 10023 - join server
// =============================================================================

#[derive(Clone, PartialEq, Message)]
pub struct Cs10022 {
    #[prost(uint32, required, tag = "1")]
    pub account_id: u32,
    #[prost(string, optional, tag = "2")]
    pub server_ticket: Option<String>,
}

#[derive(Clone, PartialEq, Message)]
pub struct Sc10023 {
    #[prost(uint32, required, tag = "1")]
    pub result: u32,
    #[prost(uint32, required, tag = "2")]
    pub user_id: u32,
}

// =============================================================================
// 13000 - chapter base sync
// =============================================================================

#[derive(Clone, PartialEq, Message)]
pub struct Sc13000 {
    #[prost(uint32, required, tag = "1")]
    pub daily_repair_count: u32,
    #[prost(message, optional, tag = "2")]
    pub current_chapter: Option<CurrentChapterInfo>,
}

// =============================================================================
// 13101 / 13102 - chapter entry
// =============================================================================

#[derive(Clone, PartialEq, Message)]
pub struct Cs13101 {
    #[prost(uint32, required, tag = "1")]
    pub id: u32,
    #[prost(message, optional, tag = "2")]
    pub fleet: Option<FleetInfo>,
    #[prost(uint32, optional, tag = "3")]
    pub operation_item: Option<u32>,
    #[prost(uint32, optional, tag = "4")]
    pub loop_flag: Option<u32>,
    #[prost(message, repeated, tag = "5")]
    pub fleet_duties: Vec<FleetDutyPair>,
}

/// KR clients submit pre-formed elite groups instead of team ship lists.
#[derive(Clone, PartialEq, Message)]
pub struct Cs13101Kr {
    #[prost(uint32, required, tag = "1")]
    pub id: u32,
    #[prost(uint32, repeated, packed = "false", tag = "2")]
    pub group_id_list: Vec<u32>,
    #[prost(uint32, optional, tag = "3")]
    pub operation_item: Option<u32>,
    #[prost(uint32, optional, tag = "4")]
    pub loop_flag: Option<u32>,
    #[prost(message, repeated, tag = "5")]
    pub elite_fleet_list: Vec<EliteFleetInfo>,
    #[prost(message, repeated, tag = "6")]
    pub fleet_duties: Vec<FleetDutyPair>,
}

#[derive(Clone, PartialEq, Message)]
pub struct Sc13102 {
    #[prost(uint32, required, tag = "1")]
    pub result: u32,
    #[prost(message, optional, tag = "2")]
    pub current_chapter: Option<CurrentChapterInfo>,
}

// =============================================================================
// 13103 / 13104 - chapter operation
// =============================================================================

#[derive(Clone, PartialEq, Message)]
pub struct Cs13103 {
    #[prost(uint32, required, tag = "1")]
    pub act: u32,
    #[prost(uint32, optional, tag = "2")]
    pub group_id: Option<u32>,
    #[prost(uint32, optional, tag = "3")]
    pub act_arg_1: Option<u32>,
    #[prost(uint32, optional, tag = "4")]
    pub act_arg_2: Option<u32>,
}

#[derive(Clone, PartialEq, Message)]
pub struct Sc13104 {
    #[prost(uint32, required, tag = "1")]
    pub result: u32,
    #[prost(message, repeated, tag = "2")]
    pub move_path: Vec<ChapterCellPos>,
    #[prost(message, repeated, tag = "3")]
    pub map_update: Vec<ChapterCellInfo>,
    #[prost(message, repeated, tag = "4")]
    pub ship_update: Vec<ShipInChapter>,
    #[prost(message, repeated, tag = "5")]
    pub ai_list: Vec<ChapterCellInfo>,
    #[prost(uint32, repeated, packed = "false", tag = "6")]
    pub buff_list: Vec<u32>,
    #[prost(message, repeated, tag = "7")]
    pub cell_flag_list: Vec<CellFlag>,
}

// =============================================================================
// 13106 / 13105 - battle result poll
// =============================================================================

#[derive(Clone, PartialEq, Message)]
pub struct Cs13106 {
    #[prost(uint32, optional, tag = "1")]
    pub arg: Option<u32>,
}

#[derive(Clone, PartialEq, Message)]
pub struct Sc13105 {
    #[prost(message, repeated, tag = "1")]
    pub map_update: Vec<ChapterCellInfo>,
    #[prost(message, repeated, tag = "2")]
    pub ai_list: Vec<ChapterCellInfo>,
    #[prost(uint32, repeated, packed = "false", tag = "3")]
    pub buff_list: Vec<u32>,
    #[prost(message, repeated, tag = "4")]
    pub cell_flag_list: Vec<CellFlag>,
    #[prost(message, repeated, tag = "5")]
    pub ship_update: Vec<ShipInChapter>,
}

// =============================================================================
// 13111 / 13112 - remove ship from elite fleets
// =============================================================================

#[derive(Clone, PartialEq, Message)]
pub struct Cs13111 {
    #[prost(uint32, required, tag = "1")]
    pub ship_id: u32,
}

#[derive(Clone, PartialEq, Message)]
pub struct Sc13112 {
    #[prost(message, repeated, tag = "1")]
    pub fleet_list: Vec<FleetInfo>,
}
