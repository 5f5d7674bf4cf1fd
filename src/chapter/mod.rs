//! Campaign session engine
//!
//! Pure logic over chapter templates and the persisted session message. Nothing
//! in here touches the database or the network; handlers load the inputs and
//! persist the results.

use thiserror::Error;

mod ambush;
mod builder;
mod coerce;
pub mod elite_fleet;
mod grid;
mod operation_item;
mod ops;
mod pathfind;
mod state;
mod template;

pub use ambush::{AmbushOdds, ChanceRoll};
pub use builder::{build_current_chapter, build_current_chapter_kr};
pub use operation_item::{
    find_operation_buff, oil_cost, operation_cost_rate, BenefitBuff, ItemStatistics, BENEFIT_BUFF_CATEGORY,
    ITEM_STATISTICS_CATEGORY,
};
pub use ops::{apply_op, battle_result_snapshot, failed_response, ChapterOp, OpContext, OpOutcome, Rejection};
pub use template::{ChapterTemplate, TemplateVariant};

#[cfg(test)]
pub use ambush::FixedRoll;

/// Structural problems with chapter config data.
#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Grid entry {index} has {len} fields, expected 4")]
    GridEntryTooShort { index: usize, len: usize },

    #[error("{field} is not a number: {value}")]
    NotNumeric { field: &'static str, value: String },

    #[error("{field} is not a boolean: {value}")]
    NotBoolean { field: &'static str, value: String },
}
