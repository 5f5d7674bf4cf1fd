//! Grid and cell model
//!
//! Turns template grid tuples into typed cells, picks spawn points and builds
//! the initial hazard cell list of a session.

use crate::protocol::{ChapterCellInfo, ChapterCellPos};

use super::template::ChapterTemplate;

/// A 1-indexed grid coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ChapterPos {
    pub row: u32,
    pub column: u32,
}

impl ChapterPos {
    pub const fn new(row: u32, column: u32) -> Self {
        Self { row, column }
    }

    /// Spawn used when a template has no grid at all.
    pub const FALLBACK_SPAWN: ChapterPos = ChapterPos::new(1, 1);
}

impl From<ChapterCellPos> for ChapterPos {
    fn from(pos: ChapterCellPos) -> Self {
        Self::new(pos.row, pos.column)
    }
}

impl From<ChapterPos> for ChapterCellPos {
    fn from(pos: ChapterPos) -> Self {
        ChapterCellPos {
            row: pos.row,
            column: pos.column,
        }
    }
}

impl std::fmt::Display for ChapterPos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.row, self.column)
    }
}

/// Hazard or marker attached to a grid entry. Codes are fixed by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attachment {
    None,
    Born,
    Elite,
    Ambush,
    Enemy,
    TorpedoEnemy,
    Boss,
    Champion,
    BornSub,
    BombEnemy,
    Other(u32),
}

impl From<u32> for Attachment {
    fn from(code: u32) -> Self {
        match code {
            0 => Attachment::None,
            1 => Attachment::Born,
            4 => Attachment::Elite,
            5 => Attachment::Ambush,
            6 => Attachment::Enemy,
            7 => Attachment::TorpedoEnemy,
            8 => Attachment::Boss,
            12 => Attachment::Champion,
            16 => Attachment::BornSub,
            24 => Attachment::BombEnemy,
            other => Attachment::Other(other),
        }
    }
}

impl Attachment {
    pub fn code(self) -> u32 {
        match self {
            Attachment::None => 0,
            Attachment::Born => 1,
            Attachment::Elite => 4,
            Attachment::Ambush => 5,
            Attachment::Enemy => 6,
            Attachment::TorpedoEnemy => 7,
            Attachment::Boss => 8,
            Attachment::Champion => 12,
            Attachment::BornSub => 16,
            Attachment::BombEnemy => 24,
            Attachment::Other(code) => code,
        }
    }

    pub fn is_spawn(self) -> bool {
        matches!(self, Attachment::Born | Attachment::BornSub)
    }

    /// Initial flag of a freshly built cell.
    pub fn initial_flag(self) -> CellFlagKind {
        match self {
            Attachment::Ambush => CellFlagKind::Armed,
            _ => CellFlagKind::Active,
        }
    }

    /// Expedition resolved for a cell carrying this attachment.
    pub fn expedition_id(self, template: &ChapterTemplate) -> Option<u32> {
        match self {
            Attachment::Boss => template.boss_expedition(),
            Attachment::Enemy => template.first_weighted_expedition(),
            Attachment::Elite => template.elite_expedition(),
            Attachment::Ambush => template.ambush_expedition(),
            Attachment::Champion | Attachment::BombEnemy | Attachment::TorpedoEnemy => {
                template.guarder_expedition()
            }
            _ => None,
        }
    }
}

/// `item_flag` values of a session cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum CellFlagKind {
    Active = 0,
    /// Ambush waiting to be fought or avoided
    Armed = 2,
}

impl CellFlagKind {
    pub fn code(self) -> u32 {
        self as u32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChapterGrid {
    pub row: u32,
    pub column: u32,
    pub walkable: bool,
    pub attachment: Attachment,
}

impl ChapterGrid {
    pub fn pos(&self) -> ChapterPos {
        ChapterPos::new(self.row, self.column)
    }
}

/// All positions tagged with `attachment`, or the first grid entry if none are.
pub fn select_spawn_positions(grids: &[ChapterGrid], attachment: Attachment) -> Vec<ChapterPos> {
    let positions: Vec<ChapterPos> = grids
        .iter()
        .filter(|grid| grid.attachment == attachment)
        .map(ChapterGrid::pos)
        .collect();

    if positions.is_empty() {
        return grids.first().map(ChapterGrid::pos).into_iter().collect();
    }
    positions
}

/// Spawn for the `index`-th group of a kind.
pub fn choose_spawn(spawns: &[ChapterPos], index: usize) -> ChapterPos {
    spawns
        .get(index)
        .or_else(|| spawns.first())
        .copied()
        .unwrap_or(ChapterPos::FALLBACK_SPAWN)
}

/// One session cell per grid entry with a non-zero attachment.
pub fn build_chapter_cells(grids: &[ChapterGrid], template: &ChapterTemplate) -> Vec<ChapterCellInfo> {
    grids
        .iter()
        .filter(|grid| grid.attachment != Attachment::None)
        .map(|grid| ChapterCellInfo {
            pos: Some(grid.pos().into()),
            item_type: grid.attachment.code(),
            item_id: grid.attachment.expedition_id(template),
            item_flag: grid.attachment.initial_flag().code(),
            item_data: 0,
        })
        .collect()
}
