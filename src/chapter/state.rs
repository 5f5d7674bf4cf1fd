//! Lookups and edits on a live session

use crate::protocol::{ChapterCellInfo, CurrentChapterInfo, GroupInChapter, ShipInChapter};

use super::grid::ChapterPos;

impl CurrentChapterInfo {
    /// Search main, then submarine, then support groups.
    pub fn find_group_mut(&mut self, group_id: u32) -> Option<&mut GroupInChapter> {
        self.main_group_list
            .iter_mut()
            .chain(self.submarine_group_list.iter_mut())
            .chain(self.support_group_list.iter_mut())
            .find(|group| group.id == group_id)
    }

    pub fn groups(&self) -> impl Iterator<Item = &GroupInChapter> {
        self.main_group_list
            .iter()
            .chain(self.submarine_group_list.iter())
            .chain(self.support_group_list.iter())
    }

    /// Every ship of every group, main first.
    pub fn collect_ships(&self) -> Vec<ShipInChapter> {
        self.groups()
            .flat_map(|group| group.ship_list.iter().cloned())
            .collect()
    }

    pub fn cell_index_at(&self, pos: ChapterPos) -> Option<usize> {
        self.cell_list
            .iter()
            .position(|cell| cell.pos.map(ChapterPos::from) == Some(pos))
    }

    pub fn cell_at(&self, pos: ChapterPos) -> Option<&ChapterCellInfo> {
        self.cell_index_at(pos).map(|index| &self.cell_list[index])
    }

    /// Replace the cell at the same position, or append it.
    pub fn upsert_cell(&mut self, cell: ChapterCellInfo) {
        let existing = cell
            .pos
            .map(ChapterPos::from)
            .and_then(|pos| self.cell_index_at(pos));
        match existing {
            Some(index) => self.cell_list[index] = cell,
            None => self.cell_list.push(cell),
        }
    }
}

impl GroupInChapter {
    /// Current position, `(0, 0)` when the group has none.
    pub fn position(&self) -> ChapterPos {
        self.pos.map(ChapterPos::from).unwrap_or_default()
    }
}
