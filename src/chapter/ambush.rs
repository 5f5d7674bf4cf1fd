//! Ambush hazard odds
//!
//! Probabilities are expressed as thresholds out of `chance_base`; a roll in
//! `0..chance_base` below the threshold succeeds.

use rand::rngs::StdRng;
use rand::Rng;
use serde::Deserialize;

use crate::protocol::{ChapterCellInfo, CurrentChapterInfo, GroupInChapter};

use super::grid::{Attachment, CellFlagKind, ChapterPos};
use super::template::ChapterTemplate;

/// Source of uniform rolls in `0..base`.
pub trait ChanceRoll {
    fn roll(&mut self, base: u32) -> u32;
}

impl ChanceRoll for StdRng {
    fn roll(&mut self, base: u32) -> u32 {
        if base == 0 {
            return 0;
        }
        self.gen_range(0..base)
    }
}

/// Tunable resolver turning template ratios into ambush thresholds.
///
/// Fleet strength is approximated per ship; combat stats are client-side.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AmbushOdds {
    pub chance_base: u32,
    /// Trigger rate of a fresh ambush before any modifiers
    pub base_trigger_rate: f64,
    /// Divides the per-step growth of the trigger rate
    pub step_divisor: f64,
    pub fleet_investigation_per_ship: f64,
    pub fleet_dodge_per_ship: f64,
}

impl Default for AmbushOdds {
    fn default() -> Self {
        Self {
            chance_base: 10000,
            base_trigger_rate: 0.05,
            step_divisor: 4.0,
            fleet_investigation_per_ship: 60.0,
            fleet_dodge_per_ship: 30.0,
        }
    }
}

impl AmbushOdds {
    /// `(position extra, global extra)` from the template's `ambush_ratio_extra`.
    pub fn ratio_extras(&self, template: &ChapterTemplate, pos: ChapterPos) -> (f64, f64) {
        let base = f64::from(self.chance_base.max(1));
        let mut pos_extra = 0.0;
        let mut global_extra = 0.0;
        for entry in &template.ambush_ratio_extra {
            match entry.as_slice() {
                [extra] => global_extra = f64::from(*extra) / base,
                [row, column, extra, ..]
                    if i64::from(*row) == i64::from(pos.row)
                        && i64::from(*column) == i64::from(pos.column) =>
                {
                    pos_extra = f64::from(*extra) / base
                }
                _ => {}
            }
        }
        (pos_extra, global_extra)
    }

    /// Threshold for an ambush appearing where `group` just moved to.
    pub fn trigger_threshold(&self, template: &ChapterTemplate, group: &GroupInChapter, pos: ChapterPos) -> u32 {
        let steps = group.step_count.saturating_sub(1);
        let inv = f64::from(template.investigation_ratio);
        let invest = fleet_sum(self.fleet_investigation_per_ship, group.ship_list.len());
        let (pos_extra, global_extra) = self.ratio_extras(template, pos);

        let mut rate = self.base_trigger_rate + pos_extra + global_extra;
        if steps > 0 && inv + invest > 0.0 && self.step_divisor > 0.0 {
            rate += (inv / (inv + invest)) / self.step_divisor * f64::from(steps);
        }
        self.scale(rate)
    }

    /// Threshold for `group` slipping past an armed ambush.
    ///
    /// A zero `avoid_ratio` always succeeds; large ratios floor to zero.
    pub fn dodge_threshold(&self, template: &ChapterTemplate, group: &GroupInChapter) -> u32 {
        let avoid = f64::from(template.avoid_ratio);
        if avoid <= 0.0 {
            return self.chance_base;
        }
        let dodge = fleet_sum(self.fleet_dodge_per_ship, group.ship_list.len());
        if dodge <= 0.0 {
            return 0;
        }
        self.scale(dodge / (dodge + avoid))
    }

    fn scale(&self, chance: f64) -> u32 {
        (chance.clamp(0.0, 1.0) * f64::from(self.chance_base)) as u32
    }
}

/// Fleet stat sum with the client's diminishing returns applied.
fn fleet_sum(per_ship: f64, ships: usize) -> f64 {
    let sum = per_ship * ships as f64;
    if sum <= 0.0 {
        0.0
    } else {
        sum.powf(2.0 / 3.0)
    }
}

/// Roll for an ambush revealed by moving `group` onto `end`.
///
/// Only plain tiles and spawn cells can host a new ambush. The revealed cell is
/// stored armed and returned for the map update.
pub fn maybe_trigger_ambush(
    odds: &AmbushOdds,
    template: &ChapterTemplate,
    session: &mut CurrentChapterInfo,
    group: &GroupInChapter,
    end: ChapterPos,
    roll: &mut dyn ChanceRoll,
) -> Option<ChapterCellInfo> {
    if template.is_ambush == 0 || end.row == 0 || end.column == 0 {
        return None;
    }
    if let Some(cell) = session.cell_at(end) {
        if !Attachment::from(cell.item_type).is_spawn() {
            return None;
        }
    }

    let threshold = odds.trigger_threshold(template, group, end);
    if threshold == 0 || roll.roll(odds.chance_base) >= threshold {
        return None;
    }

    let expedition = template.ambush_expedition()?;
    let cell = ChapterCellInfo {
        pos: Some(end.into()),
        item_type: Attachment::Ambush.code(),
        item_id: Some(expedition),
        item_flag: CellFlagKind::Armed.code(),
        item_data: 0,
    };
    session.upsert_cell(cell.clone());
    Some(cell)
}

/// Scripted rolls for tests.
#[cfg(test)]
pub struct FixedRoll(pub Vec<u32>);

#[cfg(test)]
impl ChanceRoll for FixedRoll {
    fn roll(&mut self, _base: u32) -> u32 {
        if self.0.is_empty() {
            0
        } else {
            self.0.remove(0)
        }
    }
}
