//! Chapter template definitions
//!
//! A template is the immutable description of one chapter map: its grid,
//! spawn points, expedition pools and the odds used for ambush hazards.

use serde::Deserialize;
use serde_json::Value;

use super::coerce::{coerce_bool, coerce_u32};
use super::grid::{Attachment, ChapterGrid};
use super::TemplateError;

pub const CHAPTER_TEMPLATE_CATEGORY: &str = "sharecfgdata/chapter_template.json";
pub const CHAPTER_TEMPLATE_LOOP_CATEGORY: &str = "sharecfgdata/chapter_template_loop.json";

/// Which template table a chapter is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateVariant {
    Standard,
    Loop,
}

impl TemplateVariant {
    pub fn from_loop_flag(loop_flag: u32) -> Self {
        if loop_flag != 0 {
            TemplateVariant::Loop
        } else {
            TemplateVariant::Standard
        }
    }

    pub fn category(self) -> &'static str {
        match self {
            TemplateVariant::Standard => CHAPTER_TEMPLATE_CATEGORY,
            TemplateVariant::Loop => CHAPTER_TEMPLATE_LOOP_CATEGORY,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ChapterTemplate {
    pub id: u32,
    /// `[row, column, walkable, attachment]` tuples with loose JSON types
    pub grids: Vec<Vec<Value>>,
    pub ammo_total: u32,
    pub ammo_submarine: u32,
    pub group_num: u32,
    pub submarine_num: u32,
    pub support_group_num: u32,
    pub is_ambush: u32,
    pub investigation_ratio: u32,
    pub avoid_ratio: u32,
    /// `[extra]` applies everywhere, `[row, column, extra]` to one cell
    pub ambush_ratio_extra: Vec<Vec<i32>>,
    pub chapter_strategy: Vec<u32>,
    #[serde(rename = "boss_expedition_id")]
    pub boss_expeditions: Vec<u32>,
    /// `[expedition_id, weight]` pairs with loose JSON types
    #[serde(rename = "expedition_id_weight_list")]
    pub expedition_weights: Vec<Vec<Value>>,
    #[serde(rename = "elite_expedition_list")]
    pub elite_expeditions: Vec<u32>,
    #[serde(rename = "ambush_expedition_list")]
    pub ambush_expeditions: Vec<u32>,
    #[serde(rename = "guarder_expedition_list")]
    pub guarder_expeditions: Vec<u32>,
    pub awards: Vec<Vec<u32>>,
    pub star_require_1: u32,
    pub star_require_2: u32,
    pub star_require_3: u32,
    pub num_1: u32,
    pub num_2: u32,
    pub num_3: u32,
    pub progress_boss: u32,
    /// Oil spent to enter the chapter
    pub oil: u32,
    /// Seconds the session stays valid on the client
    pub time: u32,
}

impl ChapterTemplate {
    pub fn from_json(data: &str) -> Result<Self, TemplateError> {
        Ok(serde_json::from_str(data)?)
    }

    /// Parse the raw grid tuples into typed cells.
    pub fn parse_grids(&self) -> Result<Vec<ChapterGrid>, TemplateError> {
        self.grids
            .iter()
            .enumerate()
            .map(|(index, entry)| {
                if entry.len() < 4 {
                    return Err(TemplateError::GridEntryTooShort {
                        index,
                        len: entry.len(),
                    });
                }
                Ok(ChapterGrid {
                    row: coerce_u32(&entry[0], "grid row")?,
                    column: coerce_u32(&entry[1], "grid column")?,
                    walkable: coerce_bool(&entry[2], "grid walkable")?,
                    attachment: Attachment::from(coerce_u32(&entry[3], "grid attachment")?),
                })
            })
            .collect()
    }

    /// First non-zero expedition in the weighted pool.
    ///
    /// A first match, not a weighted draw. Entries that fail to coerce are skipped.
    pub fn first_weighted_expedition(&self) -> Option<u32> {
        self.expedition_weights
            .iter()
            .filter_map(|entry| entry.first())
            .filter_map(|id| coerce_u32(id, "expedition id").ok())
            .find(|id| *id != 0)
    }

    pub fn boss_expedition(&self) -> Option<u32> {
        first_nonzero(&self.boss_expeditions)
    }

    pub fn elite_expedition(&self) -> Option<u32> {
        first_nonzero(&self.elite_expeditions)
    }

    /// Ambush pool first, weighted pool as fallback.
    pub fn ambush_expedition(&self) -> Option<u32> {
        first_nonzero(&self.ambush_expeditions).or_else(|| self.first_weighted_expedition())
    }

    /// Guarder pool first, weighted pool as fallback.
    pub fn guarder_expedition(&self) -> Option<u32> {
        first_nonzero(&self.guarder_expeditions).or_else(|| self.first_weighted_expedition())
    }
}

fn first_nonzero(pool: &[u32]) -> Option<u32> {
    pool.first().copied().filter(|id| *id != 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEMPLATE_JSON: &str = r#"{
        "id": 101,
        "grids": [[1, 1, true, 1], ["1", 2.0, 1, 0], [2, 1, false, "6"]],
        "ammo_total": 5,
        "ammo_submarine": 2,
        "is_ambush": 1,
        "investigation_ratio": 120,
        "avoid_ratio": 80,
        "ambush_ratio_extra": [[500], [2, 3, 1000]],
        "boss_expedition_id": [9001],
        "expedition_id_weight_list": [[0, 10], ["3001", 20], [3002, 30]],
        "ambush_expedition_list": [],
        "oil": 10,
        "time": 3600,
        "unknown_column": "ignored"
    }"#;

    #[test]
    fn test_from_json_with_loose_types() {
        let template = ChapterTemplate::from_json(TEMPLATE_JSON).unwrap();
        assert_eq!(template.id, 101);
        assert_eq!(template.ammo_total, 5);
        assert_eq!(template.oil, 10);
        assert!(template.elite_expeditions.is_empty());

        let grids = template.parse_grids().unwrap();
        assert_eq!(grids.len(), 3);
        assert_eq!((grids[1].row, grids[1].column), (1, 2));
        assert!(grids[1].walkable);
        assert_eq!(grids[1].attachment, Attachment::None);
        assert!(!grids[2].walkable);
        assert_eq!(grids[2].attachment, Attachment::Enemy);
    }

    #[test]
    fn test_expedition_pools() {
        let template = ChapterTemplate::from_json(TEMPLATE_JSON).unwrap();
        assert_eq!(template.first_weighted_expedition(), Some(3001));
        assert_eq!(template.boss_expedition(), Some(9001));
        assert_eq!(template.elite_expedition(), None);
        // Empty ambush pool falls back to the weighted pool
        assert_eq!(template.ambush_expedition(), Some(3001));
        assert_eq!(template.guarder_expedition(), Some(3001));
    }

    #[test]
    fn test_short_grid_entry_is_structural() {
        let template = ChapterTemplate::from_json(r#"{"grids": [[1, 1, true]]}"#).unwrap();
        assert!(matches!(
            template.parse_grids(),
            Err(TemplateError::GridEntryTooShort { index: 0, len: 3 })
        ));
    }

    #[test]
    fn test_bad_grid_value_is_structural() {
        let template = ChapterTemplate::from_json(r#"{"grids": [[1, "x", true, 0]]}"#).unwrap();
        assert!(matches!(
            template.parse_grids(),
            Err(TemplateError::NotNumeric { field: "grid column", .. })
        ));
    }

    #[test]
    fn test_variant_category() {
        assert_eq!(
            TemplateVariant::from_loop_flag(0).category(),
            CHAPTER_TEMPLATE_CATEGORY
        );
        assert_eq!(
            TemplateVariant::from_loop_flag(1).category(),
            CHAPTER_TEMPLATE_LOOP_CATEGORY
        );
    }
}
