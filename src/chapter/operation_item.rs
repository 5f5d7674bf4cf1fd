//! Operation items consumed on chapter entry
//!
//! An operation item raises the oil cost through `more_oil` benefit buffs and
//! grants the `desc` buff whose condition names the item.

use serde::Deserialize;
use serde_json::Value;

use super::coerce::coerce_u32;
use super::TemplateError;

pub const ITEM_STATISTICS_CATEGORY: &str = "sharecfgdata/item_data_statistics.json";
pub const BENEFIT_BUFF_CATEGORY: &str = "ShareCfg/benefit_buff_template.json";

const BENEFIT_MORE_OIL: &str = "more_oil";
const BENEFIT_DESC: &str = "desc";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ItemStatistics {
    pub id: u32,
    /// A JSON array, or a string holding one
    pub usage_arg: Value,
}

impl ItemStatistics {
    pub fn from_json(data: &str) -> Result<Self, TemplateError> {
        Ok(serde_json::from_str(data)?)
    }

    /// Benefit buff ids listed in `usage_arg`. Non-numeric entries are skipped.
    pub fn usage_buff_ids(&self) -> Result<Vec<u32>, TemplateError> {
        let parsed;
        let list = match &self.usage_arg {
            Value::Null => return Ok(Vec::new()),
            Value::String(text) if text.trim().is_empty() => return Ok(Vec::new()),
            Value::String(text) => {
                parsed = serde_json::from_str::<Value>(text.trim())?;
                &parsed
            }
            other => other,
        };

        let Value::Array(entries) = list else {
            return Ok(Vec::new());
        };
        Ok(entries
            .iter()
            .filter_map(|entry| coerce_u32(entry, "usage_arg").ok())
            .collect())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BenefitBuff {
    pub id: u32,
    pub benefit_type: String,
    pub benefit_effect: String,
    pub benefit_condition: String,
}

impl BenefitBuff {
    pub fn from_json(data: &str) -> Result<Self, TemplateError> {
        Ok(serde_json::from_str(data)?)
    }
}

/// Oil cost multiplier from an item's buffs; never below 1.
pub fn operation_cost_rate(buffs: &[BenefitBuff]) -> f64 {
    let rate = buffs
        .iter()
        .filter(|buff| buff.benefit_type == BENEFIT_MORE_OIL)
        .filter_map(|buff| buff.benefit_effect.trim().parse::<f64>().ok())
        .fold(1.0, |rate, effect| rate + effect * 0.01);
    rate.max(1.0)
}

/// The `desc` buff describing `item_id`, if any.
pub fn find_operation_buff<'a>(buffs: impl IntoIterator<Item = &'a BenefitBuff>, item_id: u32) -> Option<u32> {
    buffs
        .into_iter()
        .filter(|buff| buff.benefit_type == BENEFIT_DESC)
        .find(|buff| buff.benefit_condition.trim().parse::<u32>().ok() == Some(item_id))
        .map(|buff| buff.id)
}

/// Oil needed to enter with `base_oil`, truncated like the client does.
pub fn oil_cost(base_oil: u32, rate: f64) -> u32 {
    (f64::from(base_oil) * rate) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buff(id: u32, benefit_type: &str, effect: &str, condition: &str) -> BenefitBuff {
        BenefitBuff {
            id,
            benefit_type: benefit_type.to_string(),
            benefit_effect: effect.to_string(),
            benefit_condition: condition.to_string(),
        }
    }

    #[test]
    fn test_usage_arg_shapes() {
        let array = ItemStatistics::from_json(r#"{"id": 1, "usage_arg": [11, "12", "x"]}"#).unwrap();
        assert_eq!(array.usage_buff_ids().unwrap(), vec![11, 12]);

        let string = ItemStatistics::from_json(r#"{"id": 1, "usage_arg": "[21, 22]"}"#).unwrap();
        assert_eq!(string.usage_buff_ids().unwrap(), vec![21, 22]);

        let empty = ItemStatistics::from_json(r#"{"id": 1, "usage_arg": ""}"#).unwrap();
        assert!(empty.usage_buff_ids().unwrap().is_empty());

        let missing = ItemStatistics::from_json(r#"{"id": 1}"#).unwrap();
        assert!(missing.usage_buff_ids().unwrap().is_empty());

        let broken = ItemStatistics::from_json(r#"{"id": 1, "usage_arg": "[1,"}"#).unwrap();
        assert!(broken.usage_buff_ids().is_err());
    }

    #[test]
    fn test_cost_rate() {
        assert_eq!(operation_cost_rate(&[]), 1.0);
        let buffs = vec![
            buff(1, "more_oil", "50", ""),
            buff(2, "more_oil", "25", ""),
            buff(3, "desc", "900", ""),
            buff(4, "more_oil", "lots", ""),
        ];
        assert_eq!(operation_cost_rate(&buffs), 1.75);
        assert_eq!(oil_cost(10, operation_cost_rate(&buffs)), 17);

        // Discounts never push the rate below 1
        assert_eq!(operation_cost_rate(&[buff(1, "more_oil", "-80", "")]), 1.0);
    }

    #[test]
    fn test_find_operation_buff() {
        let buffs = vec![
            buff(1, "more_oil", "50", "300"),
            buff(2, "desc", "", "301"),
            buff(3, "desc", "", "300"),
        ];
        assert_eq!(find_operation_buff(&buffs, 300), Some(3));
        assert_eq!(find_operation_buff(&buffs, 999), None);
    }
}
