//! Typed coercion for loosely typed config JSON
//!
//! Chapter tables are exported from the client and do not keep numeric types
//! stable: the same column may hold `3`, `3.0` or `"3"` depending on the row.

use serde_json::Value;

use super::TemplateError;

/// Coerce an integer, float or numeric string into a `u32`.
///
/// Fractions are truncated. Negative or out of range values are rejected.
pub fn coerce_u32(value: &Value, field: &'static str) -> Result<u32, TemplateError> {
    let parsed = match value {
        Value::Number(number) => number
            .as_u64()
            .or_else(|| number.as_f64().and_then(float_to_u64)),
        Value::String(text) => {
            let text = text.trim();
            text.parse::<u64>()
                .ok()
                .or_else(|| text.parse::<f64>().ok().and_then(float_to_u64))
        }
        _ => None,
    };

    parsed
        .and_then(|v| u32::try_from(v).ok())
        .ok_or_else(|| TemplateError::NotNumeric {
            field,
            value: value.to_string(),
        })
}

/// Coerce a boolean or truthy number into a `bool`.
pub fn coerce_bool(value: &Value, field: &'static str) -> Result<bool, TemplateError> {
    match value {
        Value::Bool(flag) => Ok(*flag),
        Value::Number(number) => number
            .as_f64()
            .map(|v| v != 0.0)
            .ok_or_else(|| TemplateError::NotBoolean {
                field,
                value: value.to_string(),
            }),
        Value::String(text) => match text.trim() {
            "true" => Ok(true),
            "false" => Ok(false),
            other => other
                .parse::<f64>()
                .map(|v| v != 0.0)
                .map_err(|_| TemplateError::NotBoolean {
                    field,
                    value: value.to_string(),
                }),
        },
        _ => Err(TemplateError::NotBoolean {
            field,
            value: value.to_string(),
        }),
    }
}

fn float_to_u64(value: f64) -> Option<u64> {
    if value.is_finite() && value >= 0.0 && value <= u64::MAX as f64 {
        Some(value.trunc() as u64)
    } else {
        None
    }
}
