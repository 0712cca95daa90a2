//! Derived status summary for a raw sensor reading.
//!
//! Everything here is pure: malformed numbers degrade to the default levels
//! instead of producing errors.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Preferred temperature key (DS18B20 probe).
pub const TEMPERATURE_KEY: &str = "ds18b20_temp";
/// Legacy temperature key, consulted only when the preferred key is missing.
pub const LEGACY_TEMPERATURE_KEY: &str = "temperature";
pub const LIGHT_KEY: &str = "ldr_percent";

pub const HOT_ABOVE: f64 = 26.0;
pub const COLD_BELOW: f64 = 19.0;
pub const DAY_ABOVE: f64 = 40.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TempLevel {
    Hot,
    Cold,
    #[default]
    Normal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayOrNight {
    Day,
    Night,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    pub temp_level: TempLevel,
    pub day_or_night: DayOrNight,
}

/// Resolve the reading's temperature in degrees Celsius.
///
/// `ds18b20_temp` wins whenever it is present and non-null, even if it does not
/// parse; only a missing or null probe value falls back to `temperature`.
pub fn resolve_temperature(fields: &Map<String, Value>) -> Option<f64> {
    let raw = match fields.get(TEMPERATURE_KEY) {
        Some(Value::Null) | None => fields.get(LEGACY_TEMPERATURE_KEY)?,
        Some(value) => value,
    };
    parse_temperature(raw)
}

fn parse_temperature(value: &Value) -> Option<f64> {
    let t = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    t.is_finite().then_some(t)
}

/// Numeric coercion for the light sensor. Anything that cannot be read as a
/// number becomes NaN, which classifies as night.
pub fn coerce_light(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::String(s) if s.trim().is_empty() => 0.0,
        Value::String(s) => s.trim().parse::<f64>().unwrap_or(f64::NAN),
        Value::Bool(b) => f64::from(u8::from(*b)),
        _ => f64::NAN,
    }
}

pub fn classify_temperature(t: f64) -> TempLevel {
    if t > HOT_ABOVE {
        TempLevel::Hot
    } else if t < COLD_BELOW {
        TempLevel::Cold
    } else {
        TempLevel::Normal
    }
}

pub fn derive_status(fields: &Map<String, Value>) -> Status {
    let temp_level = resolve_temperature(fields)
        .map(classify_temperature)
        .unwrap_or_default();

    let day_or_night = match fields.get(LIGHT_KEY) {
        None | Some(Value::Null) => DayOrNight::Unknown,
        Some(value) if coerce_light(value) > DAY_ABOVE => DayOrNight::Day,
        Some(_) => DayOrNight::Night,
    };

    Status {
        temp_level,
        day_or_night,
    }
}
