use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::status::{derive_status, resolve_temperature, Status};

/// Keys owned by the server; incoming values under these names are replaced.
const RECEIVED_AT_KEY: &str = "receivedAt";
const STATUS_KEY: &str = "status";

/// Why an ingest payload was refused. No state is touched when this is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid JSON received: expected an object, got {found}")]
    NotAnObject { found: &'static str },

    #[error("Invalid JSON received: {0}")]
    MalformedBody(String),
}

/// Accept only a JSON object; every other shape is a client error.
pub fn validate_payload(payload: Value) -> Result<Map<String, Value>, ValidationError> {
    match payload {
        Value::Object(fields) => Ok(fields),
        other => Err(ValidationError::NotAnObject {
            found: json_kind(&other),
        }),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A processed reading: raw sensor fields passed through, plus the server
/// timestamp and the derived status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    #[serde(flatten)]
    pub fields: Map<String, Value>,
    #[serde(rename = "receivedAt", serialize_with = "serialize_iso_millis")]
    pub received_at: DateTime<Utc>,
    pub status: Status,
}

impl Reading {
    pub fn from_fields(mut fields: Map<String, Value>, received_at: DateTime<Utc>) -> Self {
        fields.remove(RECEIVED_AT_KEY);
        fields.remove(STATUS_KEY);

        let status = derive_status(&fields);
        Self {
            fields,
            received_at,
            status,
        }
    }

    pub fn temperature(&self) -> Option<f64> {
        resolve_temperature(&self.fields)
    }
}

fn serialize_iso_millis<S>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Millis, true))
}
