use axum::{extract::rejection::JsonRejection, extract::State, Json};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::AppState;
use crate::{error::Result, reading::ValidationError};

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct IngestAck {
    pub ok: bool,
}

/// POST /api/data
/// Accepts one reading from the device
pub async fn ingest(
    State(state): State<AppState>,
    payload: std::result::Result<Json<Value>, JsonRejection>,
) -> Result<Json<IngestAck>> {
    let Json(payload) =
        payload.map_err(|rejection| ValidationError::MalformedBody(rejection.body_text()))?;

    state.pipeline.ingest(payload)?;

    Ok(Json(IngestAck { ok: true }))
}

/// GET /api/last
/// Returns the latest reading, or `{}` before the first ingest
pub async fn latest(State(state): State<AppState>) -> Result<Json<Value>> {
    let body = match state.pipeline.latest() {
        Some(reading) => serde_json::to_value(reading.as_ref())?,
        None => json!({}),
    };
    Ok(Json(body))
}
