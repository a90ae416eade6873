//! Runtime log level control.
//!
//! `GET /api/log-level` reports the active level; `PUT /api/log-level`
//! with `{ "level": "debug" }` changes it through the shared `LogControl`.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::logging::LogLevel;

#[derive(Debug, Serialize, Deserialize)]
pub struct LogLevelBody {
    pub level: String,
}

pub async fn get(State(ctx): State<ApiContext>) -> Json<LogLevelBody> {
    Json(LogLevelBody {
        level: ctx.log.level().as_str().to_string(),
    })
}

pub async fn set(
    State(ctx): State<ApiContext>,
    Json(body): Json<LogLevelBody>,
) -> Result<Json<LogLevelBody>, ApiError> {
    let level: LogLevel = body.level.parse()?;
    ctx.log.set_level(level)?;
    Ok(Json(LogLevelBody {
        level: level.as_str().to_string(),
    }))
}
