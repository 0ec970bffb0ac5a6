//! Backend configuration handlers. Admin only; secrets are write-only.

use axum::{
    extract::{Json, State},
    http::StatusCode,
};
use serde_json::{json, Map, Value};

use crate::AppState;
use service_core::error::AppError;

pub async fn read_config(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let described = state.config_store.describe().await?;
    Ok(Json(Value::Object(described)))
}

pub async fn write_config(
    State(state): State<AppState>,
    Json(fields): Json<Map<String, Value>>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let changed = state.config_store.write(&fields).await?;
    Ok((StatusCode::OK, Json(json!({ "changed": changed }))))
}
