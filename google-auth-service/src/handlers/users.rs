//! Legacy user to policy mapping handlers. Admin only.

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
};
use serde_json::{json, Map, Value};

use crate::AppState;
use service_core::error::AppError;

pub async fn list_users(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let keys = state.roles.list_users().await?;
    Ok(Json(json!({ "keys": keys })))
}

pub async fn read_user(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Value>, AppError> {
    let entry = state.roles.user(&name).await?.ok_or_else(|| {
        AppError::NotFound(anyhow::anyhow!("user {:?} could not be found", name))
    })?;
    Ok(Json(json!({ "policies": entry.policies })))
}

pub async fn write_user(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(fields): Json<Map<String, Value>>,
) -> Result<Json<Value>, AppError> {
    let entry = state.roles.write_user(&name, &fields).await?;
    Ok(Json(json!({ "policies": entry.policies })))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<StatusCode, AppError> {
    state.roles.delete_user(&name).await?;
    Ok(StatusCode::NO_CONTENT)
}
