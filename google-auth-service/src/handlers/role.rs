//! Role handlers. Admin only.

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
};
use serde_json::{json, Map, Value};

use crate::services::BackendError;
use crate::AppState;
use service_core::error::AppError;

pub async fn list_roles(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let keys = state.roles.list_roles().await?;
    Ok(Json(json!({ "keys": keys })))
}

pub async fn read_role(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Value>, AppError> {
    let role = state
        .roles
        .role(&name)
        .await?
        .ok_or(BackendError::RoleNotFound(name))?;
    Ok(Json(role.to_response()))
}

/// Creates the role, or updates the supplied fields of an existing one.
pub async fn write_role(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(fields): Json<Map<String, Value>>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let written = state
        .roles
        .write_role(&name, &fields, &state.config.lease)
        .await?;

    let status = if written.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((
        status,
        Json(json!({
            "name": written.name,
            "data": written.role.to_response(),
            "warnings": written.warnings,
        })),
    ))
}

pub async fn delete_role(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<StatusCode, AppError> {
    state.roles.delete_role(&name).await?;
    Ok(StatusCode::NO_CONTENT)
}
