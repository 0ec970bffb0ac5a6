//! Google OAuth login handlers.
//!
//! Implements the credential flow:
//! - consent URL issuance for the CLI and web clients
//! - code submission, yielding a lease
//! - lease renewal (admin, called by the session host)

use axum::extract::{Json, State};
use serde::{Deserialize, Serialize};

use crate::models::{FlowType, Lease};
use crate::services::{CodeUrl, LoginRequest};
use crate::AppState;
use service_core::error::AppError;

// ============================================================================
// Request/Response DTOs
// ============================================================================

/// Lease envelope used by login and renew.
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub auth: Lease,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn cli_code_url(State(state): State<AppState>) -> Result<Json<CodeUrl>, AppError> {
    Ok(Json(state.orchestrator.code_url(FlowType::Cli).await?))
}

pub async fn web_code_url(State(state): State<AppState>) -> Result<Json<CodeUrl>, AppError> {
    Ok(Json(state.orchestrator.code_url(FlowType::Web).await?))
}

pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let auth = state.orchestrator.login(request).await?;
    Ok(Json(AuthResponse { auth }))
}

pub async fn renew(
    State(state): State<AppState>,
    Json(request): Json<AuthResponse>,
) -> Result<Json<AuthResponse>, AppError> {
    let auth = state.orchestrator.renew(request.auth).await?;
    Ok(Json(AuthResponse { auth }))
}
