use crate::models::fields::FieldError;
use crate::models::DecodeError;
use crate::services::provider::ProviderError;
use service_core::error::AppError;
use thiserror::Error;

pub const STATE_NOT_FOUND: &str = "this state can't be found or has already been used";
pub const USER_NOT_ALLOWED: &str = "user is not allowed to login";
pub const ROLE_NOT_ALLOWED: &str = "user is not allowed to use this role";
pub const POLICIES_CHANGED: &str = "policies have changed, not renewing";
pub const NO_REFRESH_TOKEN: &str = "no refresh token from previous login";

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Storage error: {0}")]
    Storage(#[source] anyhow::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("missing config for {0} oauth2 client")]
    MissingClientConfig(&'static str),

    #[error("{}", STATE_NOT_FOUND)]
    StateNotFound,

    #[error("{}", USER_NOT_ALLOWED)]
    NotAllowed,

    #[error("{}", ROLE_NOT_ALLOWED)]
    RoleNotAllowed,

    #[error("role {0:?} could not be found")]
    RoleNotFound(String),

    #[error("{}", POLICIES_CHANGED)]
    PolicyDrift,

    #[error("{}", NO_REFRESH_TOKEN)]
    MissingToken,

    #[error("user email is not verified")]
    UnverifiedEmail,

    #[error(transparent)]
    Upstream(#[from] ProviderError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    InvalidField(#[from] FieldError),

    #[error("{0}")]
    InvalidRequest(String),
}

impl From<BackendError> for AppError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Storage(e) => AppError::StorageError(e),
            BackendError::Serialization(e) => AppError::InternalError(anyhow::Error::new(e)),
            e @ (BackendError::MissingClientConfig(_)
            | BackendError::StateNotFound
            | BackendError::MissingToken
            | BackendError::Decode(_)
            | BackendError::InvalidField(_)
            | BackendError::InvalidRequest(_)) => AppError::BadRequest(anyhow::anyhow!(e.to_string())),
            e @ (BackendError::NotAllowed
            | BackendError::RoleNotAllowed
            | BackendError::PolicyDrift
            | BackendError::UnverifiedEmail) => AppError::Forbidden(anyhow::anyhow!(e.to_string())),
            BackendError::RoleNotFound(name) => {
                AppError::NotFound(anyhow::anyhow!("role {:?} could not be found", name))
            }
            BackendError::Upstream(e) => {
                tracing::warn!(error = %e, "Upstream provider call failed");
                AppError::BadGateway("upstream identity provider request failed".to_string())
            }
        }
    }
}
