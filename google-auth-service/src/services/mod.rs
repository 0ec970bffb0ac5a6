//! Services layer for google-auth-service.
//!
//! Storage-backed stores, the Google provider seams, authorization and the
//! login orchestrator that composes them.

pub mod authorization;
pub mod config_store;
pub mod error;
pub mod google;
pub mod login;
pub mod metrics;
pub mod provider;
pub mod role_store;
pub mod state_store;
pub mod storage;

pub use authorization::AuthorizationMode;
pub use config_store::ConfigStore;
pub use error::BackendError;
pub use google::GoogleProvider;
pub use login::{CodeUrl, LoginOrchestrator, LoginRequest, LoginSettings};
pub use provider::{
    GroupsProvider, IdentityResolver, MockGroupsProvider, MockUserProvider, ProviderError,
    UserProvider,
};
pub use role_store::{RoleStore, RoleWrite};
pub use state_store::StateStore;
pub use storage::{MemoryStorage, RedisStorage, Storage};
