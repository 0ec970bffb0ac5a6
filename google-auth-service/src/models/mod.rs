pub mod backend_config;
pub mod fields;
pub mod identity;
pub mod lease;
pub mod role;
pub mod state;
pub mod token;
pub mod user_policy;

pub use backend_config::{BackendConfig, ConfigField, FieldKind, OAuthClient, CONFIG_FIELDS};
pub use identity::{Group, Identity};
pub use lease::{Alias, Lease, LeaseInternalData, LeaseLimits, LeaseOptions};
pub use role::Role;
pub use state::{FlowType, LoginState};
pub use token::{DecodeError, Token};
pub use user_policy::UserPolicies;
