//! HTTP handlers for google-auth-service.

pub mod config;
pub mod health;
pub mod login;
pub mod metrics;
pub mod role;
pub mod users;

pub use config::*;
pub use health::*;
pub use login::*;
pub use role::*;
pub use users::*;
