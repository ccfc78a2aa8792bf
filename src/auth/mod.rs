//! Authentication module
//!
//! Supports: Bearer (OAuth access token) and Basic (agent email + API token)
//!
//! The `Authenticator` applies the configured credentials to every
//! outgoing request.

mod authenticator;
mod types;

pub use authenticator::Authenticator;
pub use types::AuthConfig;
