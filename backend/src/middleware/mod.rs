//! Request middleware and extractors

pub mod auth;
pub mod tenant;

pub use auth::{auth_middleware, AuthUser, CurrentUser};
pub use tenant::TenantUser;
