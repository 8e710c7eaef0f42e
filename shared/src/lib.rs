//! Shared types and rules for the Stockroom inventory platform
//!
//! Everything in this crate is free of I/O so the backend and the browser
//! client (via WASM) evaluate exactly the same valuation and permission logic.

pub mod change_log;
pub mod field_alias;
pub mod models;
pub mod permissions;
pub mod types;
pub mod validation;
pub mod valuation;

pub use change_log::*;
pub use field_alias::*;
pub use models::*;
pub use permissions::*;
pub use types::*;
pub use validation::*;
pub use valuation::*;
