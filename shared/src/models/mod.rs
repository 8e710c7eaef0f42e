//! Domain models for the Stockroom inventory platform

mod inventory;
mod user;

pub use inventory::*;
pub use user::*;

use thiserror::Error;

/// Raised when a string does not name a member of one of the fixed enumerations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {kind}: {value}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    pub fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}
