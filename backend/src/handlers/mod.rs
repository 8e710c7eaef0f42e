//! HTTP handlers
//!
//! Handlers resolve the caller, check the role grant, call one service
//! method and shape the response. Tenant scoping is enforced by the
//! `TenantUser` extractor before any handler body runs.

mod auth;
mod change_log;
mod field_alias;
mod health;
mod inventory;
mod sku;
mod transaction;
mod user;

pub use auth::*;
pub use change_log::*;
pub use field_alias::*;
pub use health::*;
pub use inventory::*;
pub use sku::*;
pub use transaction::*;
pub use user::*;

use serde::Serialize;
use serde_json::Value;

use crate::config::PaginationConfig;
use crate::error::{AppError, AppResult};
use crate::extract::Json;
use crate::middleware::AuthUser;
use shared::{PaginatedResponse, Pagination, Resource};

/// Page request shared by every list endpoint
pub(crate) fn page_of(config: &PaginationConfig, page: Option<u32>, limit: Option<u32>) -> Pagination {
    Pagination::from_query(page, limit, config.default_limit, config.max_limit)
}

/// Serialize a body and drop the fields the caller's role may not see
pub(crate) fn visible<T: Serialize>(user: &AuthUser, resource: Resource, body: &T) -> AppResult<Json<Value>> {
    let value = serde_json::to_value(body).map_err(|e| AppError::Internal(e.to_string()))?;
    let fields = shared::PermissionTable::global().fields(user.role, resource);
    Ok(Json(fields.filter(value)))
}

/// `visible` applied to every row of a page
pub(crate) fn visible_page<T: Serialize>(
    user: &AuthUser,
    resource: Resource,
    page: PaginatedResponse<T>,
) -> AppResult<Json<PaginatedResponse<Value>>> {
    let fields = shared::PermissionTable::global().fields(user.role, resource);
    let rows = page
        .data
        .iter()
        .map(|row| serde_json::to_value(row).map(|v| fields.filter(v)))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Json(PaginatedResponse {
        data: rows,
        pagination: page.pagination,
    }))
}
