//! Transaction handlers

use axum::{extract::State, http::StatusCode};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use super::{page_of, visible, visible_page};
use crate::error::AppResult;
use crate::extract::{Json, Path, Query};
use crate::middleware::TenantUser;
use crate::services::transaction::{
    CreateTransactionInput, RecordedTransaction, TransactionFilter, TransactionSummary,
};
use crate::services::TransactionService;
use crate::AppState;
use shared::{Action, PaginatedResponse, Resource};

#[derive(Debug, Deserialize)]
pub struct ListTransactionsQuery {
    pub transaction_type: Option<String>,
    pub sku_id: Option<Uuid>,
    pub category: Option<String>,
    pub search: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct TransactionSummaryQuery {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

fn transaction_service(state: &AppState) -> TransactionService {
    TransactionService::new(state.db.clone(), state.change_logs())
}

/// List stock movements
pub async fn list_transactions(
    State(state): State<AppState>,
    TenantUser(user): TenantUser,
    Query(query): Query<ListTransactionsQuery>,
) -> AppResult<Json<PaginatedResponse<Value>>> {
    user.require(Resource::Transactions, Action::Read)?;

    let page = page_of(&state.config.pagination, query.page, query.limit);
    let filter = TransactionFilter {
        transaction_type: query.transaction_type,
        sku_id: query.sku_id,
        category: query.category,
        search: query.search,
        start_date: query.start_date,
        end_date: query.end_date,
    };
    let rows = transaction_service(&state)
        .list(user.organization_id, filter, page)
        .await?;

    visible_page(&user, Resource::Transactions, rows)
}

/// Record a stock movement
pub async fn create_transaction(
    State(state): State<AppState>,
    TenantUser(user): TenantUser,
    Json(input): Json<CreateTransactionInput>,
) -> AppResult<(StatusCode, Json<RecordedTransaction>)> {
    user.require(Resource::Transactions, Action::Create)?;

    let recorded = transaction_service(&state)
        .create(user.organization_id, user.user_id, input)
        .await?;

    Ok((StatusCode::CREATED, Json(recorded)))
}

/// Get a stock movement by ID
pub async fn get_transaction(
    State(state): State<AppState>,
    TenantUser(user): TenantUser,
    Path((_, transaction_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<Value>> {
    user.require(Resource::Transactions, Action::Read)?;

    let transaction = transaction_service(&state)
        .get(user.organization_id, transaction_id)
        .await?;

    visible(&user, Resource::Transactions, &transaction)
}

/// Totals per movement direction
pub async fn get_transaction_summary(
    State(state): State<AppState>,
    TenantUser(user): TenantUser,
    Query(query): Query<TransactionSummaryQuery>,
) -> AppResult<Json<Vec<TransactionSummary>>> {
    user.require(Resource::Transactions, Action::Read)?;

    let summary = transaction_service(&state)
        .summary(user.organization_id, query.start_date, query.end_date)
        .await?;

    Ok(Json(summary))
}
