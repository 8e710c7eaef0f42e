//! Transaction service: immutable stock movements
//!
//! Recording a movement and revaluing its inventory row happen in one
//! database transaction. The SKU row is locked first so concurrent movements
//! on the same SKU queue up behind each other, including the very first one
//! that opens the inventory row.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use validator::Validate;

use super::inventory::{self, Inventory};
use super::{day_bounds, like_pattern, ChangeLogService};
use crate::error::{AppError, AppResult};
use shared::{NewChangeLog, PaginatedResponse, Pagination, TransactionType};

/// Transaction service
#[derive(Clone)]
pub struct TransactionService {
    db: PgPool,
    change_logs: ChangeLogService,
}

/// A stored movement
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Transaction {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub sku_id: Uuid,
    pub transaction_type: String,
    pub quantity: i32,
    pub unit_cost: Decimal,
    pub total_cost: Decimal,
    pub reference_number: Option<String>,
    pub notes: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Movement joined with its SKU and creator
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TransactionWithSku {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub sku_id: Uuid,
    pub transaction_type: String,
    pub quantity: i32,
    pub unit_cost: Decimal,
    pub total_cost: Decimal,
    pub reference_number: Option<String>,
    pub notes: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub sku_code: String,
    pub product_name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub created_by_name: Option<String>,
}

/// A recorded movement together with the stock row it produced
#[derive(Debug, Serialize)]
pub struct RecordedTransaction {
    pub transaction: TransactionWithSku,
    pub inventory: Inventory,
}

/// Input for recording a movement.
///
/// `unit_cost` is required for `in`. For `out` it defaults to the current
/// weighted cost so `total_cost` reflects the value that left stock.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateTransactionInput {
    pub sku_id: Uuid,
    pub transaction_type: String,
    #[validate(range(min = 1, message = "must be at least 1"))]
    pub quantity: i32,
    pub unit_cost: Option<Decimal>,
    #[validate(length(max = 100, message = "must be at most 100 characters"))]
    pub reference_number: Option<String>,
    #[validate(length(max = 1000, message = "must be at most 1000 characters"))]
    pub notes: Option<String>,
}

/// Filters for the transaction list
#[derive(Debug, Default, Deserialize)]
pub struct TransactionFilter {
    pub transaction_type: Option<String>,
    pub sku_id: Option<Uuid>,
    pub category: Option<String>,
    pub search: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// Totals for one movement direction
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TransactionSummary {
    pub transaction_type: String,
    pub total_transactions: i64,
    pub total_quantity: i64,
    pub total_value: Decimal,
}

const TRANSACTION_COLUMNS: &str = "id, organization_id, sku_id, transaction_type, quantity, unit_cost, \
                                   total_cost, reference_number, notes, created_by, created_at, updated_at";

const SELECT_WITH_SKU: &str = r#"
    SELECT t.id, t.organization_id, t.sku_id, t.transaction_type, t.quantity, t.unit_cost,
           t.total_cost, t.reference_number, t.notes, t.created_by, t.created_at, t.updated_at,
           s.sku_code, s.product_name, s.description, s.category, u.name AS created_by_name
    FROM inventory_transactions t
    JOIN skus s ON s.id = t.sku_id AND s.organization_id = t.organization_id
    LEFT JOIN users u ON u.id = t.created_by
"#;

const LIST_FILTER: &str = r#"
    WHERE t.organization_id = $1
      AND ($2::text IS NULL OR t.transaction_type = $2)
      AND ($3::uuid IS NULL OR t.sku_id = $3)
      AND ($4::text IS NULL OR s.category = $4)
      AND ($5::text IS NULL
           OR s.sku_code ILIKE $5
           OR s.product_name ILIKE $5
           OR COALESCE(t.reference_number, '') ILIKE $5
           OR COALESCE(t.notes, '') ILIKE $5)
      AND ($6::timestamptz IS NULL OR t.created_at >= $6)
      AND ($7::timestamptz IS NULL OR t.created_at < $7)
"#;

impl TransactionService {
    /// Create a new TransactionService instance
    pub fn new(db: PgPool, change_logs: ChangeLogService) -> Self {
        Self { db, change_logs }
    }

    /// Record a movement and revalue the SKU's stock row
    pub async fn create(&self, org_id: Uuid, actor_id: Uuid, input: CreateTransactionInput) -> AppResult<RecordedTransaction> {
        input.validate()?;
        let kind: TransactionType = input.transaction_type.parse()?;
        let reference_number = shared::normalize_optional(input.reference_number);
        let notes = shared::normalize_optional(input.notes);

        let mut tx = self.db.begin().await?;

        let sku_found = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM skus WHERE organization_id = $1 AND id = $2 FOR NO KEY UPDATE",
        )
        .bind(org_id)
        .bind(input.sku_id)
        .fetch_optional(&mut *tx)
        .await?;
        if sku_found.is_none() {
            return Err(AppError::not_found("SKU"));
        }

        let current = inventory::lock_for_update(&mut *tx, org_id, input.sku_id).await?;
        let unit_cost = resolve_unit_cost(kind, input.unit_cost, current.as_ref())?;

        // Rejections happen here, before anything is written
        let current_level = current.as_ref().map(Inventory::level);
        let level = shared::apply_transaction(current_level.as_ref(), kind, input.quantity, unit_cost)?;
        let total_cost = shared::extended_cost(input.quantity, unit_cost)?;

        let transaction = sqlx::query_as::<_, Transaction>(&format!(
            r#"
            INSERT INTO inventory_transactions (
                organization_id, sku_id, transaction_type, quantity, unit_cost, total_cost,
                reference_number, notes, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {}
            "#,
            TRANSACTION_COLUMNS
        ))
        .bind(org_id)
        .bind(input.sku_id)
        .bind(kind.as_str())
        .bind(input.quantity)
        .bind(unit_cost)
        .bind(total_cost)
        .bind(&reference_number)
        .bind(&notes)
        .bind(actor_id)
        .fetch_one(&mut *tx)
        .await?;

        let stock = match &current {
            Some(row) => inventory::update_level(&mut *tx, row.id, &level).await?,
            None => inventory::insert_level(&mut *tx, org_id, input.sku_id, &level).await?,
        };

        tx.commit().await?;

        tracing::info!(
            organization_id = %org_id,
            transaction_id = %transaction.id,
            sku_id = %transaction.sku_id,
            transaction_type = %kind,
            quantity = transaction.quantity,
            new_quantity = stock.quantity,
            weighted_cost = %stock.weighted_cost,
            "transaction recorded"
        );

        self.change_logs
            .record_best_effort(
                org_id,
                NewChangeLog::transaction(actor_id, transaction.id, transaction.sku_id)
                    .with_reason(shared::transaction_reason(kind, transaction.quantity, notes.as_deref()))
                    .with_metadata(serde_json::json!({
                        "transaction_type": kind,
                        "quantity": transaction.quantity,
                        "unit_cost": transaction.unit_cost,
                        "total_cost": transaction.total_cost,
                        "previous_quantity": current.as_ref().map(|c| c.quantity),
                        "new_quantity": stock.quantity,
                        "weighted_cost": stock.weighted_cost,
                    })),
            )
            .await;

        Ok(RecordedTransaction {
            transaction: self.get(org_id, transaction.id).await?,
            inventory: stock,
        })
    }

    /// Get a movement by ID
    pub async fn get(&self, org_id: Uuid, transaction_id: Uuid) -> AppResult<TransactionWithSku> {
        sqlx::query_as::<_, TransactionWithSku>(&format!(
            "{} WHERE t.organization_id = $1 AND t.id = $2",
            SELECT_WITH_SKU
        ))
        .bind(org_id)
        .bind(transaction_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found("Transaction"))
    }

    /// List movements, newest first
    pub async fn list(
        &self,
        org_id: Uuid,
        filter: TransactionFilter,
        page: Pagination,
    ) -> AppResult<PaginatedResponse<TransactionWithSku>> {
        let kind = filter
            .transaction_type
            .as_deref()
            .map(str::parse::<TransactionType>)
            .transpose()?;
        let category = shared::normalize_optional(filter.category);
        let search = like_pattern(filter.search.as_deref());
        let (since, until) = day_bounds(filter.start_date, filter.end_date)?;

        let total = sqlx::query_scalar::<_, i64>(&format!(
            r#"
            SELECT COUNT(*) FROM inventory_transactions t
            JOIN skus s ON s.id = t.sku_id AND s.organization_id = t.organization_id
            {}
            "#,
            LIST_FILTER
        ))
        .bind(org_id)
        .bind(kind.map(|k| k.as_str()))
        .bind(filter.sku_id)
        .bind(&category)
        .bind(&search)
        .bind(since)
        .bind(until)
        .fetch_one(&self.db)
        .await?;

        let rows = sqlx::query_as::<_, TransactionWithSku>(&format!(
            "{} {} ORDER BY t.created_at DESC LIMIT $8 OFFSET $9",
            SELECT_WITH_SKU, LIST_FILTER
        ))
        .bind(org_id)
        .bind(kind.map(|k| k.as_str()))
        .bind(filter.sku_id)
        .bind(&category)
        .bind(&search)
        .bind(since)
        .bind(until)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(PaginatedResponse::new(rows, page, total.max(0) as u64))
    }

    /// Count, quantity and value per movement direction
    pub async fn summary(
        &self,
        org_id: Uuid,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> AppResult<Vec<TransactionSummary>> {
        let (since, until) = day_bounds(start_date, end_date)?;

        let rows = sqlx::query_as::<_, TransactionSummary>(
            r#"
            SELECT transaction_type,
                   COUNT(*) AS total_transactions,
                   COALESCE(SUM(quantity), 0)::BIGINT AS total_quantity,
                   COALESCE(SUM(total_cost), 0) AS total_value
            FROM inventory_transactions
            WHERE organization_id = $1
              AND ($2::timestamptz IS NULL OR created_at >= $2)
              AND ($3::timestamptz IS NULL OR created_at < $3)
            GROUP BY transaction_type
            ORDER BY transaction_type
            "#,
        )
        .bind(org_id)
        .bind(since)
        .bind(until)
        .fetch_all(&self.db)
        .await?;

        Ok(rows)
    }
}

fn resolve_unit_cost(kind: TransactionType, requested: Option<Decimal>, current: Option<&Inventory>) -> AppResult<Decimal> {
    match (kind, requested) {
        (_, Some(cost)) => Ok(cost),
        (TransactionType::In, None) => Err(AppError::InvalidArgument(
            "unit_cost is required for in transactions".to_string(),
        )),
        (TransactionType::Out, None) => Ok(current.map(|c| c.weighted_cost).unwrap_or(Decimal::ZERO)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(quantity: i32, cost: i64) -> Inventory {
        Inventory {
            id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            sku_id: Uuid::new_v4(),
            quantity,
            weighted_cost: Decimal::from(cost),
            total_value: Decimal::from(i64::from(quantity) * cost),
            is_manual_cost: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_in_requires_unit_cost() {
        let err = resolve_unit_cost(TransactionType::In, None, None).unwrap_err();
        assert!(matches!(err, AppError::InvalidArgument(_)));
    }

    #[test]
    fn test_out_defaults_to_weighted_cost() {
        let current = row(20, 3);
        assert_eq!(
            resolve_unit_cost(TransactionType::Out, None, Some(&current)).unwrap(),
            Decimal::from(3)
        );
        assert_eq!(
            resolve_unit_cost(TransactionType::Out, Some(Decimal::from(5)), Some(&current)).unwrap(),
            Decimal::from(5)
        );
    }

    #[test]
    fn test_input_rejects_zero_quantity() {
        let input: CreateTransactionInput = serde_json::from_str(&format!(
            r#"{{"sku_id": "{}", "transaction_type": "in", "quantity": 0, "unit_cost": "2.00"}}"#,
            Uuid::new_v4()
        ))
        .unwrap();
        assert!(input.validate().is_err());
    }
}
