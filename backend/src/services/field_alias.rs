//! Field-alias service: per-organization display labels for table columns

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use validator::Validate;

use super::{check_patch_len, normalize_patch, ChangeLogService};
use crate::error::{AppError, AppResult};
use shared::{apply_patch, ChangeType, NewChangeLog, SUPPORTED_TABLES};

/// Field-alias service
#[derive(Clone)]
pub struct FieldAliasService {
    db: PgPool,
    change_logs: ChangeLogService,
}

/// A stored display label
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct FieldAlias {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub table_name: String,
    pub field_name: String,
    pub display_name: String,
    pub description: Option<String>,
    pub is_hidden: bool,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating an alias
#[derive(Debug, Deserialize, Validate)]
pub struct CreateFieldAliasInput {
    #[validate(length(min = 1, max = 100, message = "must be 1-100 characters"))]
    pub table_name: String,
    #[validate(length(min = 1, max = 100, message = "must be 1-100 characters"))]
    pub field_name: String,
    #[validate(length(min = 1, max = 255, message = "must be 1-255 characters"))]
    pub display_name: String,
    pub description: Option<String>,
    pub is_hidden: Option<bool>,
    pub sort_order: Option<i32>,
}

/// Input for updating an alias; every field is optional
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateFieldAliasInput {
    #[validate(length(min = 1, max = 255, message = "must be 1-255 characters"))]
    pub display_name: Option<String>,
    #[serde(default, deserialize_with = "shared::patch_field")]
    pub description: Option<Option<String>>,
    pub is_hidden: Option<bool>,
    pub sort_order: Option<i32>,
}

/// Filters for the alias list
#[derive(Debug, Default, Deserialize)]
pub struct FieldAliasFilter {
    pub table_name: Option<String>,
    pub is_hidden: Option<bool>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Aliases of one table with bookkeeping
#[derive(Debug, Serialize)]
pub struct TableFields {
    pub table_name: String,
    pub fields: Vec<FieldAlias>,
    pub metadata: TableFieldsMetadata,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct TableFieldsMetadata {
    pub total_fields: usize,
    pub hidden_fields: usize,
    pub custom_aliases: usize,
    pub last_updated: Option<DateTime<Utc>>,
}

/// Tables that accept aliases
#[derive(Debug, Serialize)]
pub struct SupportedTables {
    pub tables: Vec<&'static str>,
    pub count: usize,
}

const ALIAS_COLUMNS: &str = "id, organization_id, table_name, field_name, display_name, description, \
                             is_hidden, sort_order, created_at, updated_at";

impl FieldAliasService {
    /// Create a new FieldAliasService instance
    pub fn new(db: PgPool, change_logs: ChangeLogService) -> Self {
        Self { db, change_logs }
    }

    /// List aliases ordered by table, sort order and field
    pub async fn list(&self, org_id: Uuid, filter: FieldAliasFilter) -> AppResult<Vec<FieldAlias>> {
        let limit = filter
            .limit
            .filter(|l| *l > 0)
            .unwrap_or(i64::from(shared::DEFAULT_PAGE_LIMIT))
            .min(i64::from(shared::MAX_PAGE_LIMIT));
        let offset = filter.offset.unwrap_or(0).max(0);

        let aliases = sqlx::query_as::<_, FieldAlias>(&format!(
            r#"
            SELECT {} FROM field_aliases
            WHERE organization_id = $1
              AND ($2::text IS NULL OR table_name = $2)
              AND ($3::boolean IS NULL OR is_hidden = $3)
            ORDER BY table_name, sort_order, field_name
            LIMIT $4 OFFSET $5
            "#,
            ALIAS_COLUMNS
        ))
        .bind(org_id)
        .bind(shared::normalize_optional(filter.table_name))
        .bind(filter.is_hidden)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await?;

        Ok(aliases)
    }

    /// Get an alias by ID
    pub async fn get(&self, org_id: Uuid, alias_id: Uuid) -> AppResult<FieldAlias> {
        sqlx::query_as::<_, FieldAlias>(&format!(
            "SELECT {} FROM field_aliases WHERE organization_id = $1 AND id = $2",
            ALIAS_COLUMNS
        ))
        .bind(org_id)
        .bind(alias_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found("Field alias"))
    }

    /// Create an alias for a column of a supported table
    pub async fn create(&self, org_id: Uuid, actor_id: Uuid, input: CreateFieldAliasInput) -> AppResult<FieldAlias> {
        input.validate()?;
        ensure_supported(&input.table_name)?;

        let alias = sqlx::query_as::<_, FieldAlias>(&format!(
            r#"
            INSERT INTO field_aliases (organization_id, table_name, field_name, display_name, description, is_hidden, sort_order)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            ALIAS_COLUMNS
        ))
        .bind(org_id)
        .bind(&input.table_name)
        .bind(input.field_name.trim())
        .bind(input.display_name.trim())
        .bind(shared::normalize_optional(input.description))
        .bind(input.is_hidden.unwrap_or(false))
        .bind(input.sort_order.unwrap_or(0))
        .fetch_one(&self.db)
        .await
        .map_err(|e| AppError::on_unique_violation(e, "field alias already exists for this table and field"))?;

        self.change_logs
            .record_best_effort(
                org_id,
                NewChangeLog::field_alias(actor_id, Some(alias.id), ChangeType::Create)
                    .with_field(
                        format!("{}.{}", alias.table_name, alias.field_name),
                        None,
                        Some(alias.display_name.clone()),
                    ),
            )
            .await;

        Ok(alias)
    }

    /// Update an alias. Absent fields are left unchanged.
    pub async fn update(&self, org_id: Uuid, actor_id: Uuid, alias_id: Uuid, input: UpdateFieldAliasInput) -> AppResult<FieldAlias> {
        input.validate()?;
        check_patch_len("description", &input.description, 1000)?;

        let existing = self.get(org_id, alias_id).await?;

        let display_name = input
            .display_name
            .map(|d| d.trim().to_string())
            .unwrap_or_else(|| existing.display_name.clone());
        let description = apply_patch(existing.description.clone(), normalize_patch(input.description));
        let is_hidden = input.is_hidden.unwrap_or(existing.is_hidden);
        let sort_order = input.sort_order.unwrap_or(existing.sort_order);

        let alias = sqlx::query_as::<_, FieldAlias>(&format!(
            r#"
            UPDATE field_aliases
            SET display_name = $3, description = $4, is_hidden = $5, sort_order = $6, updated_at = NOW()
            WHERE organization_id = $1 AND id = $2
            RETURNING {}
            "#,
            ALIAS_COLUMNS
        ))
        .bind(org_id)
        .bind(alias_id)
        .bind(&display_name)
        .bind(&description)
        .bind(is_hidden)
        .bind(sort_order)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found("Field alias"))?;

        if existing.display_name != alias.display_name {
            self.change_logs
                .record_best_effort(
                    org_id,
                    NewChangeLog::field_alias(actor_id, Some(alias.id), ChangeType::Update).with_field(
                        format!("{}.{}", alias.table_name, alias.field_name),
                        Some(existing.display_name),
                        Some(alias.display_name.clone()),
                    ),
                )
                .await;
        }

        Ok(alias)
    }

    /// Delete an alias
    pub async fn delete(&self, org_id: Uuid, actor_id: Uuid, alias_id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM field_aliases WHERE organization_id = $1 AND id = $2")
            .bind(org_id)
            .bind(alias_id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Field alias"));
        }

        self.change_logs
            .record_best_effort(
                org_id,
                NewChangeLog::field_alias(actor_id, Some(alias_id), ChangeType::Delete),
            )
            .await;

        Ok(())
    }

    /// Aliases of one table with counts
    pub async fn table_fields(&self, org_id: Uuid, table_name: &str) -> AppResult<TableFields> {
        ensure_supported(table_name)?;

        let fields = sqlx::query_as::<_, FieldAlias>(&format!(
            r#"
            SELECT {} FROM field_aliases
            WHERE organization_id = $1 AND table_name = $2
            ORDER BY sort_order, field_name
            "#,
            ALIAS_COLUMNS
        ))
        .bind(org_id)
        .bind(table_name)
        .fetch_all(&self.db)
        .await?;

        Ok(TableFields {
            table_name: table_name.to_string(),
            metadata: table_metadata(table_name, &fields),
            fields,
        })
    }

    /// Seed the built-in labels for a table. Does nothing when the table
    /// already has any alias in this organization.
    pub async fn initialize_defaults(&self, org_id: Uuid, actor_id: Uuid, table_name: &str) -> AppResult<TableFields> {
        ensure_supported(table_name)?;
        let defaults = shared::default_fields(table_name).unwrap_or_default();

        let mut tx = self.db.begin().await?;

        // Serialize concurrent initializations of the same table
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1 || ':' || $2))")
            .bind(org_id.to_string())
            .bind(table_name)
            .execute(&mut *tx)
            .await?;

        let existing = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM field_aliases WHERE organization_id = $1 AND table_name = $2",
        )
        .bind(org_id)
        .bind(table_name)
        .fetch_one(&mut *tx)
        .await?;

        let seeded = if existing == 0 {
            for field in defaults {
                sqlx::query(
                    r#"
                    INSERT INTO field_aliases (organization_id, table_name, field_name, display_name, description, sort_order)
                    VALUES ($1, $2, $3, $4, $5, $6)
                    "#,
                )
                .bind(org_id)
                .bind(table_name)
                .bind(field.field_name)
                .bind(field.display_name)
                .bind(field.description)
                .bind(field.sort_order)
                .execute(&mut *tx)
                .await?;
            }
            defaults.len()
        } else {
            0
        };

        tx.commit().await?;

        if seeded > 0 {
            tracing::info!(organization_id = %org_id, table_name, seeded, "field aliases initialized");
            self.change_logs
                .record_best_effort(
                    org_id,
                    NewChangeLog::field_alias(actor_id, None, ChangeType::Create)
                        .with_reason(format!("Initialized {} default aliases for {}", seeded, table_name)),
                )
                .await;
        }

        self.table_fields(org_id, table_name).await
    }
}

/// Tables that accept aliases
pub fn supported_tables() -> SupportedTables {
    SupportedTables {
        tables: SUPPORTED_TABLES.to_vec(),
        count: SUPPORTED_TABLES.len(),
    }
}

fn ensure_supported(table_name: &str) -> AppResult<()> {
    if shared::is_supported_table(table_name) {
        Ok(())
    } else {
        Err(AppError::InvalidArgument(format!("unsupported table: {}", table_name)))
    }
}

fn table_metadata(table_name: &str, fields: &[FieldAlias]) -> TableFieldsMetadata {
    TableFieldsMetadata {
        total_fields: fields.len(),
        hidden_fields: fields.iter().filter(|f| f.is_hidden).count(),
        custom_aliases: fields
            .iter()
            .filter(|f| shared::is_custom_alias(table_name, &f.field_name, &f.display_name))
            .count(),
        last_updated: fields.iter().map(|f| f.updated_at).max(),
    }
}
