//! Change-log service: append-only audit trail and its read views

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::start_of_day;
use crate::config::ChangeLogConfig;
use crate::error::{AppError, AppResult};
use shared::{ChangeType, EntityType, NewChangeLog};

/// Upper bound on rows returned by the SKU history view
const SKU_HISTORY_LIMIT: i64 = 100;

/// Change-log service
#[derive(Clone)]
pub struct ChangeLogService {
    db: PgPool,
    settings: ChangeLogConfig,
}

/// A stored audit entry with display joins
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ChangeLogEntry {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub user_id: Uuid,
    pub entity_type: String,
    pub entity_id: Option<Uuid>,
    pub sku_id: Option<Uuid>,
    pub change_type: String,
    pub field_name: Option<String>,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub reason: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub user_name: Option<String>,
    pub sku_code: Option<String>,
    pub sku_name: Option<String>,
}

/// Manually submitted entry; kinds arrive as raw strings
#[derive(Debug, Deserialize)]
pub struct CreateChangeLogInput {
    pub entity_type: String,
    pub entity_id: Option<Uuid>,
    pub sku_id: Option<Uuid>,
    pub change_type: String,
    pub field_name: Option<String>,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub reason: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

/// Filters for the change-log list
#[derive(Debug, Default, Deserialize)]
pub struct ChangeLogFilter {
    pub entity_type: Option<String>,
    pub entity_id: Option<Uuid>,
    pub sku_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub change_type: Option<String>,
    pub last_days: Option<i32>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Per-user change count
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct UserActivity {
    pub user_id: Uuid,
    pub user_name: String,
    pub changes: i64,
}

/// Dashboard view of recent audit activity
#[derive(Debug, Serialize)]
pub struct ActivitySummary {
    pub window_days: i32,
    pub total_changes: i64,
    pub recent_changes: i64,
    pub changes_by_type: BTreeMap<String, i64>,
    pub top_users: Vec<UserActivity>,
    pub recent_activity: Vec<ChangeLogEntry>,
}

/// Resolved, validated query bounds
#[derive(Debug, Clone, PartialEq)]
struct ListBounds {
    entity_type: Option<EntityType>,
    change_type: Option<ChangeType>,
    since: Option<DateTime<Utc>>,
    until: Option<DateTime<Utc>>,
    limit: i64,
    offset: i64,
}

const SELECT_ENTRY: &str = r#"
    SELECT cl.id, cl.organization_id, cl.user_id, cl.entity_type, cl.entity_id, cl.sku_id,
           cl.change_type, cl.field_name, cl.old_value, cl.new_value, cl.reason, cl.metadata,
           cl.created_at, u.name AS user_name, s.sku_code, s.product_name AS sku_name
    FROM change_logs cl
    LEFT JOIN users u ON u.id = cl.user_id AND u.organization_id = cl.organization_id
    LEFT JOIN skus s ON s.id = cl.sku_id AND s.organization_id = cl.organization_id
"#;

impl ChangeLogService {
    /// Create a new ChangeLogService instance
    pub fn new(db: PgPool, settings: ChangeLogConfig) -> Self {
        Self { db, settings }
    }

    /// Append an entry
    pub async fn record(&self, org_id: Uuid, entry: &NewChangeLog) -> AppResult<Uuid> {
        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO change_logs (
                organization_id, user_id, entity_type, entity_id, sku_id, change_type,
                field_name, old_value, new_value, reason, metadata
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING id
            "#,
        )
        .bind(org_id)
        .bind(entry.user_id)
        .bind(entry.entity_type.as_str())
        .bind(entry.entity_id)
        .bind(entry.sku_id)
        .bind(entry.change_type.as_str())
        .bind(&entry.field_name)
        .bind(&entry.old_value)
        .bind(&entry.new_value)
        .bind(&entry.reason)
        .bind(&entry.metadata)
        .fetch_one(&self.db)
        .await?;

        Ok(id)
    }

    /// Append an entry without letting a failure reach the caller.
    ///
    /// Used after a state change has already succeeded: the audit write must
    /// never undo or fail the business operation.
    pub async fn record_best_effort(&self, org_id: Uuid, entry: NewChangeLog) {
        if let Err(err) = self.record(org_id, &entry).await {
            tracing::warn!(
                error = %err,
                organization_id = %org_id,
                entity_type = %entry.entity_type,
                change_type = %entry.change_type,
                "failed to write change log"
            );
        }
    }

    /// Validate a manually submitted entry and append it
    pub async fn create(&self, org_id: Uuid, user_id: Uuid, input: CreateChangeLogInput) -> AppResult<ChangeLogEntry> {
        let entity_type: EntityType = input.entity_type.parse()?;
        let change_type: ChangeType = input.change_type.parse()?;

        if let Some(sku_id) = input.sku_id {
            let owned = sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS(SELECT 1 FROM skus WHERE organization_id = $1 AND id = $2)",
            )
            .bind(org_id)
            .bind(sku_id)
            .fetch_one(&self.db)
            .await?;
            if !owned {
                return Err(AppError::not_found("SKU"));
            }
        }

        let entry = NewChangeLog {
            sku_id: input.sku_id,
            field_name: input.field_name,
            old_value: input.old_value,
            new_value: input.new_value,
            reason: input.reason,
            metadata: input.metadata,
            ..NewChangeLog::new(user_id, entity_type, input.entity_id, change_type)
        };

        let id = self.record(org_id, &entry).await?;
        self.get(org_id, id).await
    }

    pub async fn get(&self, org_id: Uuid, id: Uuid) -> AppResult<ChangeLogEntry> {
        sqlx::query_as::<_, ChangeLogEntry>(&format!(
            "{} WHERE cl.organization_id = $1 AND cl.id = $2",
            SELECT_ENTRY
        ))
        .bind(org_id)
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found("Change log"))
    }

    /// List entries, newest first
    pub async fn list(&self, org_id: Uuid, filter: ChangeLogFilter) -> AppResult<Vec<ChangeLogEntry>> {
        let bounds = resolve_bounds(&filter, Utc::now())?;

        let rows = sqlx::query_as::<_, ChangeLogEntry>(&format!(
            r#"{}
            WHERE cl.organization_id = $1
              AND ($2::text IS NULL OR cl.entity_type = $2)
              AND ($3::uuid IS NULL OR cl.entity_id = $3)
              AND ($4::uuid IS NULL OR cl.sku_id = $4)
              AND ($5::uuid IS NULL OR cl.user_id = $5)
              AND ($6::text IS NULL OR cl.change_type = $6)
              AND ($7::timestamptz IS NULL OR cl.created_at >= $7)
              AND ($8::timestamptz IS NULL OR cl.created_at < $8)
            ORDER BY cl.created_at DESC
            LIMIT $9 OFFSET $10
            "#,
            SELECT_ENTRY
        ))
        .bind(org_id)
        .bind(bounds.entity_type.map(|e| e.as_str()))
        .bind(filter.entity_id)
        .bind(filter.sku_id)
        .bind(filter.user_id)
        .bind(bounds.change_type.map(|c| c.as_str()))
        .bind(bounds.since)
        .bind(bounds.until)
        .bind(bounds.limit)
        .bind(bounds.offset)
        .fetch_all(&self.db)
        .await?;

        Ok(rows)
    }

    /// History of one SKU: entries about the SKU itself and entries that reference it
    pub async fn sku_history(&self, org_id: Uuid, sku_id: Uuid, days: Option<i32>) -> AppResult<Vec<ChangeLogEntry>> {
        let since = window_start(days.unwrap_or(self.settings.default_window_days), Utc::now())?;

        let rows = sqlx::query_as::<_, ChangeLogEntry>(&format!(
            r#"{}
            WHERE cl.organization_id = $1
              AND (cl.sku_id = $2 OR (cl.entity_id = $2 AND cl.entity_type = 'sku'))
              AND cl.created_at >= $3
            ORDER BY cl.created_at DESC
            LIMIT $4
            "#,
            SELECT_ENTRY
        ))
        .bind(org_id)
        .bind(sku_id)
        .bind(since)
        .bind(SKU_HISTORY_LIMIT)
        .fetch_all(&self.db)
        .await?;

        Ok(rows)
    }

    /// Totals, per-kind counts, most active users and latest entries
    pub async fn activity_summary(&self, org_id: Uuid, days: Option<i32>) -> AppResult<ActivitySummary> {
        let window_days = days.unwrap_or(self.settings.default_window_days);
        let now = Utc::now();
        let since = window_start(window_days, now)?;

        let total_changes = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM change_logs WHERE organization_id = $1",
        )
        .bind(org_id)
        .fetch_one(&self.db)
        .await?;

        let recent_changes = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM change_logs WHERE organization_id = $1 AND created_at >= $2",
        )
        .bind(org_id)
        .bind(now - Duration::hours(24))
        .fetch_one(&self.db)
        .await?;

        let changes_by_type = sqlx::query_as::<_, (String, i64)>(
            r#"
            SELECT change_type, COUNT(*)
            FROM change_logs
            WHERE organization_id = $1 AND created_at >= $2
            GROUP BY change_type
            "#,
        )
        .bind(org_id)
        .bind(since)
        .fetch_all(&self.db)
        .await?
        .into_iter()
        .collect();

        let top_users = sqlx::query_as::<_, UserActivity>(
            r#"
            SELECT cl.user_id, COALESCE(u.name, 'Unknown') AS user_name, COUNT(*) AS changes
            FROM change_logs cl
            LEFT JOIN users u ON u.id = cl.user_id AND u.organization_id = cl.organization_id
            WHERE cl.organization_id = $1 AND cl.created_at >= $2
            GROUP BY cl.user_id, u.name
            ORDER BY changes DESC, user_name
            LIMIT $3
            "#,
        )
        .bind(org_id)
        .bind(since)
        .bind(self.settings.summary_top_users)
        .fetch_all(&self.db)
        .await?;

        let recent_activity = sqlx::query_as::<_, ChangeLogEntry>(&format!(
            r#"{}
            WHERE cl.organization_id = $1 AND cl.created_at >= $2
            ORDER BY cl.created_at DESC
            LIMIT $3
            "#,
            SELECT_ENTRY
        ))
        .bind(org_id)
        .bind(since)
        .bind(self.settings.summary_recent)
        .fetch_all(&self.db)
        .await?;

        Ok(ActivitySummary {
            window_days,
            total_changes,
            recent_changes,
            changes_by_type,
            top_users,
            recent_activity,
        })
    }
}

fn window_start(days: i32, now: DateTime<Utc>) -> AppResult<DateTime<Utc>> {
    if days <= 0 {
        return Err(AppError::InvalidArgument("days must be greater than zero".to_string()));
    }
    Ok(now - Duration::days(i64::from(days)))
}

fn resolve_bounds(filter: &ChangeLogFilter, now: DateTime<Utc>) -> AppResult<ListBounds> {
    let entity_type = filter
        .entity_type
        .as_deref()
        .map(str::parse::<EntityType>)
        .transpose()?;
    let change_type = filter
        .change_type
        .as_deref()
        .map(str::parse::<ChangeType>)
        .transpose()?;

    let rolling = filter.last_days.map(|d| window_start(d, now)).transpose()?;
    let from = filter.date_from.map(start_of_day);
    // The later of the two lower bounds wins
    let since = match (rolling, from) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    };
    let until = filter
        .date_to
        .and_then(|d| d.succ_opt())
        .map(start_of_day);

    if let (Some(since), Some(until)) = (since, until) {
        if since >= until {
            return Err(AppError::InvalidArgument(
                "date_from must not be after date_to".to_string(),
            ));
        }
    }

    let limit = filter
        .limit
        .filter(|l| *l > 0)
        .unwrap_or(i64::from(shared::DEFAULT_PAGE_LIMIT))
        .min(i64::from(shared::MAX_PAGE_LIMIT));
    let offset = filter.offset.unwrap_or(0).max(0);

    Ok(ListBounds {
        entity_type,
        change_type,
        since,
        until,
        limit,
        offset,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_defaults() {
        let bounds = resolve_bounds(&ChangeLogFilter::default(), now()).unwrap();
        assert_eq!(bounds.limit, 50);
        assert_eq!(bounds.offset, 0);
        assert!(bounds.since.is_none());
        assert!(bounds.until.is_none());
    }

    #[test]
    fn test_invalid_kinds_rejected_before_query() {
        let filter = ChangeLogFilter {
            entity_type: Some("warehouse".into()),
            ..Default::default()
        };
        assert!(matches!(
            resolve_bounds(&filter, now()),
            Err(AppError::InvalidArgument(_))
        ));

        let filter = ChangeLogFilter {
            change_type: Some("purge".into()),
            ..Default::default()
        };
        assert!(resolve_bounds(&filter, now()).is_err());
    }

    #[test]
    fn test_date_range_is_inclusive() {
        let filter = ChangeLogFilter {
            date_from: NaiveDate::from_ymd_opt(2024, 6, 1),
            date_to: NaiveDate::from_ymd_opt(2024, 6, 10),
            ..Default::default()
        };
        let bounds = resolve_bounds(&filter, now()).unwrap();
        assert_eq!(bounds.since, Some(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()));
        assert_eq!(bounds.until, Some(Utc.with_ymd_and_hms(2024, 6, 11, 0, 0, 0).unwrap()));
    }

    #[test]
    fn test_later_lower_bound_wins() {
        let filter = ChangeLogFilter {
            last_days: Some(7),
            date_from: NaiveDate::from_ymd_opt(2024, 1, 1),
            ..Default::default()
        };
        let bounds = resolve_bounds(&filter, now()).unwrap();
        assert_eq!(bounds.since, Some(now() - Duration::days(7)));
    }

    #[test]
    fn test_limit_capped_and_days_positive() {
        let filter = ChangeLogFilter {
            limit: Some(1000),
            offset: Some(-5),
            ..Default::default()
        };
        let bounds = resolve_bounds(&filter, now()).unwrap();
        assert_eq!(bounds.limit, 100);
        assert_eq!(bounds.offset, 0);

        assert!(window_start(0, now()).is_err());
    }

    #[test]
    fn test_reversed_range_rejected() {
        let filter = ChangeLogFilter {
            date_from: NaiveDate::from_ymd_opt(2024, 6, 10),
            date_to: NaiveDate::from_ymd_opt(2024, 6, 1),
            ..Default::default()
        };
        assert!(resolve_bounds(&filter, now()).is_err());
    }
}

#[cfg(test)]
mod db_tests {
    use super::*;
    use crate::services::test_support;

    fn manual_entry(sku_id: Option<Uuid>) -> CreateChangeLogInput {
        CreateChangeLogInput {
            entity_type: "sku".to_string(),
            entity_id: sku_id,
            sku_id,
            change_type: "update".to_string(),
            field_name: Some("notes".to_string()),
            old_value: None,
            new_value: Some("recounted".to_string()),
            reason: Some("stocktake".to_string()),
            metadata: None,
        }
    }

    #[tokio::test]
    #[ignore] // Requires database connection
    async fn test_foreign_sku_rejected_and_never_joined() {
        let pool = test_support::pool().await;
        let (org_id, user_id) = test_support::seed_org(&pool).await;
        let (other_org, _) = test_support::seed_org(&pool).await;
        let own_sku = test_support::seed_sku(&pool, org_id).await;
        let foreign_sku = test_support::seed_sku(&pool, other_org).await;
        let service = test_support::change_logs(&pool);

        let err = service
            .create(org_id, user_id, manual_entry(Some(foreign_sku)))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let entry = service.create(org_id, user_id, manual_entry(Some(own_sku))).await.unwrap();
        assert!(entry.sku_code.is_some());
        assert_eq!(entry.user_name.as_deref(), Some("Tester"));

        // A row written directly with another tenant's SKU gets no display join
        let id = service
            .record(
                org_id,
                &NewChangeLog::sku(user_id, foreign_sku, ChangeType::Update),
            )
            .await
            .unwrap();
        let entry = service.get(org_id, id).await.unwrap();
        assert_eq!(entry.sku_id, Some(foreign_sku));
        assert!(entry.sku_code.is_none());
        assert!(entry.sku_name.is_none());
    }
}
