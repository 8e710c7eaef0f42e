//! User service: tenant-scoped accounts and their role capabilities

use bcrypt::{hash, DEFAULT_COST};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use validator::Validate;

use super::{like_pattern, ChangeLogService};
use crate::error::{AppError, AppResult};
use shared::{
    Action, ChangeType, FieldPermissions, NewChangeLog, PaginatedResponse, Pagination, Permission,
    PermissionTable, Resource, Role,
};

/// User service
#[derive(Clone)]
pub struct UserService {
    db: PgPool,
    change_logs: Option<ChangeLogService>,
}

/// User with organization details
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct UserWithDetails {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub email: String,
    pub name: String,
    pub role: String,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub organization_name: String,
}

/// Input for creating a user
#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserInput {
    #[validate(email(message = "must be a valid email address"), length(max = 255))]
    pub email: String,
    #[validate(length(min = 1, max = 100, message = "must be 1-100 characters"))]
    pub name: String,
    pub role: String,
    #[validate(length(min = 8, message = "must be at least 8 characters"))]
    pub password: Option<String>,
}

/// Input for updating a user. Name and role are always resupplied.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateUserInput {
    #[validate(length(min = 1, max = 100, message = "must be 1-100 characters"))]
    pub name: String,
    pub role: String,
    pub is_active: Option<bool>,
}

/// Filters for the user list
#[derive(Debug, Default, Deserialize)]
pub struct UserFilter {
    pub role: Option<String>,
    pub is_active: Option<bool>,
    pub search: Option<String>,
}

/// A role and everything it grants
#[derive(Debug, Serialize)]
pub struct RoleInfo {
    pub name: Role,
    pub description: &'static str,
    pub permissions: Vec<Permission>,
}

/// Effective capabilities of one user
#[derive(Debug, Serialize)]
pub struct UserPermissions {
    pub user_id: Uuid,
    pub role: Role,
    pub permissions: Vec<Permission>,
    pub field_permissions: std::collections::BTreeMap<Resource, FieldPermissions>,
}

/// Input for a single permission check
#[derive(Debug, Deserialize)]
pub struct CheckPermissionInput {
    pub resource: String,
    pub action: String,
}

/// Outcome of a single permission check
#[derive(Debug, Serialize)]
pub struct PermissionCheck {
    pub user_id: Uuid,
    pub resource: Resource,
    pub action: Action,
    pub allowed: bool,
}

const SELECT_USER: &str = r#"
    SELECT u.id, u.organization_id, u.email, u.name, u.role, u.is_active, u.last_login_at,
           u.created_at, u.updated_at, o.name AS organization_name
    FROM users u
    JOIN organizations o ON o.id = u.organization_id
"#;

const LIST_FILTER: &str = r#"
    WHERE u.organization_id = $1
      AND ($2::text IS NULL OR u.role = $2)
      AND ($3::boolean IS NULL OR u.is_active = $3)
      AND ($4::text IS NULL OR u.name ILIKE $4 OR u.email ILIKE $4)
"#;

impl UserService {
    /// Create a UserService without an audit trail, for reads
    pub fn new(db: PgPool) -> Self {
        Self { db, change_logs: None }
    }

    /// Create a UserService whose mutations are audited
    pub fn with_change_logs(db: PgPool, change_logs: ChangeLogService) -> Self {
        Self {
            db,
            change_logs: Some(change_logs),
        }
    }

    async fn audit(&self, org_id: Uuid, entry: NewChangeLog) {
        if let Some(change_logs) = &self.change_logs {
            change_logs.record_best_effort(org_id, entry).await;
        }
    }

    /// List users of an organization, newest first
    pub async fn list(&self, org_id: Uuid, filter: UserFilter, page: Pagination) -> AppResult<PaginatedResponse<UserWithDetails>> {
        let role = filter.role.as_deref().map(str::parse::<Role>).transpose()?;
        let search = like_pattern(filter.search.as_deref());

        let total = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM users u {}", LIST_FILTER))
            .bind(org_id)
            .bind(role.map(|r| r.as_str()))
            .bind(filter.is_active)
            .bind(&search)
            .fetch_one(&self.db)
            .await?;

        let users = sqlx::query_as::<_, UserWithDetails>(&format!(
            "{} {} ORDER BY u.created_at DESC LIMIT $5 OFFSET $6",
            SELECT_USER, LIST_FILTER
        ))
        .bind(org_id)
        .bind(role.map(|r| r.as_str()))
        .bind(filter.is_active)
        .bind(&search)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(PaginatedResponse::new(users, page, total.max(0) as u64))
    }

    /// Get a user by ID
    pub async fn get(&self, org_id: Uuid, user_id: Uuid) -> AppResult<UserWithDetails> {
        sqlx::query_as::<_, UserWithDetails>(&format!(
            "{} WHERE u.organization_id = $1 AND u.id = $2",
            SELECT_USER
        ))
        .bind(org_id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found("User"))
    }

    /// Create a user
    pub async fn create(&self, org_id: Uuid, actor_id: Uuid, input: CreateUserInput) -> AppResult<UserWithDetails> {
        input.validate()?;
        let role: Role = input.role.parse()?;
        let email = input.email.trim().to_lowercase();

        let password_hash = match input.password.as_deref() {
            Some(password) => Some(
                hash(password, DEFAULT_COST)
                    .map_err(|e| AppError::Internal(format!("password hashing failed: {}", e)))?,
            ),
            None => None,
        };

        let user_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO users (organization_id, email, name, role, password_hash)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(org_id)
        .bind(&email)
        .bind(input.name.trim())
        .bind(role.as_str())
        .bind(&password_hash)
        .fetch_one(&self.db)
        .await
        .map_err(|e| AppError::on_unique_violation(e, "user with this email already exists"))?;

        tracing::info!(organization_id = %org_id, user_id = %user_id, role = %role, "user created");

        self.audit(
            org_id,
            NewChangeLog::user(actor_id, user_id, ChangeType::Create)
                .with_reason(format!("Created user {} as {}", email, role)),
        )
        .await;

        self.get(org_id, user_id).await
    }

    /// Update a user
    pub async fn update(&self, org_id: Uuid, actor_id: Uuid, user_id: Uuid, input: UpdateUserInput) -> AppResult<UserWithDetails> {
        input.validate()?;
        let role: Role = input.role.parse()?;

        let existing = self.get(org_id, user_id).await?;
        let is_active = input.is_active.unwrap_or(existing.is_active);

        let updated = sqlx::query(
            r#"
            UPDATE users SET name = $3, role = $4, is_active = $5, updated_at = NOW()
            WHERE organization_id = $1 AND id = $2
            "#,
        )
        .bind(org_id)
        .bind(user_id)
        .bind(input.name.trim())
        .bind(role.as_str())
        .bind(is_active)
        .execute(&self.db)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(AppError::not_found("User"));
        }

        let user = self.get(org_id, user_id).await?;

        let changes = [
            ("name", existing.name.as_str(), user.name.as_str()),
            ("role", existing.role.as_str(), user.role.as_str()),
        ];
        for (field, old, new) in changes.into_iter().filter(|(_, old, new)| old != new) {
            self.audit(
                org_id,
                NewChangeLog::user(actor_id, user_id, ChangeType::Update).with_field(
                    field,
                    Some(old.to_string()),
                    Some(new.to_string()),
                ),
            )
            .await;
        }
        if existing.is_active != user.is_active {
            self.audit(
                org_id,
                NewChangeLog::user(actor_id, user_id, ChangeType::for_status(user.is_active)).with_field(
                    "is_active",
                    Some(existing.is_active.to_string()),
                    Some(user.is_active.to_string()),
                ),
            )
            .await;
        }

        Ok(user)
    }

    /// Delete a user permanently
    pub async fn delete(&self, org_id: Uuid, actor_id: Uuid, user_id: Uuid) -> AppResult<()> {
        if actor_id == user_id {
            return Err(AppError::InvalidArgument("cannot delete your own account".to_string()));
        }

        let result = sqlx::query("DELETE FROM users WHERE organization_id = $1 AND id = $2")
            .bind(org_id)
            .bind(user_id)
            .execute(&self.db)
            .await
            .map_err(|e| {
                AppError::on_reference_violation(
                    e,
                    "user has recorded transactions; deactivate the account instead",
                )
            })?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("User"));
        }

        tracing::info!(organization_id = %org_id, user_id = %user_id, "user deleted");
        self.audit(org_id, NewChangeLog::user(actor_id, user_id, ChangeType::Delete)).await;

        Ok(())
    }

    /// Stamp a successful sign-in
    pub async fn update_login_time(&self, user_id: Uuid) -> AppResult<()> {
        sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = $1")
            .bind(user_id)
            .execute(&self.db)
            .await?;

        Ok(())
    }

    /// Effective permissions of a user, derived from their stored role
    pub async fn permissions(&self, org_id: Uuid, user_id: Uuid) -> AppResult<UserPermissions> {
        let role = self.role_of(org_id, user_id).await?;
        let table = PermissionTable::global();

        Ok(UserPermissions {
            user_id,
            role,
            permissions: table.permissions(role),
            field_permissions: table.all_fields(role),
        })
    }

    /// Whether a user's stored role grants one action
    pub async fn check_permission(&self, org_id: Uuid, user_id: Uuid, input: CheckPermissionInput) -> AppResult<PermissionCheck> {
        let resource: Resource = input.resource.parse()?;
        let action: Action = input.action.parse()?;
        let role = self.role_of(org_id, user_id).await?;

        Ok(PermissionCheck {
            user_id,
            resource,
            action,
            allowed: PermissionTable::global().allows(role, resource, action),
        })
    }

    async fn role_of(&self, org_id: Uuid, user_id: Uuid) -> AppResult<Role> {
        let role = sqlx::query_scalar::<_, String>(
            "SELECT role FROM users WHERE organization_id = $1 AND id = $2",
        )
        .bind(org_id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;

        role.parse::<Role>()
            .map_err(|_| AppError::Internal(format!("user {} has unknown role {}", user_id, role)))
    }
}

/// The static role catalogue
pub fn role_catalogue() -> Vec<RoleInfo> {
    let table = PermissionTable::global();
    Role::ALL
        .into_iter()
        .map(|role| RoleInfo {
            name: role,
            description: role.description(),
            permissions: table.permissions(role),
        })
        .collect()
}
