//! Authentication service for login and token management

use bcrypt::verify;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::services::user::{UserService, UserWithDetails};
use shared::Role;

/// Authentication service
#[derive(Clone)]
pub struct AuthService {
    db: PgPool,
    jwt_secret: String,
    token_expiry_hours: i64,
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub organization_id: String,
    pub email: String,
    pub role: String,
    pub exp: i64,
    pub iat: i64,
}

/// Issued token with the user it was issued for
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserWithDetails,
}

/// User columns needed to authenticate
#[derive(Debug, sqlx::FromRow)]
struct CredentialRow {
    id: Uuid,
    organization_id: Uuid,
    email: String,
    role: String,
    password_hash: Option<String>,
    is_active: bool,
}

impl AuthService {
    /// Create a new AuthService instance
    pub fn new(db: PgPool, config: &Config) -> Self {
        Self {
            db,
            jwt_secret: config.jwt.secret.clone(),
            token_expiry_hours: config.jwt.token_expiry_hours,
        }
    }

    /// Authenticate user with email and password.
    ///
    /// Emails are unique per organization only, so a caller whose address is
    /// registered in several organizations must name the one to sign in to.
    pub async fn login(&self, email: &str, password: &str, organization_id: Option<Uuid>) -> AppResult<LoginResponse> {
        let invalid = || AppError::Unauthorized("invalid email or password".to_string());

        let mut matches = sqlx::query_as::<_, CredentialRow>(
            r#"
            SELECT id, organization_id, email, role, password_hash, is_active
            FROM users
            WHERE LOWER(email) = LOWER($1)
              AND ($2::uuid IS NULL OR organization_id = $2)
            LIMIT 2
            "#,
        )
        .bind(email.trim())
        .bind(organization_id)
        .fetch_all(&self.db)
        .await?;

        if matches.len() > 1 {
            return Err(AppError::InvalidArgument(
                "email is registered in several organizations; organization_id is required".to_string(),
            ));
        }
        let user = matches.pop().ok_or_else(invalid)?;

        let hash = user.password_hash.as_deref().ok_or_else(invalid)?;
        let valid = verify(password, hash)
            .map_err(|e| AppError::Internal(format!("password verification failed: {}", e)))?;
        if !valid {
            return Err(invalid());
        }

        if !user.is_active {
            return Err(AppError::Unauthorized("account is disabled".to_string()));
        }

        let role: Role = user
            .role
            .parse()
            .map_err(|_| AppError::Internal(format!("user {} has unknown role {}", user.id, user.role)))?;

        let users = UserService::new(self.db.clone());
        users.update_login_time(user.id).await?;

        let (token, expires_at) = self.issue_token(&AuthUser {
            user_id: user.id,
            organization_id: user.organization_id,
            email: user.email,
            role,
        })?;

        tracing::info!(user_id = %user.id, organization_id = %user.organization_id, "user logged in");

        Ok(LoginResponse {
            token,
            token_type: "Bearer".to_string(),
            expires_at,
            user: users.get(user.organization_id, user.id).await?,
        })
    }

    /// Sign an access token for a user
    pub fn issue_token(&self, user: &AuthUser) -> AppResult<(String, DateTime<Utc>)> {
        let now = Utc::now();
        let expires_at = now + Duration::hours(self.token_expiry_hours);

        let claims = Claims {
            sub: user.user_id.to_string(),
            organization_id: user.organization_id.to_string(),
            email: user.email.clone(),
            role: user.role.as_str().to_string(),
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(|e| AppError::Internal(format!("token generation failed: {}", e)))?;

        Ok((token, expires_at))
    }

    /// Validate access token and return the caller it identifies
    pub fn validate_token(&self, token: &str) -> AppResult<AuthUser> {
        let claims = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &Validation::default(),
        )
        .map(|data| data.claims)
        .map_err(|e| AppError::Unauthorized(format!("invalid token: {}", e)))?;

        let user_id = Uuid::parse_str(&claims.sub)
            .map_err(|_| AppError::Unauthorized("invalid user id in token".to_string()))?;
        let organization_id = Uuid::parse_str(&claims.organization_id)
            .map_err(|_| AppError::Unauthorized("invalid organization id in token".to_string()))?;
        let role = claims
            .role
            .parse::<Role>()
            .map_err(|_| AppError::Unauthorized("invalid role in token".to_string()))?;

        Ok(AuthUser {
            user_id,
            organization_id,
            email: claims.email,
            role,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::postgres::PgPoolOptions;

    fn service(secret: &str, hours: i64) -> AuthService {
        let db = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/stockroom_test")
            .unwrap();
        AuthService {
            db,
            jwt_secret: secret.to_string(),
            token_expiry_hours: hours,
        }
    }

    fn caller() -> AuthUser {
        AuthUser {
            user_id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            email: "ops@example.com".to_string(),
            role: Role::Manager,
        }
    }

    #[tokio::test]
    async fn test_token_round_trip() {
        let svc = service("secret", 24);
        let user = caller();
        let (token, expires_at) = svc.issue_token(&user).unwrap();
        assert!(expires_at > Utc::now());

        let decoded = svc.validate_token(&token).unwrap();
        assert_eq!(decoded.user_id, user.user_id);
        assert_eq!(decoded.organization_id, user.organization_id);
        assert_eq!(decoded.role, Role::Manager);
    }

    #[tokio::test]
    async fn test_wrong_secret_rejected() {
        let (token, _) = service("secret", 24).issue_token(&caller()).unwrap();
        let err = service("other", 24).validate_token(&token).unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_expired_token_rejected() {
        let svc = service("secret", -2);
        let (token, _) = svc.issue_token(&caller()).unwrap();
        assert!(svc.validate_token(&token).is_err());
    }
}
