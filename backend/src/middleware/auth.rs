//! Authentication middleware
//!
//! Bearer JWT validation and the resolved caller identity

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};
use shared::{Action, PermissionTable, Resource, Role};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::AuthService;
use crate::AppState;

/// Authenticated user information extracted from JWT
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub organization_id: Uuid,
    pub email: String,
    pub role: Role,
}

impl AuthUser {
    /// Check if the user's role grants an action on a resource
    pub fn has_permission(&self, resource: Resource, action: Action) -> bool {
        PermissionTable::global().allows(self.role, resource, action)
    }

    /// Fail with `Forbidden` unless the role grants the action
    pub fn require(&self, resource: Resource, action: Action) -> AppResult<()> {
        if self.has_permission(resource, action) {
            Ok(())
        } else {
            Err(AppError::forbidden_for(resource.as_str(), action.as_str()))
        }
    }

    /// Like `require`, but acting on one's own record is always allowed
    pub fn require_self_or(&self, target_user_id: Uuid, resource: Resource, action: Action) -> AppResult<()> {
        if shared::self_or_permission(&self.user_id, &target_user_id, self.role, resource, action) {
            Ok(())
        } else {
            Err(AppError::forbidden_for(resource.as_str(), action.as_str()))
        }
    }
}

/// Authentication middleware that validates JWT tokens
pub async fn auth_middleware(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let token = match bearer_token(&request) {
        Some(token) => token,
        None => {
            return AppError::Unauthorized("missing or invalid Authorization header".to_string())
                .into_response()
        }
    };

    let auth_user = match AuthService::new(state.db.clone(), &state.config).validate_token(token) {
        Ok(user) => user,
        Err(err) => return err.into_response(),
    };

    tracing::Span::current().record("user_id", tracing::field::display(auth_user.user_id));
    request.extensions_mut().insert(auth_user);

    next.run(request).await
}

fn bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Extractor for authenticated user
/// Use this in handlers to get the current user
#[derive(Clone, Debug)]
pub struct CurrentUser(pub AuthUser);

#[axum::async_trait]
impl<S> axum::extract::FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .map(CurrentUser)
            .ok_or_else(|| AppError::Unauthorized("authentication required".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role) -> AuthUser {
        AuthUser {
            user_id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            email: "ops@example.com".to_string(),
            role,
        }
    }

    #[test]
    fn test_require_uses_role_table() {
        assert!(user(Role::Admin).require(Resource::Users, Action::Delete).is_ok());
        let err = user(Role::Manager)
            .require(Resource::Users, Action::Delete)
            .unwrap_err();
        assert_eq!(err.to_string(), "permission denied: requires users:delete");
    }

    #[test]
    fn test_require_self_or() {
        let viewer = user(Role::Viewer);
        assert!(viewer
            .require_self_or(viewer.user_id, Resource::Users, Action::Read)
            .is_ok());
        assert!(viewer
            .require_self_or(Uuid::new_v4(), Resource::Users, Action::Read)
            .is_err());
    }

    #[test]
    fn test_extractor_requires_auth_user() {
        use axum::extract::FromRequestParts;

        let (mut parts, _) = axum::http::Request::builder()
            .uri("/api/v1/orgs")
            .body(())
            .unwrap()
            .into_parts();
        let missing = tokio_test::block_on(CurrentUser::from_request_parts(&mut parts, &()));
        assert!(matches!(missing, Err(AppError::Unauthorized(_))));

        let expected = user(Role::User);
        parts.extensions.insert(expected.clone());
        let CurrentUser(found) =
            tokio_test::block_on(CurrentUser::from_request_parts(&mut parts, &())).unwrap();
        assert_eq!(found.user_id, expected.user_id);
    }
}
