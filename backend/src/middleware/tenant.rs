//! Tenant scoping
//!
//! Every `/orgs/:org_id/...` route resolves the caller through `TenantUser`,
//! which refuses the request unless the path organization is the one the
//! caller's token was issued for.

use std::collections::HashMap;

use axum::{
    extract::{FromRequestParts, Path},
    http::request::Parts,
};
use uuid::Uuid;

use super::auth::{AuthUser, CurrentUser};
use crate::error::AppError;

/// Caller identity, verified to belong to the organization in the path
#[derive(Clone, Debug)]
pub struct TenantUser(pub AuthUser);

#[axum::async_trait]
impl<S> FromRequestParts<S> for TenantUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;

        let Path(params) = Path::<HashMap<String, String>>::from_request_parts(parts, state)
            .await
            .map_err(|_| AppError::InvalidArgument("invalid path parameters".to_string()))?;

        let org_id = params
            .get("org_id")
            .ok_or_else(|| AppError::InvalidArgument("organization id is required".to_string()))?;
        let org_id = Uuid::parse_str(org_id)
            .map_err(|_| AppError::InvalidArgument("invalid organization id".to_string()))?;

        ensure_same_org(&user, org_id)?;
        Ok(TenantUser(user))
    }
}

fn ensure_same_org(user: &AuthUser, org_id: Uuid) -> Result<(), AppError> {
    if user.organization_id == org_id {
        Ok(())
    } else {
        tracing::warn!(
            user_id = %user.user_id,
            token_org = %user.organization_id,
            path_org = %org_id,
            "cross-tenant access refused"
        );
        Err(AppError::Forbidden("access to this organization is not allowed".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::Role;

    fn user_in(org: Uuid) -> AuthUser {
        AuthUser {
            user_id: Uuid::new_v4(),
            organization_id: org,
            email: "ops@example.com".to_string(),
            role: Role::Admin,
        }
    }

    #[test]
    fn test_same_org_allowed() {
        let org = Uuid::new_v4();
        assert!(ensure_same_org(&user_in(org), org).is_ok());
    }

    #[test]
    fn test_other_org_refused_even_for_admin() {
        let err = ensure_same_org(&user_in(Uuid::new_v4()), Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }
}
