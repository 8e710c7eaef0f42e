//! Authentication handlers

use axum::extract::State;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppResult;
use crate::extract::Json;
use crate::middleware::CurrentUser;
use crate::services::auth::LoginResponse;
use crate::services::user::UserWithDetails;
use crate::services::{AuthService, UserService};
use crate::AppState;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    pub organization_id: Option<Uuid>,
}

/// Login endpoint handler
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let auth_service = AuthService::new(state.db.clone(), &state.config);
    let response = auth_service
        .login(&body.email, &body.password, body.organization_id)
        .await?;

    Ok(Json(response))
}

/// Current user endpoint handler
pub async fn me(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<UserWithDetails>> {
    let service = UserService::new(state.db);
    let me = service.get(user.organization_id, user.user_id).await?;

    Ok(Json(me))
}
