//! User profile and directory handlers

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use pm_models::User;
use serde::Deserialize;
use serde_json::json;

use crate::error::ApiResult;
use crate::extractors::{AppState, AuthenticatedUser};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdateRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Deserialize)]
pub struct EmailQuery {
    pub email: String,
}

/// GET /users
pub async fn list(State(state): State<AppState>, _user: AuthenticatedUser) -> ApiResult<Json<Vec<User>>> {
    Ok(Json(state.auth.list_active_users().await?))
}

/// GET /users/profile
pub async fn profile(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> ApiResult<Json<User>> {
    Ok(Json(state.auth.get_user(user.id).await?))
}

/// PUT /users/profile
pub async fn update_profile(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<ProfileUpdateRequest>,
) -> ApiResult<Json<User>> {
    let updated = state
        .auth
        .update_profile(
            user.id,
            &request.first_name,
            &request.last_name,
            &request.email,
        )
        .await?;
    Ok(Json(updated))
}

/// DELETE /users/profile
///
/// Soft-deletes the account. Any outstanding token stops authenticating on
/// its next use.
pub async fn deactivate(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> ApiResult<impl IntoResponse> {
    state.auth.deactivate(user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /users/change-password
pub async fn change_password(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<ChangePasswordRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    state
        .auth
        .change_password(user.id, &request.current_password, &request.new_password)
        .await?;
    Ok(Json(json!({ "message": "Password changed successfully" })))
}

/// GET /users/search?q=term
pub async fn search(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<Vec<User>>> {
    Ok(Json(state.auth.search_users(&query.q).await?))
}

/// GET /users/stats
pub async fn stats(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> ApiResult<Json<serde_json::Value>> {
    let active = state.auth.count_active_users().await?;
    Ok(Json(json!({ "activeUsers": active })))
}

/// GET /users/check-email?email=a@x.com
pub async fn check_email(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Query(query): Query<EmailQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let available = state.auth.email_available(&query.email).await?;
    Ok(Json(json!({ "available": available })))
}
