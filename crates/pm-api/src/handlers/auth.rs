//! Registration and login
//!
//! These routes are on the public allow-list; they are the only way to
//! obtain a token.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use pm_models::User;
use pm_services::RegisterParams;
use serde::{Deserialize, Serialize};

use crate::error::ApiResult;
use crate::extractors::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Token plus the account it was issued for
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub token: String,
    pub token_type: &'static str,
    pub user: User,
}

impl AuthResponse {
    fn new(user: User, token: String) -> Self {
        Self {
            token,
            token_type: "Bearer",
            user,
        }
    }
}

/// POST /auth/register
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    let (user, token) = state
        .auth
        .register(RegisterParams {
            first_name: request.first_name,
            last_name: request.last_name,
            email: request.email,
            password: request.password,
            confirm_password: request.confirm_password,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(AuthResponse::new(user, token))))
}

/// POST /auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let (user, token) = state.auth.login(&request.email, &request.password).await?;
    Ok(Json(AuthResponse::new(user, token)))
}

/// GET /auth/health
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "UP", "service": "auth" }))
}
