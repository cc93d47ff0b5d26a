//! Axum extractors and shared handler state

use std::sync::Arc;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use pm_auth::CurrentUser;
use pm_core::PmError;
use pm_services::{AuthService, ProjectService, TaskService};

use crate::error::ApiError;

/// Services shared by all handlers
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub projects: Arc<ProjectService>,
    pub tasks: Arc<TaskService>,
}

/// Extractor for routes that require an authenticated identity.
///
/// The authentication filter never blocks a request; it only attaches a
/// [`CurrentUser`] extension when the token checks out. Rejection happens
/// here, at the routes that actually need one.
pub struct AuthenticatedUser(pub CurrentUser);

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .map(AuthenticatedUser)
            .ok_or_else(|| ApiError(PmError::InvalidToken))
    }
}

impl std::ops::Deref for AuthenticatedUser {
    type Target = CurrentUser;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
