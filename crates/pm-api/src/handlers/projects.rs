//! Project CRUD and membership handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::NaiveDate;
use pm_core::{Id, PmError, ValidationErrors};
use pm_models::{Project, User};
use pm_services::{MemberRef, ProjectParams};
use serde::{Deserialize, Serialize};

use crate::error::ApiResult;
use crate::extractors::{AppState, AuthenticatedUser};
use crate::handlers::users::SearchQuery;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRequest {
    pub name: String,
    pub description: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl From<ProjectRequest> for ProjectParams {
    fn from(request: ProjectRequest) -> Self {
        ProjectParams {
            name: request.name,
            description: request.description,
            start_date: request.start_date,
            end_date: request.end_date,
        }
    }
}

/// Member to add: by id or by email, at least one required
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddMemberRequest {
    pub user_id: Option<Id>,
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub total_projects: u64,
    pub owned_projects: u64,
    pub total_tasks: u64,
    pub completed_tasks: u64,
    pub completion_percentage: f64,
}

/// POST /projects
pub async fn create(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<ProjectRequest>,
) -> ApiResult<impl IntoResponse> {
    let project = state.projects.create(request.into(), &user).await?;
    Ok((StatusCode::CREATED, Json(project)))
}

/// GET /projects
pub async fn list(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> ApiResult<Json<Vec<Project>>> {
    Ok(Json(state.projects.list_for(&user).await?))
}

/// GET /projects/owned
pub async fn owned(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> ApiResult<Json<Vec<Project>>> {
    Ok(Json(state.projects.owned_by(&user).await?))
}

/// GET /projects/search?q=term
pub async fn search(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<Vec<Project>>> {
    Ok(Json(state.projects.search(&query.q, &user).await?))
}

/// GET /projects/recent
pub async fn recent(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> ApiResult<Json<Vec<Project>>> {
    Ok(Json(state.projects.recent(&user).await?))
}

/// GET /projects/stats
pub async fn stats(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> ApiResult<Json<StatsResponse>> {
    let stats = state.projects.stats(&user).await?;
    Ok(Json(StatsResponse {
        total_projects: stats.total_projects,
        owned_projects: stats.owned_projects,
        total_tasks: stats.total_tasks,
        completed_tasks: stats.completed_tasks,
        completion_percentage: stats.completion_percentage(),
    }))
}

/// GET /projects/:id
pub async fn get(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Id>,
) -> ApiResult<Json<Project>> {
    Ok(Json(state.projects.get(id, &user).await?))
}

/// PUT /projects/:id
pub async fn update(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Id>,
    Json(request): Json<ProjectRequest>,
) -> ApiResult<Json<Project>> {
    Ok(Json(state.projects.update(id, request.into(), &user).await?))
}

/// DELETE /projects/:id
pub async fn delete(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Id>,
) -> ApiResult<impl IntoResponse> {
    state.projects.delete(id, &user).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /projects/:id/members
pub async fn members(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Id>,
) -> ApiResult<Json<Vec<User>>> {
    Ok(Json(state.projects.members(id, &user).await?))
}

/// POST /projects/:id/members
pub async fn add_member(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Id>,
    Json(request): Json<AddMemberRequest>,
) -> ApiResult<impl IntoResponse> {
    let member = match (request.user_id, request.email) {
        (Some(user_id), _) => MemberRef::Id(user_id),
        (None, Some(email)) => MemberRef::Email(email),
        (None, None) => {
            let mut errors = ValidationErrors::new();
            errors.add_base("Either userId or email is required");
            return Err(PmError::Validation(errors).into());
        }
    };

    let added = state.projects.add_member(id, member, &user).await?;
    Ok((StatusCode::CREATED, Json(added)))
}

/// DELETE /projects/:id/members/:user_id
pub async fn remove_member(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path((id, member_id)): Path<(Id, Id)>,
) -> ApiResult<impl IntoResponse> {
    state.projects.remove_member(id, member_id, &user).await?;
    Ok(StatusCode::NO_CONTENT)
}
