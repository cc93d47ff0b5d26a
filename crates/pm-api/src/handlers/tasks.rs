//! Task handlers
//!
//! Creation and listing are nested under the owning project; single-task
//! operations address tasks directly.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::NaiveDate;
use pm_core::Id;
use pm_models::{Task, TaskPriority, TaskStatus};
use pm_services::{TaskParams, TaskUpdateParams};
use serde::Deserialize;

use crate::error::ApiResult;
use crate::extractors::{AppState, AuthenticatedUser};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    pub title: String,
    pub description: Option<String>,
    pub priority: Option<TaskPriority>,
    pub deadline: Option<NaiveDate>,
    pub estimated_hours: Option<i32>,
    pub assigned_to: Option<Id>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskRequest {
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub deadline: Option<NaiveDate>,
    pub estimated_hours: Option<i32>,
    pub actual_hours: Option<i32>,
    pub assigned_to: Option<Id>,
}

/// POST /projects/:id/tasks
pub async fn create(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(project_id): Path<Id>,
    Json(request): Json<CreateTaskRequest>,
) -> ApiResult<impl IntoResponse> {
    let task = state
        .tasks
        .create(
            project_id,
            TaskParams {
                title: request.title,
                description: request.description,
                priority: request.priority,
                deadline: request.deadline,
                estimated_hours: request.estimated_hours,
                assigned_to: request.assigned_to,
            },
            &user,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(task)))
}

/// GET /projects/:id/tasks
pub async fn list_for_project(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(project_id): Path<Id>,
) -> ApiResult<Json<Vec<Task>>> {
    Ok(Json(state.tasks.list_for_project(project_id, &user).await?))
}

/// GET /tasks/:id
pub async fn get(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Id>,
) -> ApiResult<Json<Task>> {
    Ok(Json(state.tasks.get(id, &user).await?))
}

/// PUT /tasks/:id
pub async fn update(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Id>,
    Json(request): Json<UpdateTaskRequest>,
) -> ApiResult<Json<Task>> {
    let task = state
        .tasks
        .update(
            id,
            TaskUpdateParams {
                title: request.title,
                description: request.description,
                status: request.status,
                priority: request.priority,
                deadline: request.deadline,
                estimated_hours: request.estimated_hours,
                actual_hours: request.actual_hours,
                assigned_to: request.assigned_to,
            },
            &user,
        )
        .await?;
    Ok(Json(task))
}

/// DELETE /tasks/:id
pub async fn delete(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Id>,
) -> ApiResult<impl IntoResponse> {
    state.tasks.delete(id, &user).await?;
    Ok(StatusCode::NO_CONTENT)
}
