//! Task service
//!
//! Tasks live inside a project; every operation is gated on project
//! membership. Deleting a task additionally requires being the project
//! owner or the task's creator.

use std::sync::Arc;

use pm_auth::{policy, CurrentUser};
use pm_core::{Id, PmError, PmResult, ValidationErrors};
use pm_models::{Project, Task, TaskPriority, TaskStatus};
use tracing::info;

use crate::store::{NewTask, ProjectStore, TaskStore, TaskUpdate};

const TITLE_MAX: usize = 200;

#[derive(Debug, Clone)]
pub struct TaskParams {
    pub title: String,
    pub description: Option<String>,
    pub priority: Option<TaskPriority>,
    pub deadline: Option<chrono::NaiveDate>,
    pub estimated_hours: Option<i32>,
    pub assigned_to: Option<Id>,
}

#[derive(Debug, Clone)]
pub struct TaskUpdateParams {
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub deadline: Option<chrono::NaiveDate>,
    pub estimated_hours: Option<i32>,
    pub actual_hours: Option<i32>,
    pub assigned_to: Option<Id>,
}

pub struct TaskService {
    tasks: Arc<dyn TaskStore>,
    projects: Arc<dyn ProjectStore>,
}

impl TaskService {
    pub fn new(tasks: Arc<dyn TaskStore>, projects: Arc<dyn ProjectStore>) -> Self {
        Self { tasks, projects }
    }

    /// Create a task in a project the actor is a member of. An assignee,
    /// when given, must be a member too.
    pub async fn create(
        &self,
        project_id: Id,
        params: TaskParams,
        actor: &CurrentUser,
    ) -> PmResult<Task> {
        validate_task(&params.title, params.description.as_deref())?;
        let project = self.require_membership(project_id, actor).await?;

        if let Some(assignee) = params.assigned_to {
            if !project.is_member(assignee) {
                let mut errors = ValidationErrors::new();
                errors.add("assignedTo", "must be a member of the project");
                return Err(PmError::Validation(errors));
            }
        }

        let task = self
            .tasks
            .insert(NewTask {
                title: params.title.trim().to_string(),
                description: params.description.map(|d| d.trim().to_string()),
                status: TaskStatus::Todo,
                priority: params.priority.unwrap_or_default(),
                deadline: params.deadline,
                estimated_hours: params.estimated_hours,
                project_id,
                assigned_to: params.assigned_to,
                created_by: actor.id,
            })
            .await?;

        info!(task_id = task.id, project_id, "created task");
        Ok(task)
    }

    pub async fn get(&self, task_id: Id, actor: &CurrentUser) -> PmResult<Task> {
        let task = self.require_task(task_id).await?;
        self.require_membership(task.project_id, actor).await?;
        Ok(task)
    }

    pub async fn list_for_project(
        &self,
        project_id: Id,
        actor: &CurrentUser,
    ) -> PmResult<Vec<Task>> {
        self.require_membership(project_id, actor).await?;
        self.tasks.list_by_project(project_id).await
    }

    /// Any project member may update a task
    pub async fn update(
        &self,
        task_id: Id,
        params: TaskUpdateParams,
        actor: &CurrentUser,
    ) -> PmResult<Task> {
        validate_task(&params.title, params.description.as_deref())?;
        let task = self.require_task(task_id).await?;
        let project = self.require_membership(task.project_id, actor).await?;

        if let Some(assignee) = params.assigned_to {
            if !project.is_member(assignee) {
                let mut errors = ValidationErrors::new();
                errors.add("assignedTo", "must be a member of the project");
                return Err(PmError::Validation(errors));
            }
        }

        self.tasks
            .update(
                task_id,
                TaskUpdate {
                    title: params.title.trim().to_string(),
                    description: params.description.map(|d| d.trim().to_string()),
                    status: params.status,
                    priority: params.priority,
                    deadline: params.deadline,
                    estimated_hours: params.estimated_hours,
                    actual_hours: params.actual_hours,
                    assigned_to: params.assigned_to,
                },
            )
            .await
    }

    /// Delete requires project ownership or having created the task
    pub async fn delete(&self, task_id: Id, actor: &CurrentUser) -> PmResult<()> {
        let task = self.require_task(task_id).await?;
        let project = self.require_membership(task.project_id, actor).await?;

        if !policy::is_owner(&project, actor.id) && task.created_by != actor.id {
            return Err(PmError::access_denied(
                "Only the project owner or the task creator can delete a task",
            ));
        }

        info!(task_id, actor_id = actor.id, "deleting task");
        self.tasks.delete(task_id).await
    }

    async fn require_task(&self, task_id: Id) -> PmResult<Task> {
        self.tasks
            .find_by_id(task_id)
            .await?
            .ok_or_else(|| PmError::not_found("task", "id", task_id))
    }

    async fn require_membership(&self, project_id: Id, actor: &CurrentUser) -> PmResult<Project> {
        let project = self
            .projects
            .find_by_id(project_id)
            .await?
            .ok_or_else(|| PmError::not_found("project", "id", project_id))?;
        if !policy::can_view_project(&project, actor) {
            return Err(PmError::access_denied(
                "You are not a member of this project",
            ));
        }
        Ok(project)
    }
}

fn validate_task(title: &str, description: Option<&str>) -> PmResult<()> {
    let mut errors = ValidationErrors::new();
    let title = title.trim();
    if title.is_empty() {
        errors.add("title", "is required");
    } else if title.len() > TITLE_MAX {
        errors.add("title", format!("cannot exceed {} characters", TITLE_MAX));
    }
    if let Some(description) = description {
        if description.trim().len() > 1000 {
            errors.add("description", "cannot exceed 1000 characters");
        }
    }
    errors.into_result()
}
