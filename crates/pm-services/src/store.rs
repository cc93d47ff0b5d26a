//! Storage traits
//!
//! Narrow interfaces the services persist through. Implemented by `pm-db`
//! for Postgres and by [`crate::memory`] for tests and standalone runs.
//! Ownership/membership checks and the subsequent write must see a
//! consistent snapshot; implementations keep membership mutations inside
//! one transactional boundary.

use async_trait::async_trait;
use chrono::NaiveDate;
use pm_core::{Id, PmResult};
use pm_models::{Project, Role, Task, TaskPriority, TaskStatus, User};

/// Fields for inserting a user; the store assigns id and timestamps
#[derive(Debug, Clone)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    /// Already normalized (trimmed, lowercased)
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

/// Profile fields a user may change
#[derive(Debug, Clone)]
pub struct ProfileUpdate {
    pub first_name: String,
    pub last_name: String,
    /// Normalized; uniqueness is re-checked by the service
    pub email: String,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert(&self, user: NewUser) -> PmResult<User>;
    async fn find_by_id(&self, id: Id) -> PmResult<Option<User>>;
    /// Lookup by normalized email, active identities only
    async fn find_active_by_email(&self, email: &str) -> PmResult<Option<User>>;
    /// Case-insensitive existence check, active or not
    async fn email_exists(&self, email: &str) -> PmResult<bool>;
    async fn update_profile(&self, id: Id, update: ProfileUpdate) -> PmResult<User>;
    async fn update_password_hash(&self, id: Id, password_hash: &str) -> PmResult<()>;
    /// Soft delete; the row is never removed
    async fn deactivate(&self, id: Id) -> PmResult<()>;
    async fn list_active(&self) -> PmResult<Vec<User>>;
    async fn search_by_name(&self, term: &str) -> PmResult<Vec<User>>;
    async fn count_active(&self) -> PmResult<u64>;
}

#[derive(Debug, Clone)]
pub struct NewProject {
    pub name: String,
    pub description: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub owner_id: Id,
}

#[derive(Debug, Clone)]
pub struct ProjectUpdate {
    pub name: String,
    pub description: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[async_trait]
pub trait ProjectStore: Send + Sync {
    /// Insert with the owner already in the member set
    async fn insert(&self, project: NewProject) -> PmResult<Project>;
    async fn find_by_id(&self, id: Id) -> PmResult<Option<Project>>;
    async fn list_by_member(&self, user_id: Id) -> PmResult<Vec<Project>>;
    async fn list_by_owner(&self, user_id: Id) -> PmResult<Vec<Project>>;
    async fn update(&self, id: Id, update: ProjectUpdate) -> PmResult<Project>;
    /// Soft delete
    async fn deactivate(&self, id: Id) -> PmResult<()>;
    async fn add_member(&self, project_id: Id, user_id: Id) -> PmResult<()>;
    /// Must refuse to remove the owner regardless of caller
    async fn remove_member(&self, project_id: Id, user_id: Id) -> PmResult<()>;
    async fn search_by_member(&self, user_id: Id, term: &str) -> PmResult<Vec<Project>>;
    async fn recent_for_member(&self, user_id: Id, limit: usize) -> PmResult<Vec<Project>>;
}

#[derive(Debug, Clone)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub deadline: Option<NaiveDate>,
    pub estimated_hours: Option<i32>,
    pub project_id: Id,
    pub assigned_to: Option<Id>,
    pub created_by: Id,
}

#[derive(Debug, Clone)]
pub struct TaskUpdate {
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub deadline: Option<NaiveDate>,
    pub estimated_hours: Option<i32>,
    pub actual_hours: Option<i32>,
    pub assigned_to: Option<Id>,
}

/// Per-project task totals used by project statistics
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskCounts {
    pub total: u64,
    pub done: u64,
}

#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn insert(&self, task: NewTask) -> PmResult<Task>;
    async fn find_by_id(&self, id: Id) -> PmResult<Option<Task>>;
    async fn list_by_project(&self, project_id: Id) -> PmResult<Vec<Task>>;
    async fn update(&self, id: Id, update: TaskUpdate) -> PmResult<Task>;
    async fn delete(&self, id: Id) -> PmResult<()>;
    async fn count_by_project(&self, project_id: Id) -> PmResult<TaskCounts>;
}
