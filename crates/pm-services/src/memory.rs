//! In-memory store implementations
//!
//! Back the storage traits with maps behind an `RwLock`. Used by the test
//! suites and for running the server without a database.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;
use pm_auth::IdentityLookup;
use pm_core::{Id, PmError, PmResult};
use pm_models::{Project, Task, User};

use crate::store::{
    NewProject, NewTask, NewUser, ProfileUpdate, ProjectStore, ProjectUpdate, TaskCounts,
    TaskStore, TaskUpdate, UserStore,
};

#[derive(Default)]
pub struct InMemoryUserStore {
    users: RwLock<HashMap<Id, User>>,
    next_id: AtomicI64,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            next_id: AtomicI64::new(1),
        }
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn insert(&self, user: NewUser) -> PmResult<User> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let now = Utc::now();
        let user = User {
            id,
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.users.write().unwrap().insert(id, user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: Id) -> PmResult<Option<User>> {
        Ok(self.users.read().unwrap().get(&id).cloned())
    }

    async fn find_active_by_email(&self, email: &str) -> PmResult<Option<User>> {
        Ok(self
            .users
            .read()
            .unwrap()
            .values()
            .find(|u| u.is_active && u.email == email)
            .cloned())
    }

    async fn email_exists(&self, email: &str) -> PmResult<bool> {
        let email = email.to_lowercase();
        Ok(self
            .users
            .read()
            .unwrap()
            .values()
            .any(|u| u.email.to_lowercase() == email))
    }

    async fn update_profile(&self, id: Id, update: ProfileUpdate) -> PmResult<User> {
        let mut users = self.users.write().unwrap();
        let user = users
            .get_mut(&id)
            .ok_or_else(|| PmError::not_found("user", "id", id))?;
        user.first_name = update.first_name;
        user.last_name = update.last_name;
        user.email = update.email;
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn update_password_hash(&self, id: Id, password_hash: &str) -> PmResult<()> {
        let mut users = self.users.write().unwrap();
        let user = users
            .get_mut(&id)
            .ok_or_else(|| PmError::not_found("user", "id", id))?;
        user.password_hash = password_hash.to_string();
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn deactivate(&self, id: Id) -> PmResult<()> {
        let mut users = self.users.write().unwrap();
        let user = users
            .get_mut(&id)
            .ok_or_else(|| PmError::not_found("user", "id", id))?;
        user.is_active = false;
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn list_active(&self) -> PmResult<Vec<User>> {
        let mut users: Vec<User> = self
            .users
            .read()
            .unwrap()
            .values()
            .filter(|u| u.is_active)
            .cloned()
            .collect();
        users.sort_by_key(|u| u.id);
        Ok(users)
    }

    async fn search_by_name(&self, term: &str) -> PmResult<Vec<User>> {
        let term = term.to_lowercase();
        let mut users: Vec<User> = self
            .users
            .read()
            .unwrap()
            .values()
            .filter(|u| u.is_active && u.full_name().to_lowercase().contains(&term))
            .cloned()
            .collect();
        users.sort_by_key(|u| u.id);
        Ok(users)
    }

    async fn count_active(&self) -> PmResult<u64> {
        Ok(self
            .users
            .read()
            .unwrap()
            .values()
            .filter(|u| u.is_active)
            .count() as u64)
    }
}

#[async_trait]
impl IdentityLookup for InMemoryUserStore {
    async fn find_active_by_email(&self, email: &str) -> Result<Option<User>, PmError> {
        UserStore::find_active_by_email(self, email).await
    }
}

#[derive(Default)]
pub struct InMemoryProjectStore {
    projects: RwLock<HashMap<Id, Project>>,
    next_id: AtomicI64,
}

impl InMemoryProjectStore {
    pub fn new() -> Self {
        Self {
            projects: RwLock::new(HashMap::new()),
            next_id: AtomicI64::new(1),
        }
    }
}

#[async_trait]
impl ProjectStore for InMemoryProjectStore {
    async fn insert(&self, project: NewProject) -> PmResult<Project> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let now = Utc::now();
        let project = Project {
            id,
            name: project.name,
            description: project.description,
            start_date: project.start_date,
            end_date: project.end_date,
            owner_id: project.owner_id,
            is_active: true,
            member_ids: [project.owner_id].into(),
            created_at: now,
            updated_at: now,
        };
        self.projects.write().unwrap().insert(id, project.clone());
        Ok(project)
    }

    async fn find_by_id(&self, id: Id) -> PmResult<Option<Project>> {
        Ok(self
            .projects
            .read()
            .unwrap()
            .get(&id)
            .filter(|p| p.is_active)
            .cloned())
    }

    async fn list_by_member(&self, user_id: Id) -> PmResult<Vec<Project>> {
        let mut projects: Vec<Project> = self
            .projects
            .read()
            .unwrap()
            .values()
            .filter(|p| p.is_active && p.is_member(user_id))
            .cloned()
            .collect();
        projects.sort_by_key(|p| p.id);
        Ok(projects)
    }

    async fn list_by_owner(&self, user_id: Id) -> PmResult<Vec<Project>> {
        let mut projects: Vec<Project> = self
            .projects
            .read()
            .unwrap()
            .values()
            .filter(|p| p.is_active && p.is_owner(user_id))
            .cloned()
            .collect();
        projects.sort_by_key(|p| p.id);
        Ok(projects)
    }

    async fn update(&self, id: Id, update: ProjectUpdate) -> PmResult<Project> {
        let mut projects = self.projects.write().unwrap();
        let project = projects
            .get_mut(&id)
            .ok_or_else(|| PmError::not_found("project", "id", id))?;
        project.name = update.name;
        project.description = update.description;
        project.start_date = update.start_date;
        project.end_date = update.end_date;
        project.updated_at = Utc::now();
        Ok(project.clone())
    }

    async fn deactivate(&self, id: Id) -> PmResult<()> {
        let mut projects = self.projects.write().unwrap();
        let project = projects
            .get_mut(&id)
            .ok_or_else(|| PmError::not_found("project", "id", id))?;
        project.is_active = false;
        project.updated_at = Utc::now();
        Ok(())
    }

    async fn add_member(&self, project_id: Id, user_id: Id) -> PmResult<()> {
        let mut projects = self.projects.write().unwrap();
        let project = projects
            .get_mut(&project_id)
            .ok_or_else(|| PmError::not_found("project", "id", project_id))?;
        project.add_member(user_id);
        project.updated_at = Utc::now();
        Ok(())
    }

    async fn remove_member(&self, project_id: Id, user_id: Id) -> PmResult<()> {
        let mut projects = self.projects.write().unwrap();
        let project = projects
            .get_mut(&project_id)
            .ok_or_else(|| PmError::not_found("project", "id", project_id))?;
        // Owner membership is invariant; the model refuses the removal
        if !project.remove_member(user_id) && project.is_owner(user_id) {
            return Err(PmError::access_denied(
                "Cannot remove project owner from the project",
            ));
        }
        project.updated_at = Utc::now();
        Ok(())
    }

    async fn search_by_member(&self, user_id: Id, term: &str) -> PmResult<Vec<Project>> {
        let term = term.to_lowercase();
        let mut projects: Vec<Project> = self
            .projects
            .read()
            .unwrap()
            .values()
            .filter(|p| {
                p.is_active && p.is_member(user_id) && p.name.to_lowercase().contains(&term)
            })
            .cloned()
            .collect();
        projects.sort_by_key(|p| p.id);
        Ok(projects)
    }

    async fn recent_for_member(&self, user_id: Id, limit: usize) -> PmResult<Vec<Project>> {
        let mut projects: Vec<Project> = self
            .projects
            .read()
            .unwrap()
            .values()
            .filter(|p| p.is_active && p.is_member(user_id))
            .cloned()
            .collect();
        projects.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        projects.truncate(limit);
        Ok(projects)
    }
}

#[derive(Default)]
pub struct InMemoryTaskStore {
    tasks: RwLock<HashMap<Id, Task>>,
    next_id: AtomicI64,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self {
            tasks: RwLock::new(HashMap::new()),
            next_id: AtomicI64::new(1),
        }
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn insert(&self, task: NewTask) -> PmResult<Task> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let now = Utc::now();
        let task = Task {
            id,
            title: task.title,
            description: task.description,
            status: task.status,
            priority: task.priority,
            deadline: task.deadline,
            estimated_hours: task.estimated_hours,
            actual_hours: None,
            project_id: task.project_id,
            assigned_to: task.assigned_to,
            created_by: task.created_by,
            created_at: now,
            updated_at: now,
        };
        self.tasks.write().unwrap().insert(id, task.clone());
        Ok(task)
    }

    async fn find_by_id(&self, id: Id) -> PmResult<Option<Task>> {
        Ok(self.tasks.read().unwrap().get(&id).cloned())
    }

    async fn list_by_project(&self, project_id: Id) -> PmResult<Vec<Task>> {
        let mut tasks: Vec<Task> = self
            .tasks
            .read()
            .unwrap()
            .values()
            .filter(|t| t.project_id == project_id)
            .cloned()
            .collect();
        tasks.sort_by_key(|t| t.id);
        Ok(tasks)
    }

    async fn update(&self, id: Id, update: TaskUpdate) -> PmResult<Task> {
        let mut tasks = self.tasks.write().unwrap();
        let task = tasks
            .get_mut(&id)
            .ok_or_else(|| PmError::not_found("task", "id", id))?;
        task.title = update.title;
        task.description = update.description;
        task.status = update.status;
        task.priority = update.priority;
        task.deadline = update.deadline;
        task.estimated_hours = update.estimated_hours;
        task.actual_hours = update.actual_hours;
        task.assigned_to = update.assigned_to;
        task.updated_at = Utc::now();
        Ok(task.clone())
    }

    async fn delete(&self, id: Id) -> PmResult<()> {
        self.tasks
            .write()
            .unwrap()
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| PmError::not_found("task", "id", id))
    }

    async fn count_by_project(&self, project_id: Id) -> PmResult<TaskCounts> {
        let tasks = self.tasks.read().unwrap();
        let mut counts = TaskCounts::default();
        for task in tasks.values().filter(|t| t.project_id == project_id) {
            counts.total += 1;
            if task.is_done() {
                counts.done += 1;
            }
        }
        Ok(counts)
    }
}
