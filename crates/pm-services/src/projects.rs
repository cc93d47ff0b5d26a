//! Project service
//!
//! CRUD and member management. Every mutating operation loads a snapshot of
//! the project, consults the authorization rules and only then writes; the
//! storage layer keeps the membership write inside the same transactional
//! boundary so the checked snapshot cannot drift under the mutation.

use std::sync::Arc;

use pm_auth::{policy, CurrentUser};
use pm_core::{Id, PmError, PmResult, ValidationErrors};
use pm_models::{Project, User};
use tracing::info;

use crate::store::{NewProject, ProjectStore, ProjectUpdate, TaskStore, UserStore};

const NAME_MIN: usize = 3;
const NAME_MAX: usize = 100;
const DESCRIPTION_MAX: usize = 500;
const RECENT_LIMIT: usize = 5;

/// Create/update input shared by both operations
#[derive(Debug, Clone)]
pub struct ProjectParams {
    pub name: String,
    pub description: Option<String>,
    pub start_date: Option<chrono::NaiveDate>,
    pub end_date: Option<chrono::NaiveDate>,
}

/// Reference to a user when adding a member: by id or by email
#[derive(Debug, Clone)]
pub enum MemberRef {
    Id(Id),
    Email(String),
}

/// Aggregate statistics over the actor's projects
#[derive(Debug, Clone, Default)]
pub struct ProjectStats {
    pub total_projects: u64,
    pub owned_projects: u64,
    pub total_tasks: u64,
    pub completed_tasks: u64,
}

impl ProjectStats {
    pub fn completion_percentage(&self) -> f64 {
        if self.total_tasks == 0 {
            0.0
        } else {
            (self.completed_tasks as f64 * 100.0) / self.total_tasks as f64
        }
    }
}

pub struct ProjectService {
    projects: Arc<dyn ProjectStore>,
    users: Arc<dyn UserStore>,
    tasks: Arc<dyn TaskStore>,
}

impl ProjectService {
    pub fn new(
        projects: Arc<dyn ProjectStore>,
        users: Arc<dyn UserStore>,
        tasks: Arc<dyn TaskStore>,
    ) -> Self {
        Self {
            projects,
            users,
            tasks,
        }
    }

    /// Create a project owned by the actor. The owner is a member from the
    /// first moment the project exists.
    pub async fn create(&self, params: ProjectParams, actor: &CurrentUser) -> PmResult<Project> {
        validate_project(&params)?;
        // Reconfirm the owner still exists as an active identity
        self.users
            .find_by_id(actor.id)
            .await?
            .filter(|u| u.is_active)
            .ok_or_else(|| PmError::not_found("user", "id", actor.id))?;

        let project = self
            .projects
            .insert(NewProject {
                name: params.name.trim().to_string(),
                description: trim_description(params.description),
                start_date: params.start_date,
                end_date: params.end_date,
                owner_id: actor.id,
            })
            .await?;

        info!(project_id = project.id, owner_id = actor.id, "created project");
        Ok(project)
    }

    /// Fetch a project the actor is a member of
    pub async fn get(&self, project_id: Id, actor: &CurrentUser) -> PmResult<Project> {
        let project = self.require_project(project_id).await?;
        if !policy::can_view_project(&project, actor) {
            return Err(PmError::access_denied(
                "You are not a member of this project",
            ));
        }
        Ok(project)
    }

    /// Projects the actor is a member of
    pub async fn list_for(&self, actor: &CurrentUser) -> PmResult<Vec<Project>> {
        self.projects.list_by_member(actor.id).await
    }

    /// Projects the actor owns
    pub async fn owned_by(&self, actor: &CurrentUser) -> PmResult<Vec<Project>> {
        self.projects.list_by_owner(actor.id).await
    }

    /// Update name/description/dates. Ownership required; membership is
    /// insufficient.
    pub async fn update(
        &self,
        project_id: Id,
        params: ProjectParams,
        actor: &CurrentUser,
    ) -> PmResult<Project> {
        validate_project(&params)?;
        let project = self.require_project(project_id).await?;
        if !policy::can_modify_project(&project, actor) {
            return Err(PmError::access_denied(
                "Only the project owner can update the project",
            ));
        }

        self.projects
            .update(
                project_id,
                ProjectUpdate {
                    name: params.name.trim().to_string(),
                    description: trim_description(params.description),
                    start_date: params.start_date,
                    end_date: params.end_date,
                },
            )
            .await
    }

    /// Soft-delete. Ownership required.
    pub async fn delete(&self, project_id: Id, actor: &CurrentUser) -> PmResult<()> {
        let project = self.require_project(project_id).await?;
        if !policy::can_modify_project(&project, actor) {
            return Err(PmError::access_denied(
                "Only the project owner can delete the project",
            ));
        }
        info!(project_id, actor_id = actor.id, "deactivating project");
        self.projects.deactivate(project_id).await
    }

    /// Add a member, referenced by id or email. Owner or admin only.
    pub async fn add_member(
        &self,
        project_id: Id,
        member: MemberRef,
        actor: &CurrentUser,
    ) -> PmResult<User> {
        let project = self.require_project(project_id).await?;
        if !policy::can_add_member(&project, actor) {
            return Err(PmError::access_denied(
                "Only the project owner can add members",
            ));
        }

        let user = match member {
            MemberRef::Id(id) => self
                .users
                .find_by_id(id)
                .await?
                .filter(|u| u.is_active)
                .ok_or_else(|| PmError::not_found("user", "id", id))?,
            MemberRef::Email(email) => {
                let email = email.trim().to_lowercase();
                self.users
                    .find_active_by_email(&email)
                    .await?
                    .ok_or_else(|| PmError::not_found("user", "email", email))?
            }
        };

        if project.is_member(user.id) {
            let mut errors = ValidationErrors::new();
            errors.add_base("User is already a member of this project");
            return Err(PmError::Validation(errors));
        }

        self.projects.add_member(project_id, user.id).await?;
        info!(project_id, member_id = user.id, "added project member");
        Ok(user)
    }

    /// Remove a member. Owner only, and the owner can never be the target.
    pub async fn remove_member(
        &self,
        project_id: Id,
        target_id: Id,
        actor: &CurrentUser,
    ) -> PmResult<()> {
        let project = self.require_project(project_id).await?;
        if !policy::can_remove_member(&project, actor, target_id) {
            let message = if policy::is_owner(&project, target_id) {
                "Cannot remove project owner from the project"
            } else {
                "Only the project owner can remove members"
            };
            return Err(PmError::access_denied(message));
        }

        if !project.is_member(target_id) {
            let mut errors = ValidationErrors::new();
            errors.add_base("User is not a member of this project");
            return Err(PmError::Validation(errors));
        }

        self.projects.remove_member(project_id, target_id).await?;
        info!(project_id, member_id = target_id, "removed project member");
        Ok(())
    }

    /// Member list, visible to members
    pub async fn members(&self, project_id: Id, actor: &CurrentUser) -> PmResult<Vec<User>> {
        let project = self.get(project_id, actor).await?;
        let mut members = Vec::with_capacity(project.member_ids.len());
        for member_id in &project.member_ids {
            if let Some(user) = self.users.find_by_id(*member_id).await? {
                members.push(user);
            }
        }
        members.sort_by_key(|u| u.id);
        Ok(members)
    }

    /// Name search within the actor's projects; blank term lists them all
    pub async fn search(&self, term: &str, actor: &CurrentUser) -> PmResult<Vec<Project>> {
        let term = term.trim();
        if term.is_empty() {
            self.projects.list_by_member(actor.id).await
        } else {
            self.projects.search_by_member(actor.id, term).await
        }
    }

    /// Most recently created projects the actor is a member of
    pub async fn recent(&self, actor: &CurrentUser) -> PmResult<Vec<Project>> {
        self.projects.recent_for_member(actor.id, RECENT_LIMIT).await
    }

    /// Aggregate task/project counts across the actor's projects
    pub async fn stats(&self, actor: &CurrentUser) -> PmResult<ProjectStats> {
        let projects = self.projects.list_by_member(actor.id).await?;
        let mut stats = ProjectStats {
            total_projects: projects.len() as u64,
            ..Default::default()
        };
        for project in &projects {
            if project.is_owner(actor.id) {
                stats.owned_projects += 1;
            }
            let counts = self.tasks.count_by_project(project.id).await?;
            stats.total_tasks += counts.total;
            stats.completed_tasks += counts.done;
        }
        Ok(stats)
    }

    async fn require_project(&self, project_id: Id) -> PmResult<Project> {
        self.projects
            .find_by_id(project_id)
            .await?
            .ok_or_else(|| PmError::not_found("project", "id", project_id))
    }
}

fn trim_description(description: Option<String>) -> Option<String> {
    description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
}

fn validate_project(params: &ProjectParams) -> PmResult<()> {
    let mut errors = ValidationErrors::new();

    let name = params.name.trim();
    if name.len() < NAME_MIN || name.len() > NAME_MAX {
        errors.add(
            "name",
            format!("must be between {} and {} characters", NAME_MIN, NAME_MAX),
        );
    }
    if let Some(description) = &params.description {
        if description.trim().len() > DESCRIPTION_MAX {
            errors.add(
                "description",
                format!("cannot exceed {} characters", DESCRIPTION_MAX),
            );
        }
    }
    if let (Some(start), Some(end)) = (params.start_date, params.end_date) {
        if end <= start {
            errors.add("endDate", "must be after start date");
        }
    }

    errors.into_result()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{InMemoryProjectStore, InMemoryTaskStore, InMemoryUserStore};
    use crate::store::{NewTask, NewUser};
    use pm_models::{Role, TaskPriority, TaskStatus};

    struct Fixture {
        service: ProjectService,
        users: Arc<InMemoryUserStore>,
        tasks: Arc<InMemoryTaskStore>,
    }

    impl Fixture {
        fn new() -> Self {
            let users = Arc::new(InMemoryUserStore::new());
            let projects = Arc::new(InMemoryProjectStore::new());
            let tasks = Arc::new(InMemoryTaskStore::new());
            Self {
                service: ProjectService::new(projects, users.clone(), tasks.clone()),
                users,
                tasks,
            }
        }

        async fn user(&self, email: &str, role: Role) -> CurrentUser {
            let user = self
                .users
                .insert(NewUser {
                    first_name: "Test".into(),
                    last_name: email.split('@').next().unwrap_or("user").into(),
                    email: email.into(),
                    password_hash: String::new(),
                    role,
                })
                .await
                .unwrap();
            CurrentUser::from_user(&user)
        }
    }

    fn params(name: &str) -> ProjectParams {
        ProjectParams {
            name: name.into(),
            description: Some("A test project".into()),
            start_date: None,
            end_date: None,
        }
    }

    #[tokio::test]
    async fn test_create_makes_owner_a_member() {
        let fx = Fixture::new();
        let owner = fx.user("owner@x.com", Role::User).await;

        let project = fx.service.create(params("Apollo"), &owner).await.unwrap();
        assert_eq!(project.owner_id, owner.id);
        assert!(project.is_member(owner.id));
    }

    #[tokio::test]
    async fn test_create_validates_name_and_dates() {
        let fx = Fixture::new();
        let owner = fx.user("owner@x.com", Role::User).await;

        let err = fx.service.create(params("ab"), &owner).await.unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");

        let mut bad_dates = params("Apollo");
        bad_dates.start_date = chrono::NaiveDate::from_ymd_opt(2026, 2, 1);
        bad_dates.end_date = chrono::NaiveDate::from_ymd_opt(2026, 1, 1);
        let err = fx.service.create(bad_dates, &owner).await.unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_non_member_cannot_view() {
        let fx = Fixture::new();
        let owner = fx.user("owner@x.com", Role::User).await;
        let outsider = fx.user("outsider@x.com", Role::User).await;

        let project = fx.service.create(params("Apollo"), &owner).await.unwrap();

        let err = fx.service.get(project.id, &outsider).await.unwrap_err();
        assert_eq!(err.error_code(), "PROJECT_ACCESS_DENIED");
        assert_eq!(err.status_code(), 403);
    }

    #[tokio::test]
    async fn test_member_cannot_update_or_delete() {
        let fx = Fixture::new();
        let owner = fx.user("owner@x.com", Role::User).await;
        let member = fx.user("member@x.com", Role::User).await;

        let project = fx.service.create(params("Apollo"), &owner).await.unwrap();
        fx.service
            .add_member(project.id, MemberRef::Id(member.id), &owner)
            .await
            .unwrap();

        // Membership is insufficient for update/delete
        let err = fx
            .service
            .update(project.id, params("Apollo 2"), &member)
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "PROJECT_ACCESS_DENIED");

        let err = fx.service.delete(project.id, &member).await.unwrap_err();
        assert_eq!(err.error_code(), "PROJECT_ACCESS_DENIED");

        // But the owner can
        let updated = fx
            .service
            .update(project.id, params("Apollo 2"), &owner)
            .await
            .unwrap();
        assert_eq!(updated.name, "Apollo 2");
    }

    #[tokio::test]
    async fn test_add_member_requires_owner_or_admin() {
        let fx = Fixture::new();
        let owner = fx.user("owner@x.com", Role::User).await;
        let member = fx.user("member@x.com", Role::User).await;
        let target = fx.user("target@x.com", Role::User).await;
        let admin = fx.user("admin@x.com", Role::Admin).await;

        let project = fx.service.create(params("Apollo"), &owner).await.unwrap();
        fx.service
            .add_member(project.id, MemberRef::Id(member.id), &owner)
            .await
            .unwrap();

        // Plain member cannot add
        let err = fx
            .service
            .add_member(project.id, MemberRef::Id(target.id), &member)
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "PROJECT_ACCESS_DENIED");

        // Admin can, even as a non-member
        let added = fx
            .service
            .add_member(project.id, MemberRef::Email("Target@X.com".into()), &admin)
            .await
            .unwrap();
        assert_eq!(added.id, target.id);

        // Adding twice fails validation
        let err = fx
            .service
            .add_member(project.id, MemberRef::Id(target.id), &owner)
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_owner_can_never_be_removed() {
        let fx = Fixture::new();
        let owner = fx.user("owner@x.com", Role::User).await;
        let admin = fx.user("admin@x.com", Role::Admin).await;

        let project = fx.service.create(params("Apollo"), &owner).await.unwrap();

        for actor in [&owner, &admin] {
            let err = fx
                .service
                .remove_member(project.id, owner.id, actor)
                .await
                .unwrap_err();
            assert_eq!(err.error_code(), "PROJECT_ACCESS_DENIED");
        }

        let project = fx.service.get(project.id, &owner).await.unwrap();
        assert!(project.is_member(owner.id));
    }

    #[tokio::test]
    async fn test_remove_member() {
        let fx = Fixture::new();
        let owner = fx.user("owner@x.com", Role::User).await;
        let member = fx.user("member@x.com", Role::User).await;

        let project = fx.service.create(params("Apollo"), &owner).await.unwrap();
        fx.service
            .add_member(project.id, MemberRef::Id(member.id), &owner)
            .await
            .unwrap();

        // Non-owner cannot remove anyone, not even themselves
        let err = fx
            .service
            .remove_member(project.id, member.id, &member)
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "PROJECT_ACCESS_DENIED");

        fx.service
            .remove_member(project.id, member.id, &owner)
            .await
            .unwrap();
        let project = fx.service.get(project.id, &owner).await.unwrap();
        assert!(!project.is_member(member.id));
    }

    #[tokio::test]
    async fn test_members_listing() {
        let fx = Fixture::new();
        let owner = fx.user("owner@x.com", Role::User).await;
        let member = fx.user("member@x.com", Role::User).await;

        let project = fx.service.create(params("Apollo"), &owner).await.unwrap();
        fx.service
            .add_member(project.id, MemberRef::Id(member.id), &owner)
            .await
            .unwrap();

        let members = fx.service.members(project.id, &member).await.unwrap();
        let ids: Vec<_> = members.iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![owner.id, member.id]);
    }

    #[tokio::test]
    async fn test_stats() {
        let fx = Fixture::new();
        let owner = fx.user("owner@x.com", Role::User).await;
        let project = fx.service.create(params("Apollo"), &owner).await.unwrap();

        for (title, status) in [("a", TaskStatus::Done), ("b", TaskStatus::Todo)] {
            fx.tasks
                .insert(NewTask {
                    title: title.into(),
                    description: None,
                    status,
                    priority: TaskPriority::Medium,
                    deadline: None,
                    estimated_hours: None,
                    project_id: project.id,
                    assigned_to: None,
                    created_by: owner.id,
                })
                .await
                .unwrap();
        }

        let stats = fx.service.stats(&owner).await.unwrap();
        assert_eq!(stats.total_projects, 1);
        assert_eq!(stats.owned_projects, 1);
        assert_eq!(stats.total_tasks, 2);
        assert_eq!(stats.completed_tasks, 1);
        assert!((stats.completion_percentage() - 50.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_search_scoped_to_membership() {
        let fx = Fixture::new();
        let owner = fx.user("owner@x.com", Role::User).await;
        let outsider = fx.user("outsider@x.com", Role::User).await;

        fx.service.create(params("Apollo"), &owner).await.unwrap();
        fx.service.create(params("Gemini"), &owner).await.unwrap();

        let found = fx.service.search("apo", &owner).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Apollo");

        let found = fx.service.search("apo", &outsider).await.unwrap();
        assert!(found.is_empty());
    }
}
