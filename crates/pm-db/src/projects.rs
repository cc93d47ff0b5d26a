//! Project store over Postgres
//!
//! Tables: projects and project_members. Membership writes run in a
//! transaction that locks the project row first, so the ownership check
//! and the member mutation see the same snapshot. The owner row in
//! project_members is created at insert and guarded against deletion in
//! SQL as well as in the service layer.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use pm_core::{Id, PmError, PmResult};
use pm_models::Project;
use pm_services::{NewProject, ProjectStore, ProjectUpdate};
use sqlx::{FromRow, PgPool, Postgres, Transaction};

use crate::db_err;

#[derive(Debug, FromRow)]
struct ProjectRow {
    id: i64,
    name: String,
    description: Option<String>,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    owner_id: i64,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ProjectRow {
    fn into_project(self, member_ids: HashSet<Id>) -> Project {
        Project {
            id: self.id,
            name: self.name,
            description: self.description,
            start_date: self.start_date,
            end_date: self.end_date,
            owner_id: self.owner_id,
            is_active: self.is_active,
            member_ids,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

const PROJECT_COLUMNS: &str =
    "id, name, description, start_date, end_date, owner_id, is_active, created_at, updated_at";

pub struct PgProjectStore {
    pool: PgPool,
}

impl PgProjectStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn members_of(&self, project_id: Id) -> PmResult<HashSet<Id>> {
        let rows: Vec<(i64,)> =
            sqlx::query_as("SELECT user_id FROM project_members WHERE project_id = $1")
                .bind(project_id)
                .fetch_all(&self.pool)
                .await
                .map_err(db_err)?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Attach member sets to a batch of rows with one membership query
    async fn hydrate(&self, rows: Vec<ProjectRow>) -> PmResult<Vec<Project>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        let memberships: Vec<(i64, i64)> = sqlx::query_as(
            "SELECT project_id, user_id FROM project_members WHERE project_id = ANY($1)",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        let mut by_project: std::collections::HashMap<i64, HashSet<Id>> =
            std::collections::HashMap::new();
        for (project_id, user_id) in memberships {
            by_project.entry(project_id).or_default().insert(user_id);
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let members = by_project.remove(&row.id).unwrap_or_default();
                row.into_project(members)
            })
            .collect())
    }

    /// Lock the project row so the membership check and the write that
    /// follows cannot interleave with a concurrent mutation
    async fn lock_project(
        tx: &mut Transaction<'_, Postgres>,
        project_id: Id,
    ) -> PmResult<ProjectRow> {
        sqlx::query_as::<_, ProjectRow>(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects WHERE id = $1 AND is_active FOR UPDATE"
        ))
        .bind(project_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(db_err)?
        .ok_or_else(|| PmError::not_found("project", "id", project_id))
    }
}

#[async_trait]
impl ProjectStore for PgProjectStore {
    async fn insert(&self, project: NewProject) -> PmResult<Project> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let row = sqlx::query_as::<_, ProjectRow>(&format!(
            r#"
            INSERT INTO projects (name, description, start_date, end_date, owner_id, is_active)
            VALUES ($1, $2, $3, $4, $5, TRUE)
            RETURNING {PROJECT_COLUMNS}
            "#
        ))
        .bind(&project.name)
        .bind(&project.description)
        .bind(project.start_date)
        .bind(project.end_date)
        .bind(project.owner_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_err)?;

        // Owner joins the member set in the same transaction
        sqlx::query("INSERT INTO project_members (project_id, user_id) VALUES ($1, $2)")
            .bind(row.id)
            .bind(project.owner_id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;

        let members = HashSet::from([project.owner_id]);
        Ok(row.into_project(members))
    }

    async fn find_by_id(&self, id: Id) -> PmResult<Option<Project>> {
        let row = sqlx::query_as::<_, ProjectRow>(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects WHERE id = $1 AND is_active"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        match row {
            Some(row) => {
                let members = self.members_of(row.id).await?;
                Ok(Some(row.into_project(members)))
            }
            None => Ok(None),
        }
    }

    async fn list_by_member(&self, user_id: Id) -> PmResult<Vec<Project>> {
        let rows = sqlx::query_as::<_, ProjectRow>(&format!(
            r#"
            SELECT p.{}
            FROM projects p
            JOIN project_members m ON m.project_id = p.id
            WHERE m.user_id = $1 AND p.is_active
            ORDER BY p.id
            "#,
            PROJECT_COLUMNS.replace(", ", ", p.")
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        self.hydrate(rows).await
    }

    async fn list_by_owner(&self, user_id: Id) -> PmResult<Vec<Project>> {
        let rows = sqlx::query_as::<_, ProjectRow>(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects WHERE owner_id = $1 AND is_active ORDER BY id"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        self.hydrate(rows).await
    }

    async fn update(&self, id: Id, update: ProjectUpdate) -> PmResult<Project> {
        let row = sqlx::query_as::<_, ProjectRow>(&format!(
            r#"
            UPDATE projects
            SET name = $2, description = $3, start_date = $4, end_date = $5, updated_at = NOW()
            WHERE id = $1 AND is_active
            RETURNING {PROJECT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&update.name)
        .bind(&update.description)
        .bind(update.start_date)
        .bind(update.end_date)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?
        .ok_or_else(|| PmError::not_found("project", "id", id))?;

        let members = self.members_of(row.id).await?;
        Ok(row.into_project(members))
    }

    async fn deactivate(&self, id: Id) -> PmResult<()> {
        let result = sqlx::query(
            "UPDATE projects SET is_active = FALSE, updated_at = NOW() WHERE id = $1 AND is_active",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(PmError::not_found("project", "id", id));
        }
        Ok(())
    }

    async fn add_member(&self, project_id: Id, user_id: Id) -> PmResult<()> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        Self::lock_project(&mut tx, project_id).await?;

        sqlx::query(
            r#"
            INSERT INTO project_members (project_id, user_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(project_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        tx.commit().await.map_err(db_err)
    }

    async fn remove_member(&self, project_id: Id, user_id: Id) -> PmResult<()> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let project = Self::lock_project(&mut tx, project_id).await?;

        if project.owner_id == user_id {
            return Err(PmError::access_denied(
                "Cannot remove project owner from the project",
            ));
        }

        // Owner guard repeated in SQL in case callers race past the check
        sqlx::query(
            r#"
            DELETE FROM project_members m
            USING projects p
            WHERE m.project_id = $1 AND m.user_id = $2
              AND p.id = m.project_id AND p.owner_id <> m.user_id
            "#,
        )
        .bind(project_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        tx.commit().await.map_err(db_err)
    }

    async fn search_by_member(&self, user_id: Id, term: &str) -> PmResult<Vec<Project>> {
        let pattern = format!("%{}%", term);
        let rows = sqlx::query_as::<_, ProjectRow>(&format!(
            r#"
            SELECT p.{}
            FROM projects p
            JOIN project_members m ON m.project_id = p.id
            WHERE m.user_id = $1 AND p.is_active AND p.name ILIKE $2
            ORDER BY p.id
            "#,
            PROJECT_COLUMNS.replace(", ", ", p.")
        ))
        .bind(user_id)
        .bind(pattern)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        self.hydrate(rows).await
    }

    async fn recent_for_member(&self, user_id: Id, limit: usize) -> PmResult<Vec<Project>> {
        let rows = sqlx::query_as::<_, ProjectRow>(&format!(
            r#"
            SELECT p.{}
            FROM projects p
            JOIN project_members m ON m.project_id = p.id
            WHERE m.user_id = $1 AND p.is_active
            ORDER BY p.created_at DESC
            LIMIT $2
            "#,
            PROJECT_COLUMNS.replace(", ", ", p.")
        ))
        .bind(user_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        self.hydrate(rows).await
    }
}
