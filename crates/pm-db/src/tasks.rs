//! Task store over Postgres

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use pm_core::{Id, PmError, PmResult};
use pm_models::{Task, TaskPriority, TaskStatus};
use pm_services::{NewTask, TaskCounts, TaskStore, TaskUpdate};
use sqlx::{FromRow, PgPool};

use crate::db_err;

#[derive(Debug, FromRow)]
struct TaskRow {
    id: i64,
    title: String,
    description: Option<String>,
    status: String,
    priority: String,
    deadline: Option<NaiveDate>,
    estimated_hours: Option<i32>,
    actual_hours: Option<i32>,
    project_id: i64,
    assigned_to: Option<i64>,
    created_by: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TaskRow {
    fn into_task(self) -> PmResult<Task> {
        let status: TaskStatus = self
            .status
            .parse()
            .map_err(|e: String| PmError::Database(e))?;
        let priority: TaskPriority = self
            .priority
            .parse()
            .map_err(|e: String| PmError::Database(e))?;
        Ok(Task {
            id: self.id,
            title: self.title,
            description: self.description,
            status,
            priority,
            deadline: self.deadline,
            estimated_hours: self.estimated_hours,
            actual_hours: self.actual_hours,
            project_id: self.project_id,
            assigned_to: self.assigned_to,
            created_by: self.created_by,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const TASK_COLUMNS: &str = "id, title, description, status, priority, deadline, \
     estimated_hours, actual_hours, project_id, assigned_to, created_by, created_at, updated_at";

pub struct PgTaskStore {
    pool: PgPool,
}

impl PgTaskStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TaskStore for PgTaskStore {
    async fn insert(&self, task: NewTask) -> PmResult<Task> {
        let row = sqlx::query_as::<_, TaskRow>(&format!(
            r#"
            INSERT INTO tasks (title, description, status, priority, deadline,
                               estimated_hours, project_id, assigned_to, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {TASK_COLUMNS}
            "#
        ))
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.status.as_str())
        .bind(task.priority.as_str())
        .bind(task.deadline)
        .bind(task.estimated_hours)
        .bind(task.project_id)
        .bind(task.assigned_to)
        .bind(task.created_by)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        row.into_task()
    }

    async fn find_by_id(&self, id: Id) -> PmResult<Option<Task>> {
        let row = sqlx::query_as::<_, TaskRow>(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.map(TaskRow::into_task).transpose()
    }

    async fn list_by_project(&self, project_id: Id) -> PmResult<Vec<Task>> {
        let rows = sqlx::query_as::<_, TaskRow>(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE project_id = $1 ORDER BY id"
        ))
        .bind(project_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.into_iter().map(TaskRow::into_task).collect()
    }

    async fn update(&self, id: Id, update: TaskUpdate) -> PmResult<Task> {
        let row = sqlx::query_as::<_, TaskRow>(&format!(
            r#"
            UPDATE tasks
            SET title = $2, description = $3, status = $4, priority = $5, deadline = $6,
                estimated_hours = $7, actual_hours = $8, assigned_to = $9, updated_at = NOW()
            WHERE id = $1
            RETURNING {TASK_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&update.title)
        .bind(&update.description)
        .bind(update.status.as_str())
        .bind(update.priority.as_str())
        .bind(update.deadline)
        .bind(update.estimated_hours)
        .bind(update.actual_hours)
        .bind(update.assigned_to)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?
        .ok_or_else(|| PmError::not_found("task", "id", id))?;

        row.into_task()
    }

    async fn delete(&self, id: Id) -> PmResult<()> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(PmError::not_found("task", "id", id));
        }
        Ok(())
    }

    async fn count_by_project(&self, project_id: Id) -> PmResult<TaskCounts> {
        let (total, done): (i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*), COUNT(*) FILTER (WHERE status = 'DONE')
            FROM tasks WHERE project_id = $1
            "#,
        )
        .bind(project_id)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(TaskCounts {
            total: total as u64,
            done: done as u64,
        })
    }
}
