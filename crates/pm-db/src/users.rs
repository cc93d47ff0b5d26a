//! User store over Postgres
//!
//! Table: users. Emails are compared case-insensitively via LOWER();
//! deactivation flips is_active, the row is never deleted.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pm_auth::IdentityLookup;
use pm_core::{Id, PmError, PmResult};
use pm_models::{Role, User};
use pm_services::{NewUser, ProfileUpdate, UserStore};
use sqlx::{FromRow, PgPool};

use crate::db_err;

#[derive(Debug, FromRow)]
struct UserRow {
    id: i64,
    first_name: String,
    last_name: String,
    email: String,
    password_hash: String,
    role: String,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRow {
    fn into_user(self) -> PmResult<User> {
        let role: Role = self
            .role
            .parse()
            .map_err(|e: String| PmError::Database(e))?;
        Ok(User {
            id: self.id,
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            password_hash: self.password_hash,
            role,
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const USER_COLUMNS: &str =
    "id, first_name, last_name, email, password_hash, role, is_active, created_at, updated_at";

pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn insert(&self, user: NewUser) -> PmResult<User> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            INSERT INTO users (first_name, last_name, email, password_hash, role, is_active)
            VALUES ($1, $2, $3, $4, $5, TRUE)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        row.into_user()
    }

    async fn find_by_id(&self, id: Id) -> PmResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.map(UserRow::into_user).transpose()
    }

    async fn find_active_by_email(&self, email: &str) -> PmResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1 AND is_active"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.map(UserRow::into_user).transpose()
    }

    async fn email_exists(&self, email: &str) -> PmResult<bool> {
        let exists: (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM users WHERE LOWER(email) = LOWER($1))")
                .bind(email)
                .fetch_one(&self.pool)
                .await
                .map_err(db_err)?;
        Ok(exists.0)
    }

    async fn update_profile(&self, id: Id, update: ProfileUpdate) -> PmResult<User> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            UPDATE users
            SET first_name = $2, last_name = $3, email = $4, updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&update.first_name)
        .bind(&update.last_name)
        .bind(&update.email)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.map(UserRow::into_user)
            .transpose()?
            .ok_or_else(|| PmError::not_found("user", "id", id))
    }

    async fn update_password_hash(&self, id: Id, password_hash: &str) -> PmResult<()> {
        let result =
            sqlx::query("UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .bind(password_hash)
                .execute(&self.pool)
                .await
                .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(PmError::not_found("user", "id", id));
        }
        Ok(())
    }

    async fn deactivate(&self, id: Id) -> PmResult<()> {
        let result =
            sqlx::query("UPDATE users SET is_active = FALSE, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(PmError::not_found("user", "id", id));
        }
        Ok(())
    }

    async fn list_active(&self) -> PmResult<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE is_active ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.into_iter().map(UserRow::into_user).collect()
    }

    async fn search_by_name(&self, term: &str) -> PmResult<Vec<User>> {
        let pattern = format!("%{}%", term);
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            SELECT {USER_COLUMNS} FROM users
            WHERE is_active AND (first_name || ' ' || last_name) ILIKE $1
            ORDER BY id
            "#
        ))
        .bind(pattern)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.into_iter().map(UserRow::into_user).collect()
    }

    async fn count_active(&self) -> PmResult<u64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE is_active")
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(count.0 as u64)
    }
}

#[async_trait]
impl IdentityLookup for PgUserStore {
    async fn find_active_by_email(&self, email: &str) -> Result<Option<User>, PmError> {
        UserStore::find_active_by_email(self, email).await
    }
}
