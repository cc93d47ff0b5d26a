//! # pm-db
//!
//! Postgres implementations of the storage traits, plus connection pool
//! management. Schema lives in `migrations/`.

pub mod pool;
pub mod projects;
pub mod tasks;
pub mod users;

pub use pool::Database;
pub use projects::PgProjectStore;
pub use tasks::PgTaskStore;
pub use users::PgUserStore;

use pm_core::PmError;

/// Map a driver error into the core taxonomy
pub(crate) fn db_err(err: sqlx::Error) -> PmError {
    PmError::Database(err.to_string())
}
