//! # pm-services
//!
//! Business services. Each operation validates input, consults the
//! authorization rules against a snapshot of the resource, then mutates
//! state through the storage traits. All failures surface as
//! `Result<_, PmError>` and are translated to responses once, at the API
//! boundary.

pub mod auth;
pub mod memory;
pub mod projects;
pub mod store;
pub mod tasks;

pub use auth::{AuthService, RegisterParams};
pub use memory::{InMemoryProjectStore, InMemoryTaskStore, InMemoryUserStore};
pub use projects::{MemberRef, ProjectParams, ProjectService, ProjectStats};
pub use store::{
    NewProject, NewTask, NewUser, ProfileUpdate, ProjectStore, ProjectUpdate, TaskCounts,
    TaskStore, TaskUpdate, UserStore,
};
pub use tasks::{TaskParams, TaskService, TaskUpdateParams};
