//! # pm-core
//!
//! Shared foundation for PM-RS: the error taxonomy, validation error
//! collection, configuration loading and common type aliases.

pub mod config;
pub mod error;
pub mod types;

pub use config::AppConfig;
pub use error::{PmError, PmResult, ValidationErrors};
pub use types::Id;
