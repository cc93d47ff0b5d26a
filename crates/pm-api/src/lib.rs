//! # pm-api
//!
//! HTTP boundary: request DTOs, handlers, routing and the single place
//! where `PmError` values become JSON error responses.

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod routes;

pub use error::{ApiError, ApiResult};
pub use extractors::{AppState, AuthenticatedUser};
pub use routes::router;
