//! # pm-auth
//!
//! Authentication and authorization core:
//!
//! - JWT token codec (issue, decode, expiry check)
//! - Password hashing over argon2
//! - The per-request authentication filter
//! - Pure authorization predicates over (actor, project) pairs

pub mod identity;
pub mod jwt;
pub mod middleware;
pub mod password;
pub mod policy;

pub use identity::CurrentUser;
pub use jwt::{extract_bearer_token, ClaimSet, Claims, JwtCodec, TokenError};
pub use middleware::{authenticate, is_public_path, AuthState, IdentityLookup};
pub use password::{hash_password, verify_password};
