//! Request authentication filter
//!
//! Runs once per request ahead of all authenticated routes. Extracts a
//! bearer token, decodes it, checks expiry and re-looks-up the identity to
//! confirm it is still active, then attaches a [`CurrentUser`] to the
//! request extensions. Every failure is swallowed here: the request always
//! continues to the next stage unauthenticated, and rejection happens where
//! a route actually requires an identity.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use pm_core::PmError;
use pm_models::User;
use tracing::{debug, warn};

use crate::identity::CurrentUser;
use crate::jwt::{extract_bearer_token, JwtCodec};

/// Path prefixes that bypass the filter entirely. These must never require
/// a prior token.
pub const PUBLIC_PREFIXES: &[&str] = &["/auth", "/test", "/data-test", "/health"];

/// Whether a request path is on the public allow-list
pub fn is_public_path(path: &str) -> bool {
    PUBLIC_PREFIXES.iter().any(|prefix| {
        path == *prefix || path.starts_with(&format!("{}/", prefix))
    })
}

/// Narrow interface to the credential store: the filter only ever needs an
/// active identity by normalized email. The per-decode re-lookup is what
/// makes deactivation act as revocation for otherwise untracked tokens.
#[async_trait]
pub trait IdentityLookup: Send + Sync {
    async fn find_active_by_email(&self, email: &str) -> Result<Option<User>, PmError>;
}

/// State shared by the filter across requests
#[derive(Clone)]
pub struct AuthState {
    pub codec: Arc<JwtCodec>,
    pub identities: Arc<dyn IdentityLookup>,
}

impl AuthState {
    pub fn new(codec: Arc<JwtCodec>, identities: Arc<dyn IdentityLookup>) -> Self {
        Self { codec, identities }
    }
}

/// The filter itself. Per request:
///
/// `NoContext -> (token absent | decode fails | expired | identity inactive)
///   -> Unauthenticated`; `NoContext -> (valid token, active identity) ->
/// Authenticated`. Terminal either way; the chain is never blocked here.
pub async fn authenticate(
    State(state): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Response {
    if is_public_path(request.uri().path()) {
        return next.run(request).await;
    }

    if request.extensions().get::<CurrentUser>().is_none() {
        if let Some(user) = resolve_identity(&state, request.headers()).await {
            request.extensions_mut().insert(CurrentUser::from_user(&user));
        }
    }

    next.run(request).await
}

/// Decode the bearer token and reconfirm the identity is still active.
/// Returns None on any failure; the reason is logged, never surfaced.
async fn resolve_identity(state: &AuthState, headers: &header::HeaderMap) -> Option<User> {
    let header_value = headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?;
    let token = extract_bearer_token(header_value)?;

    let claims = match state.codec.decode(token) {
        Ok(claims) => claims,
        Err(err) => {
            debug!(error = %err, "token decode failed, continuing unauthenticated");
            return None;
        }
    };

    if claims.is_expired() {
        debug!(subject = %claims.sub, "token expired, continuing unauthenticated");
        return None;
    }

    match state.identities.find_active_by_email(&claims.sub).await {
        Ok(Some(user)) => Some(user),
        Ok(None) => {
            debug!(subject = %claims.sub, "no active identity for token subject");
            None
        }
        Err(err) => {
            warn!(error = %err, "identity lookup failed during authentication");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, middleware, routing::get, Extension, Router};
    use chrono::Utc;
    use pm_models::Role;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tower::ServiceExt;

    use crate::jwt::ClaimSet;

    struct FakeIdentities {
        users: Mutex<HashMap<String, User>>,
    }

    impl FakeIdentities {
        fn with_user(user: User) -> Arc<Self> {
            Arc::new(Self {
                users: Mutex::new(HashMap::from([(user.email.clone(), user)])),
            })
        }
    }

    #[async_trait]
    impl IdentityLookup for FakeIdentities {
        async fn find_active_by_email(&self, email: &str) -> Result<Option<User>, PmError> {
            let users = self.users.lock().unwrap();
            Ok(users.get(email).filter(|u| u.is_active).cloned())
        }
    }

    fn user(email: &str, active: bool) -> User {
        User {
            id: 1,
            first_name: "Test".into(),
            last_name: "User".into(),
            email: email.into(),
            password_hash: String::new(),
            role: Role::User,
            is_active: active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn app(state: AuthState) -> Router {
        async fn whoami(identity: Option<Extension<CurrentUser>>) -> String {
            match identity {
                Some(Extension(user)) => user.email,
                None => "anonymous".into(),
            }
        }

        Router::new()
            .route("/projects", get(whoami))
            .route("/test/hello", get(whoami))
            .layer(middleware::from_fn_with_state(state, authenticate))
    }

    fn codec() -> Arc<JwtCodec> {
        Arc::new(JwtCodec::new(&"0123456789abcdef".repeat(4)).unwrap())
    }

    fn token(codec: &JwtCodec, email: &str, ttl: i64) -> String {
        codec
            .issue(
                email,
                ClaimSet {
                    user_id: 1,
                    role: "USER".into(),
                    full_name: "Test User".into(),
                    extra: HashMap::new(),
                },
                ttl,
            )
            .unwrap()
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn test_public_path_matching() {
        assert!(is_public_path("/auth/login"));
        assert!(is_public_path("/auth"));
        assert!(is_public_path("/test/hello"));
        assert!(is_public_path("/health"));
        assert!(!is_public_path("/authx"));
        assert!(!is_public_path("/projects"));
        assert!(!is_public_path("/users/1"));
    }

    #[tokio::test]
    async fn test_valid_token_attaches_identity() {
        let codec = codec();
        let state = AuthState::new(codec.clone(), FakeIdentities::with_user(user("a@x.com", true)));
        let token = token(&codec, "a@x.com", 3600);

        let response = app(state)
            .oneshot(
                axum::http::Request::builder()
                    .uri("/projects")
                    .header("Authorization", format!("Bearer {}", token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(body_string(response).await, "a@x.com");
    }

    #[tokio::test]
    async fn test_garbage_token_continues_unauthenticated() {
        let codec = codec();
        let state = AuthState::new(codec, FakeIdentities::with_user(user("a@x.com", true)));

        let response = app(state)
            .oneshot(
                axum::http::Request::builder()
                    .uri("/projects")
                    .header("Authorization", "Bearer garbage")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        // Filter swallows the failure; no identity is attached
        assert_eq!(body_string(response).await, "anonymous");
    }

    #[tokio::test]
    async fn test_garbage_token_on_public_path_succeeds() {
        let codec = codec();
        let state = AuthState::new(codec, FakeIdentities::with_user(user("a@x.com", true)));

        let response = app(state)
            .oneshot(
                axum::http::Request::builder()
                    .uri("/test/hello")
                    .header("Authorization", "Bearer garbage")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), axum::http::StatusCode::OK);
    }

    #[tokio::test]
    async fn test_expired_token_continues_unauthenticated() {
        let codec = codec();
        let state = AuthState::new(codec.clone(), FakeIdentities::with_user(user("a@x.com", true)));
        let token = token(&codec, "a@x.com", -60);

        let response = app(state)
            .oneshot(
                axum::http::Request::builder()
                    .uri("/projects")
                    .header("Authorization", format!("Bearer {}", token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(body_string(response).await, "anonymous");
    }

    #[tokio::test]
    async fn test_deactivated_identity_is_revoked() {
        let codec = codec();
        let state = AuthState::new(
            codec.clone(),
            FakeIdentities::with_user(user("a@x.com", false)),
        );
        // Well-signed, unexpired token for a deactivated account
        let token = token(&codec, "a@x.com", 3600);

        let response = app(state)
            .oneshot(
                axum::http::Request::builder()
                    .uri("/projects")
                    .header("Authorization", format!("Bearer {}", token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(body_string(response).await, "anonymous");
    }

    #[tokio::test]
    async fn test_missing_header_continues_unauthenticated() {
        let codec = codec();
        let state = AuthState::new(codec, FakeIdentities::with_user(user("a@x.com", true)));

        let response = app(state)
            .oneshot(
                axum::http::Request::builder()
                    .uri("/projects")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(body_string(response).await, "anonymous");
    }
}
