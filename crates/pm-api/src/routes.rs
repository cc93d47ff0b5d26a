//! Router assembly
//!
//! The authentication filter is layered over the whole router; routes under
//! the public prefixes bypass it inside the filter itself, so the allow-list
//! lives in exactly one place.

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use pm_auth::AuthState;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::extractors::AppState;
use crate::handlers::{auth, projects, tasks, test, users};

/// Build the full application router
pub fn router(state: AppState, auth_state: AuthState) -> Router {
    Router::new()
        .route("/health", get(test::health))
        .nest("/auth", auth_router())
        .nest("/test", test_router())
        .nest("/users", users_router())
        .nest("/projects", projects_router())
        .nest("/tasks", tasks_router())
        .layer(middleware::from_fn_with_state(auth_state, pm_auth::authenticate))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn auth_router() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/health", get(auth::health))
}

fn test_router() -> Router<AppState> {
    Router::new()
        .route("/hello", get(test::hello))
        .route("/echo", post(test::echo))
        .route("/health", get(test::health))
}

fn users_router() -> Router<AppState> {
    Router::new()
        .route("/", get(users::list))
        .route("/profile", get(users::profile))
        .route("/profile", put(users::update_profile))
        .route("/profile", delete(users::deactivate))
        .route("/change-password", post(users::change_password))
        .route("/search", get(users::search))
        .route("/stats", get(users::stats))
        .route("/check-email", get(users::check_email))
}

fn projects_router() -> Router<AppState> {
    Router::new()
        .route("/", post(projects::create))
        .route("/", get(projects::list))
        .route("/owned", get(projects::owned))
        .route("/search", get(projects::search))
        .route("/recent", get(projects::recent))
        .route("/stats", get(projects::stats))
        .route("/:id", get(projects::get))
        .route("/:id", put(projects::update))
        .route("/:id", delete(projects::delete))
        .route("/:id/members", get(projects::members))
        .route("/:id/members", post(projects::add_member))
        .route("/:id/members/:user_id", delete(projects::remove_member))
        .route("/:id/tasks", post(tasks::create))
        .route("/:id/tasks", get(tasks::list_for_project))
}

fn tasks_router() -> Router<AppState> {
    Router::new()
        .route("/:id", get(tasks::get))
        .route("/:id", put(tasks::update))
        .route("/:id", delete(tasks::delete))
}
