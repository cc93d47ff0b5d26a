//! PM-RS server binary
//!
//! Loads configuration, wires storage into the services and serves the API.
//! Falls back to in-memory storage when the database is unreachable, which
//! keeps local development working without Postgres.

use std::sync::Arc;

use pm_api::{error::set_expose_internal_errors, router, AppState};
use pm_auth::{AuthState, IdentityLookup, JwtCodec};
use pm_core::config::AppConfig;
use pm_db::{Database, PgProjectStore, PgTaskStore, PgUserStore};
use pm_services::{
    AuthService, InMemoryProjectStore, InMemoryTaskStore, InMemoryUserStore, ProjectService,
    ProjectStore, TaskService, TaskStore, UserStore,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

struct Stores {
    users: Arc<dyn UserStore>,
    projects: Arc<dyn ProjectStore>,
    tasks: Arc<dyn TaskStore>,
    identities: Arc<dyn IdentityLookup>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;
    set_expose_internal_errors(config.server.expose_internal_errors);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        host = %config.server.host,
        port = config.server.port,
        "starting PM-RS"
    );

    // Refuses keys too short for HMAC-SHA512
    let codec = Arc::new(JwtCodec::new(&config.auth.jwt_secret)?);

    let stores = match Database::connect(&config.database).await {
        Ok(db) => {
            info!("connected to database");
            let users = Arc::new(PgUserStore::new(db.pool().clone()));
            Stores {
                users: users.clone(),
                projects: Arc::new(PgProjectStore::new(db.pool().clone())),
                tasks: Arc::new(PgTaskStore::new(db.pool().clone())),
                identities: users,
            }
        }
        Err(e) => {
            warn!(error = %e, "database unreachable, using in-memory storage");
            let users = Arc::new(InMemoryUserStore::new());
            Stores {
                users: users.clone(),
                projects: Arc::new(InMemoryProjectStore::new()),
                tasks: Arc::new(InMemoryTaskStore::new()),
                identities: users,
            }
        }
    };

    let state = AppState {
        auth: Arc::new(AuthService::new(
            stores.users.clone(),
            codec.clone(),
            config.auth.token_ttl_secs as i64,
        )),
        projects: Arc::new(ProjectService::new(
            stores.projects.clone(),
            stores.users.clone(),
            stores.tasks.clone(),
        )),
        tasks: Arc::new(TaskService::new(stores.tasks, stores.projects)),
    };
    let auth_state = AuthState::new(codec, stores.identities);

    let app = router(state, auth_state);

    let addr = config.server_addr();
    info!("listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server shutdown complete");
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,pm_server=debug,pm_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("received SIGTERM, initiating graceful shutdown");
        }
    }
}
