//! taskdesk-server library - admin task distribution service
//!
//! Admins sign up and log in, manage agents, and upload CSV/XLS/XLSX task
//! lists that are split across all registered agents.

use axum::http::{header, Method};
use axum::Router;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use taskdesk_common::config::ServerConfig;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod api;
pub mod error;
pub mod ingest;

use ingest::{DiskTempStorage, SqliteAgentStore, UploadOrchestrator};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// HS256 signing secret for admin tokens
    pub jwt_secret: Arc<str>,
    /// Upload job runner
    pub uploads: Arc<UploadOrchestrator>,
    /// Request body limit for `/api/upload`
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        jwt_secret: impl Into<Arc<str>>,
        uploads: UploadOrchestrator,
        max_upload_bytes: usize,
    ) -> Self {
        Self {
            db,
            jwt_secret: jwt_secret.into(),
            uploads: Arc::new(uploads),
            max_upload_bytes,
        }
    }

    /// Production wiring: SQLite agent store and on-disk temp storage
    pub fn from_config(db: SqlitePool, config: &ServerConfig) -> Self {
        let store = Arc::new(SqliteAgentStore::new(db.clone()));
        let storage = Arc::new(DiskTempStorage::new(&config.upload_dir));
        let uploads = UploadOrchestrator::new(store, storage)
            .with_timeout(Duration::from_secs(config.upload_timeout_secs));

        Self::new(db, config.jwt_secret.as_str(), uploads, config.max_upload_bytes)
    }
}

/// Build application router
///
/// `/health`, `/api/auth/signup` and `/api/auth/login` are public; every
/// other route requires an admin bearer token.
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;
    use axum::routing::{delete, get, post};

    // Protected routes (require admin token)
    let protected = Router::new()
        .route("/api/agents", get(api::list_agents).post(api::create_agent))
        .route(
            "/api/agents/:id",
            get(api::get_agent)
                .put(api::update_agent)
                .delete(api::delete_agent),
        )
        .route("/api/agents/:id/tasks", delete(api::clear_agent_tasks))
        .merge(api::upload_routes(state.max_upload_bytes))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            api::require_admin,
        ));

    // Public routes
    let public = Router::new()
        .route("/api/auth/signup", post(api::signup))
        .route("/api/auth/login", post(api::login))
        .merge(api::health_routes());

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .merge(protected)
        .merge(public)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
