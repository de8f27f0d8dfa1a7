//! Taskboard Backend
//!
//! REST backend for projects, role-based memberships, notes, tasks and subtasks,
//! persisted in SQLite.

mod api;
mod auth;
mod config;
mod db;
mod errors;
mod models;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::Config;
use db::Repository;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub config: Arc<Config>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Taskboard Backend");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Bind address: {}", config.bind_addr);

    // Warn if PSK is not configured
    if config.api_psk.is_none() {
        tracing::warn!("No API PSK configured (TASKBOARD_API_PSK). Authentication is disabled!");
    }

    // Initialize database
    let pool = db::init_database(&config.db_path).await?;
    let repo = Arc::new(Repository::new(pool));

    let state = AppState {
        repo,
        config: Arc::new(config.clone()),
    };

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Clone PSK for the auth layer
    let psk = state.config.api_psk.clone();

    // API routes
    let api_routes = Router::new()
        // Users
        .route("/users", post(api::create_user))
        .route("/users/me", get(api::get_current_user))
        // Projects
        .route("/projects", get(api::list_projects).post(api::create_project))
        .route(
            "/projects/{projectId}",
            get(api::get_project)
                .put(api::update_project)
                .delete(api::delete_project),
        )
        // Members
        .route(
            "/projects/{projectId}/member",
            get(api::list_members).post(api::add_member),
        )
        .route(
            "/projects/{projectId}/member/{userId}",
            put(api::update_member_role).delete(api::remove_member),
        )
        // Notes
        .route(
            "/projects/{projectId}/notes",
            get(api::list_notes).post(api::create_note),
        )
        .route(
            "/projects/{projectId}/notes/{noteId}",
            get(api::get_note)
                .put(api::update_note)
                .delete(api::delete_note),
        )
        // Tasks
        .route(
            "/projects/{projectId}/tasks",
            get(api::list_tasks).post(api::create_task),
        )
        .route(
            "/projects/{projectId}/tasks/{taskId}",
            get(api::get_task)
                .put(api::update_task)
                .delete(api::delete_task),
        )
        // Subtasks
        .route(
            "/projects/{projectId}/tasks/{taskId}/subtasks",
            post(api::create_subtask),
        )
        .route(
            "/projects/{projectId}/subtasks/{subTaskId}",
            put(api::update_subtask).delete(api::delete_subtask),
        )
        // Apply PSK auth middleware
        .layer(middleware::from_fn(move |req, next| {
            auth::psk_auth_layer(psk.clone(), req, next)
        }));

    // Health check (no auth required)
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}
