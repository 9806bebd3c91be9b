pub mod error;
pub mod liveness;
pub mod process;
pub mod routes;
pub mod state;

use agelum_core::settings::SettingsStore;
use axum::routing::{get, post};
use axum::Router;
use std::path::PathBuf;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use state::AppState;

/// Build the axum Router with all API routes and middleware.
/// Used by `serve()` and available for integration testing.
pub fn build_router(settings: SettingsStore, default_root: Option<PathBuf>) -> Router {
    router(AppState::new(settings, default_root))
}

/// Router over an existing state, for callers that customise it.
pub fn router(app_state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Events (SSE)
        .route("/api/events", get(routes::events::sse_events))
        // Repositories
        .route(
            "/api/repositories",
            get(routes::repositories::list_repositories)
                .post(routes::repositories::add_repository)
                .delete(routes::repositories::remove_repository),
        )
        // Settings
        .route(
            "/api/settings",
            get(routes::settings::get_settings)
                .post(routes::settings::replace_settings)
                .patch(routes::settings::patch_settings)
                .delete(routes::settings::reset_settings),
        )
        .route(
            "/api/project/config",
            get(routes::settings::get_project_config).post(routes::settings::save_project_config),
        )
        // Work items
        .route(
            "/api/tasks",
            get(routes::items::list_tasks).post(routes::items::task_action),
        )
        .route(
            "/api/epics",
            get(routes::items::list_epics).post(routes::items::epic_action),
        )
        .route(
            "/api/ideas",
            get(routes::items::list_ideas).post(routes::items::idea_action),
        )
        .route("/api/board", get(routes::board::get_board))
        // Files and documents
        .route(
            "/api/file",
            get(routes::files::read_file)
                .put(routes::files::write_file)
                .delete(routes::files::delete_file),
        )
        .route("/api/file/rename", post(routes::files::rename_file))
        .route("/api/files", get(routes::files::file_tree))
        .route("/api/docs", get(routes::files::list_docs))
        .route("/api/migrate", post(routes::migrate::migrate))
        // Preview app
        .route(
            "/api/app-status",
            get(routes::app::get_status).post(routes::app::app_action),
        )
        .route("/api/app-logs", get(routes::app::get_logs))
        .route("/api/app-logs/input", post(routes::app::send_input))
        // Browser tests
        .route(
            "/api/tests",
            get(routes::tests::list_tests).post(routes::tests::create_test),
        )
        .route(
            "/api/tests/groups",
            get(routes::tests::list_groups).post(routes::tests::create_group),
        )
        .route(
            "/api/tests/record/execute",
            post(routes::record::execute),
        )
        .route(
            "/api/tests/record/ai",
            get(routes::record::backends).post(routes::record::recommend),
        )
        .route(
            "/api/tests/record/backends",
            get(routes::record::backends),
        )
        .route(
            "/api/tests/record/capture",
            post(routes::record::capture),
        )
        .route(
            "/api/tests/artifacts/{*path}",
            get(routes::tests::get_artifact),
        )
        .route(
            "/api/tests/{id}",
            get(routes::tests::get_test)
                .put(routes::tests::update_test)
                .delete(routes::tests::delete_test),
        )
        .route(
            "/api/tests/{id}/steps",
            get(routes::tests::list_steps).post(routes::tests::add_step),
        )
        .route("/api/tests/{id}/run", post(routes::tests::run_test))
        .route("/api/tests/{id}/finish", post(routes::tests::finish_test))
        .route(
            "/api/tests/{id}/executions",
            get(routes::tests::list_executions),
        )
        // Annotations and bug reports
        .route(
            "/api/annotations/render",
            post(routes::annotations::render),
        )
        .route("/api/reports", post(routes::annotations::create_report))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

/// Interface the server binds unless told otherwise. The API reads and writes
/// project files and runs commands, so it stays off the network by default.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Start the Agelum API server on `host:port`.
pub async fn serve(
    settings: SettingsStore,
    default_root: Option<PathBuf>,
    host: &str,
    port: u16,
    open_browser: bool,
) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind((host, port)).await?;
    serve_on(settings, default_root, listener, open_browser).await
}

/// Start the server on a pre-bound listener.
///
/// The caller can read the actual port before starting, which matters when
/// binding port 0 lets the OS pick a free one.
pub async fn serve_on(
    settings: SettingsStore,
    default_root: Option<PathBuf>,
    listener: tokio::net::TcpListener,
    open_browser: bool,
) -> anyhow::Result<()> {
    let actual_port = listener.local_addr()?.port();
    let app = build_router(settings, default_root);

    tracing::info!("Agelum server listening on http://localhost:{actual_port}");

    if open_browser {
        let url = format!("http://localhost:{actual_port}/api/repositories");
        if let Err(e) = open::that(&url) {
            tracing::warn!(error = %e, "could not open browser");
        }
    }

    axum::serve(listener, app).await?;
    Ok(())
}
