//! CollabCanvas reference server
//!
//! Serves the canvas REST API under `/canvas/api/canvas/{id}` and a
//! WebSocket relay at `/ws` that fans canvas updates out to room peers.
//!
//! ## Relay protocol
//!
//! Messages are JSON tagged by `type`:
//! ```json
//! { "type": "join", "room": "canvas_1" }
//! { "type": "canvas_update", "update": { "type": "full", "state": { "elements": [] } } }
//! { "type": "presence", "cursor": { "x": 100, "y": 200 }, "selection": [] }
//! ```

mod api;
mod config;
mod relay;
mod state;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use config::ServerConfig;
use state::{AppState, SharedState};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

pub fn router(state: SharedState) -> Router {
    let canvas_api = Router::new()
        .route("/{id}/load", get(api::load_canvas))
        .route("/{id}/save", post(api::save_canvas))
        .route(
            "/{id}/upload",
            post(api::upload_file).layer(DefaultBodyLimit::max(api::MAX_UPLOAD_BYTES)),
        )
        .route("/{id}/files", get(api::list_files))
        .route(
            "/{id}/chat/messages",
            get(api::list_messages).post(api::post_message),
        );

    let uploads = ServeDir::new(&state.config.upload_dir);

    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/ws", get(relay::ws_handler))
        .nest("/canvas/api/canvas", canvas_api)
        .nest_service("/static/uploads/canvas", uploads)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "collabcanvas_server=info,tower_http=info".into()),
        )
        .init();

    let config = ServerConfig::from_env()?;
    let addr = config.addr;
    info!(upload_dir = %config.upload_dir.display(), "storing uploads");
    let app = router(AppState::shared(config));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("CollabCanvas server listening on {}", addr);
    info!("WebSocket endpoint: ws://{}/ws", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

/// Index page
async fn index() -> &'static str {
    "CollabCanvas Server - REST under /canvas/api/canvas, relay at /ws"
}

/// Health check
async fn health() -> &'static str {
    "ok"
}
