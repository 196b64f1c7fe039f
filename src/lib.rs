pub mod api;
pub mod app_state;
pub mod config;
pub mod error;
pub mod fetch;
pub mod sync;
pub mod toolchain;

use axum::Router;
use axum::extract::Extension;
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tower_http::cors::Any;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

//
// Re-export
//
pub use api::{
    ExtractFramesResponse, FrameData, FrameExtractRequest, MergeRequest, StitchRequest,
    extract_frames, health, log_request_errors, merge, stitch,
};
pub use app_state::AppState;
pub use config::Config;
pub use error::ServiceError;
pub use sync::{InvalidDurationError, SyncPlan, SyncRequest, compute_sync_plan};
pub use toolchain::{Toolchain, ToolchainError};

pub async fn run(config: Config) {
    let state = AppState::new(&config)
        .await
        .expect("Failed to create app state");

    // CORS layer
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/merge", post(merge))
        .route("/stitch", post(stitch))
        .route("/extract-frames", post(extract_frames))
        .route("/health", get(health))
        .layer(axum::middleware::from_fn(log_request_errors))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(Extension(state));

    let addr = format!("0.0.0.0:{}", config.listen_on_port);
    info!("Listening on {addr}");
    let listener = TcpListener::bind(&addr)
        .await
        .expect("Failed to bind listener");

    axum::serve(listener, app).await.expect("Server error");
}
