use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderName, Method},
    routing::{get, post},
    Router,
};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use super::handlers;
use crate::config::WavFormat;
use crate::tts::ModelHandle;
use crate::voices::VoiceCatalog;

pub struct AppState {
    pub catalog: VoiceCatalog,
    pub model: ModelHandle,
    pub wav_format: WavFormat,
}

pub struct RouterOptions {
    pub static_dir: Option<PathBuf>,
    pub max_upload_bytes: usize,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self {
            static_dir: None,
            max_upload_bytes: 25 * 1024 * 1024,
        }
    }
}

pub fn create_router(state: Arc<AppState>, options: RouterOptions) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .expose_headers([
            header::CONTENT_DISPOSITION,
            HeaderName::from_static(handlers::X_SAMPLE_RATE),
        ]);

    let api_routes = Router::new()
        .route("/tts", post(handlers::generate_tts))
        .route(
            "/tts/upload",
            post(handlers::generate_tts_upload)
                .layer(DefaultBodyLimit::max(options.max_upload_bytes)),
        )
        .route("/voices", get(handlers::list_voices))
        .route("/tags", get(handlers::list_tags))
        .route("/health", get(handlers::health));

    let mut router = Router::new().nest("/api", api_routes);

    if let Some(dir) = options.static_dir.filter(|d| d.is_dir()) {
        tracing::info!("Serving static files from {}", dir.display());
        router = router
            .fallback_service(ServeDir::new(dir).append_index_html_on_directories(true));
    }

    router
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
