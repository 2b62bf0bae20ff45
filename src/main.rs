use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod api;
mod audio;
mod config;
mod error;
mod markup;
mod tts;
mod voices;

use api::routes::{create_router, AppState, RouterOptions};
use config::{Backend, ServerConfig};
use tts::{CommandLoader, ModelHandle, ModelLoader, PiperLoader};
use voices::VoiceCatalog;

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run(ServerConfig::parse()).await {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = config.socket_addr()?;
    let device = config.resolved_device();

    tracing::info!("TTS Server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Device: {}", device);
    tracing::info!("Voices directory: {}", config.voices_dir.display());

    let catalog = VoiceCatalog::scan(&config.voices_dir)?;
    if catalog.is_empty() {
        tracing::warn!("No reference voices found; requests will use the default voice");
    }

    let loader: Arc<dyn ModelLoader> = match config.backend {
        Backend::Piper => Arc::new(PiperLoader::new(config.model.clone())),
        Backend::Command => Arc::new(CommandLoader::new(
            config.model.clone(),
            config.model_args.clone(),
        )),
    };
    tracing::info!("Model: {} ({:?} backend)", config.model.display(), config.backend);
    if !config.backend.clones_voices() {
        tracing::warn!(
            "The {:?} backend ignores reference voices and seeds; use --backend command for voice cloning",
            config.backend
        );
    }

    let model = ModelHandle::new(loader, device);
    if config.preload {
        model.get_or_load().await?;
    }

    let state = Arc::new(AppState {
        catalog,
        model,
        wav_format: config.wav_format,
    });

    let app = create_router(
        state,
        RouterOptions {
            static_dir: Some(config.static_dir.clone()),
            max_upload_bytes: config.max_upload_bytes,
        },
    );

    tracing::info!("Starting server on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
