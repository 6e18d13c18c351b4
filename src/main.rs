mod api;
mod audio;
mod backend;
mod config;
mod error;
mod languages;
mod media;
mod model_store;
mod segments;
mod storage;
mod subtitles;
mod translate;

use std::sync::Arc;

use tracing::info;

use crate::api::{build_router, AppState};
use crate::backend::build_backend;
use crate::config::AppConfig;
use crate::media::MediaTool;
use crate::model_store::ensure_model_ready;
use crate::storage::UploadStore;
use crate::translate::{build_translator, TranslationService};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "video_translator=info,axum=info".into()),
        )
        .compact()
        .init();

    let cfg = AppConfig::from_env()?;
    let cfg = tokio::task::spawn_blocking(move || {
        let mut cfg = cfg;
        ensure_model_ready(&mut cfg).map(|()| cfg)
    })
    .await??;

    let transcriber = build_backend(&cfg)?;
    let translation = TranslationService::new(build_translator(&cfg)?);
    let store = UploadStore::open(&cfg.upload_dir).await?;
    let media = MediaTool::from_config(&cfg);

    let addr = format!("{}:{}", cfg.host, cfg.port);
    info!(
        host = %cfg.host,
        port = cfg.port,
        model = %cfg.whisper_model,
        translation_url = %cfg.translation_url,
        upload_dir = %store.root().display(),
        "starting video-translator"
    );

    let state = Arc::new(AppState::new(cfg, store, media, transcriber, translation));
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
            let _ = sigterm.recv().await;
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received, draining connections");
}
