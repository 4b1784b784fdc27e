use anyhow::{bail, Context, Result};
use rollcall_core::recognizer::{tolerance_too_strict, ARCFACE_EMBEDDING_DIM};
use rollcall_core::{DecoderChain, Gallery, OnnxFaceAnalyzer};
use rollcall_ledger::Ledger;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod config;
mod engine;
mod error;
mod orchestrator;
mod routes;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!("rollcalld starting");

    let config = config::Config::from_env();

    let gallery = Gallery::load(&config.gallery_path).with_context(|| {
        format!(
            "failed to load gallery from {}; run `rollcall build-gallery` first",
            config.gallery_path.display()
        )
    })?;
    if let Some(dim) = gallery.dimension() {
        if dim != ARCFACE_EMBEDDING_DIM {
            bail!(
                "gallery embeddings are {dim}-dimensional but the recognizer produces {ARCFACE_EMBEDDING_DIM}; rebuild the gallery"
            );
        }
    }
    if tolerance_too_strict(config.match_tolerance, gallery.dimension()) {
        tracing::warn!(
            tolerance = config.match_tolerance,
            "match tolerance is too strict for ArcFace embeddings; most faces will be Unknown"
        );
    }
    if gallery.is_empty() {
        tracing::warn!("gallery is empty; every face will be reported as Unknown");
    }
    tracing::info!(
        path = %config.gallery_path.display(),
        entries = gallery.len(),
        identities = gallery.identities().len(),
        "gallery loaded"
    );
    let gallery = Arc::new(gallery);

    let store = config
        .open_ledger_store()
        .context("failed to open attendance ledger")?;
    let ledger = Arc::new(Ledger::new(store, gallery.identities()));
    // A failure here is retried lazily by the first ledger operation.
    if let Err(e) = ledger.initialize(&gallery.identities()) {
        tracing::warn!(error = %e, store = %ledger.describe(), "ledger initialization failed");
    }

    let analyzer = OnnxFaceAnalyzer::load(&config.model_dir).with_context(|| {
        format!("failed to load face models from {}", config.model_dir.display())
    })?;

    let orchestrator = orchestrator::Orchestrator::new(
        analyzer,
        Arc::clone(&gallery),
        Arc::clone(&ledger),
        config.match_tolerance,
    );
    let engine = engine::spawn_engine(orchestrator)?;

    let state = routes::AppState {
        engine,
        ledger,
        decoders: Arc::new(DecoderChain::standard()),
        gallery,
        tolerance: config.match_tolerance,
    };
    let app = routes::router(state, config.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    tracing::info!(
        addr = %config.listen_addr,
        tolerance = config.match_tolerance,
        "rollcalld ready"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    tracing::info!("rollcalld shutting down");
    Ok(())
}
