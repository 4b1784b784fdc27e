use crate::engine::EngineHandle;
use crate::error::{ApiError, Result};
use axum::body::Bytes;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use rollcall_core::{DecoderChain, Gallery};
use rollcall_ledger::Ledger;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Multipart field carrying the uploaded photo.
const UPLOAD_FIELD: &str = "file";

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub engine: EngineHandle,
    pub ledger: Arc<Ledger>,
    pub decoders: Arc<DecoderChain>,
    pub gallery: Arc<Gallery>,
    pub tolerance: f32,
}

pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/recognize", post(handler_recognize))
        .route("/recognize/", post(handler_recognize))
        .route("/attendance", get(handler_attendance))
        .route("/attendance/", get(handler_attendance))
        .route("/status", get(handler_status))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// First field named `file`, or failing that the first field carrying a filename.
async fn read_upload(multipart: &mut Multipart) -> Result<Bytes> {
    let mut fallback = None;
    while let Some(field) = multipart.next_field().await? {
        let is_upload = field.name() == Some(UPLOAD_FIELD);
        let has_filename = field.file_name().is_some();
        if is_upload {
            return Ok(field.bytes().await?);
        }
        if has_filename && fallback.is_none() {
            fallback = Some(field.bytes().await?);
        }
    }
    fallback.ok_or(ApiError::MissingFile)
}

async fn handler_recognize(
    State(state): State<AppState>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<Value>> {
    let upload = read_upload(&mut multipart?).await?;
    tracing::debug!(bytes = upload.len(), "image received");

    let decoders = Arc::clone(&state.decoders);
    let image = tokio::task::spawn_blocking(move || decoders.decode(&upload)).await??;

    let recognition = state.engine.recognize(image).await?;

    let mut body = json!({ "result": recognition.identification.label() });
    if let Err(err) = &recognition.ledger {
        body["ledger_error"] = json!(err.to_string());
    }
    Ok(Json(body))
}

async fn handler_attendance(State(state): State<AppState>) -> Result<Json<Value>> {
    let ledger = Arc::clone(&state.ledger);
    let records = tokio::task::spawn_blocking(move || ledger.list_all()).await??;
    Ok(Json(json!({ "attendance": records })))
}

async fn handler_status(State(state): State<AppState>) -> Result<Json<Value>> {
    Ok(Json(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "gallery": {
            "entries": state.gallery.len(),
            "identities": state.gallery.identities().len(),
            "dimension": state.gallery.dimension(),
            "model_version": state.gallery.model_version(),
        },
        "match_tolerance": state.tolerance,
        "ledger": state.ledger.describe(),
        "decoders": state.decoders.decoder_names(),
    })))
}
