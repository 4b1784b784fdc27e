use crate::engine::EngineError;
use axum::extract::multipart::MultipartError;
use axum::extract::multipart::MultipartRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use rollcall_core::DecodeError;
use rollcall_ledger::LedgerError;
use serde_json::json;
use thiserror::Error;

pub type Result<T> = core::result::Result<T, ApiError>;

/// Per-request failure, rendered as `{"error": message}`.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("no image uploaded: expected a multipart field named \"file\"")]
    MissingFile,
    #[error("expected a multipart/form-data upload: {0}")]
    NotMultipart(#[from] MultipartRejection),
    #[error("malformed upload: {0}")]
    Multipart(#[from] MultipartError),
    #[error("{0}")]
    Decode(#[from] DecodeError),
    #[error("{0}")]
    Engine(#[from] EngineError),
    #[error("attendance ledger unavailable: {0}")]
    Ledger(#[from] LedgerError),
    #[error("worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingFile | Self::Decode(_) => StatusCode::BAD_REQUEST,
            Self::NotMultipart(err) => err.status(),
            Self::Multipart(err) => err.status(),
            Self::Engine(_) | Self::Ledger(_) | Self::Join(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let req_id = uuid::Uuid::new_v4();
        if status.is_server_error() {
            tracing::error!(%req_id, error = %self, status = status.as_u16(), "request failed");
        } else {
            tracing::warn!(%req_id, error = %self, status = status.as_u16(), "request rejected");
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(ApiError::MissingFile.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::Decode(DecodeError::Empty).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Engine(EngineError::ChannelClosed).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::Ledger(LedgerError::Poisoned).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
