use rollcall_core::recognizer::ARCFACE_MATCH_TOLERANCE;
use rollcall_ledger::{LedgerBackend, LedgerError, LedgerStore};
use std::path::PathBuf;

/// Daemon configuration, loaded from environment variables.
pub struct Config {
    /// Socket address the HTTP server binds to (default: 0.0.0.0:8000).
    pub listen_addr: String,
    /// Directory containing ONNX model files.
    pub model_dir: PathBuf,
    /// Gallery blob produced by `rollcall build-gallery`.
    pub gallery_path: PathBuf,
    /// Attendance ledger location.
    pub ledger_path: PathBuf,
    pub ledger_backend: LedgerBackend,
    /// Euclidean distance below which the nearest gallery entry is a match.
    pub match_tolerance: f32,
    /// Largest accepted upload body.
    pub max_upload_bytes: usize,
}

impl Config {
    /// Load configuration from `ROLLCALL_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let data_dir = rollcall_core::default_data_dir();

        let model_dir = std::env::var("ROLLCALL_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| rollcall_core::default_model_dir());

        let gallery_path = std::env::var("ROLLCALL_GALLERY_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("gallery.json"));

        let ledger_backend = match std::env::var("ROLLCALL_LEDGER_BACKEND") {
            Ok(v) => v.parse().unwrap_or_else(|e: String| {
                tracing::warn!(error = %e, "invalid ROLLCALL_LEDGER_BACKEND; using csv");
                LedgerBackend::Csv
            }),
            Err(_) => LedgerBackend::Csv,
        };

        let ledger_path = std::env::var("ROLLCALL_LEDGER_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join(ledger_backend.default_file_name()));

        Self {
            listen_addr: std::env::var("ROLLCALL_LISTEN")
                .unwrap_or_else(|_| "0.0.0.0:8000".to_string()),
            model_dir,
            gallery_path,
            ledger_path,
            ledger_backend,
            match_tolerance: tolerance(std::env::var("ROLLCALL_MATCH_TOLERANCE").ok().as_deref()),
            max_upload_bytes: env_usize("ROLLCALL_MAX_UPLOAD_BYTES", 20 * 1024 * 1024),
        }
    }

    /// Open the configured ledger backend.
    pub fn open_ledger_store(&self) -> Result<Box<dyn LedgerStore>, LedgerError> {
        self.ledger_backend.open(&self.ledger_path)
    }
}

/// Parse the configured tolerance, falling back to the ArcFace calibration
/// when unset, unparsable, non-positive or non-finite.
fn tolerance(raw: Option<&str>) -> f32 {
    let Some(raw) = raw else {
        return ARCFACE_MATCH_TOLERANCE;
    };
    match raw.trim().parse::<f32>() {
        Ok(value) if value.is_finite() && value > 0.0 => value,
        _ => {
            tracing::warn!(
                value = raw,
                default = ARCFACE_MATCH_TOLERANCE,
                "invalid match tolerance; using default"
            );
            ARCFACE_MATCH_TOLERANCE
        }
    }
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tolerance_defaults_to_arcface_calibration() {
        assert_eq!(tolerance(None), ARCFACE_MATCH_TOLERANCE);
        assert_eq!(tolerance(Some("0.9")), 0.9);
        assert_eq!(tolerance(Some(" 1.2 ")), 1.2);
    }

    #[test]
    fn test_tolerance_guard() {
        assert_eq!(tolerance(Some("0")), ARCFACE_MATCH_TOLERANCE);
        assert_eq!(tolerance(Some("-1")), ARCFACE_MATCH_TOLERANCE);
        assert_eq!(tolerance(Some("NaN")), ARCFACE_MATCH_TOLERANCE);
        assert_eq!(tolerance(Some("loose")), ARCFACE_MATCH_TOLERANCE);
    }
}
