//! rollcall-core: face gallery matching for attendance.
//!
//! Holds the embedding gallery and the nearest-neighbour matcher, the
//! uploaded-image decoder chain, and the SCRFD + ArcFace face analyzer
//! running on ONNX Runtime.

pub mod alignment;
pub mod analyzer;
pub mod builder;
pub mod decode;
pub mod detector;
pub mod gallery;
pub mod matcher;
pub mod recognizer;
pub mod types;

pub use analyzer::{
    default_data_dir, default_model_dir, AnalyzerError, FaceAnalyzer, OnnxFaceAnalyzer,
};
pub use decode::{DecodeError, DecoderChain};
pub use gallery::{Gallery, GalleryEntry, GalleryError};
pub use matcher::{
    identify, EuclideanMatcher, MatchError, MatchResult, Matcher, DEFAULT_TOLERANCE,
};
pub use types::{
    is_sentinel_label, BoundingBox, DetectedFace, Embedding, Identification, NO_FACE_LABEL,
    UNKNOWN_LABEL,
};
