//! Embedding gallery: the reference set of known faces.
//!
//! Serialized as a single JSON blob holding two parallel sequences,
//! `names` and `encodings`, aligned by index.

use crate::types::Embedding;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GalleryError {
    #[error("gallery file not found: {0}; build one with `rollcall build-gallery`")]
    NotFound(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed gallery blob: {0}")]
    Json(#[from] serde_json::Error),
    #[error("gallery has {names} names but {encodings} encodings")]
    Misaligned { names: usize, encodings: usize },
    #[error("encoding {index} has {actual} dimensions, expected {expected}")]
    MixedDimensions {
        index: usize,
        expected: usize,
        actual: usize,
    },
}

/// One known face: an identity and one embedding sampled from it.
#[derive(Debug, Clone)]
pub struct GalleryEntry {
    pub identity: String,
    pub embedding: Embedding,
}

/// On-disk shape of the gallery.
#[derive(Debug, Serialize, Deserialize)]
struct GalleryBlob {
    names: Vec<String>,
    encodings: Vec<Vec<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    model_version: Option<String>,
}

/// Ordered, immutable collection of gallery entries.
///
/// Identities may repeat: one entry per enrolled sample.
#[derive(Debug, Clone, Default)]
pub struct Gallery {
    entries: Vec<GalleryEntry>,
    model_version: Option<String>,
}

impl Gallery {
    /// Build a gallery from entries, rejecting mixed dimensionality.
    pub fn new(entries: Vec<GalleryEntry>) -> Result<Self, GalleryError> {
        if let Some(first) = entries.first() {
            let expected = first.embedding.dimension();
            for (index, entry) in entries.iter().enumerate() {
                let actual = entry.embedding.dimension();
                if actual != expected {
                    return Err(GalleryError::MixedDimensions {
                        index,
                        expected,
                        actual,
                    });
                }
            }
        }
        let model_version = entries
            .first()
            .and_then(|e| e.embedding.model_version.clone());
        Ok(Self {
            entries,
            model_version,
        })
    }

    /// Load a gallery blob from disk.
    pub fn load(path: &Path) -> Result<Self, GalleryError> {
        if !path.exists() {
            return Err(GalleryError::NotFound(path.display().to_string()));
        }
        let bytes = std::fs::read(path)?;
        let gallery = Self::from_json_slice(&bytes)?;
        tracing::info!(
            path = %path.display(),
            entries = gallery.len(),
            identities = gallery.identities().len(),
            dimension = ?gallery.dimension(),
            "gallery loaded"
        );
        Ok(gallery)
    }

    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, GalleryError> {
        let blob: GalleryBlob = serde_json::from_slice(bytes)?;
        if blob.names.len() != blob.encodings.len() {
            return Err(GalleryError::Misaligned {
                names: blob.names.len(),
                encodings: blob.encodings.len(),
            });
        }
        let model_version = blob.model_version;
        let entries = blob
            .names
            .into_iter()
            .zip(blob.encodings)
            .map(|(identity, values)| GalleryEntry {
                identity,
                embedding: Embedding {
                    values,
                    model_version: model_version.clone(),
                },
            })
            .collect();
        let mut gallery = Self::new(entries)?;
        gallery.model_version = model_version;
        Ok(gallery)
    }

    /// Serialize to the parallel-sequence blob.
    pub fn to_json_vec(&self) -> Result<Vec<u8>, GalleryError> {
        let blob = GalleryBlob {
            names: self.entries.iter().map(|e| e.identity.clone()).collect(),
            encodings: self
                .entries
                .iter()
                .map(|e| e.embedding.values.clone())
                .collect(),
            model_version: self.model_version.clone(),
        };
        Ok(serde_json::to_vec(&blob)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), GalleryError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json_vec()?)?;
        Ok(())
    }

    pub fn entries(&self) -> &[GalleryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Embedding dimensionality, or `None` for an empty gallery.
    pub fn dimension(&self) -> Option<usize> {
        self.entries.first().map(|e| e.embedding.dimension())
    }

    pub fn model_version(&self) -> Option<&str> {
        self.model_version.as_deref()
    }

    /// Distinct identities in first-appearance order.
    pub fn identities(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.entries
            .iter()
            .filter(|e| seen.insert(e.identity.as_str()))
            .map(|e| e.identity.clone())
            .collect()
    }

    /// Number of samples per identity, in first-appearance order.
    pub fn sample_counts(&self) -> Vec<(String, usize)> {
        let mut counts: Vec<(String, usize)> = Vec::new();
        for entry in &self.entries {
            match counts.iter_mut().find(|(name, _)| *name == entry.identity) {
                Some((_, n)) => *n += 1,
                None => counts.push((entry.identity.clone(), 1)),
            }
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(identity: &str, values: Vec<f32>) -> GalleryEntry {
        GalleryEntry {
            identity: identity.into(),
            embedding: Embedding::new(values),
        }
    }

    #[test]
    fn test_from_json_parallel_sequences() {
        let json = br#"{"names": ["Alice", "Bob", "Alice"], "encodings": [[0.1, 0.2], [0.3, 0.4], [0.5, 0.6]]}"#;
        let gallery = Gallery::from_json_slice(json).unwrap();
        assert_eq!(gallery.len(), 3);
        assert_eq!(gallery.dimension(), Some(2));
        assert_eq!(gallery.entries()[1].identity, "Bob");
        assert_eq!(gallery.entries()[2].embedding.values, vec![0.5, 0.6]);
        assert_eq!(gallery.identities(), vec!["Alice".to_string(), "Bob".to_string()]);
        assert_eq!(
            gallery.sample_counts(),
            vec![("Alice".to_string(), 2), ("Bob".to_string(), 1)]
        );
    }

    #[test]
    fn test_from_json_misaligned() {
        let json = br#"{"names": ["Alice", "Bob"], "encodings": [[0.1, 0.2]]}"#;
        let err = Gallery::from_json_slice(json).unwrap_err();
        assert!(matches!(err, GalleryError::Misaligned { names: 2, encodings: 1 }));
    }

    #[test]
    fn test_mixed_dimensions_rejected() {
        let err =
            Gallery::new(vec![entry("a", vec![0.0, 1.0]), entry("b", vec![1.0])]).unwrap_err();
        assert!(matches!(
            err,
            GalleryError::MixedDimensions { index: 1, expected: 2, actual: 1 }
        ));
    }

    #[test]
    fn test_empty_gallery() {
        let gallery = Gallery::from_json_slice(br#"{"names": [], "encodings": []}"#).unwrap();
        assert!(gallery.is_empty());
        assert_eq!(gallery.dimension(), None);
        assert!(gallery.identities().is_empty());
    }

    #[test]
    fn test_save_and_load_preserves_order_and_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("gallery.json");

        let mut first = entry("Bob", vec![0.25, 0.5]);
        first.embedding.model_version = Some("w600k_r50".into());
        let gallery = Gallery::new(vec![first, entry("Alice", vec![0.75, 1.0])]).unwrap();
        gallery.save(&path).unwrap();

        let loaded = Gallery::load(&path).unwrap();
        assert_eq!(loaded.identities(), vec!["Bob".to_string(), "Alice".to_string()]);
        assert_eq!(loaded.model_version(), Some("w600k_r50"));
        assert_eq!(loaded.entries()[1].embedding.values, vec![0.75, 1.0]);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Gallery::load(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, GalleryError::NotFound(_)));
    }
}
