//! Nearest-neighbour identity matching against the gallery.

use crate::gallery::Gallery;
use crate::types::{DetectedFace, Embedding, Identification};
use thiserror::Error;

/// Reference tolerance: a nearest distance strictly below this is a match.
pub const DEFAULT_TOLERANCE: f32 = 0.5;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MatchError {
    #[error("query has {query} dimensions but the gallery has {gallery}")]
    DimensionMismatch { query: usize, gallery: usize },
}

/// Result of comparing one query against a gallery.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub matched: bool,
    /// Distance to the nearest gallery entry, `None` for an empty gallery.
    pub distance: Option<f32>,
    /// Index of the nearest gallery entry.
    pub index: Option<usize>,
    /// Identity of the nearest entry, only set when `matched`.
    pub identity: Option<String>,
}

impl MatchResult {
    fn no_candidate() -> Self {
        Self {
            matched: false,
            distance: None,
            index: None,
            identity: None,
        }
    }

    pub fn identification(&self) -> Identification {
        match &self.identity {
            Some(name) if self.matched => Identification::Known(name.clone()),
            _ => Identification::Unknown,
        }
    }
}

/// Strategy for comparing a query embedding against the gallery.
pub trait Matcher {
    fn compare(
        &self,
        query: &Embedding,
        gallery: &Gallery,
        tolerance: f32,
    ) -> Result<MatchResult, MatchError>;
}

/// Euclidean nearest-neighbour matcher.
///
/// Picks the single globally nearest entry (first in gallery order on exact
/// ties) and only then applies the tolerance to it. Entries are independent
/// rows; samples of the same identity are not aggregated.
#[derive(Debug, Clone, Copy, Default)]
pub struct EuclideanMatcher;

impl Matcher for EuclideanMatcher {
    fn compare(
        &self,
        query: &Embedding,
        gallery: &Gallery,
        tolerance: f32,
    ) -> Result<MatchResult, MatchError> {
        let Some(dimension) = gallery.dimension() else {
            return Ok(MatchResult::no_candidate());
        };
        if query.dimension() != dimension {
            return Err(MatchError::DimensionMismatch {
                query: query.dimension(),
                gallery: dimension,
            });
        }

        let mut best_dist = f32::INFINITY;
        let mut best_idx: Option<usize> = None;

        for (i, entry) in gallery.entries().iter().enumerate() {
            let dist = query.euclidean_distance(&entry.embedding);
            if dist < best_dist {
                best_dist = dist;
                best_idx = Some(i);
            }
        }

        let Some(idx) = best_idx else {
            return Ok(MatchResult::no_candidate());
        };
        let matched = best_dist < tolerance;

        tracing::debug!(
            nearest = %gallery.entries()[idx].identity,
            distance = best_dist,
            tolerance,
            matched,
            "nearest gallery entry"
        );

        Ok(MatchResult {
            matched,
            distance: Some(best_dist),
            index: Some(idx),
            identity: matched.then(|| gallery.entries()[idx].identity.clone()),
        })
    }
}

/// Identify the first detected face against the gallery.
///
/// Zero faces short-circuits to [`Identification::NoFaceDetected`] without
/// touching the gallery. Further faces beyond the first are ignored.
pub fn identify<M: Matcher + ?Sized>(
    matcher: &M,
    faces: &[DetectedFace],
    gallery: &Gallery,
    tolerance: f32,
) -> Result<(Identification, Option<MatchResult>), MatchError> {
    let Some(face) = faces.first() else {
        return Ok((Identification::NoFaceDetected, None));
    };
    if faces.len() > 1 {
        tracing::debug!(faces = faces.len(), "multiple faces detected; using the first");
    }
    let result = matcher.compare(&face.embedding, gallery, tolerance)?;
    Ok((result.identification(), Some(result)))
}
