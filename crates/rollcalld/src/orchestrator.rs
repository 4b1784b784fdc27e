//! Recognition pipeline: analyze → match → record.

use chrono::{Local, NaiveDateTime};
use image::RgbImage;
use rollcall_core::{
    identify, AnalyzerError, EuclideanMatcher, FaceAnalyzer, Gallery, Identification, MatchError,
};
use rollcall_ledger::{Ledger, LedgerError, MarkOutcome};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RecognizeError {
    #[error("face analysis failed: {0}")]
    Analyzer(#[from] AnalyzerError),
    #[error("{0}")]
    Match(#[from] MatchError),
}

/// Outcome of one recognition request.
#[derive(Debug)]
pub struct Recognition {
    pub identification: Identification,
    /// Distance to the nearest gallery entry, when a face was found.
    pub distance: Option<f32>,
    /// Ledger write result; a failure here never hides the identification.
    pub ledger: Result<MarkOutcome, LedgerError>,
}

pub struct Orchestrator<A> {
    analyzer: A,
    gallery: Arc<Gallery>,
    ledger: Arc<Ledger>,
    matcher: EuclideanMatcher,
    tolerance: f32,
    clock: fn() -> NaiveDateTime,
}

fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

impl<A: FaceAnalyzer> Orchestrator<A> {
    pub fn new(analyzer: A, gallery: Arc<Gallery>, ledger: Arc<Ledger>, tolerance: f32) -> Self {
        Self {
            analyzer,
            gallery,
            ledger,
            matcher: EuclideanMatcher,
            tolerance,
            clock: local_now,
        }
    }

    #[cfg(test)]
    fn with_clock(mut self, clock: fn() -> NaiveDateTime) -> Self {
        self.clock = clock;
        self
    }

    /// Identify the first face in `image` and mark it present.
    ///
    /// The ledger is always asked to record the label; sentinel labels are
    /// dropped there. The label is returned whether or not the write succeeded.
    pub fn recognize_and_record(
        &mut self,
        image: &RgbImage,
    ) -> Result<Recognition, RecognizeError> {
        let faces = self.analyzer.analyze(image)?;
        let (identification, result) =
            identify(&self.matcher, &faces, &self.gallery, self.tolerance)?;
        let distance = result.and_then(|r| r.distance);

        tracing::info!(
            result = %identification,
            faces = faces.len(),
            distance = ?distance,
            "recognition complete"
        );

        let ledger = self.ledger.mark_present(identification.label(), (self.clock)());
        if let Err(err) = &ledger {
            tracing::error!(error = %err, result = %identification, "attendance write failed");
        }

        Ok(Recognition {
            identification,
            distance,
            ledger,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rollcall_core::{BoundingBox, DetectedFace, Embedding, GalleryEntry};
    use rollcall_ledger::{AttendanceRecord, CsvStore, Status};

    /// Returns the same faces for every image.
    pub(crate) struct FixedAnalyzer(pub Vec<Vec<f32>>);

    impl FaceAnalyzer for FixedAnalyzer {
        fn analyze(&mut self, _: &RgbImage) -> Result<Vec<DetectedFace>, AnalyzerError> {
            Ok(self
                .0
                .iter()
                .map(|values| DetectedFace {
                    bbox: BoundingBox {
                        x: 0.0,
                        y: 0.0,
                        width: 1.0,
                        height: 1.0,
                        confidence: 1.0,
                        landmarks: None,
                    },
                    embedding: Embedding::new(values.clone()),
                })
                .collect())
        }
    }

    pub(crate) fn alice_bob_gallery() -> Arc<Gallery> {
        let entry = |identity: &str, values: Vec<f32>| GalleryEntry {
            identity: identity.into(),
            embedding: Embedding::new(values),
        };
        Arc::new(
            Gallery::new(vec![
                entry("Alice", vec![0.3, 0.0]),
                entry("Bob", vec![0.9, 0.0]),
            ])
            .unwrap(),
        )
    }

    fn nine_am() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 9, 2).unwrap().and_hms_opt(9, 0, 0).unwrap()
    }

    fn setup(
        dir: &tempfile::TempDir,
        query: Vec<Vec<f32>>,
    ) -> (Orchestrator<FixedAnalyzer>, Arc<Ledger>) {
        let gallery = alice_bob_gallery();
        let ledger = Arc::new(Ledger::new(
            Box::new(CsvStore::new(dir.path().join("attendance.csv"))),
            gallery.identities(),
        ));
        ledger.initialize(&gallery.identities()).unwrap();
        let orchestrator =
            Orchestrator::new(FixedAnalyzer(query), gallery, Arc::clone(&ledger), 0.5)
                .with_clock(nine_am);
        (orchestrator, ledger)
    }

    fn blank() -> RgbImage {
        RgbImage::new(4, 4)
    }

    #[test]
    fn test_match_marks_only_matched_identity() {
        // distance(query, Alice) = 0.3, distance(query, Bob) = 0.9
        let dir = tempfile::tempdir().unwrap();
        let (mut orchestrator, ledger) = setup(&dir, vec![vec![0.0, 0.0]]);

        let recognition = orchestrator.recognize_and_record(&blank()).unwrap();
        assert_eq!(recognition.identification, Identification::Known("Alice".into()));
        assert!(matches!(recognition.ledger, Ok(MarkOutcome::Updated)));
        assert_eq!(
            ledger.list_all().unwrap(),
            vec![
                AttendanceRecord::present("Alice", nine_am()),
                AttendanceRecord::absent("Bob"),
            ]
        );
    }

    #[test]
    fn test_miss_leaves_ledger_unchanged() {
        // Nearest entry (Alice) is 0.6 away.
        let dir = tempfile::tempdir().unwrap();
        let (mut orchestrator, ledger) = setup(&dir, vec![vec![-0.3, 0.0]]);
        let before = ledger.list_all().unwrap();

        let recognition = orchestrator.recognize_and_record(&blank()).unwrap();
        assert_eq!(recognition.identification, Identification::Unknown);
        assert!((recognition.distance.unwrap() - 0.6).abs() < 1e-6);
        assert!(matches!(recognition.ledger, Ok(MarkOutcome::Skipped)));
        assert_eq!(ledger.list_all().unwrap(), before);
    }

    #[test]
    fn test_no_face_flows_through() {
        let dir = tempfile::tempdir().unwrap();
        let (mut orchestrator, ledger) = setup(&dir, vec![]);

        let recognition = orchestrator.recognize_and_record(&blank()).unwrap();
        assert_eq!(recognition.identification, Identification::NoFaceDetected);
        assert_eq!(recognition.distance, None);
        assert!(ledger.list_all().unwrap().iter().all(|r| r.status == Status::Absent));
    }

    #[test]
    fn test_dimension_mismatch_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let (mut orchestrator, _) = setup(&dir, vec![vec![0.0, 0.0, 0.0]]);
        let err = orchestrator.recognize_and_record(&blank()).unwrap_err();
        assert!(matches!(err, RecognizeError::Match(_)));
    }

    #[test]
    fn test_ledger_failure_keeps_result() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"").unwrap();

        let gallery = alice_bob_gallery();
        let ledger = Arc::new(Ledger::new(
            Box::new(CsvStore::new(blocker.join("attendance.csv"))),
            gallery.identities(),
        ));
        let mut orchestrator =
            Orchestrator::new(FixedAnalyzer(vec![vec![0.0, 0.0]]), gallery, ledger, 0.5);

        let recognition = orchestrator.recognize_and_record(&blank()).unwrap();
        assert_eq!(recognition.identification, Identification::Known("Alice".into()));
        assert!(recognition.ledger.is_err());
    }
}
