//! Offline gallery builder.
//!
//! Walks a labeled dataset laid out as one directory per identity:
//!
//! ```text
//! dataset/
//!   alice/  img_001.jpg  img_002.heic ...
//!   bob/    ...
//! ```
//!
//! Every readable image contributes the embedding of its first detected face.

use crate::analyzer::FaceAnalyzer;
use crate::decode::DecoderChain;
use crate::gallery::{Gallery, GalleryEntry, GalleryError};
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    Unreadable(String),
    Undecodable(String),
    NoFace,
    Analysis(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unreadable(e) => write!(f, "unreadable: {e}"),
            Self::Undecodable(e) => write!(f, "undecodable: {e}"),
            Self::NoFace => f.write_str("no face found"),
            Self::Analysis(e) => write!(f, "analysis failed: {e}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SkippedSample {
    pub path: PathBuf,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    pub enrolled: usize,
    pub skipped: Vec<SkippedSample>,
}

/// Sorted paths of the entries in `dir` matching `keep`.
fn sorted_children(dir: &Path, keep: impl Fn(&Path) -> bool) -> std::io::Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let hidden = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with('.'));
        if !hidden && keep(&path) {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

/// Build a gallery from `dataset`, skipping samples that yield no embedding.
pub fn build_gallery<A: FaceAnalyzer + ?Sized>(
    dataset: &Path,
    decoders: &DecoderChain,
    analyzer: &mut A,
) -> Result<(Gallery, BuildReport), GalleryError> {
    if !dataset.is_dir() {
        return Err(GalleryError::NotFound(dataset.display().to_string()));
    }

    let mut entries = Vec::new();
    let mut report = BuildReport::default();

    for person_dir in sorted_children(dataset, Path::is_dir)? {
        let Some(identity) = person_dir.file_name().and_then(|n| n.to_str()) else {
            tracing::warn!(path = %person_dir.display(), "skipping non-UTF-8 identity directory");
            continue;
        };

        for path in sorted_children(&person_dir, Path::is_file)? {
            match embed_sample(&path, decoders, analyzer) {
                Ok(embedding) => {
                    tracing::debug!(identity, path = %path.display(), "sample enrolled");
                    entries.push(GalleryEntry {
                        identity: identity.to_string(),
                        embedding,
                    });
                    report.enrolled += 1;
                }
                Err(reason) => {
                    tracing::warn!(path = %path.display(), %reason, "sample skipped");
                    report.skipped.push(SkippedSample { path, reason });
                }
            }
        }
    }

    let gallery = Gallery::new(entries)?;
    tracing::info!(
        enrolled = report.enrolled,
        skipped = report.skipped.len(),
        identities = gallery.identities().len(),
        "gallery built"
    );
    Ok((gallery, report))
}

fn embed_sample<A: FaceAnalyzer + ?Sized>(
    path: &Path,
    decoders: &DecoderChain,
    analyzer: &mut A,
) -> Result<crate::types::Embedding, SkipReason> {
    let bytes = std::fs::read(path).map_err(|e| SkipReason::Unreadable(e.to_string()))?;
    let image = decoders
        .decode(&bytes)
        .map_err(|e| SkipReason::Undecodable(e.to_string()))?;
    let faces = analyzer
        .analyze(&image)
        .map_err(|e| SkipReason::Analysis(e.to_string()))?;
    faces
        .into_iter()
        .next()
        .map(|face| face.embedding)
        .ok_or(SkipReason::NoFace)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::AnalyzerError;
    use crate::types::{BoundingBox, DetectedFace, Embedding};
    use image::{ImageFormat, Rgb, RgbImage};

    /// Embeds the top-left pixel; pure black images have no face.
    struct PixelAnalyzer;

    impl FaceAnalyzer for PixelAnalyzer {
        fn analyze(&mut self, image: &RgbImage) -> Result<Vec<DetectedFace>, AnalyzerError> {
            let p = image.get_pixel(0, 0).0;
            if p == [0, 0, 0] {
                return Ok(vec![]);
            }
            Ok(vec![DetectedFace {
                bbox: BoundingBox {
                    x: 0.0,
                    y: 0.0,
                    width: 1.0,
                    height: 1.0,
                    confidence: 1.0,
                    landmarks: None,
                },
                embedding: Embedding::new(p.iter().map(|&c| c as f32 / 255.0).collect()),
            }])
        }
    }

    fn write_png(path: &Path, color: [u8; 3]) {
        RgbImage::from_pixel(4, 4, Rgb(color))
            .save_with_format(path, ImageFormat::Png)
            .unwrap();
    }

    #[test]
    fn test_build_from_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("bob")).unwrap();
        std::fs::create_dir_all(root.join("alice")).unwrap();
        write_png(&root.join("alice/1.png"), [255, 0, 0]);
        write_png(&root.join("bob/2.png"), [0, 255, 0]);
        write_png(&root.join("bob/1.png"), [0, 0, 255]);
        write_png(&root.join("bob/3.png"), [0, 0, 0]);
        std::fs::write(root.join("bob/notes.txt"), b"not an image").unwrap();
        write_png(&root.join("stray.png"), [9, 9, 9]);

        let (gallery, report) =
            build_gallery(root, &DecoderChain::standard(), &mut PixelAnalyzer).unwrap();

        let names: Vec<&str> = gallery.entries().iter().map(|e| e.identity.as_str()).collect();
        assert_eq!(names, vec!["alice", "bob", "bob"]);
        // bob/1.png sorts before bob/2.png.
        assert_eq!(gallery.entries()[1].embedding.values, vec![0.0, 0.0, 1.0]);
        assert_eq!(report.enrolled, 3);
        assert_eq!(report.skipped.len(), 2);
        assert_eq!(report.skipped[0].reason, SkipReason::NoFace);
        assert!(matches!(report.skipped[1].reason, SkipReason::Undecodable(_)));
    }

    #[test]
    fn test_build_missing_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let err = build_gallery(
            &dir.path().join("nope"),
            &DecoderChain::standard(),
            &mut PixelAnalyzer,
        )
        .unwrap_err();
        assert!(matches!(err, GalleryError::NotFound(_)));
    }
}
