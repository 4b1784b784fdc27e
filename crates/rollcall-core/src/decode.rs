//! Uploaded image normalization: an ordered decoder chain producing packed RGB8.
//!
//! Each decoder either yields pixels or a typed failure; the chain tries them
//! in order and reports every failure if none succeeds.

use image::{ImageFormat, RgbImage};
use std::fmt;
use thiserror::Error;

/// Why a single decoder rejected the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeFailure {
    pub decoder: &'static str,
    pub reason: String,
}

impl fmt::Display for DecodeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.decoder, self.reason)
    }
}

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("empty image upload")]
    Empty,
    #[error("invalid image file or unsupported format ({})", join_failures(.0))]
    Unsupported(Vec<DecodeFailure>),
}

fn join_failures(failures: &[DecodeFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// One attempt at turning bytes into RGB pixels.
pub trait ImageDecoder: Send + Sync {
    fn name(&self) -> &'static str;
    fn decode(&self, bytes: &[u8]) -> Result<RgbImage, DecodeFailure>;
}

/// Formats detected by their magic bytes (JPEG, PNG, WebP, GIF, ...).
pub struct SniffedDecoder;

impl ImageDecoder for SniffedDecoder {
    fn name(&self) -> &'static str {
        "sniffed"
    }

    fn decode(&self, bytes: &[u8]) -> Result<RgbImage, DecodeFailure> {
        image::load_from_memory(bytes)
            .map(|img| img.to_rgb8())
            .map_err(|e| DecodeFailure {
                decoder: self.name(),
                reason: e.to_string(),
            })
    }
}

/// Legacy containers that carry no usable signature, tried explicitly.
pub struct LegacyFormatDecoder {
    formats: Vec<ImageFormat>,
}

impl Default for LegacyFormatDecoder {
    fn default() -> Self {
        Self {
            formats: vec![ImageFormat::Tga, ImageFormat::Bmp, ImageFormat::Ico],
        }
    }
}

impl ImageDecoder for LegacyFormatDecoder {
    fn name(&self) -> &'static str {
        "legacy"
    }

    fn decode(&self, bytes: &[u8]) -> Result<RgbImage, DecodeFailure> {
        let mut tried = Vec::with_capacity(self.formats.len());
        for &format in &self.formats {
            match image::load_from_memory_with_format(bytes, format) {
                Ok(img) => {
                    tracing::debug!(?format, "decoded through legacy fallback");
                    return Ok(img.to_rgb8());
                }
                Err(e) => tried.push(format!("{format:?}: {e}")),
            }
        }
        Err(DecodeFailure {
            decoder: self.name(),
            reason: tried.join(", "),
        })
    }
}

/// HEIF/HEIC stills (phone camera uploads) through the system libheif.
#[cfg(feature = "heif")]
pub struct HeifDecoder;

#[cfg(feature = "heif")]
impl ImageDecoder for HeifDecoder {
    fn name(&self) -> &'static str {
        "heif"
    }

    fn decode(&self, bytes: &[u8]) -> Result<RgbImage, DecodeFailure> {
        use libheif_rs::{ColorSpace, HeifContext, LibHeif, RgbChroma};

        let fail = |reason: String| DecodeFailure {
            decoder: "heif",
            reason,
        };

        let lib_heif = LibHeif::new();
        let ctx = HeifContext::read_from_bytes(bytes).map_err(|e| fail(e.to_string()))?;
        let handle = ctx.primary_image_handle().map_err(|e| fail(e.to_string()))?;
        let decoded = lib_heif
            .decode(&handle, ColorSpace::Rgb(RgbChroma::Rgb), None)
            .map_err(|e| fail(e.to_string()))?;

        let planes = decoded.planes();
        let plane = planes
            .interleaved
            .ok_or_else(|| fail("no interleaved RGB plane".into()))?;

        // Rows may be padded past width * 3.
        let row_len = plane.width as usize * 3;
        let mut data = Vec::with_capacity(row_len * plane.height as usize);
        for row in plane.data.chunks(plane.stride).take(plane.height as usize) {
            let row = row
                .get(..row_len)
                .ok_or_else(|| fail("truncated RGB row".into()))?;
            data.extend_from_slice(row);
        }

        RgbImage::from_raw(plane.width, plane.height, data)
            .ok_or_else(|| fail("plane shorter than its dimensions".into()))
    }
}

/// Ordered list of decoders, tried until one succeeds.
pub struct DecoderChain {
    decoders: Vec<Box<dyn ImageDecoder>>,
}

impl Default for DecoderChain {
    fn default() -> Self {
        Self::standard()
    }
}

impl DecoderChain {
    pub fn new(decoders: Vec<Box<dyn ImageDecoder>>) -> Self {
        Self { decoders }
    }

    /// Sniffed formats first, then the legacy fallback (and HEIF when enabled).
    pub fn standard() -> Self {
        let mut decoders: Vec<Box<dyn ImageDecoder>> =
            vec![Box::new(SniffedDecoder), Box::new(LegacyFormatDecoder::default())];
        #[cfg(feature = "heif")]
        decoders.push(Box::new(HeifDecoder));
        Self { decoders }
    }

    pub fn decoder_names(&self) -> Vec<&'static str> {
        self.decoders.iter().map(|d| d.name()).collect()
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<RgbImage, DecodeError> {
        if bytes.is_empty() {
            return Err(DecodeError::Empty);
        }

        let mut failures = Vec::new();
        for decoder in &self.decoders {
            match decoder.decode(bytes) {
                Ok(img) if img.width() > 0 && img.height() > 0 => {
                    if !failures.is_empty() {
                        tracing::info!(
                            decoder = decoder.name(),
                            skipped = failures.len(),
                            "image decoded by fallback decoder"
                        );
                    }
                    return Ok(img);
                }
                Ok(_) => failures.push(DecodeFailure {
                    decoder: decoder.name(),
                    reason: "zero-sized image".into(),
                }),
                Err(failure) => {
                    tracing::debug!(%failure, "decoder rejected input");
                    failures.push(failure);
                }
            }
        }
        Err(DecodeError::Unsupported(failures))
    }
}
