//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the two operations the pipeline needs:
//! `identify` (read dimensions without producing anything) and `transcode`
//! (decode once, emit every size tier as encoded JPEG bytes).
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend). Tests use the
//! [`MockBackend`](tests::MockBackend), which records calls and fabricates
//! variants so the orchestrator can be exercised without decoding pixels.

use super::params::{SizeTier, TranscodeParams};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot decode {path}: {message}")]
    Decode { path: String, message: String },
    #[error("cannot encode {tier} variant: {message}")]
    Encode { tier: SizeTier, message: String },
}

/// Pixel dimensions of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn as_tuple(self) -> (u32, u32) {
        (self.width, self.height)
    }
}

impl From<(u32, u32)> for Dimensions {
    fn from((width, height): (u32, u32)) -> Self {
        Self { width, height }
    }
}

/// One encoded output tier, ready to be published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedVariant {
    pub tier: SizeTier,
    pub dimensions: Dimensions,
    pub bytes: Vec<u8>,
}

/// Everything produced from one source image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcoded {
    /// Source dimensions after orientation was applied.
    pub source: Dimensions,
    /// One entry per [`SizeTier`], in [`SizeTier::ALL`] order.
    pub variants: Vec<EncodedVariant>,
}

impl Transcoded {
    pub fn variant(&self, tier: SizeTier) -> Option<&EncodedVariant> {
        self.variants.iter().find(|v| v.tier == tier)
    }
}

/// Trait for image processing backends.
pub trait ImageBackend: Sync {
    /// Get image dimensions, orientation applied.
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError>;

    /// Decode `source` once and encode every size tier.
    ///
    /// A variant is never larger than the (oriented) source.
    fn transcode(
        &self,
        source: &Path,
        params: &TranscodeParams,
    ) -> Result<Transcoded, BackendError>;
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::imaging::calculations::fit_within;
    use std::sync::Mutex;

    /// Mock backend that records operations and fabricates variants.
    ///
    /// Variant bytes are the ASCII string `WxH`, which `identify` reads back,
    /// so a staged mock variant can be re-identified like a real file.
    /// Uses Mutex (not RefCell) so it is Sync and works with rayon's par_iter.
    pub struct MockBackend {
        pub source_dimensions: Dimensions,
        /// Sources whose file name contains any of these fail to decode.
        pub failing: Vec<String>,
        pub operations: Mutex<Vec<RecordedOp>>,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum RecordedOp {
        Identify(String),
        Transcode { source: String, quality: u32 },
    }

    impl Default for MockBackend {
        fn default() -> Self {
            Self {
                source_dimensions: Dimensions {
                    width: 3000,
                    height: 2000,
                },
                failing: Vec::new(),
                operations: Mutex::new(Vec::new()),
            }
        }
    }

    impl MockBackend {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_dimensions(width: u32, height: u32) -> Self {
            Self {
                source_dimensions: Dimensions { width, height },
                ..Self::default()
            }
        }

        pub fn failing_on(names: &[&str]) -> Self {
            Self {
                failing: names.iter().map(|n| n.to_string()).collect(),
                ..Self::default()
            }
        }

        pub fn get_operations(&self) -> Vec<RecordedOp> {
            self.operations.lock().unwrap().clone()
        }

        pub fn transcode_count(&self) -> usize {
            self.get_operations()
                .iter()
                .filter(|op| matches!(op, RecordedOp::Transcode { .. }))
                .count()
        }

        fn fails(&self, path: &Path) -> bool {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            self.failing.iter().any(|f| name.contains(f.as_str()))
        }
    }

    fn parse_fake(bytes: &[u8]) -> Option<Dimensions> {
        let text = std::str::from_utf8(bytes).ok()?;
        let (w, h) = text.split_once('x')?;
        Some(Dimensions {
            width: w.parse().ok()?,
            height: h.parse().ok()?,
        })
    }

    impl ImageBackend for MockBackend {
        fn identify(&self, path: &Path) -> Result<Dimensions, BackendError> {
            self.operations
                .lock()
                .unwrap()
                .push(RecordedOp::Identify(path.to_string_lossy().to_string()));

            if self.fails(path) {
                return Err(BackendError::Decode {
                    path: path.display().to_string(),
                    message: "mock decode failure".into(),
                });
            }
            let bytes = std::fs::read(path).unwrap_or_default();
            Ok(parse_fake(&bytes).unwrap_or(self.source_dimensions))
        }

        fn transcode(
            &self,
            source: &Path,
            params: &TranscodeParams,
        ) -> Result<Transcoded, BackendError> {
            self.operations.lock().unwrap().push(RecordedOp::Transcode {
                source: source.to_string_lossy().to_string(),
                quality: params.quality.value(),
            });

            if self.fails(source) {
                return Err(BackendError::Decode {
                    path: source.display().to_string(),
                    message: "mock decode failure".into(),
                });
            }

            let variants = SizeTier::ALL
                .iter()
                .map(|&tier| {
                    let dims: Dimensions = fit_within(
                        self.source_dimensions.as_tuple(),
                        params.tiers.max_for(tier),
                    )
                    .into();
                    EncodedVariant {
                        tier,
                        dimensions: dims,
                        bytes: format!("{}x{}", dims.width, dims.height).into_bytes(),
                    }
                })
                .collect();

            Ok(Transcoded {
                source: self.source_dimensions,
                variants,
            })
        }
    }

    #[test]
    fn mock_records_transcode_and_caps_tiers() {
        let backend = MockBackend::with_dimensions(6000, 4000);
        let out = backend
            .transcode(Path::new("/a/b.jpg"), &TranscodeParams::default())
            .unwrap();

        assert_eq!(out.variants.len(), 3);
        let medium = out.variant(SizeTier::Medium).unwrap();
        assert_eq!(medium.dimensions, Dimensions::from((1600, 1067)));
        assert_eq!(medium.bytes, b"1600x1067");
        assert_eq!(backend.transcode_count(), 1);
    }

    #[test]
    fn mock_fails_on_configured_names() {
        let backend = MockBackend::failing_on(&["broken"]);
        let err = backend
            .transcode(Path::new("/a/broken.jpg"), &TranscodeParams::default())
            .unwrap_err();
        assert!(matches!(err, BackendError::Decode { .. }));
    }

    #[test]
    fn mock_identify_reads_back_fake_variants() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("v.jpg");
        std::fs::write(&path, b"400x267").unwrap();
        let backend = MockBackend::new();
        assert_eq!(
            backend.identify(&path).unwrap(),
            Dimensions::from((400, 267))
        );
    }
}
