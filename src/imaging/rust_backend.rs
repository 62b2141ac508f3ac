//! Pure Rust image processing backend.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Step | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, TIFF, WebP) | `image::ImageReader` (pure Rust decoders) |
//! | Orientation | `ImageDecoder::orientation` + `DynamicImage::apply_orientation` |
//! | Alpha flatten | composite onto white before encoding |
//! | Resize | `image::imageops::resize` with `Lanczos3` filter |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` |

use super::backend::{BackendError, Dimensions, EncodedVariant, ImageBackend, Transcoded};
use super::calculations::{fit_within, needs_downscale};
use super::params::{Quality, SizeTier, TranscodeParams};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder, ImageFormat, ImageReader, RgbImage};
use std::path::Path;
use std::sync::LazyLock;

const PHOTO_CANDIDATES: &[(&str, ImageFormat)] = &[
    ("jpg", ImageFormat::Jpeg),
    ("jpeg", ImageFormat::Jpeg),
    ("png", ImageFormat::Png),
    ("tif", ImageFormat::Tiff),
    ("tiff", ImageFormat::Tiff),
    ("webp", ImageFormat::WebP),
];

static SUPPORTED_EXTENSIONS: LazyLock<Vec<&'static str>> = LazyLock::new(|| {
    PHOTO_CANDIDATES
        .iter()
        .filter(|(_, fmt)| fmt.reading_enabled())
        .map(|(ext, _)| *ext)
        .collect()
});

/// Returns the set of image file extensions that have working decoders compiled in.
///
/// Extensions are lowercase; callers compare case-insensitively.
pub fn supported_input_extensions() -> &'static [&'static str] {
    &SUPPORTED_EXTENSIONS
}

/// Whether `path` has an extension the scanner should pick up.
pub fn is_supported_photo(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            supported_input_extensions()
                .iter()
                .any(|s| s.eq_ignore_ascii_case(ext))
        })
}

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-step mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn decode_error(path: &Path, e: impl std::fmt::Display) -> BackendError {
    BackendError::Decode {
        path: path.display().to_string(),
        message: e.to_string(),
    }
}

fn swaps_axes(orientation: Orientation) -> bool {
    matches!(
        orientation,
        Orientation::Rotate90
            | Orientation::Rotate270
            | Orientation::Rotate90FlipH
            | Orientation::Rotate270FlipH
    )
}

/// Decode an image and rotate/flip it upright according to its EXIF tag.
fn load_oriented(path: &Path) -> Result<DynamicImage, BackendError> {
    let mut decoder = ImageReader::open(path)?
        .with_guessed_format()?
        .into_decoder()
        .map_err(|e| decode_error(path, e))?;
    let orientation = decoder
        .orientation()
        .unwrap_or(Orientation::NoTransforms);
    let mut img = DynamicImage::from_decoder(decoder).map_err(|e| decode_error(path, e))?;
    img.apply_orientation(orientation);
    Ok(img)
}

/// Drop the alpha channel by compositing onto white.
fn flatten(img: DynamicImage) -> RgbImage {
    if !img.color().has_alpha() {
        return img.to_rgb8();
    }
    let rgba = img.to_rgba8();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let a = a as u32;
        let blend = |c: u8| ((c as u32 * a + 255 * (255 - a)) / 255) as u8;
        image::Rgb([blend(r), blend(g), blend(b)])
    })
}

fn encode_jpeg(img: &RgbImage, quality: Quality, tier: SizeTier) -> Result<Vec<u8>, BackendError> {
    let mut bytes = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut bytes, quality.value() as u8);
    img.write_with_encoder(encoder)
        .map_err(|e| BackendError::Encode {
            tier,
            message: e.to_string(),
        })?;
    Ok(bytes)
}

impl ImageBackend for RustBackend {
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError> {
        let mut decoder = ImageReader::open(path)?
            .with_guessed_format()?
            .into_decoder()
            .map_err(|e| decode_error(path, e))?;
        let (width, height) = decoder.dimensions();
        let orientation = decoder
            .orientation()
            .unwrap_or(Orientation::NoTransforms);
        if swaps_axes(orientation) {
            Ok(Dimensions {
                width: height,
                height: width,
            })
        } else {
            Ok(Dimensions { width, height })
        }
    }

    fn transcode(
        &self,
        source: &Path,
        params: &TranscodeParams,
    ) -> Result<Transcoded, BackendError> {
        let rgb = flatten(load_oriented(source)?);
        let source_dims = (rgb.width(), rgb.height());

        let mut variants = Vec::with_capacity(SizeTier::ALL.len());
        for tier in SizeTier::ALL {
            let max_edge = params.tiers.max_for(tier);
            let (bytes, dims) = if needs_downscale(source_dims, max_edge) {
                let (w, h) = fit_within(source_dims, max_edge);
                let resized = image::imageops::resize(&rgb, w, h, FilterType::Lanczos3);
                (encode_jpeg(&resized, params.quality, tier)?, (w, h))
            } else {
                (encode_jpeg(&rgb, params.quality, tier)?, source_dims)
            };
            variants.push(EncodedVariant {
                tier,
                dimensions: dims.into(),
                bytes,
            });
        }

        Ok(Transcoded {
            source: source_dims.into(),
            variants,
        })
    }
}
