//! Image transcoding in pure Rust.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | decoder dimensions, orientation applied |
//! | **Transcode** | decode once, orient, flatten, Lanczos3 per tier, JPEG |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing what to produce
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]

pub mod backend;
mod calculations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, EncodedVariant, ImageBackend, Transcoded};
pub use calculations::fit_within;
pub use params::{Quality, SizeTier, TierWidths, TranscodeParams};
pub use rust_backend::{RustBackend, is_supported_photo, supported_input_extensions};
