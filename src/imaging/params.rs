//! Parameter types for transcoding.
//!
//! These describe *what* to produce, not *how*: the [`backend`](super::backend)
//! does the pixel work, so a mock backend can stand in during tests without
//! the orchestrator noticing.
//!
//! - [`Quality`]: JPEG encoding quality (1–100). Clamped on construction.
//! - [`SizeTier`]: the three named output resolutions.
//! - [`TierWidths`]: max longer-edge size for each tier.
//! - [`TranscodeParams`]: everything a backend needs for one source image.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(85)
    }
}

/// A named target resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeTier {
    Original,
    Medium,
    Thumbnail,
}

impl SizeTier {
    /// All tiers, largest first.
    pub const ALL: [SizeTier; 3] = [SizeTier::Original, SizeTier::Medium, SizeTier::Thumbnail];

    pub fn as_str(self) -> &'static str {
        match self {
            SizeTier::Original => "original",
            SizeTier::Medium => "medium",
            SizeTier::Thumbnail => "thumbnail",
        }
    }
}

impl fmt::Display for SizeTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Max longer-edge size per tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierWidths {
    pub original: u32,
    pub medium: u32,
    pub thumbnail: u32,
}

impl TierWidths {
    pub fn max_for(&self, tier: SizeTier) -> u32 {
        match tier {
            SizeTier::Original => self.original,
            SizeTier::Medium => self.medium,
            SizeTier::Thumbnail => self.thumbnail,
        }
    }
}

impl Default for TierWidths {
    fn default() -> Self {
        Self {
            original: 4000,
            medium: 1600,
            thumbnail: 400,
        }
    }
}

/// Everything a backend needs to transcode one source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TranscodeParams {
    pub tiers: TierWidths,
    pub quality: Quality,
}

impl TranscodeParams {
    pub fn from_config(config: &crate::config::PipelineConfig) -> Self {
        Self {
            tiers: TierWidths {
                original: config.sizes.original,
                medium: config.sizes.medium,
                thumbnail: config.sizes.thumbnail,
            },
            quality: Quality::new(config.images.quality),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_clamps_to_valid_range() {
        assert_eq!(Quality::new(0).value(), 1);
        assert_eq!(Quality::new(50).value(), 50);
        assert_eq!(Quality::new(150).value(), 100);
    }

    #[test]
    fn tier_names_are_stable() {
        let names: Vec<&str> = SizeTier::ALL.iter().map(|t| t.as_str()).collect();
        assert_eq!(names, vec!["original", "medium", "thumbnail"]);
        assert_eq!(SizeTier::Medium.to_string(), "medium");
    }

    #[test]
    fn params_follow_config() {
        let mut config = crate::config::PipelineConfig::default();
        config.sizes.medium = 1200;
        config.images.quality = 70;
        let params = TranscodeParams::from_config(&config);
        assert_eq!(params.tiers.max_for(SizeTier::Medium), 1200);
        assert_eq!(params.tiers.max_for(SizeTier::Original), 4000);
        assert_eq!(params.quality.value(), 70);
    }
}
