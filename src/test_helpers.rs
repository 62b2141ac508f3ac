//! Shared test utilities.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tree = PhotoTree::new();
//! tree.album("Lisbon", &["a.jpg", "b.jpg"], Some("2024-06-01"));
//! let config = tree.config();
//! ```

use crate::config::PipelineConfig;
use image::{ImageBuffer, Rgb};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

// =========================================================================
// Files
// =========================================================================

/// Write a real gradient JPEG of the given size, creating parent dirs.
pub fn write_jpeg(path: &Path, width: u32, height: u32) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    let img = ImageBuffer::from_fn(width, height, |x, y| {
        Rgb([(x * 255 / width.max(1)) as u8, (y * 255 / height.max(1)) as u8, 128])
    });
    img.save(path).unwrap();
}

/// Write a JPEG whose stored pixels are `width`x`height`, tagged with an
/// EXIF Orientation value (1-8) in an APP1 segment right after SOI.
pub fn write_oriented_jpeg(path: &Path, width: u32, height: u32, orientation: u16) {
    let tmp = TempDir::new().unwrap();
    let plain = tmp.path().join("plain.jpg");
    write_jpeg(&plain, width, height);
    let jpeg = std::fs::read(&plain).unwrap();
    assert_eq!(&jpeg[..2], &[0xFF, 0xD8], "not a JPEG");

    // Big-endian TIFF header, one IFD entry: 0x0112 SHORT x1.
    let mut exif = b"Exif\0\0MM\0\x2A\0\0\0\x08\0\x01\x01\x12\0\x03\0\0\0\x01".to_vec();
    exif.extend_from_slice(&orientation.to_be_bytes());
    exif.extend_from_slice(&[0, 0, 0, 0, 0, 0]);

    let mut out = vec![0xFF, 0xD8, 0xFF, 0xE1];
    out.extend_from_slice(&((exif.len() + 2) as u16).to_be_bytes());
    out.extend_from_slice(&exif);
    out.extend_from_slice(&jpeg[2..]);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, out).unwrap();
}

/// Set a file or directory's modification time.
pub fn set_mtime(path: &Path, time: SystemTime) {
    std::fs::File::open(path)
        .unwrap()
        .set_modified(time)
        .unwrap();
}

// =========================================================================
// Photo trees
// =========================================================================

/// A temp dir holding `photos/` and `site/`, with placeholder source files.
///
/// Sources are not decodable images: they pair with `MockBackend`. Their
/// mtimes are set a day back so variants staged during a test are always
/// newer.
pub struct PhotoTree {
    tmp: TempDir,
}

impl PhotoTree {
    pub fn new() -> Self {
        let tree = Self {
            tmp: TempDir::new().unwrap(),
        };
        std::fs::create_dir_all(tree.photos()).unwrap();
        std::fs::create_dir_all(tree.site()).unwrap();
        tree
    }

    pub fn photos(&self) -> PathBuf {
        self.tmp.path().join("photos")
    }

    pub fn site(&self) -> PathBuf {
        self.tmp.path().join("site")
    }

    /// Create an album directory with placeholder photos and an optional date.
    pub fn album(&self, dir: &str, files: &[&str], date: Option<&str>) {
        let path = self.photos().join(dir);
        std::fs::create_dir_all(&path).unwrap();
        if let Some(date) = date {
            std::fs::write(path.join("album.yaml"), format!("date: \"{date}\"\n")).unwrap();
        }
        for file in files {
            self.add_photo(dir, file);
        }
    }

    pub fn add_photo(&self, dir: &str, file: &str) {
        let path = self.photos().join(dir).join(file);
        std::fs::write(&path, format!("source {file}")).unwrap();
        set_mtime(&path, SystemTime::now() - Duration::from_secs(86_400));
    }

    /// Config rooted in this tree, with metadata extraction off.
    pub fn config(&self) -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.photos_dir = self.photos();
        config.site_root = self.site();
        config.metadata.exiftool = String::new();
        config.processing.max_processes = Some(2);
        config
    }
}
