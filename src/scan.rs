//! Album discovery and change detection.
//!
//! Stage 1 of the pipeline. Walks the photos root one level deep; every
//! visible subdirectory is an album, every supported image directly inside it
//! is a photo.
//!
//! ## Directory Structure
//!
//! ```text
//! photos/                          # Photos root
//! ├── Summer in Lisbon/            # Album → id `summer-in-lisbon`
//! │   ├── album.yaml               # Overrides (optional)
//! │   ├── IMG_2041.JPG             # Photo → id `img2041`
//! │   └── IMG_2042.png
//! ├── Winter/
//! │   ├── album.txt                # Line 1 title, line 2 description
//! │   └── snow.tiff
//! └── .derived/                    # Hidden: staged variants, never scanned
//! ```
//!
//! ## Overrides
//!
//! `album.yaml` takes priority over `album.txt`. Recognised YAML keys: `title`,
//! `description`, `date`, `location`, `tags`, `camera`, `cover_photo`.
//!
//! ## Validation
//!
//! Configuration errors abort the scan:
//! - Two album directories slugify to the same id
//! - Two photos in one album slugify to the same id
//! - A directory or file name slugifies to nothing
//! - `--album` names an album that does not exist
//!
//! ## Change detection
//!
//! Each photo carries a [`VariantState`] computed from the staged variants
//! under the derived root: all present and newer than the source means
//! [`VariantState::Current`].

use crate::imaging::{SizeTier, is_supported_photo};
use crate::naming::{is_valid_id, slugify};
use crate::storage::VariantKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use walkdir::WalkDir;

pub const ALBUM_YAML: &str = "album.yaml";
pub const ALBUM_TXT: &str = "album.txt";

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("photos directory does not exist: {0}")]
    MissingRoot(PathBuf),
    #[error("albums {first:?} and {second:?} both map to id {id:?}")]
    AlbumIdCollision {
        id: String,
        first: String,
        second: String,
    },
    #[error("photos {first:?} and {second:?} in album {album:?} both map to id {id:?}")]
    PhotoIdCollision {
        album: String,
        id: String,
        first: String,
        second: String,
    },
    #[error("{0:?} does not produce a usable id")]
    EmptyId(PathBuf),
    #[error("no album named {0:?}")]
    AlbumNotFound(String),
    #[error("invalid {path}: {message}")]
    Overrides { path: PathBuf, message: String },
}

/// Per-album metadata supplied by the operator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AlbumOverrides {
    pub title: Option<String>,
    pub description: Option<String>,
    pub date: Option<String>,
    pub location: Option<String>,
    pub tags: Vec<String>,
    /// Free-form camera note for the album.
    pub camera: Option<String>,
    pub cover_photo: Option<String>,
}

/// Source-file identity used to notice replaced or edited photos.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    /// Modification time, seconds since the Unix epoch.
    pub modified: i64,
    pub size: u64,
}

impl Fingerprint {
    pub fn of(meta: &fs::Metadata) -> Self {
        Self {
            modified: meta.modified().map(unix_seconds).unwrap_or(0),
            size: meta.len(),
        }
    }
}

/// State of a photo's staged variants relative to its source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariantState {
    /// No variant staged yet.
    Missing,
    /// Some variants missing, or older than the source.
    Stale,
    /// All variants present and at least as new as the source.
    Current,
}

#[derive(Debug, Clone)]
pub struct SourcePhoto {
    pub id: String,
    pub filename: String,
    pub path: PathBuf,
    pub fingerprint: Fingerprint,
    pub variants: VariantState,
}

#[derive(Debug, Clone)]
pub struct AlbumSource {
    pub id: String,
    /// Directory base name; the default title.
    pub dir_name: String,
    pub path: PathBuf,
    pub overrides: AlbumOverrides,
    /// Override date, else directory modification date (`YYYY-MM-DD`).
    pub date: Option<String>,
    /// Sorted by filename.
    pub photos: Vec<SourcePhoto>,
}

impl AlbumSource {
    pub fn title(&self) -> &str {
        self.overrides.title.as_deref().unwrap_or(&self.dir_name)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    /// Restrict the scan to one album, by directory name or id.
    pub album: Option<String>,
}

/// Discover albums under `root`, checking staged variants under `derived_root`.
///
/// Albums come back sorted by directory name; the manifest imposes its own
/// display order.
pub fn scan(
    root: &Path,
    derived_root: &Path,
    options: &ScanOptions,
) -> Result<Vec<AlbumSource>, ScanError> {
    if !root.is_dir() {
        return Err(ScanError::MissingRoot(root.to_path_buf()));
    }

    let mut by_id: BTreeMap<String, (String, PathBuf)> = BTreeMap::new();
    for entry in WalkDir::new(root)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry?;
        if !entry.file_type().is_dir() || is_hidden(entry.path()) {
            continue;
        }
        let dir_name = entry.file_name().to_string_lossy().to_string();
        let id = slugify(&dir_name);
        if !is_valid_id(&id) {
            return Err(ScanError::EmptyId(entry.path().to_path_buf()));
        }
        if let Some((first, _)) = by_id.get(&id) {
            return Err(ScanError::AlbumIdCollision {
                id,
                first: first.clone(),
                second: dir_name,
            });
        }
        by_id.insert(id, (dir_name, entry.path().to_path_buf()));
    }

    if let Some(wanted) = &options.album {
        let wanted_id = slugify(wanted);
        by_id.retain(|id, (dir_name, _)| dir_name == wanted || *id == wanted_id);
        if by_id.is_empty() {
            return Err(ScanError::AlbumNotFound(wanted.clone()));
        }
    }

    let mut albums: Vec<AlbumSource> = by_id
        .into_iter()
        .map(|(id, (dir_name, path))| scan_album(id, dir_name, path, derived_root))
        .collect::<Result<_, _>>()?;
    albums.sort_by(|a, b| a.dir_name.cmp(&b.dir_name));
    Ok(albums)
}

fn scan_album(
    id: String,
    dir_name: String,
    path: PathBuf,
    derived_root: &Path,
) -> Result<AlbumSource, ScanError> {
    let overrides = read_overrides(&path)?;
    let date = match &overrides.date {
        Some(date) => Some(date.clone()),
        None => fs::metadata(&path)?.modified().ok().map(format_date),
    };

    let mut photos: Vec<SourcePhoto> = Vec::new();
    let mut ids: BTreeMap<String, String> = BTreeMap::new();
    for entry in WalkDir::new(&path)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry?;
        if !entry.file_type().is_file() || is_hidden(entry.path()) {
            continue;
        }
        if !is_supported_photo(entry.path()) {
            continue;
        }

        let filename = entry.file_name().to_string_lossy().to_string();
        let stem = entry
            .path()
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let photo_id = slugify(&stem);
        if !is_valid_id(&photo_id) {
            return Err(ScanError::EmptyId(entry.path().to_path_buf()));
        }
        if let Some(first) = ids.get(&photo_id) {
            return Err(ScanError::PhotoIdCollision {
                album: id,
                id: photo_id,
                first: first.clone(),
                second: filename,
            });
        }
        ids.insert(photo_id.clone(), filename.clone());

        let meta = entry.metadata()?;
        let variants = variant_state(derived_root, &id, &photo_id, &meta)?;
        photos.push(SourcePhoto {
            id: photo_id,
            filename,
            path: entry.path().to_path_buf(),
            fingerprint: Fingerprint::of(&meta),
            variants,
        });
    }

    Ok(AlbumSource {
        id,
        dir_name,
        path,
        overrides,
        date,
        photos,
    })
}

/// Read `album.yaml`, else `album.txt`, else defaults.
pub fn read_overrides(album_dir: &Path) -> Result<AlbumOverrides, ScanError> {
    let yaml_path = album_dir.join(ALBUM_YAML);
    if yaml_path.is_file() {
        let content = fs::read_to_string(&yaml_path)?;
        if content.trim().is_empty() {
            return Ok(AlbumOverrides::default());
        }
        return serde_yaml::from_str(&content).map_err(|e| ScanError::Overrides {
            path: yaml_path,
            message: e.to_string(),
        });
    }

    let txt_path = album_dir.join(ALBUM_TXT);
    if txt_path.is_file() {
        let content = fs::read_to_string(&txt_path)?;
        let mut lines = content.lines().map(str::trim);
        let non_empty = |s: Option<&str>| s.filter(|s| !s.is_empty()).map(str::to_string);
        return Ok(AlbumOverrides {
            title: non_empty(lines.next()),
            description: non_empty(lines.next()),
            ..Default::default()
        });
    }

    Ok(AlbumOverrides::default())
}

/// Compare staged variants against the source's modification time.
pub fn variant_state(
    derived_root: &Path,
    album_id: &str,
    photo_id: &str,
    source: &fs::Metadata,
) -> Result<VariantState, ScanError> {
    let source_modified = source.modified()?;
    let mut present = 0;
    let mut stale = false;

    for tier in SizeTier::ALL {
        let staged = VariantKey::new(album_id, photo_id, tier).staged_path(derived_root);
        match fs::metadata(&staged) {
            Ok(meta) => {
                present += 1;
                if meta.modified()? < source_modified {
                    stale = true;
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }

    Ok(match present {
        0 => VariantState::Missing,
        n if n < SizeTier::ALL.len() || stale => VariantState::Stale,
        _ => VariantState::Current,
    })
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.'))
}

fn unix_seconds(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_secs() as i64,
        Err(e) => -(e.duration().as_secs() as i64),
    }
}

fn format_date(time: SystemTime) -> String {
    chrono::DateTime::<chrono::Utc>::from(time)
        .format("%Y-%m-%d")
        .to_string()
}
