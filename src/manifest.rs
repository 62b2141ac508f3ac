//! The album manifest: the site generator's only view of the photos.
//!
//! Written as YAML (`data/albums.yaml` by default) so Hugo can read it as a
//! data file. Field order follows the struct definitions and collections are
//! sorted before serialization, so the same inputs always produce the same
//! bytes regardless of the order workers finished in.
//!
//! ## Ordering
//!
//! - Albums: date descending (undated albums last), then id ascending.
//! - Photos within an album: source filename, then id.
//!
//! ## Merging
//!
//! A run does not always touch every album or photo. [`ManifestBuilder`]
//! starts either empty or from the prior manifest and has albums replaced
//! wholesale, so albums outside a single-album run survive untouched.
//!
//! ## Durability
//!
//! [`write_atomic`] writes to a temp file in the destination directory and
//! renames it over the old manifest. An interrupted or failed write leaves the
//! previous manifest byte-for-byte intact.

use crate::imaging::SizeTier;
use crate::metadata::PhotoMetadata;
use crate::scan::Fingerprint;
use crate::storage::VariantKey;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const SCHEMA_VERSION: u32 = 1;

const HEADER: &str = "# Generated by photoblog. Edits are overwritten on the next run.\n";

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("manifest is not valid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("manifest schema version {found} is not supported (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub schema_version: u32,
    pub albums: Vec<AlbumRecord>,
}

impl Default for Manifest {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            albums: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlbumRecord {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_photo: Option<String>,
    pub photos: Vec<PhotoRecord>,
}

impl AlbumRecord {
    pub fn photo(&self, id: &str) -> Option<&PhotoRecord> {
        self.photos.iter().find(|p| p.id == id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoRecord {
    pub id: String,
    pub filename: String,
    /// Source dimensions, orientation applied.
    pub width: u32,
    pub height: u32,
    pub sizes: SizeSet,
    #[serde(default, skip_serializing_if = "PhotoMetadata::is_empty")]
    pub exif: PhotoMetadata,
    pub fingerprint: Fingerprint,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeSet {
    pub original: SizeVariant,
    pub medium: SizeVariant,
    pub thumbnail: SizeVariant,
}

impl SizeSet {
    pub fn get(&self, tier: SizeTier) -> &SizeVariant {
        match tier {
            SizeTier::Original => &self.original,
            SizeTier::Medium => &self.medium,
            SizeTier::Thumbnail => &self.thumbnail,
        }
    }

    /// Build from a per-tier constructor, or fail with its first error.
    pub fn try_from_fn<E>(
        mut f: impl FnMut(SizeTier) -> Result<SizeVariant, E>,
    ) -> Result<Self, E> {
        Ok(Self {
            original: f(SizeTier::Original)?,
            medium: f(SizeTier::Medium)?,
            thumbnail: f(SizeTier::Thumbnail)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeVariant {
    pub url: String,
    pub width: u32,
    pub height: u32,
}

impl Manifest {
    /// Load the manifest at `path`. A missing file is `Ok(None)`.
    pub fn load(path: &Path) -> Result<Option<Self>, ManifestError> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let manifest: Manifest = serde_yaml::from_str(&content)?;
        if manifest.schema_version != SCHEMA_VERSION {
            return Err(ManifestError::UnsupportedVersion {
                found: manifest.schema_version,
                expected: SCHEMA_VERSION,
            });
        }
        Ok(Some(manifest))
    }

    pub fn album(&self, id: &str) -> Option<&AlbumRecord> {
        self.albums.iter().find(|a| a.id == id)
    }

    pub fn photo_count(&self) -> usize {
        self.albums.iter().map(|a| a.photos.len()).sum()
    }

    pub fn to_yaml(&self) -> Result<String, ManifestError> {
        Ok(format!("{HEADER}{}", serde_yaml::to_string(self)?))
    }
}

/// Accumulates album records and emits a deterministically ordered manifest.
#[derive(Debug, Default)]
pub struct ManifestBuilder {
    albums: BTreeMap<String, AlbumRecord>,
}

impl ManifestBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from every album of `prior`.
    pub fn retaining(prior: Manifest) -> Self {
        Self {
            albums: prior
                .albums
                .into_iter()
                .map(|a| (a.id.clone(), a))
                .collect(),
        }
    }

    /// Insert `album`, replacing any record with the same id.
    pub fn upsert(&mut self, album: AlbumRecord) {
        self.albums.insert(album.id.clone(), album);
    }

    pub fn remove(&mut self, id: &str) -> Option<AlbumRecord> {
        self.albums.remove(id)
    }

    pub fn build(self) -> Manifest {
        let mut albums: Vec<AlbumRecord> = self.albums.into_values().collect();
        for album in &mut albums {
            sort_photos(&mut album.photos);
        }
        albums.sort_by(album_order);
        Manifest {
            schema_version: SCHEMA_VERSION,
            albums,
        }
    }
}

/// Newest first; undated albums last; ties broken by id.
fn album_order(a: &AlbumRecord, b: &AlbumRecord) -> Ordering {
    match (&a.date, &b.date) {
        (Some(x), Some(y)) => y.cmp(x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
    .then_with(|| a.id.cmp(&b.id))
}

pub fn sort_photos(photos: &mut [PhotoRecord]) {
    photos.sort_by(|a, b| a.filename.cmp(&b.filename).then_with(|| a.id.cmp(&b.id)));
}

/// A manifest entry dropped because a staged variant is gone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingAsset {
    pub album_id: String,
    pub photo_id: String,
    pub path: PathBuf,
}

/// Drop photo records whose staged variants are not all on disk, then any
/// album left without photos. Returns what was dropped.
pub fn verify_assets(manifest: &mut Manifest, derived_root: &Path) -> Vec<MissingAsset> {
    let mut missing = Vec::new();
    for album in &mut manifest.albums {
        let album_id = album.id.clone();
        album.photos.retain(|photo| {
            let absent = SizeTier::ALL
                .iter()
                .map(|&tier| VariantKey::new(&album_id, &photo.id, tier).staged_path(derived_root))
                .find(|path| !path.is_file());
            match absent {
                Some(path) => {
                    tracing::warn!(
                        album = %album_id,
                        photo = %photo.id,
                        path = %path.display(),
                        "staged variant missing, dropping entry"
                    );
                    missing.push(MissingAsset {
                        album_id: album_id.clone(),
                        photo_id: photo.id.clone(),
                        path,
                    });
                    false
                }
                None => true,
            }
        });
    }
    manifest.albums.retain(|a| !a.photos.is_empty());
    missing
}

/// Replace `path` atomically with whatever `fill` writes.
///
/// `fill` writes into a temp file beside `path`; only if it succeeds and the
/// data is synced is the temp file renamed over `path`. On any error the temp
/// file is removed and `path` is left as it was.
pub fn write_atomic<F>(path: &Path, fill: F) -> Result<(), ManifestError>
where
    F: FnOnce(&mut dyn Write) -> io::Result<()>,
{
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    fill(&mut tmp)?;
    tmp.flush()?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| ManifestError::Io(e.error))?;
    Ok(())
}

/// Serialize and atomically write `manifest` unless the file already holds
/// identical bytes. Returns whether the file changed.
pub fn write_manifest(path: &Path, manifest: &Manifest) -> Result<bool, ManifestError> {
    let yaml = manifest.to_yaml()?;
    if std::fs::read(path).is_ok_and(|existing| existing == yaml.as_bytes()) {
        return Ok(false);
    }
    write_atomic(path, |w| w.write_all(yaml.as_bytes()))?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn variant(url: &str) -> SizeVariant {
        SizeVariant {
            url: url.to_string(),
            width: 10,
            height: 8,
        }
    }

    fn photo(id: &str, filename: &str) -> PhotoRecord {
        PhotoRecord {
            id: id.to_string(),
            filename: filename.to_string(),
            width: 100,
            height: 80,
            sizes: SizeSet {
                original: variant(&format!("/photos/a/original/{id}.jpg")),
                medium: variant(&format!("/photos/a/medium/{id}.jpg")),
                thumbnail: variant(&format!("/photos/a/thumbnail/{id}.jpg")),
            },
            exif: PhotoMetadata::default(),
            fingerprint: Fingerprint {
                modified: 1,
                size: 2,
            },
        }
    }

    fn album(id: &str, date: Option<&str>, photos: Vec<PhotoRecord>) -> AlbumRecord {
        AlbumRecord {
            id: id.to_string(),
            title: id.to_uppercase(),
            description: None,
            date: date.map(str::to_string),
            location: None,
            tags: Vec::new(),
            camera: None,
            cover_photo: None,
            photos,
        }
    }

    fn ids(manifest: &Manifest) -> Vec<&str> {
        manifest.albums.iter().map(|a| a.id.as_str()).collect()
    }

    // =========================================================================
    // Ordering
    // =========================================================================

    #[test]
    fn albums_newest_first_undated_last_ties_by_id() {
        let mut builder = ManifestBuilder::new();
        builder.upsert(album("undated", None, vec![]));
        builder.upsert(album("b-old", Some("2022-01-01"), vec![]));
        builder.upsert(album("z-new", Some("2024-06-01"), vec![]));
        builder.upsert(album("a-new", Some("2024-06-01"), vec![]));

        let manifest = builder.build();
        assert_eq!(ids(&manifest), vec!["a-new", "z-new", "b-old", "undated"]);
    }

    #[test]
    fn photos_sorted_by_filename_regardless_of_insert_order() {
        let mut builder = ManifestBuilder::new();
        builder.upsert(album(
            "a",
            None,
            vec![photo("c", "c.jpg"), photo("a", "a.jpg"), photo("b", "b.jpg")],
        ));
        let manifest = builder.build();
        let photo_ids: Vec<&str> = manifest.albums[0]
            .photos
            .iter()
            .map(|p| p.id.as_str())
            .collect();
        assert_eq!(photo_ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn serialization_is_deterministic() {
        let build = |order: &[&str]| {
            let mut builder = ManifestBuilder::new();
            for id in order {
                builder.upsert(album(id, Some("2024-01-01"), vec![photo("p", "p.jpg")]));
            }
            builder.build().to_yaml().unwrap()
        };
        assert_eq!(build(&["x", "y", "z"]), build(&["z", "x", "y"]));
    }

    #[test]
    fn yaml_omits_absent_fields_and_keeps_field_order() {
        let mut builder = ManifestBuilder::new();
        builder.upsert(album("a", Some("2024-01-01"), vec![photo("p", "p.jpg")]));
        let yaml = builder.build().to_yaml().unwrap();

        assert!(yaml.starts_with("# Generated by photoblog"));
        assert!(!yaml.contains("description"));
        assert!(!yaml.contains("exif"));
        let schema = yaml.find("schema_version").unwrap();
        let albums = yaml.find("albums:").unwrap();
        let thumb = yaml.find("thumbnail:").unwrap();
        let medium = yaml.find("medium:").unwrap();
        assert!(schema < albums);
        assert!(medium < thumb);
    }

    // =========================================================================
    // Merging
    // =========================================================================

    #[test]
    fn retaining_keeps_untouched_albums() {
        let mut prior = ManifestBuilder::new();
        prior.upsert(album("kept", Some("2020-01-01"), vec![photo("k", "k.jpg")]));
        prior.upsert(album("redone", Some("2021-01-01"), vec![photo("old", "old.jpg")]));
        let prior = prior.build();
        let kept_before = prior.album("kept").unwrap().clone();

        let mut builder = ManifestBuilder::retaining(prior);
        builder.upsert(album("redone", Some("2021-01-01"), vec![photo("new", "new.jpg")]));
        let manifest = builder.build();

        assert_eq!(manifest.album("kept").unwrap(), &kept_before);
        let redone = manifest.album("redone").unwrap();
        assert!(redone.photo("old").is_none());
        assert!(redone.photo("new").is_some());
    }

    // =========================================================================
    // Load / write
    // =========================================================================

    #[test]
    fn load_missing_file_is_none() {
        let tmp = TempDir::new().unwrap();
        assert!(Manifest::load(&tmp.path().join("albums.yaml")).unwrap().is_none());
    }

    #[test]
    fn write_then_load_preserves_content() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("data/albums.yaml");
        let mut builder = ManifestBuilder::new();
        builder.upsert(album("a", Some("2024-01-01"), vec![photo("p", "p.jpg")]));
        let manifest = builder.build();

        assert!(write_manifest(&path, &manifest).unwrap());
        assert_eq!(Manifest::load(&path).unwrap().unwrap(), manifest);
    }

    #[test]
    fn identical_manifest_is_not_rewritten() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("albums.yaml");
        let manifest = ManifestBuilder::new().build();
        assert!(write_manifest(&path, &manifest).unwrap());
        assert!(!write_manifest(&path, &manifest).unwrap());
    }

    #[test]
    fn corrupt_manifest_is_yaml_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("albums.yaml");
        std::fs::write(&path, "albums: [unclosed").unwrap();
        assert!(matches!(Manifest::load(&path), Err(ManifestError::Yaml(_))));
    }

    #[test]
    fn future_schema_version_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("albums.yaml");
        std::fs::write(&path, "schema_version: 99\nalbums: []\n").unwrap();
        assert!(matches!(
            Manifest::load(&path),
            Err(ManifestError::UnsupportedVersion { found: 99, .. })
        ));
    }

    #[test]
    fn interrupted_write_leaves_prior_manifest_intact() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("albums.yaml");
        std::fs::write(&path, "prior content\n").unwrap();

        let result = write_atomic(&path, |w| {
            w.write_all(b"half of the new")?;
            Err(io::Error::other("disk full"))
        });

        assert!(result.is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "prior content\n");
        let entries: Vec<_> = std::fs::read_dir(tmp.path()).unwrap().collect();
        assert_eq!(entries.len(), 1, "temp file left behind");
    }

    #[test]
    fn write_into_missing_directory_creates_it() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a/b/albums.yaml");
        write_atomic(&path, |w| w.write_all(b"x")).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"x");
    }

    // =========================================================================
    // Asset verification
    // =========================================================================

    #[test]
    fn entries_without_staged_files_are_dropped() {
        let tmp = TempDir::new().unwrap();
        let derived = tmp.path();
        for tier in SizeTier::ALL {
            let path = VariantKey::new("a", "ok", tier).staged_path(derived);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, b"x").unwrap();
        }
        let partial = VariantKey::new("a", "partial", SizeTier::Original).staged_path(derived);
        std::fs::write(partial, b"x").unwrap();

        let mut builder = ManifestBuilder::new();
        builder.upsert(album(
            "a",
            None,
            vec![photo("ok", "ok.jpg"), photo("partial", "partial.jpg")],
        ));
        builder.upsert(album("gone", None, vec![photo("x", "x.jpg")]));
        let mut manifest = builder.build();

        let missing = verify_assets(&mut manifest, derived);

        assert_eq!(missing.len(), 2);
        assert_eq!(ids(&manifest), vec!["a"]);
        assert_eq!(manifest.albums[0].photos.len(), 1);
        assert_eq!(manifest.albums[0].photos[0].id, "ok");
    }
}
