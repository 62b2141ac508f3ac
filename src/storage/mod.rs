//! Where derived variants go and how they are addressed.
//!
//! Every backend stages encoded variants on local disk under the derived root:
//!
//! ```text
//! <derived_root>/<album_id>/<tier>/<photo_id>.jpg
//! ```
//!
//! Those staged files are also the change-detection ledger the scanner reads:
//! a photo is up to date when all three tier files exist and are newer than
//! its source. Backends therefore only stage a variant once it has been
//! delivered.
//!
//! - [`LocalBackend`]: the staged file is the deliverable. The site's static
//!   tree gets a symlink to the derived root; URLs are site-relative.
//! - [`RemoteBackend`]: the variant is uploaded to an [`ObjectStore`] (with a
//!   content-addressable skip and bounded retry) before being staged; URLs
//!   point at the public base of the bucket.

pub mod local;
pub mod remote;
pub mod s3;

pub use local::LocalBackend;
pub use remote::{ObjectStore, RemoteBackend, RemoteObject, RetryPolicy};
pub use s3::S3ObjectStore;

use crate::imaging::SizeTier;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{path} exists and is not a symlink; refusing to replace it")]
    LinkOccupied { path: PathBuf },
    #[error("object store request for {key} failed: {message}")]
    Remote { key: String, message: String },
    #[error("upload of {key} failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        key: String,
        attempts: u32,
        last: Box<StorageError>,
    },
}

/// Identifies one derived variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VariantKey {
    pub album_id: String,
    pub photo_id: String,
    pub tier: SizeTier,
}

impl VariantKey {
    pub fn new(album_id: &str, photo_id: &str, tier: SizeTier) -> Self {
        Self {
            album_id: album_id.to_string(),
            photo_id: photo_id.to_string(),
            tier,
        }
    }

    /// `<album_id>/<tier>/<photo_id>.jpg`, always with forward slashes.
    pub fn relative_path(&self) -> String {
        format!("{}/{}/{}.jpg", self.album_id, self.tier, self.photo_id)
    }

    /// Object-store key: `albums/<album_id>/<tier>/<photo_id>.jpg`.
    pub fn object_key(&self) -> String {
        format!("albums/{}", self.relative_path())
    }

    /// Staged location under the derived root.
    pub fn staged_path(&self, derived_root: &Path) -> PathBuf {
        derived_root
            .join(&self.album_id)
            .join(self.tier.as_str())
            .join(format!("{}.jpg", self.photo_id))
    }
}

/// Outcome of publishing one variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub url: String,
    /// Whether bytes were sent to a remote store on this call.
    pub uploaded: bool,
    /// Whether a remote upload was skipped because identical content was there.
    pub unchanged_remote: bool,
}

/// Destination for derived variants.
pub trait StorageBackend: Sync {
    /// One-time setup before any variant is published (links, buckets).
    fn prepare(&self) -> Result<(), StorageError>;

    /// Deliver `bytes` for `key` and return its public URL.
    fn publish(&self, key: &VariantKey, bytes: &[u8]) -> Result<Published, StorageError>;

    /// Public URL for `key`, without touching storage.
    fn url_for(&self, key: &VariantKey) -> String;

    /// Root under which variants are staged locally.
    fn derived_root(&self) -> &Path;
}

/// Write `bytes` to `path` via a sibling temp file and rename.
///
/// A crash mid-write leaves either the old file or none, never a truncated
/// file with a fresh modification time that change detection would trust.
pub fn write_staged(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent)?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| StorageError::Io(e.error))?;
    Ok(())
}

/// Build the configured backend.
pub fn from_config(
    config: &crate::config::PipelineConfig,
    runtime: &tokio::runtime::Handle,
) -> Box<dyn StorageBackend> {
    use crate::config::BackendKind;

    let derived_root = config.derived_root();
    match config.storage.backend {
        BackendKind::Local => Box::new(LocalBackend::new(
            derived_root,
            config.site_path(&config.storage.local.static_link),
            &config.storage.local.url_prefix,
        )),
        BackendKind::Remote => {
            let remote = &config.storage.remote;
            let store = S3ObjectStore::connect(remote, runtime.clone());
            Box::new(RemoteBackend::new(
                store,
                derived_root,
                &remote.public_base_url,
                RetryPolicy::from_config(remote),
            ))
        }
    }
}
