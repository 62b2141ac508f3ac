//! Local storage: variants live in the derived root, served via a symlink.

use super::{Published, StorageBackend, StorageError, VariantKey, write_staged};
use std::path::{Path, PathBuf};

/// Serves derived variants straight from disk.
///
/// `prepare` points `static_link` (inside the site tree) at the derived root,
/// so `<url_prefix>/<album_id>/<tier>/<photo_id>.jpg` resolves without copying.
pub struct LocalBackend {
    derived_root: PathBuf,
    static_link: PathBuf,
    url_prefix: String,
}

impl LocalBackend {
    pub fn new(derived_root: PathBuf, static_link: PathBuf, url_prefix: &str) -> Self {
        Self {
            derived_root,
            static_link,
            url_prefix: url_prefix.trim_end_matches('/').to_string(),
        }
    }

    pub fn static_link(&self) -> &Path {
        &self.static_link
    }
}

impl StorageBackend for LocalBackend {
    fn prepare(&self) -> Result<(), StorageError> {
        std::fs::create_dir_all(&self.derived_root)?;
        ensure_symlink(&self.derived_root, &self.static_link)
    }

    fn publish(&self, key: &VariantKey, bytes: &[u8]) -> Result<Published, StorageError> {
        write_staged(&key.staged_path(&self.derived_root), bytes)?;
        Ok(Published {
            url: self.url_for(key),
            uploaded: false,
            unchanged_remote: false,
        })
    }

    fn url_for(&self, key: &VariantKey) -> String {
        format!("{}/{}", self.url_prefix, key.relative_path())
    }

    fn derived_root(&self) -> &Path {
        &self.derived_root
    }
}

/// Make `link` a symlink to `target`. Idempotent.
///
/// A link that already points at `target` is left alone; a link pointing
/// elsewhere is replaced. A real file or directory at `link` is an error.
pub fn ensure_symlink(target: &Path, link: &Path) -> Result<(), StorageError> {
    match std::fs::symlink_metadata(link) {
        Ok(meta) if meta.file_type().is_symlink() => {
            if std::fs::read_link(link)? == target {
                return Ok(());
            }
            tracing::info!(
                link = %link.display(),
                target = %target.display(),
                "repointing symlink"
            );
            std::fs::remove_file(link)?;
        }
        Ok(_) => {
            return Err(StorageError::LinkOccupied {
                path: link.to_path_buf(),
            });
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }

    if let Some(parent) = link.parent() {
        std::fs::create_dir_all(parent)?;
    }
    create_dir_symlink(target, link)?;
    tracing::debug!(link = %link.display(), target = %target.display(), "created symlink");
    Ok(())
}

#[cfg(unix)]
fn create_dir_symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn create_dir_symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::windows::fs::symlink_dir(target, link)
}
