//! Remote storage: upload to an object store, then stage locally.
//!
//! Uploads are content-addressable: each object carries the SHA-256 of its
//! bytes in user metadata (`sha256`). Before uploading, the backend asks the
//! store for the object's size and hash and skips the transfer when both
//! match. JPEG encoding is deterministic, so a forced re-run over unchanged
//! sources re-encodes but uploads nothing.
//!
//! Failed store calls are retried up to `max_attempts` times with exponential
//! backoff. The variant is staged locally only after the store accepted it, so
//! a photo whose upload failed still counts as changed on the next run.

use super::{Published, StorageBackend, StorageError, VariantKey, write_staged};
use crate::config::RemoteStorageConfig;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONTENT_TYPE: &str = "image/jpeg";

/// What the store knows about an existing object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteObject {
    pub size: u64,
    pub sha256: Option<String>,
}

/// Minimal object-store surface the backend needs.
pub trait ObjectStore: Sync {
    /// Size and content hash of `key`, or `None` if absent.
    fn head(&self, key: &str) -> Result<Option<RemoteObject>, StorageError>;

    /// Store `bytes` at `key`, tagging the object with `sha256`.
    fn put(
        &self,
        key: &str,
        bytes: &[u8],
        content_type: &str,
        sha256: &str,
    ) -> Result<(), StorageError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &RemoteStorageConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            backoff: Duration::from_millis(config.backoff_ms),
        }
    }

    /// Delay after the `attempt`-th failure (1-based): backoff, 2x, 4x, ...
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        self.backoff.saturating_mul(factor)
    }
}

/// SHA-256 of `bytes` as lowercase hex.
pub fn content_hash(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

pub struct RemoteBackend<S> {
    store: S,
    derived_root: PathBuf,
    public_base_url: String,
    retry: RetryPolicy,
}

impl<S: ObjectStore> RemoteBackend<S> {
    pub fn new(store: S, derived_root: PathBuf, public_base_url: &str, retry: RetryPolicy) -> Self {
        Self {
            store,
            derived_root,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
            retry,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Upload unless identical content is already at `key`. Returns whether
    /// bytes were sent.
    fn upload_if_changed(&self, key: &str, bytes: &[u8], hash: &str) -> Result<bool, StorageError> {
        if let Some(existing) = self.store.head(key)?
            && existing.size == bytes.len() as u64
            && existing.sha256.as_deref() == Some(hash)
        {
            tracing::debug!(key, "remote object unchanged, skipping upload");
            return Ok(false);
        }
        self.store.put(key, bytes, CONTENT_TYPE, hash)?;
        tracing::debug!(key, size = bytes.len(), "uploaded");
        Ok(true)
    }

    fn upload_with_retry(&self, key: &str, bytes: &[u8]) -> Result<bool, StorageError> {
        let hash = content_hash(bytes);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.upload_if_changed(key, bytes, &hash) {
                Ok(uploaded) => return Ok(uploaded),
                Err(e) if attempt >= self.retry.max_attempts => {
                    return Err(StorageError::RetriesExhausted {
                        key: key.to_string(),
                        attempts: attempt,
                        last: Box::new(e),
                    });
                }
                Err(e) => {
                    let delay = self.retry.delay_after(attempt);
                    tracing::warn!(
                        key,
                        attempt,
                        max_attempts = self.retry.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "upload failed, retrying"
                    );
                    std::thread::sleep(delay);
                }
            }
        }
    }
}

impl<S: ObjectStore> StorageBackend for RemoteBackend<S> {
    fn prepare(&self) -> Result<(), StorageError> {
        std::fs::create_dir_all(&self.derived_root)?;
        Ok(())
    }

    fn publish(&self, key: &VariantKey, bytes: &[u8]) -> Result<Published, StorageError> {
        let uploaded = self.upload_with_retry(&key.object_key(), bytes)?;
        write_staged(&key.staged_path(&self.derived_root), bytes)?;
        Ok(Published {
            url: self.url_for(key),
            uploaded,
            unchanged_remote: !uploaded,
        })
    }

    fn url_for(&self, key: &VariantKey) -> String {
        format!("{}/{}", self.public_base_url, key.object_key())
    }

    fn derived_root(&self) -> &Path {
        &self.derived_root
    }
}
