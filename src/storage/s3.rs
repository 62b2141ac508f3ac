//! S3-compatible object store (AWS S3, Cloudflare R2, Backblaze B2, MinIO).
//!
//! The SDK is async; the pipeline's workers are plain rayon threads, so each
//! call is driven to completion with [`Handle::block_on`] on a runtime owned by
//! `main`. Calls are independent, so several workers can be blocked on the
//! runtime at once.

use super::StorageError;
use super::remote::{ObjectStore, RemoteObject};
use crate::config::RemoteStorageConfig;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use tokio::runtime::Handle;

/// Object metadata key holding the content hash.
const SHA256_METADATA: &str = "sha256";

pub struct S3ObjectStore {
    client: aws_sdk_s3::Client,
    bucket: String,
    runtime: Handle,
}

impl S3ObjectStore {
    /// Build a client from the shared AWS config chain, overridden by any
    /// endpoint, region and static credentials set in `config`.
    pub fn connect(config: &RemoteStorageConfig, runtime: Handle) -> Self {
        let shared = runtime.block_on(aws_config::load_defaults(
            aws_config::BehaviorVersion::latest(),
        ));

        let mut builder = aws_sdk_s3::config::Builder::from(&shared);
        if !config.region.is_empty() {
            builder = builder.region(aws_sdk_s3::config::Region::new(config.region.clone()));
        }
        if !config.endpoint.is_empty() {
            builder = builder.endpoint_url(&config.endpoint).force_path_style(true);
        }
        if !config.access_key.is_empty() && !config.secret_key.is_empty() {
            builder = builder.credentials_provider(aws_sdk_s3::config::Credentials::new(
                config.access_key.clone(),
                config.secret_key.clone(),
                None,
                None,
                "photoblog-config",
            ));
        }

        tracing::debug!(
            bucket = %config.bucket,
            endpoint = %config.endpoint,
            "object store client ready"
        );
        Self {
            client: aws_sdk_s3::Client::from_conf(builder.build()),
            bucket: config.bucket.clone(),
            runtime,
        }
    }
}

impl ObjectStore for S3ObjectStore {
    fn head(&self, key: &str) -> Result<Option<RemoteObject>, StorageError> {
        let result = self.runtime.block_on(
            self.client
                .head_object()
                .bucket(&self.bucket)
                .key(key)
                .send(),
        );
        match result {
            Ok(resp) => Ok(Some(RemoteObject {
                size: resp.content_length().unwrap_or(0).max(0) as u64,
                sha256: resp
                    .metadata()
                    .and_then(|m| m.get(SHA256_METADATA))
                    .cloned(),
            })),
            Err(e) if e.as_service_error().is_some_and(|se| se.is_not_found()) => Ok(None),
            Err(e) => Err(StorageError::Remote {
                key: key.to_string(),
                message: format!("head_object: {}", DisplayErrorContext(&e)),
            }),
        }
    }

    fn put(
        &self,
        key: &str,
        bytes: &[u8],
        content_type: &str,
        sha256: &str,
    ) -> Result<(), StorageError> {
        self.runtime
            .block_on(
                self.client
                    .put_object()
                    .bucket(&self.bucket)
                    .key(key)
                    .content_type(content_type)
                    .metadata(SHA256_METADATA, sha256)
                    .body(ByteStream::from(bytes.to_vec()))
                    .send(),
            )
            .map(|_| ())
            .map_err(|e| StorageError::Remote {
                key: key.to_string(),
                message: format!("put_object: {}", DisplayErrorContext(&e)),
            })
    }
}
