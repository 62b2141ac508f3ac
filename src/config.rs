//! Pipeline configuration.
//!
//! Settings come from three layers, later layers overriding earlier ones:
//!
//! 1. Stock defaults ([`PipelineConfig::default`])
//! 2. `photoblog.toml` in the site root (optional, sparse)
//! 3. Environment variables (`PHOTOS_DIR`, `JPEG_QUALITY`, `S3_BUCKET`, ...)
//!
//! Each layer is a `toml::Value`; they are merged with [`merge_toml`] and the
//! result is deserialized and validated once. The resulting [`PipelineConfig`]
//! is immutable and passed explicitly to every component.
//!
//! ## Configuration Options
//!
//! ```toml
//! photos_dir = "~/Pictures/albums"
//! manifest_path = "data/albums.yaml"   # relative to site_root
//!
//! [sizes]
//! original = 4000    # cap on the longer edge
//! medium = 1600
//! thumbnail = 400
//!
//! [images]
//! quality = 85       # JPEG quality (1-100)
//!
//! [storage]
//! backend = "local"  # or "remote"
//!
//! [storage.local]
//! derived_dir = ""               # empty = <photos_dir>/.derived
//! static_link = "static/photos"  # relative to site_root
//! url_prefix = "/photos"
//!
//! [storage.remote]
//! endpoint = "https://<account>.r2.cloudflarestorage.com"
//! bucket = "photos"
//! public_base_url = "https://cdn.example.com"
//! max_attempts = 3
//! backoff_ms = 500
//!
//! [metadata]
//! exiftool = "exiftool"
//! timeout_secs = 10
//!
//! [processing]
//! max_processes = 4  # omit for auto = CPU cores
//!
//! [site]
//! content_pages = true
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the config file looked up in the site root.
pub const CONFIG_FILENAME: &str = "photoblog.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid value for environment variable {name}: {value:?}")]
    Env { name: String, value: String },
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Full pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Root directory holding one subdirectory per album.
    pub photos_dir: PathBuf,
    /// Root of the static site (Hugo repository).
    pub site_root: PathBuf,
    /// Manifest location, relative to `site_root` unless absolute.
    pub manifest_path: PathBuf,
    pub sizes: SizesConfig,
    pub images: ImagesConfig,
    pub storage: StorageConfig,
    pub metadata: MetadataConfig,
    pub processing: ProcessingConfig,
    pub site: SiteConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            photos_dir: PathBuf::from("~/Pictures/albums"),
            site_root: PathBuf::from("."),
            manifest_path: PathBuf::from("data/albums.yaml"),
            sizes: SizesConfig::default(),
            images: ImagesConfig::default(),
            storage: StorageConfig::default(),
            metadata: MetadataConfig::default(),
            processing: ProcessingConfig::default(),
            site: SiteConfig::default(),
        }
    }
}

/// Max longer-edge size per tier, in pixels.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SizesConfig {
    pub original: u32,
    pub medium: u32,
    pub thumbnail: u32,
}

impl Default for SizesConfig {
    fn default() -> Self {
        Self {
            original: 4000,
            medium: 1600,
            thumbnail: 400,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImagesConfig {
    /// JPEG encoding quality (1 = worst, 100 = best).
    pub quality: u32,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self { quality: 85 }
    }
}

/// Which storage backend publishes derived variants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Local,
    Remote,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    pub backend: BackendKind,
    pub local: LocalStorageConfig,
    pub remote: RemoteStorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LocalStorageConfig {
    /// Where derived variants are written. Empty means `<photos_dir>/.derived`.
    pub derived_dir: PathBuf,
    /// Symlink inside the site that points at `derived_dir`.
    pub static_link: PathBuf,
    /// URL prefix under which the static link is served.
    pub url_prefix: String,
}

impl Default for LocalStorageConfig {
    fn default() -> Self {
        Self {
            derived_dir: PathBuf::new(),
            static_link: PathBuf::from("static/photos"),
            url_prefix: "/photos".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RemoteStorageConfig {
    pub endpoint: String,
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
    pub bucket: String,
    /// Public (CDN) base URL objects are served from.
    pub public_base_url: String,
    /// Upload attempts per object before the photo is reported as failed.
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on each further attempt.
    pub backoff_ms: u64,
}

impl Default for RemoteStorageConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            region: "auto".to_string(),
            access_key: String::new(),
            secret_key: String::new(),
            bucket: "photos".to_string(),
            public_base_url: String::new(),
            max_attempts: 3,
            backoff_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MetadataConfig {
    /// exiftool executable name or path. Empty disables metadata extraction.
    pub exiftool: String,
    /// Seconds to wait for exiftool before giving up on a photo's metadata.
    pub timeout_secs: u64,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            exiftool: "exiftool".to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Write one `content/album/<id>.md` stub per album.
    pub content_pages: bool,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            content_pages: true,
        }
    }
}

impl PipelineConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=100).contains(&self.images.quality) {
            return Err(ConfigError::Validation(
                "images.quality must be 1-100".into(),
            ));
        }
        let s = &self.sizes;
        if s.original == 0 || s.medium == 0 || s.thumbnail == 0 {
            return Err(ConfigError::Validation(
                "sizes.original, sizes.medium and sizes.thumbnail must be non-zero".into(),
            ));
        }
        if s.thumbnail > s.medium || s.medium > s.original {
            return Err(ConfigError::Validation(
                "sizes must satisfy thumbnail <= medium <= original".into(),
            ));
        }
        if self.metadata.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "metadata.timeout_secs must be at least 1".into(),
            ));
        }
        if self.storage.backend == BackendKind::Remote {
            let r = &self.storage.remote;
            if r.bucket.is_empty() {
                return Err(ConfigError::Validation(
                    "storage.remote.bucket is required for the remote backend".into(),
                ));
            }
            if r.public_base_url.is_empty() {
                return Err(ConfigError::Validation(
                    "storage.remote.public_base_url is required for the remote backend".into(),
                ));
            }
            if r.max_attempts == 0 {
                return Err(ConfigError::Validation(
                    "storage.remote.max_attempts must be at least 1".into(),
                ));
            }
        }
        Ok(())
    }

    /// Photos root with a leading `~` expanded.
    pub fn photos_root(&self) -> PathBuf {
        expand_home(&self.photos_dir)
    }

    /// Absolute-or-site-relative manifest location.
    pub fn manifest_file(&self) -> PathBuf {
        self.site_path(&self.manifest_path)
    }

    /// Directory derived variants are staged in.
    pub fn derived_root(&self) -> PathBuf {
        let dir = &self.storage.local.derived_dir;
        if dir.as_os_str().is_empty() {
            self.photos_root().join(".derived")
        } else {
            expand_home(dir)
        }
    }

    /// Resolve a path relative to the site root.
    pub fn site_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            expand_home(&self.site_root).join(path)
        }
    }
}

/// Expand a leading `~/` to `$HOME`.
fn expand_home(path: &Path) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~")
        && let Some(home) = std::env::var_os("HOME")
    {
        return PathBuf::from(home).join(rest);
    }
    path.to_path_buf()
}

/// Resolve the effective worker count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

// =============================================================================
// Loading and merging
// =============================================================================

/// Stock defaults as a `toml::Value::Table`, the base layer for merging.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    toml::Value::try_from(PipelineConfig::default())
        .map_err(|e| ConfigError::Validation(format!("default config must serialize: {e}")))
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `photoblog.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(dir: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = dir.join(CONFIG_FILENAME);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Map recognised environment variables onto a sparse TOML overlay.
///
/// Takes the variables as an iterator so callers (and tests) decide where
/// they come from. Unrecognised names are ignored; recognised names with
/// unparseable values are an error.
pub fn env_overlay<I, K, V>(vars: I) -> Result<toml::Value, ConfigError>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut root = toml::Table::new();

    for (name, value) in vars {
        let (name, value) = (name.as_ref(), value.as_ref());
        let (path, parsed): (&str, toml::Value) = match name {
            "PHOTOS_DIR" => ("photos_dir", value.into()),
            "HUGO_REPO" => ("site_root", value.into()),
            "USE_CLOUD_STORAGE" => {
                let backend = if parse_bool(name, value)? {
                    "remote"
                } else {
                    "local"
                };
                ("storage.backend", backend.into())
            }
            "ORIGINAL_MAX_WIDTH" => ("sizes.original", parse_int(name, value)?),
            "MEDIUM_WIDTH" => ("sizes.medium", parse_int(name, value)?),
            "THUMBNAIL_WIDTH" => ("sizes.thumbnail", parse_int(name, value)?),
            "JPEG_QUALITY" => ("images.quality", parse_int(name, value)?),
            "S3_ENDPOINT" => ("storage.remote.endpoint", value.into()),
            "S3_ACCESS_KEY" => ("storage.remote.access_key", value.into()),
            "S3_SECRET_KEY" => ("storage.remote.secret_key", value.into()),
            "S3_BUCKET" => ("storage.remote.bucket", value.into()),
            "CDN_BASE_URL" => ("storage.remote.public_base_url", value.into()),
            _ => continue,
        };
        let segments: Vec<&str> = path.split('.').collect();
        insert_path(&mut root, &segments, parsed);
    }

    Ok(toml::Value::Table(root))
}

fn insert_path(table: &mut toml::Table, path: &[&str], value: toml::Value) {
    match path {
        [] => {}
        [leaf] => {
            table.insert((*leaf).to_string(), value);
        }
        [head, rest @ ..] => {
            let child = table
                .entry((*head).to_string())
                .or_insert_with(|| toml::Value::Table(toml::Table::new()));
            if let toml::Value::Table(child) = child {
                insert_path(child, rest, value);
            }
        }
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" | "" => Ok(false),
        _ => Err(ConfigError::Env {
            name: name.to_string(),
            value: value.to_string(),
        }),
    }
}

fn parse_int(name: &str, value: &str) -> Result<toml::Value, ConfigError> {
    value
        .trim()
        .parse::<i64>()
        .map(toml::Value::Integer)
        .map_err(|_| ConfigError::Env {
            name: name.to_string(),
            value: value.to_string(),
        })
}

/// Merge layers in order, then deserialize and validate.
pub fn resolve_config(layers: Vec<toml::Value>) -> Result<PipelineConfig, ConfigError> {
    let merged = layers
        .into_iter()
        .fold(stock_defaults_value()?, merge_toml);
    let config: PipelineConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config for a site: stock defaults, then `photoblog.toml` in
/// `site_root`, then the process environment.
pub fn load_config(site_root: &Path) -> Result<PipelineConfig, ConfigError> {
    load_config_with_env(site_root, std::env::vars())
}

/// [`load_config`] with the environment supplied by the caller.
///
/// `site_root` is layered above the file, so the directory the file was read
/// from is the site root unless `HUGO_REPO` says otherwise.
pub fn load_config_with_env<I, K, V>(
    site_root: &Path,
    vars: I,
) -> Result<PipelineConfig, ConfigError>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut layers = Vec::new();
    if let Some(file) = load_raw_config(site_root)? {
        layers.push(file);
    }
    layers.push(toml::Value::Table(toml::Table::from_iter([(
        "site_root".to_string(),
        toml::Value::String(site_root.to_string_lossy().into_owned()),
    )])));
    layers.push(env_overlay(vars)?);
    resolve_config(layers)
}

/// Fully-commented stock `photoblog.toml`, printed by `gen-config`.
pub fn stock_config_toml() -> &'static str {
    r##"# photoblog configuration
# =======================
# All settings are optional. Values shown are the defaults.
# Environment variables (PHOTOS_DIR, HUGO_REPO, USE_CLOUD_STORAGE,
# ORIGINAL_MAX_WIDTH, MEDIUM_WIDTH, THUMBNAIL_WIDTH, JPEG_QUALITY,
# S3_ENDPOINT, S3_ACCESS_KEY, S3_SECRET_KEY, S3_BUCKET, CDN_BASE_URL)
# override values in this file. Unknown keys cause an error.

# Directory containing one subdirectory per album.
photos_dir = "~/Pictures/albums"

# Manifest written for the site generator (relative to site_root).
manifest_path = "data/albums.yaml"

# ---------------------------------------------------------------------------
# Size tiers (pixels on the longer edge; images are never upscaled)
# ---------------------------------------------------------------------------
[sizes]
original = 4000
medium = 1600
thumbnail = 400

# ---------------------------------------------------------------------------
# Encoding
# ---------------------------------------------------------------------------
[images]
# JPEG quality (1 = worst, 100 = best).
quality = 85

# ---------------------------------------------------------------------------
# Storage
# ---------------------------------------------------------------------------
[storage]
# "local" serves variants through a symlink in the site's static tree,
# "remote" uploads them to an S3-compatible bucket behind a CDN.
backend = "local"

[storage.local]
# Where derived variants are written. Empty = <photos_dir>/.derived
derived_dir = ""
# Symlink (relative to site_root) pointing at derived_dir.
static_link = "static/photos"
# URL prefix the static link is served under.
url_prefix = "/photos"

[storage.remote]
endpoint = ""
region = "auto"
access_key = ""
secret_key = ""
bucket = "photos"
# Public base URL objects are served from, e.g. "https://cdn.example.com".
public_base_url = ""
# Upload attempts per object, and the initial retry delay (doubles each time).
max_attempts = 3
backoff_ms = 500

# ---------------------------------------------------------------------------
# Metadata
# ---------------------------------------------------------------------------
[metadata]
# exiftool executable. Empty disables metadata extraction.
exiftool = "exiftool"
# Seconds to wait for exiftool per photo.
timeout_secs = 10

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel workers. Omit to auto-detect (= number of CPU cores).
# max_processes = 4

# ---------------------------------------------------------------------------
# Site
# ---------------------------------------------------------------------------
[site]
# Write content/album/<id>.md stubs for each album.
content_pages = true
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_values() {
        let config = PipelineConfig::default();
        assert_eq!(config.sizes.original, 4000);
        assert_eq!(config.sizes.medium, 1600);
        assert_eq!(config.sizes.thumbnail, 400);
        assert_eq!(config.images.quality, 85);
        assert_eq!(config.storage.backend, BackendKind::Local);
        assert_eq!(config.manifest_path, PathBuf::from("data/albums.yaml"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parse_partial_config() {
        let config: PipelineConfig = toml::from_str(
            r#"
[sizes]
medium = 1200
"#,
        )
        .unwrap();
        assert_eq!(config.sizes.medium, 1200);
        assert_eq!(config.sizes.original, 4000);
        assert_eq!(config.images.quality, 85);
    }

    #[test]
    fn unknown_keys_rejected() {
        let result: Result<PipelineConfig, _> = toml::from_str("[sizes]\nhuge = 9000\n");
        assert!(result.is_err());
    }

    #[test]
    fn stock_config_toml_parses_to_defaults() {
        let config: PipelineConfig = toml::from_str(stock_config_toml()).unwrap();
        let defaults = PipelineConfig::default();
        assert_eq!(config.sizes.original, defaults.sizes.original);
        assert_eq!(config.images.quality, defaults.images.quality);
        assert_eq!(config.storage.remote.max_attempts, 3);
        assert_eq!(config.processing.max_processes, None);
    }

    // =========================================================================
    // Validation
    // =========================================================================

    #[test]
    fn zero_metadata_timeout_is_invalid() {
        let mut config = PipelineConfig::default();
        config.metadata.timeout_secs = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn quality_out_of_range_is_invalid() {
        let mut config = PipelineConfig::default();
        config.images.quality = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
        config.images.quality = 101;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn tiers_must_be_ordered() {
        let mut config = PipelineConfig::default();
        config.sizes.thumbnail = 2000;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn zero_tier_is_invalid() {
        let mut config = PipelineConfig::default();
        config.sizes.thumbnail = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn remote_backend_requires_public_base_url() {
        let mut config = PipelineConfig::default();
        config.storage.backend = BackendKind::Remote;
        assert!(config.validate().is_err());
        config.storage.remote.public_base_url = "https://cdn.example.com".into();
        assert!(config.validate().is_ok());
        config.storage.remote.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    // =========================================================================
    // Layering
    // =========================================================================

    #[test]
    fn merge_toml_overlay_wins_and_base_survives() {
        let base: toml::Value = toml::from_str("a = 1\n[t]\nx = 1\ny = 2\n").unwrap();
        let overlay: toml::Value = toml::from_str("[t]\ny = 3\n").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged["a"].as_integer(), Some(1));
        assert_eq!(merged["t"]["x"].as_integer(), Some(1));
        assert_eq!(merged["t"]["y"].as_integer(), Some(3));
    }

    #[test]
    fn env_overlay_maps_known_variables() {
        let overlay = env_overlay([
            ("PHOTOS_DIR", "/srv/albums"),
            ("USE_CLOUD_STORAGE", "true"),
            ("JPEG_QUALITY", "70"),
            ("CDN_BASE_URL", "https://cdn.example.com"),
            ("UNRELATED", "ignored"),
        ])
        .unwrap();
        let config = resolve_config(vec![overlay]).unwrap();
        assert_eq!(config.photos_dir, PathBuf::from("/srv/albums"));
        assert_eq!(config.storage.backend, BackendKind::Remote);
        assert_eq!(config.images.quality, 70);
        assert_eq!(config.storage.remote.public_base_url, "https://cdn.example.com");
    }

    #[test]
    fn env_overlay_rejects_bad_numbers() {
        let result = env_overlay([("MEDIUM_WIDTH", "wide")]);
        assert!(matches!(result, Err(ConfigError::Env { .. })));
    }

    #[test]
    fn env_overlay_overrides_file_layer() {
        let file: toml::Value = toml::from_str("[images]\nquality = 60\n").unwrap();
        let env = env_overlay([("JPEG_QUALITY", "90")]).unwrap();
        let config = resolve_config(vec![file, env]).unwrap();
        assert_eq!(config.images.quality, 90);
    }

    #[test]
    fn load_config_reads_file_from_site_root() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILENAME),
            "photos_dir = \"/data/albums\"\n[sizes]\nthumbnail = 300\n",
        )
        .unwrap();
        let file = load_raw_config(tmp.path()).unwrap();
        let config = resolve_config(file.into_iter().collect()).unwrap();
        assert_eq!(config.photos_dir, PathBuf::from("/data/albums"));
        assert_eq!(config.sizes.thumbnail, 300);
    }

    #[test]
    fn site_root_argument_beats_generated_config() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILENAME), stock_config_toml()).unwrap();

        let config = load_config_with_env(tmp.path(), Vec::<(String, String)>::new()).unwrap();
        assert_eq!(config.site_root, tmp.path());
        assert_eq!(config.manifest_file(), tmp.path().join("data/albums.yaml"));
    }

    #[test]
    fn site_root_in_file_does_not_move_the_site() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILENAME), "site_root = \"/elsewhere\"\n").unwrap();

        let config = load_config_with_env(tmp.path(), Vec::<(String, String)>::new()).unwrap();
        assert_eq!(config.site_root, tmp.path());
    }

    #[test]
    fn hugo_repo_overrides_site_root_argument() {
        let tmp = TempDir::new().unwrap();
        let config = load_config_with_env(tmp.path(), [("HUGO_REPO", "/srv/blog")]).unwrap();
        assert_eq!(config.site_root, PathBuf::from("/srv/blog"));
    }

    #[test]
    fn load_raw_config_missing_file_is_none() {
        let tmp = TempDir::new().unwrap();
        assert!(load_raw_config(tmp.path()).unwrap().is_none());
    }

    #[test]
    fn load_raw_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILENAME), "not [[[ toml").unwrap();
        assert!(matches!(
            load_raw_config(tmp.path()),
            Err(ConfigError::Toml(_))
        ));
    }

    // =========================================================================
    // Derived paths
    // =========================================================================

    #[test]
    fn derived_root_defaults_inside_photos_dir() {
        let mut config = PipelineConfig::default();
        config.photos_dir = PathBuf::from("/albums");
        assert_eq!(config.derived_root(), PathBuf::from("/albums/.derived"));
        config.storage.local.derived_dir = PathBuf::from("/cache/derived");
        assert_eq!(config.derived_root(), PathBuf::from("/cache/derived"));
    }

    #[test]
    fn manifest_file_is_relative_to_site_root() {
        let mut config = PipelineConfig::default();
        config.site_root = PathBuf::from("/site");
        assert_eq!(config.manifest_file(), PathBuf::from("/site/data/albums.yaml"));
    }

    #[test]
    fn effective_threads_user_constrains_down() {
        let config = ProcessingConfig {
            max_processes: Some(1),
        };
        assert_eq!(effective_threads(&config), 1);
    }

    #[test]
    fn effective_threads_never_zero() {
        let config = ProcessingConfig {
            max_processes: Some(0),
        };
        assert_eq!(effective_threads(&config), 1);
    }
}
