//! Camera metadata extraction.
//!
//! Metadata comes from `exiftool`, run as a subprocess per photo. The tool is
//! an optional dependency: if it is missing, crashes, prints garbage or takes
//! longer than the configured timeout, the photo still gets processed with an
//! all-absent [`PhotoMetadata`]. Nothing in this module fails a photo.
//!
//! The subprocess is driven by tokio so the wait can be bounded with
//! `tokio::time::timeout`; the child is spawned with `kill_on_drop`, so a
//! timed-out exiftool is killed rather than left running.
//!
//! [`NoopReader`] stands in when exiftool is disabled in the configuration and
//! keeps tests deterministic.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::runtime::Handle;

/// Tags requested from exiftool.
const EXIFTOOL_TAGS: &[&str] = &[
    "-Make",
    "-Model",
    "-LensModel",
    "-ISO",
    "-ShutterSpeed",
    "-Aperture",
    "-FNumber",
    "-FocalLength",
    "-DateTimeOriginal",
];

/// Best-effort camera metadata. Every field is independently optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lens: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focal_length: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aperture: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shutter_speed: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iso: Option<u32>,
    /// Capture time as ISO-8601 with a `Z` suffix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub taken_at: Option<String>,
}

impl PhotoMetadata {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Source of per-photo metadata.
pub trait MetadataReader: Sync {
    /// Read metadata for `path`. Never fails; missing data is absent fields.
    fn read(&self, path: &Path) -> PhotoMetadata;
}

/// Reader that never extracts anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReader;

impl MetadataReader for NoopReader {
    fn read(&self, _path: &Path) -> PhotoMetadata {
        PhotoMetadata::default()
    }
}

#[derive(Error, Debug)]
pub enum ExifToolError {
    #[error("cannot run exiftool: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("exiftool did not finish within {0:?}")]
    Timeout(Duration),
    #[error("exiftool exited with {0}")]
    Failed(std::process::ExitStatus),
    #[error("unreadable exiftool output: {0}")]
    Json(#[from] serde_json::Error),
}

/// Runs exiftool once per photo with a bounded wait.
pub struct ExifToolReader {
    program: OsString,
    args: Vec<OsString>,
    timeout: Duration,
    runtime: Handle,
}

impl ExifToolReader {
    pub fn new(executable: impl Into<OsString>, timeout: Duration, runtime: Handle) -> Self {
        let mut args: Vec<OsString> = vec!["-json".into()];
        args.extend(EXIFTOOL_TAGS.iter().map(OsString::from));
        Self::with_command(executable, args, timeout, runtime)
    }

    /// Run `program` with `args` followed by the photo path.
    pub fn with_command(
        program: impl Into<OsString>,
        args: Vec<OsString>,
        timeout: Duration,
        runtime: Handle,
    ) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
            runtime,
        }
    }

    /// Run the tool and parse its output, surfacing every failure.
    pub fn try_read(&self, path: &Path) -> Result<PhotoMetadata, ExifToolError> {
        let stdout = self.runtime.block_on(self.run(path))?;
        parse_exiftool_json(&stdout)
    }

    async fn run(&self, path: &Path) -> Result<Vec<u8>, ExifToolError> {
        let child = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| ExifToolError::Timeout(self.timeout))??;

        if !output.status.success() {
            return Err(ExifToolError::Failed(output.status));
        }
        Ok(output.stdout)
    }
}

impl MetadataReader for ExifToolReader {
    fn read(&self, path: &Path) -> PhotoMetadata {
        match self.try_read(path) {
            Ok(metadata) => metadata,
            Err(e) => {
                tracing::debug!(photo = %path.display(), error = %e, "metadata unavailable");
                PhotoMetadata::default()
            }
        }
    }
}

/// Parse `exiftool -json` output (an array with one object per file).
pub fn parse_exiftool_json(bytes: &[u8]) -> Result<PhotoMetadata, ExifToolError> {
    let parsed: Vec<serde_json::Map<String, Value>> = serde_json::from_slice(bytes)?;
    Ok(parsed
        .first()
        .map(metadata_from_tags)
        .unwrap_or_default())
}

fn metadata_from_tags(tags: &serde_json::Map<String, Value>) -> PhotoMetadata {
    let text = |key: &str| tags.get(key).and_then(value_text);

    let camera = match (text("Make"), text("Model")) {
        (Some(make), Some(model)) => Some(format!("{make} {model}")),
        (None, Some(model)) => Some(model),
        _ => None,
    };

    PhotoMetadata {
        camera,
        lens: text("LensModel"),
        focal_length: text("FocalLength"),
        aperture: text("FNumber").or_else(|| text("Aperture")),
        shutter_speed: text("ShutterSpeed"),
        iso: tags.get("ISO").and_then(value_u32),
        taken_at: text("DateTimeOriginal").and_then(|raw| iso_timestamp(&raw)),
    }
}

fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn value_u32(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// `2024:05:01 14:30:00` → `2024-05-01T14:30:00Z`. Trailing sub-seconds or
/// offsets are ignored.
fn iso_timestamp(raw: &str) -> Option<String> {
    let head = raw.get(..19)?;
    NaiveDateTime::parse_from_str(head, "%Y:%m:%d %H:%M:%S")
        .ok()
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
}
