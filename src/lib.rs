//! # Photoblog
//!
//! Turns a directory of photo albums into the image variants and the data
//! file a static photo blog is built from.
//!
//! Your filesystem is the data source: each directory under the photos root is
//! an album, each image in it a photo. A run produces, per photo, three JPEG
//! variants (original, medium, thumbnail) and one manifest entry with URLs,
//! dimensions and camera metadata. The site generator reads the manifest and
//! never touches the source photos.
//!
//! # Architecture
//!
//! ```text
//! 1. Scan      photos/          →  albums + change state   (filesystem → structured data)
//! 2. Process   changed photos   →  staged/uploaded variants (decode, resize, encode, publish)
//! 3. Manifest  records + prior  →  data/albums.yaml        (merge, sort, atomic write)
//! ```
//!
//! Runs are incremental. Staged variants double as the change-detection
//! ledger: a photo whose three variants exist and are newer than its source,
//! and whose prior entry points at the current storage, is reused from the
//! prior manifest without decoding it. A rerun with no
//! changes performs no image work and leaves the manifest byte-identical.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`scan`] | Walks the photos root, derives ids, reads overrides, checks variants |
//! | [`process`] | Runs the pipeline: decide, transcode and publish in parallel, merge |
//! | [`manifest`] | Manifest data model, deterministic ordering, prior-merge and atomic write |
//! | [`imaging`] | Decode, orientation, resize and JPEG encode ([`imaging::ImageBackend`]) |
//! | [`metadata`] | Camera metadata via `exiftool`, with a bounded wait |
//! | [`storage`] | Local symlinked directory or S3-compatible object store for variants |
//! | [`site`] | Album content stubs for the site generator |
//! | [`config`] | Layered `photoblog.toml` + environment configuration and validation |
//! | [`naming`] | Slug ids for albums and photos |
//! | [`output`] | CLI output formatting for progress, plans and summaries |
//!
//! # Design Decisions
//!
//! ## One Bad Photo Never Fails a Run
//!
//! Decode, publish and metadata problems are contained to the photo they
//! happen on. The photo keeps its previous manifest entry if it had one, the
//! failure is listed in the run summary, and the next run retries it. Only
//! configuration errors, scan-level conflicts (two albums with the same id)
//! and an unwritable manifest abort a run.
//!
//! ## Stable Identifiers
//!
//! Album and photo ids are slugs of the directory and file names
//! ([`naming::slugify`]). They appear in variant paths, object keys and URLs,
//! so renaming a file is a delete plus an add, and nothing else moves.
//!
//! ## Storage Is Swappable
//!
//! The pipeline only sees [`storage::StorageBackend`]. Locally, variants are
//! served through a symlink in the site's static tree. Remotely, variants are
//! uploaded to any S3-compatible store with a content-hash skip, so a forced
//! rebuild does not re-upload identical bytes.

pub mod config;
pub mod imaging;
pub mod manifest;
pub mod metadata;
pub mod naming;
pub mod output;
pub mod process;
pub mod scan;
pub mod site;
pub mod storage;

#[cfg(test)]
pub(crate) mod test_helpers;
