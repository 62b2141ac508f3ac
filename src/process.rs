//! The pipeline run: scan, decide, transcode, publish, merge, write.
//!
//! ## Per-run state machine
//!
//! ```text
//! Scan → per album: decide per photo → (transcode → metadata → publish) → accumulate
//!      → merge with prior manifest → verify staged assets → write manifest → content pages
//! ```
//!
//! ## Decisions
//!
//! Each source photo gets a [`PhotoAction`]:
//!
//! | Staged variants | Prior entry | `--force` | Action |
//! |---|---|---|---|
//! | any | any | yes | process |
//! | missing / stale | any | no | process |
//! | current | same fingerprint | no | reuse entry |
//! | current | different fingerprint | no | process |
//! | current | none | no | recover entry from staged files |
//!
//! Recovery rebuilds a manifest entry from the staged variants without
//! re-encoding or re-uploading, so a lost manifest costs a rescan, not a
//! re-render.
//!
//! ## Failures
//!
//! Decode and publish errors fail one photo. The photo's prior entry, if any,
//! stays in the manifest and the failure is listed in the [`RunReport`].
//! Only configuration, scan and manifest-write errors abort a run.
//!
//! ## Parallel Processing
//!
//! Photos within an album are processed in parallel on a dedicated
//! [rayon](https://docs.rs/rayon) pool sized by
//! [`effective_threads`](crate::config::effective_threads). Completion order
//! does not matter: the manifest builder sorts before writing.

use crate::config::{PipelineConfig, effective_threads};
use crate::imaging::{ImageBackend, SizeTier, TranscodeParams};
use crate::manifest::{
    self, AlbumRecord, Manifest, ManifestBuilder, ManifestError, MissingAsset, PhotoRecord,
    SizeSet, SizeVariant,
};
use crate::metadata::MetadataReader;
use crate::scan::{self, AlbumSource, ScanError, ScanOptions, SourcePhoto, VariantState};
use crate::site;
use crate::storage::{StorageBackend, StorageError, VariantKey};
use rayon::prelude::*;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use thiserror::Error;

/// Fatal run errors. Per-photo problems are [`Failure`]s instead.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("scan failed: {0}")]
    Scan(#[from] ScanError),
    #[error("cannot use prior manifest: {0}")]
    PriorManifest(#[source] ManifestError),
    #[error("storage setup failed: {0}")]
    Storage(#[from] StorageError),
    #[error("cannot build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("cannot write manifest: {0}")]
    ManifestWrite(#[source] ManifestError),
}

/// What a run covers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Restrict the run to one album, by directory name or id.
    pub album: Option<String>,
    /// Reprocess every photo in scope regardless of change detection.
    pub force: bool,
    /// Scan and decide only; write nothing.
    pub dry_run: bool,
}

impl RunOptions {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn force_all() -> Self {
        Self {
            force: true,
            ..Self::default()
        }
    }

    pub fn album(name: &str) -> Self {
        Self {
            album: Some(name.to_string()),
            ..Self::default()
        }
    }
}

/// Why a photo is (re)processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    Forced,
    New,
    Stale,
    SourceReplaced,
    /// The prior entry's URLs point somewhere the current storage does not.
    Relocated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhotoAction {
    Process(Reason),
    Reuse,
    Recover,
}

impl fmt::Display for PhotoAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PhotoAction::Process(Reason::Forced) => "process (forced)",
            PhotoAction::Process(Reason::New) => "process (new)",
            PhotoAction::Process(Reason::Stale) => "process (changed)",
            PhotoAction::Process(Reason::SourceReplaced) => "process (replaced)",
            PhotoAction::Process(Reason::Relocated) => "process (storage changed)",
            PhotoAction::Reuse => "unchanged",
            PhotoAction::Recover => "recover from staged files",
        };
        f.write_str(s)
    }
}

/// Decide what to do with one photo.
///
/// `url_for` gives the URL the current storage backend would publish each
/// tier under; a prior entry is only reused when all of its URLs match.
pub fn decide(
    photo: &SourcePhoto,
    prior: Option<&PhotoRecord>,
    url_for: impl Fn(SizeTier) -> String,
    force: bool,
) -> PhotoAction {
    if force {
        return PhotoAction::Process(Reason::Forced);
    }
    match photo.variants {
        VariantState::Missing => PhotoAction::Process(Reason::New),
        VariantState::Stale => PhotoAction::Process(Reason::Stale),
        VariantState::Current => match prior {
            Some(record) if record.fingerprint != photo.fingerprint => {
                PhotoAction::Process(Reason::SourceReplaced)
            }
            Some(record) if !urls_match(record, &url_for) => {
                PhotoAction::Process(Reason::Relocated)
            }
            Some(_) => PhotoAction::Reuse,
            None => PhotoAction::Recover,
        },
    }
}

fn urls_match(record: &PhotoRecord, url_for: impl Fn(SizeTier) -> String) -> bool {
    SizeTier::ALL
        .iter()
        .all(|&tier| record.sizes.get(tier).url == url_for(tier))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    Transcode,
    Publish,
    Recover,
    ContentPage,
    MissingAsset,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FailureStage::Transcode => "transcode",
            FailureStage::Publish => "publish",
            FailureStage::Recover => "recover",
            FailureStage::ContentPage => "content page",
            FailureStage::MissingAsset => "missing asset",
        })
    }
}

/// A non-fatal problem, reported at the end of the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub album_id: String,
    /// Source filename; `None` for album-level problems.
    pub photo: Option<String>,
    pub stage: FailureStage,
    pub message: String,
}

impl Failure {
    fn photo(
        album_id: &str,
        photo: &SourcePhoto,
        stage: FailureStage,
        e: impl fmt::Display,
    ) -> Self {
        Self {
            album_id: album_id.to_string(),
            photo: Some(photo.filename.clone()),
            stage,
            message: e.to_string(),
        }
    }
}

/// Per-variant publish outcome, for progress display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantInfo {
    pub tier: SizeTier,
    pub width: u32,
    pub height: u32,
    pub status: VariantStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariantStatus {
    /// Written to local storage.
    Written,
    /// Uploaded to the object store.
    Uploaded,
    /// Identical object already in the store.
    Unchanged,
}

/// Progress events emitted while a run is in flight.
#[derive(Debug, Clone)]
pub enum ProcessEvent {
    AlbumStarted {
        title: String,
        photo_count: usize,
        pending: usize,
    },
    PhotoProcessed {
        filename: String,
        action: PhotoAction,
        variants: Vec<VariantInfo>,
    },
    PhotoRecovered {
        filename: String,
    },
    PhotoFailed {
        filename: String,
        stage: FailureStage,
        message: String,
    },
}

/// Dry-run view of one album.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedAlbum {
    pub id: String,
    pub title: String,
    pub photos: Vec<(String, PhotoAction)>,
}

/// What a run did.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub dry_run: bool,
    pub albums_scanned: usize,
    pub photos_processed: usize,
    pub photos_reused: usize,
    pub photos_recovered: usize,
    pub uploads: usize,
    pub uploads_skipped: usize,
    pub failures: Vec<Failure>,
    pub manifest_path: PathBuf,
    pub manifest_changed: bool,
    pub manifest_albums: usize,
    pub manifest_photos: usize,
    pub pages_written: usize,
    /// Filled on dry runs only.
    pub plan: Vec<PlannedAlbum>,
}

impl RunReport {
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Result of working one photo on the pool.
struct PhotoOutcome {
    record: PhotoRecord,
    uploads: usize,
    uploads_skipped: usize,
}

/// A configured pipeline, ready to run.
pub struct Pipeline<'a> {
    config: &'a PipelineConfig,
    images: &'a dyn ImageBackend,
    metadata: &'a dyn MetadataReader,
    storage: &'a dyn StorageBackend,
    events: Option<Sender<ProcessEvent>>,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        config: &'a PipelineConfig,
        images: &'a dyn ImageBackend,
        metadata: &'a dyn MetadataReader,
        storage: &'a dyn StorageBackend,
    ) -> Self {
        Self {
            config,
            images,
            metadata,
            storage,
            events: None,
        }
    }

    /// Send progress events to `tx`. Dropping the pipeline closes the channel.
    pub fn with_events(mut self, tx: Sender<ProcessEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    fn emit(&self, event: ProcessEvent) {
        if let Some(tx) = &self.events {
            tx.send(event).ok();
        }
    }

    pub fn run_all(&self) -> Result<RunReport, PipelineError> {
        self.run(&RunOptions::all())
    }

    pub fn force_all(&self) -> Result<RunReport, PipelineError> {
        self.run(&RunOptions::force_all())
    }

    pub fn run_album(&self, name: &str) -> Result<RunReport, PipelineError> {
        self.run(&RunOptions::album(name))
    }

    pub fn run(&self, options: &RunOptions) -> Result<RunReport, PipelineError> {
        let config = self.config;
        let derived_root = self.storage.derived_root();
        let manifest_path = config.manifest_file();

        let albums = scan::scan(
            &config.photos_root(),
            derived_root,
            &ScanOptions {
                album: options.album.clone(),
            },
        )?;
        let prior = self.load_prior(options)?;

        let mut report = RunReport {
            dry_run: options.dry_run,
            albums_scanned: albums.len(),
            manifest_path: manifest_path.clone(),
            ..RunReport::default()
        };

        let plans: Vec<Vec<PhotoAction>> = albums
            .iter()
            .map(|album| {
                let prior_album = prior.as_ref().and_then(|m| m.album(&album.id));
                album
                    .photos
                    .iter()
                    .map(|photo| {
                        let prior_photo = prior_album.and_then(|a| a.photo(&photo.id));
                        let url_for = |tier| {
                            self.storage
                                .url_for(&VariantKey::new(&album.id, &photo.id, tier))
                        };
                        decide(photo, prior_photo, url_for, options.force)
                    })
                    .collect()
            })
            .collect();

        if options.dry_run {
            report.plan = albums
                .iter()
                .zip(&plans)
                .map(|(album, actions)| PlannedAlbum {
                    id: album.id.clone(),
                    title: album.title().to_string(),
                    photos: album
                        .photos
                        .iter()
                        .map(|p| p.filename.clone())
                        .zip(actions.iter().copied())
                        .collect(),
                })
                .collect();
            return Ok(report);
        }

        self.storage.prepare()?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(effective_threads(&config.processing))
            .build()?;
        let params = TranscodeParams::from_config(config);

        let mut builder = match (&options.album, &prior) {
            (Some(_), Some(prior)) => ManifestBuilder::retaining(prior.clone()),
            _ => ManifestBuilder::new(),
        };

        for (album, actions) in albums.iter().zip(&plans) {
            let prior_album = prior.as_ref().and_then(|m| m.album(&album.id));
            let photos =
                self.process_album(&pool, &params, album, actions, prior_album, &mut report);
            match album_record(album, photos) {
                Some(record) => builder.upsert(record),
                None => {
                    tracing::info!(
                        album = %album.id,
                        "no photos, leaving album out of the manifest"
                    );
                    builder.remove(&album.id);
                }
            }
        }

        let mut manifest = builder.build();
        for MissingAsset {
            album_id,
            photo_id,
            path,
        } in manifest::verify_assets(&mut manifest, derived_root)
        {
            report.failures.push(Failure {
                album_id,
                photo: Some(photo_id),
                stage: FailureStage::MissingAsset,
                message: format!("staged variant missing: {}", path.display()),
            });
        }

        report.manifest_changed = manifest::write_manifest(&manifest_path, &manifest)
            .map_err(PipelineError::ManifestWrite)?;
        report.manifest_albums = manifest.albums.len();
        report.manifest_photos = manifest.photo_count();
        tracing::info!(
            path = %manifest_path.display(),
            changed = report.manifest_changed,
            albums = report.manifest_albums,
            photos = report.manifest_photos,
            "manifest written"
        );

        if config.site.content_pages {
            let content_dir = config.site_path(Path::new(site::CONTENT_DIR));
            match site::write_album_pages(&content_dir, &manifest) {
                Ok(written) => report.pages_written = written,
                Err(e) => report.failures.push(Failure {
                    album_id: String::new(),
                    photo: None,
                    stage: FailureStage::ContentPage,
                    message: e.to_string(),
                }),
            }
        }

        Ok(report)
    }

    /// Load the prior manifest. An unreadable one is ignored for full runs,
    /// which rebuild every album, but fatal for single-album runs, which
    /// would otherwise drop every other album.
    fn load_prior(&self, options: &RunOptions) -> Result<Option<Manifest>, PipelineError> {
        let path = self.config.manifest_file();
        match Manifest::load(&path) {
            Ok(prior) => Ok(prior),
            Err(e) if options.album.is_none() => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "ignoring unreadable prior manifest"
                );
                Ok(None)
            }
            Err(e) => Err(PipelineError::PriorManifest(e)),
        }
    }

    fn process_album(
        &self,
        pool: &rayon::ThreadPool,
        params: &TranscodeParams,
        album: &AlbumSource,
        actions: &[PhotoAction],
        prior: Option<&AlbumRecord>,
        report: &mut RunReport,
    ) -> Vec<PhotoRecord> {
        let pending = actions
            .iter()
            .filter(|a| !matches!(a, PhotoAction::Reuse))
            .count();
        self.emit(ProcessEvent::AlbumStarted {
            title: album.title().to_string(),
            photo_count: album.photos.len(),
            pending,
        });

        let outcomes: Vec<Option<Result<PhotoOutcome, Failure>>> = pool.install(|| {
            album
                .photos
                .par_iter()
                .zip(actions.par_iter())
                .map(|(photo, action)| match action {
                    PhotoAction::Reuse => None,
                    PhotoAction::Recover => Some(self.recover_photo(&album.id, photo)),
                    PhotoAction::Process(_) => {
                        Some(self.process_photo(&album.id, photo, params, *action))
                    }
                })
                .collect()
        });

        let mut photos = Vec::with_capacity(album.photos.len());
        for ((photo, action), outcome) in album.photos.iter().zip(actions).zip(outcomes) {
            let prior_photo = prior.and_then(|a| a.photo(&photo.id));
            match outcome {
                None => {
                    if let Some(record) = prior_photo {
                        report.photos_reused += 1;
                        photos.push(record.clone());
                    }
                }
                Some(Ok(outcome)) => {
                    match action {
                        PhotoAction::Recover => report.photos_recovered += 1,
                        _ => report.photos_processed += 1,
                    }
                    report.uploads += outcome.uploads;
                    report.uploads_skipped += outcome.uploads_skipped;
                    photos.push(outcome.record);
                }
                Some(Err(failure)) => {
                    tracing::warn!(
                        album = %album.id,
                        photo = %photo.filename,
                        stage = %failure.stage,
                        error = %failure.message,
                        retained = prior_photo.is_some(),
                        "photo failed"
                    );
                    if let Some(record) = prior_photo {
                        photos.push(record.clone());
                    }
                    report.failures.push(failure);
                }
            }
        }
        photos
    }

    fn process_photo(
        &self,
        album_id: &str,
        photo: &SourcePhoto,
        params: &TranscodeParams,
        action: PhotoAction,
    ) -> Result<PhotoOutcome, Failure> {
        let fail = |stage: FailureStage, e: &dyn fmt::Display| {
            let failure = Failure::photo(album_id, photo, stage, e);
            self.emit(ProcessEvent::PhotoFailed {
                filename: photo.filename.clone(),
                stage,
                message: failure.message.clone(),
            });
            failure
        };

        let transcoded = self
            .images
            .transcode(&photo.path, params)
            .map_err(|e| fail(FailureStage::Transcode, &e))?;
        let exif = self.metadata.read(&photo.path);

        let mut uploads = 0;
        let mut uploads_skipped = 0;
        let mut variants = Vec::with_capacity(SizeTier::ALL.len());
        let sizes = SizeSet::try_from_fn(|tier| {
            let variant = transcoded.variant(tier).ok_or_else(|| {
                fail(
                    FailureStage::Transcode,
                    &format!("backend produced no {tier} variant"),
                )
            })?;
            let key = VariantKey::new(album_id, &photo.id, tier);
            let published = self
                .storage
                .publish(&key, &variant.bytes)
                .map_err(|e| fail(FailureStage::Publish, &e))?;

            let status = if published.uploaded {
                uploads += 1;
                VariantStatus::Uploaded
            } else if published.unchanged_remote {
                uploads_skipped += 1;
                VariantStatus::Unchanged
            } else {
                VariantStatus::Written
            };
            variants.push(VariantInfo {
                tier,
                width: variant.dimensions.width,
                height: variant.dimensions.height,
                status,
            });
            Ok(SizeVariant {
                url: published.url,
                width: variant.dimensions.width,
                height: variant.dimensions.height,
            })
        })?;

        self.emit(ProcessEvent::PhotoProcessed {
            filename: photo.filename.clone(),
            action,
            variants,
        });

        Ok(PhotoOutcome {
            record: PhotoRecord {
                id: photo.id.clone(),
                filename: photo.filename.clone(),
                width: transcoded.source.width,
                height: transcoded.source.height,
                sizes,
                exif,
                fingerprint: photo.fingerprint,
            },
            uploads,
            uploads_skipped,
        })
    }

    /// Rebuild a manifest entry from already-staged variants.
    fn recover_photo(&self, album_id: &str, photo: &SourcePhoto) -> Result<PhotoOutcome, Failure> {
        let derived_root = self.storage.derived_root();
        let fail = |e: &dyn fmt::Display| {
            let failure = Failure::photo(album_id, photo, FailureStage::Recover, e);
            self.emit(ProcessEvent::PhotoFailed {
                filename: photo.filename.clone(),
                stage: FailureStage::Recover,
                message: failure.message.clone(),
            });
            failure
        };

        let source = self.images.identify(&photo.path).map_err(|e| fail(&e))?;
        let sizes = SizeSet::try_from_fn(|tier| {
            let key = VariantKey::new(album_id, &photo.id, tier);
            let dims = self
                .images
                .identify(&key.staged_path(derived_root))
                .map_err(|e| fail(&e))?;
            Ok(SizeVariant {
                url: self.storage.url_for(&key),
                width: dims.width,
                height: dims.height,
            })
        })?;
        let exif = self.metadata.read(&photo.path);

        tracing::debug!(
            album = album_id,
            photo = %photo.filename,
            "recovered entry from staged variants"
        );
        self.emit(ProcessEvent::PhotoRecovered {
            filename: photo.filename.clone(),
        });

        Ok(PhotoOutcome {
            record: PhotoRecord {
                id: photo.id.clone(),
                filename: photo.filename.clone(),
                width: source.width,
                height: source.height,
                sizes,
                exif,
                fingerprint: photo.fingerprint,
            },
            uploads: 0,
            uploads_skipped: 0,
        })
    }
}

/// Album record from scanned source data and its photo entries; `None` when
/// there are no photos to show.
fn album_record(album: &AlbumSource, photos: Vec<PhotoRecord>) -> Option<AlbumRecord> {
    if photos.is_empty() {
        return None;
    }
    let o = &album.overrides;
    Some(AlbumRecord {
        id: album.id.clone(),
        title: album.title().to_string(),
        description: o.description.clone(),
        date: album.date.clone(),
        location: o.location.clone(),
        tags: o.tags.clone(),
        camera: o.camera.clone(),
        cover_photo: o.cover_photo.clone(),
        photos,
    })
}
