//! Operator-facing output for every command.
//!
//! Diagnostics go through `tracing` to stderr; this module formats what the
//! operator asked for, on stdout.
//!
//! # Output Format
//!
//! ## Run progress
//!
//! ```text
//! Summer in Lisbon (12 photos, 3 to process)
//!     IMG_2041.JPG: process (new)
//!         original: 4000x3000 uploaded
//!         medium: 1600x1200 uploaded
//!         thumbnail: 400x300 unchanged
//!     IMG_2042.JPG: recovered
//!     broken.jpg: FAILED (transcode) cannot decode ...
//! ```
//!
//! ## Dry run
//!
//! ```text
//! 001 Summer in Lisbon [summer-in-lisbon]
//!     IMG_2041.JPG: process (new)
//!     IMG_2042.JPG: unchanged
//!
//! 1 to process, 1 unchanged
//! ```
//!
//! ## Check
//!
//! ```text
//! 001 Summer in Lisbon [summer-in-lisbon] (12 photos)
//!     Source: Summer in Lisbon/
//!     Date: 2024-06-01
//!     Variants: 9 current, 2 stale, 1 missing
//! ```
//!
//! ## Summary
//!
//! ```text
//! Processed 3, reused 9, recovered 0 (uploaded 9, skipped 0)
//! Manifest data/albums.yaml: 2 albums, 20 photos (updated)
//! 1 failure:
//!     summer-in-lisbon/broken.jpg [transcode]: cannot decode ...
//! ```
//!
//! # Architecture
//!
//! Each view has a `format_*` function (returns `Vec<String>`) for testability
//! and a `print_*` wrapper that writes to stdout. Format functions are pure.

use crate::process::{
    Failure, PhotoAction, PlannedAlbum, ProcessEvent, RunReport, VariantInfo, VariantStatus,
};
use crate::scan::{AlbumSource, VariantState};

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// `001 Title [id]`, with the id only when it differs from the title.
fn album_header(index: usize, title: &str, id: &str) -> String {
    if title == id {
        format!("{} {}", format_index(index), title)
    } else {
        format!("{} {} [{}]", format_index(index), title, id)
    }
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

fn variant_line(v: &VariantInfo) -> String {
    let status = match v.status {
        VariantStatus::Written => "written",
        VariantStatus::Uploaded => "uploaded",
        VariantStatus::Unchanged => "unchanged",
    };
    format!("{}{}: {}x{} {}", indent(2), v.tier, v.width, v.height, status)
}

fn failure_line(f: &Failure) -> String {
    let subject = match &f.photo {
        Some(photo) if f.album_id.is_empty() => photo.clone(),
        Some(photo) => format!("{}/{}", f.album_id, photo),
        None if f.album_id.is_empty() => "(site)".to_string(),
        None => f.album_id.clone(),
    };
    format!("{}{} [{}]: {}", indent(1), subject, f.stage, f.message)
}

// ============================================================================
// Run progress
// ============================================================================

/// Format a single progress event as display lines.
pub fn format_process_event(event: &ProcessEvent) -> Vec<String> {
    match event {
        ProcessEvent::AlbumStarted {
            title,
            photo_count,
            pending,
        } => {
            let header = if *pending == 0 {
                format!("{} ({}, up to date)", title, plural(*photo_count, "photo"))
            } else {
                format!(
                    "{} ({}, {} to process)",
                    title,
                    plural(*photo_count, "photo"),
                    pending
                )
            };
            vec![header]
        }
        ProcessEvent::PhotoProcessed {
            filename,
            action,
            variants,
        } => {
            let mut lines = vec![format!("{}{}: {}", indent(1), filename, action)];
            lines.extend(variants.iter().map(variant_line));
            lines
        }
        ProcessEvent::PhotoRecovered { filename } => {
            vec![format!("{}{}: recovered", indent(1), filename)]
        }
        ProcessEvent::PhotoFailed {
            filename,
            stage,
            message,
        } => vec![format!(
            "{}{}: FAILED ({}) {}",
            indent(1),
            filename,
            stage,
            message
        )],
    }
}

// ============================================================================
// Dry run
// ============================================================================

/// Format the planned actions of a dry run.
pub fn format_plan(plan: &[PlannedAlbum]) -> Vec<String> {
    let mut lines = Vec::new();
    let mut to_process = 0;
    let mut unchanged = 0;

    for (i, album) in plan.iter().enumerate() {
        if i > 0 {
            lines.push(String::new());
        }
        lines.push(album_header(i + 1, &album.title, &album.id));
        for (filename, action) in &album.photos {
            match action {
                PhotoAction::Reuse => unchanged += 1,
                _ => to_process += 1,
            }
            lines.push(format!("{}{}: {}", indent(1), filename, action));
        }
    }

    if !lines.is_empty() {
        lines.push(String::new());
    }
    lines.push(format!("{to_process} to process, {unchanged} unchanged"));
    lines
}

// ============================================================================
// Check
// ============================================================================

/// Format the scan inventory shown by `check`.
pub fn format_check(albums: &[AlbumSource]) -> Vec<String> {
    let mut lines = Vec::new();
    for (i, album) in albums.iter().enumerate() {
        lines.push(format!(
            "{} ({})",
            album_header(i + 1, album.title(), &album.id),
            plural(album.photos.len(), "photo")
        ));
        lines.push(format!("{}Source: {}/", indent(1), album.dir_name));
        if let Some(date) = &album.date {
            lines.push(format!("{}Date: {}", indent(1), date));
        }
        if let Some(description) = &album.overrides.description {
            lines.push(format!("{}Description: {}", indent(1), description));
        }

        let count = |state: VariantState| {
            album
                .photos
                .iter()
                .filter(|p| p.variants == state)
                .count()
        };
        lines.push(format!(
            "{}Variants: {} current, {} stale, {} missing",
            indent(1),
            count(VariantState::Current),
            count(VariantState::Stale),
            count(VariantState::Missing)
        ));
    }
    if albums.is_empty() {
        lines.push("No albums found".to_string());
    }
    lines
}

pub fn print_check(albums: &[AlbumSource]) {
    for line in format_check(albums) {
        println!("{}", line);
    }
}

// ============================================================================
// Summary
// ============================================================================

/// Format the end-of-run summary.
pub fn format_run_report(report: &RunReport) -> Vec<String> {
    let mut lines = Vec::new();
    if report.dry_run {
        lines.extend(format_plan(&report.plan));
        return lines;
    }

    lines.push(format!(
        "Processed {}, reused {}, recovered {} (uploaded {}, skipped {})",
        report.photos_processed,
        report.photos_reused,
        report.photos_recovered,
        report.uploads,
        report.uploads_skipped
    ));
    lines.push(format!(
        "Manifest {}: {}, {} ({})",
        report.manifest_path.display(),
        plural(report.manifest_albums, "album"),
        plural(report.manifest_photos, "photo"),
        if report.manifest_changed {
            "updated"
        } else {
            "unchanged"
        }
    ));
    if report.pages_written > 0 {
        lines.push(format!("Wrote {}", plural(report.pages_written, "album page")));
    }
    if !report.failures.is_empty() {
        lines.push(format!("{}:", plural(report.failures.len(), "failure")));
        lines.extend(report.failures.iter().map(failure_line));
    }
    lines
}

pub fn print_run_report(report: &RunReport) {
    for line in format_run_report(report) {
        println!("{}", line);
    }
}

// ============================================================================
// Tests
// ============================================================================
