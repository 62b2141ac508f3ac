//! Album content stubs for the static site.
//!
//! Each album in the manifest gets `content/album/<id>.md` with just enough
//! front matter for the site's album layout to pick it up:
//!
//! ```text
//! ---
//! title: "Summer in Lisbon"
//! type: album
//! ---
//! ```
//!
//! Stubs are rewritten only when their content would change, and stubs for
//! albums that left the manifest are left alone: they may carry hand-written
//! body text.

use crate::manifest::Manifest;
use std::fs;
use std::io;
use std::path::Path;

/// Site content directory, relative to the site root.
pub const CONTENT_DIR: &str = "content";

/// Render the front matter stub for one album.
pub fn album_page(title: &str) -> String {
    format!("---\ntitle: {}\ntype: album\n---\n", quote(title))
}

/// Double-quoted YAML scalar.
fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Write a stub per album under `content_dir/album/`. Returns how many files
/// were created or changed.
pub fn write_album_pages(content_dir: &Path, manifest: &Manifest) -> io::Result<usize> {
    let dir = content_dir.join("album");
    fs::create_dir_all(&dir)?;

    let mut written = 0;
    for album in &manifest.albums {
        let path = dir.join(format!("{}.md", album.id));
        let page = album_page(&album.title);
        if fs::read_to_string(&path).is_ok_and(|existing| existing == page) {
            continue;
        }
        fs::write(&path, page)?;
        tracing::debug!(path = %path.display(), "wrote album page");
        written += 1;
    }
    Ok(written)
}
