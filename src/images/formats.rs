//! Supported-format registry
//!
//! Extension rules deciding which files can be flashed, and the name
//! heuristic for Windows installation media.

use std::collections::BTreeSet;
use std::path::Path;

/// Extensions of raw, directly flashable images
pub const NON_COMPRESSED_EXTENSIONS: &[&str] = &[
    "img", "iso", "bin", "dsk", "hddimg", "raw", "dmg", "sdcard", "rpi-sdimg", "wic",
];

/// Single-file compression wrappers around a raw image
pub const COMPRESSED_EXTENSIONS: &[&str] = &["gz", "bz2", "xz", "zst"];

/// Archives containing an image
pub const ARCHIVE_EXTENSIONS: &[&str] = &["zip", "etch"];

const WINDOWS_MARKERS: &[&str] = &["windows", "win7", "win8", "win10", "winxp"];

/// Every extension the registry recognizes
pub fn get_all_extensions() -> BTreeSet<&'static str> {
    NON_COMPRESSED_EXTENSIONS
        .iter()
        .chain(COMPRESSED_EXTENSIONS)
        .chain(ARCHIVE_EXTENSIONS)
        .copied()
        .collect()
}

fn file_name_lower(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// Last and penultimate extensions of a file name, lower-cased
fn extensions(path: &Path) -> (Option<String>, Option<String>) {
    let name = file_name_lower(path);
    // first part is the stem, never an extension
    let mut parts: Vec<&str> = name.split('.').skip(1).collect();
    let last = parts.pop().map(str::to_string);
    let penultimate = parts.pop().map(str::to_string);
    (last, penultimate)
}

/// True when the path can be flashed as-is or after decompression
///
/// A compressed file qualifies when it wraps a raw image or names no inner
/// format at all, so `disk.img.xz` and `disk.xz` are supported while
/// `notes.txt.xz` is not.
pub fn is_supported_image(path: &Path) -> bool {
    let (last, penultimate) = extensions(path);
    let Some(last) = last else {
        return false;
    };

    if NON_COMPRESSED_EXTENSIONS.contains(&last.as_str())
        || ARCHIVE_EXTENSIONS.contains(&last.as_str())
    {
        return true;
    }

    if !COMPRESSED_EXTENSIONS.contains(&last.as_str()) {
        return false;
    }

    match penultimate {
        None => true,
        Some(ext) => NON_COMPRESSED_EXTENSIONS.contains(&ext.as_str()),
    }
}

/// True when the file name suggests Windows installation media
pub fn looks_like_windows_image(path: &Path) -> bool {
    let name = file_name_lower(path);
    WINDOWS_MARKERS.iter().any(|marker| name.contains(marker))
}

/// Compression wrapper of a path, if its last extension names one
pub fn compression_of(path: &Path) -> Option<&'static str> {
    let (last, _) = extensions(path);
    let last = last?;
    COMPRESSED_EXTENSIONS
        .iter()
        .chain(ARCHIVE_EXTENSIONS)
        .find(|ext| **ext == last)
        .copied()
}
