//! Local firmware repository
//!
//! Scans the downloads directory for `mcu_v<major>.<minor>.<patch>.img.zip`
//! files. The directory is read fresh on every call.

use std::path::{Path, PathBuf};

use crate::config::firmware::{FILE_PREFIX, FILE_SUFFIX};
use crate::error::{CoordinatorError, Result};
use crate::images::LocalFirmwareFile;
use crate::{log_debug, log_warn};

const MODULE: &str = "update::local";

/// Numeric `(major, minor, patch)` of a conforming firmware file name
pub fn parse_firmware_filename(filename: &str) -> Option<(u64, u64, u64)> {
    let version = filename
        .strip_prefix(FILE_PREFIX)?
        .strip_suffix(FILE_SUFFIX)?;

    let mut parts = version.split('.');
    let mut component = || -> Option<u64> {
        let part = parts.next()?;
        if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        part.parse().ok()
    };

    let triple = (component()?, component()?, component()?);
    if parts.next().is_some() {
        return None;
    }
    Some(triple)
}

#[derive(Debug, Clone)]
pub struct LocalImageRepository {
    directory: PathBuf,
}

impl LocalImageRepository {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Conforming firmware files, newest first
    ///
    /// Ordered by numeric version so `1.10.0` ranks above `1.9.0`; equal
    /// versions fall back to descending file name.
    pub fn list_firmware_images(&self) -> Result<Vec<LocalFirmwareFile>> {
        let entries = std::fs::read_dir(&self.directory).map_err(|source| {
            CoordinatorError::DirectoryUnreadable {
                path: self.directory.clone(),
                source,
            }
        })?;

        let mut found: Vec<((u64, u64, u64), LocalFirmwareFile)> = entries
            .flatten()
            .filter_map(|entry| {
                let filename = entry.file_name().to_str()?.to_string();
                let triple = parse_firmware_filename(&filename)?;
                let (major, minor, patch) = triple;
                Some((
                    triple,
                    LocalFirmwareFile {
                        path: entry.path(),
                        version: format!("{}.{}.{}", major, minor, patch),
                        filename,
                    },
                ))
            })
            .collect();

        found.sort_by(|(a, fa), (b, fb)| b.cmp(a).then_with(|| fb.filename.cmp(&fa.filename)));

        log_debug!(
            MODULE,
            "Found {} firmware image(s) in {}",
            found.len(),
            self.directory.display()
        );
        Ok(found.into_iter().map(|(_, file)| file).collect())
    }

    /// Newest firmware file; an unreadable directory counts as empty
    pub fn latest(&self) -> Option<LocalFirmwareFile> {
        match self.list_firmware_images() {
            Ok(files) => files.into_iter().next(),
            Err(e) => {
                log_warn!(MODULE, "{}", e);
                None
            }
        }
    }
}
