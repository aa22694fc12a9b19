//! Image data models
//!
//! Types representing candidate images, the committed selection, and
//! firmware releases both remote and on disk.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A candidate disk image, as produced by metadata extraction or a file picker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    pub path: PathBuf,
    pub size: Option<u64>,
    #[serde(rename = "hasMBR")]
    pub has_mbr: bool,
    pub looks_like_windows_image: bool,
    /// Embedded logo, if the image ships one
    pub logo: Option<String>,
    /// Block map contents, if the image ships one
    pub bmap: Option<String>,
}

impl Image {
    /// Image with no metadata beyond its path
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            size: None,
            has_mbr: false,
            looks_like_windows_image: false,
            logo: None,
            bmap: None,
        }
    }

    /// Last extension, lower-cased
    pub fn extension(&self) -> Option<String> {
        self.path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
    }
}

/// The image the user intends to flash
///
/// Feature flags are plain booleans here; the raw logo/bmap payloads stay
/// with the candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedImage {
    pub path: PathBuf,
    pub size: Option<u64>,
    #[serde(rename = "hasMBR")]
    pub has_mbr: bool,
    pub logo: bool,
    pub bmap: bool,
    /// Firmware artifacts committed without OS-image validation
    pub trusted_firmware: bool,
}

impl From<Image> for SelectedImage {
    fn from(image: Image) -> Self {
        Self {
            path: image.path,
            size: image.size,
            has_mbr: image.has_mbr,
            logo: image.logo.is_some_and(|l| !l.is_empty()),
            bmap: image.bmap.is_some_and(|b| !b.is_empty()),
            trusted_firmware: false,
        }
    }
}

impl SelectedImage {
    pub fn trusted_firmware(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            size: None,
            has_mbr: false,
            logo: false,
            bmap: false,
            trusted_firmware: true,
        }
    }
}

/// Newest published firmware release
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FirmwareRelease {
    /// Version tag with any leading `v` removed
    pub version: String,
    /// Download URL of the first asset
    pub download_url: String,
    pub asset_name: Option<String>,
    /// Lower-case hex SHA-256 published for the asset
    pub sha256: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

/// A firmware file found in the downloads directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalFirmwareFile {
    pub filename: String,
    pub path: PathBuf,
    /// `<major>.<minor>.<patch>` taken from the filename
    pub version: String,
}
