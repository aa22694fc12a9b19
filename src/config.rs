//! Application configuration
//!
//! Compile-time constants grouped by concern, plus the runtime
//! [`CoordinatorConfig`] handed to a session.

use std::path::PathBuf;
use std::time::Duration;

use crate::utils::get_downloads_dir;

pub mod app {
    /// Application name (used for log lines and the HTTP user agent)
    pub const NAME: &str = "mcu-imager";
    pub const USER_AGENT: &str = concat!("MCU-Imager/", env!("CARGO_PKG_VERSION"));
}

pub mod urls {
    /// "Latest release" endpoint publishing MCU firmware images
    pub const LATEST_RELEASE: &str =
        "https://api.github.com/repos/mcu-imager/firmware/releases/latest";
}

pub mod firmware {
    /// Firmware files are named `mcu_v<major>.<minor>.<patch>.img.zip`
    pub const FILE_PREFIX: &str = "mcu_v";
    pub const FILE_SUFFIX: &str = ".img.zip";
}

pub mod download {
    /// Suffix of partially downloaded files
    pub const PARTIAL_SUFFIX: &str = "downloading";
    /// Timeout for the release metadata request, in seconds
    pub const REQUEST_TIMEOUT_SECS: u64 = 15;
}

pub mod logging {
    /// Log download progress every N megabytes
    pub const DOWNLOAD_LOG_INTERVAL_MB: u64 = 4;
    /// Environment variable overriding the log filter
    pub const FILTER_ENV: &str = "MCU_IMAGER_LOG";
}

pub mod env {
    pub const RELEASE_URL: &str = "MCU_IMAGER_RELEASE_URL";
    pub const DOWNLOADS_DIR: &str = "MCU_IMAGER_DOWNLOADS_DIR";
}

/// Runtime settings for one application session
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Endpoint queried for the newest published firmware
    pub release_url: String,
    /// Directory scanned for `mcu_v*.img.zip` files and used as download target
    pub downloads_dir: PathBuf,
    pub user_agent: String,
    pub request_timeout: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            release_url: urls::LATEST_RELEASE.to_string(),
            downloads_dir: get_downloads_dir(),
            user_agent: app::USER_AGENT.to_string(),
            request_timeout: Duration::from_secs(download::REQUEST_TIMEOUT_SECS),
        }
    }
}

impl CoordinatorConfig {
    /// Defaults overlaid with `MCU_IMAGER_*` environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = std::env::var(env::RELEASE_URL) {
            if !url.trim().is_empty() {
                config.release_url = url.trim().to_string();
            }
        }

        if let Ok(dir) = std::env::var(env::DOWNLOADS_DIR) {
            if !dir.trim().is_empty() {
                config.downloads_dir = PathBuf::from(dir.trim());
            }
        }

        config
    }

    pub fn with_downloads_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.downloads_dir = dir.into();
        self
    }

    pub fn with_release_url(mut self, url: impl Into<String>) -> Self {
        self.release_url = url.into();
        self
    }
}
