//! Download module
//!
//! Fetches firmware bundles into the downloads directory. Starting a
//! download is a one-way request; the outcome arrives later on the
//! completion channel, tagged with the ticket of the request.

use std::path::{Path, PathBuf};
use std::time::Instant;

use futures_util::StreamExt;
use reqwest::Client;
use sha2::{Digest, Sha256};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;

use crate::config::{self, CoordinatorConfig};
use crate::error::{CoordinatorError, Result};
use crate::utils::{bytes_to_mb, format_size, MB};
use crate::{log_debug, log_error, log_info, log_warn};

const MODULE: &str = "download";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    /// Identifies the download this request belongs to
    pub ticket: u64,
    pub url: String,
    /// `<major>.<minor>.<patch>` of the release; names the file on disk
    pub version: String,
    /// Expected lower-case hex SHA-256, when the release publishes one
    pub sha256: Option<String>,
}

#[derive(Debug)]
pub struct DownloadFinished {
    pub ticket: u64,
    pub result: Result<PathBuf>,
}

pub type CompletionSender = mpsc::UnboundedSender<DownloadFinished>;
pub type CompletionReceiver = mpsc::UnboundedReceiver<DownloadFinished>;

/// Starts downloads without waiting for them
pub trait DownloadTransport: Send + Sync {
    fn request_download(&self, request: DownloadRequest);
}

/// Downloads over HTTP(S) on the tokio runtime
pub struct HttpDownloadTransport {
    client: Client,
    output_dir: PathBuf,
    completions: CompletionSender,
}

impl HttpDownloadTransport {
    /// Transport plus the receiving end of its completion channel
    pub fn new(config: &CoordinatorConfig) -> Result<(Self, CompletionReceiver)> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .connect_timeout(config.request_timeout)
            .build()?;
        let (completions, receiver) = mpsc::unbounded_channel();

        Ok((
            Self {
                client,
                output_dir: config.downloads_dir.clone(),
                completions,
            },
            receiver,
        ))
    }
}

impl DownloadTransport for HttpDownloadTransport {
    fn request_download(&self, request: DownloadRequest) {
        let client = self.client.clone();
        let output_dir = self.output_dir.clone();
        let completions = self.completions.clone();

        tokio::spawn(async move {
            let result = download_firmware(&client, &request, &output_dir).await;
            if let Err(e) = &result {
                log_error!(MODULE, "Download {} failed: {}", request.ticket, e);
            }
            if completions
                .send(DownloadFinished {
                    ticket: request.ticket,
                    result,
                })
                .is_err()
            {
                log_warn!(MODULE, "Nobody is listening for download {}", request.ticket);
            }
        });
    }
}

/// Name a firmware bundle is stored under, whatever the asset is called
fn firmware_filename(version: &str) -> String {
    format!(
        "{}{}{}",
        config::firmware::FILE_PREFIX,
        version,
        config::firmware::FILE_SUFFIX
    )
}

/// Logs progress every few megabytes
struct ProgressLog {
    total_bytes: u64,
    processed_bytes: u64,
    next_log_at: u64,
    interval: u64,
    started: Instant,
}

impl ProgressLog {
    fn new(total_bytes: u64) -> Self {
        let interval = config::logging::DOWNLOAD_LOG_INTERVAL_MB * MB;
        Self {
            total_bytes,
            processed_bytes: 0,
            next_log_at: interval,
            interval,
            started: Instant::now(),
        }
    }

    fn update(&mut self, bytes: u64) {
        self.processed_bytes += bytes;
        if self.processed_bytes < self.next_log_at {
            return;
        }
        self.next_log_at = self.processed_bytes + self.interval;

        if self.total_bytes > 0 {
            log_debug!(
                MODULE,
                "Progress: {:.1} MB / {:.1} MB ({:.0}%)",
                bytes_to_mb(self.processed_bytes),
                bytes_to_mb(self.total_bytes),
                self.processed_bytes as f64 / self.total_bytes as f64 * 100.0
            );
        } else {
            log_debug!(MODULE, "Progress: {:.1} MB", bytes_to_mb(self.processed_bytes));
        }
    }

    fn finish(&self) {
        log_info!(
            MODULE,
            "Downloaded {} in {:.1}s",
            format_size(self.processed_bytes),
            self.started.elapsed().as_secs_f64()
        );
    }
}

/// Download one firmware bundle into `output_dir`
///
/// Data lands in `<name>.downloading` first and is renamed into place only
/// after the transfer (and checksum, when known) succeeded.
pub async fn download_firmware(
    client: &Client,
    request: &DownloadRequest,
    output_dir: &Path,
) -> Result<PathBuf> {
    let filename = firmware_filename(&request.version);
    let output_path = output_dir.join(&filename);
    let temp_path = output_dir.join(format!(
        "{}.{}",
        filename,
        config::download::PARTIAL_SUFFIX
    ));

    log_info!(MODULE, "Download requested: {}", request.url);
    log_debug!(MODULE, "Output path: {}", output_path.display());

    tokio::fs::create_dir_all(output_dir).await.map_err(|e| {
        CoordinatorError::DownloadFailed(format!("Failed to create output directory: {}", e))
    })?;

    let result = stream_to_file(client, request, &temp_path).await;
    if let Err(e) = result {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(e);
    }

    tokio::fs::rename(&temp_path, &output_path)
        .await
        .map_err(|e| CoordinatorError::DownloadFailed(format!("Failed to move file: {}", e)))?;

    log_info!(MODULE, "Firmware ready: {}", output_path.display());
    Ok(output_path)
}

async fn stream_to_file(client: &Client, request: &DownloadRequest, temp_path: &Path) -> Result<()> {
    let response = client.get(&request.url).send().await.map_err(|e| {
        CoordinatorError::DownloadFailed(format!("Failed to start download: {}", e))
    })?;

    if !response.status().is_success() {
        return Err(CoordinatorError::DownloadFailed(format!(
            "Download failed with status: {}",
            response.status()
        )));
    }

    let total_size = response.content_length().unwrap_or(0);
    log_info!(MODULE, "Download size: {}", format_size(total_size));

    let mut file = File::create(temp_path).await.map_err(|e| {
        CoordinatorError::DownloadFailed(format!("Failed to create temp file: {}", e))
    })?;
    let mut hasher = Sha256::new();
    let mut progress = ProgressLog::new(total_size);
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk =
            chunk.map_err(|e| CoordinatorError::DownloadFailed(format!("Download error: {}", e)))?;
        file.write_all(&chunk).await.map_err(|e| {
            CoordinatorError::DownloadFailed(format!("Failed to write chunk: {}", e))
        })?;
        hasher.update(&chunk);
        progress.update(chunk.len() as u64);
    }

    file.flush()
        .await
        .map_err(|e| CoordinatorError::DownloadFailed(format!("Failed to flush file: {}", e)))?;
    progress.finish();

    let actual = hex::encode(hasher.finalize());
    verify_sha256(request.sha256.as_deref(), &actual)
}

fn verify_sha256(expected: Option<&str>, actual: &str) -> Result<()> {
    match expected {
        Some(expected) if expected.eq_ignore_ascii_case(actual) => {
            log_info!(MODULE, "SHA256 verification PASSED");
            Ok(())
        }
        Some(expected) => {
            log_error!(
                MODULE,
                "SHA256 verification FAILED! Expected: {}, Got: {}",
                expected,
                actual
            );
            Err(CoordinatorError::DownloadFailed(format!(
                "SHA256 mismatch: expected {}, got {}",
                expected, actual
            )))
        }
        None => {
            log_warn!(MODULE, "No SHA256 published, skipping verification");
            Ok(())
        }
    }
}
