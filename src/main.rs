//! MCU Imager - headless session runner
//!
//! Adopts the newest firmware image in the downloads directory, fetches a
//! newer one when published, and optionally validates and selects a disk
//! image given on the command line.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use async_trait::async_trait;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use mcu_imager::config::{self, CoordinatorConfig};
use mcu_imager::download::HttpDownloadTransport;
use mcu_imager::images::FsMetadataExtractor;
use mcu_imager::selection::{ConfirmationModal, ImagePicker, MemorySelectionStore, ModalOptions};
use mcu_imager::sinks::{ErrorReporter, LogSink, Sinks};
use mcu_imager::update::RemoteReleaseClient;
use mcu_imager::{log_error, log_info, logging, Collaborators, Session};

#[derive(Debug, Parser)]
#[command(name = "mcu-imager", version, about = "Select disk images and keep MCU firmware current")]
struct Args {
    /// Disk image to validate and select
    image: Option<PathBuf>,

    /// Check for new firmware without downloading it
    #[arg(long)]
    no_download: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    /// Directory holding mcu_v*.img.zip firmware images
    #[arg(long, value_name = "DIR")]
    downloads_dir: Option<PathBuf>,
}

/// Asks on the terminal; anything but "change" keeps the new image
struct TerminalModal;

#[async_trait]
impl ConfirmationModal for TerminalModal {
    async fn display(&self, options: ModalOptions) -> bool {
        println!("\n{}\n", options.description);
        print!(
            "[{}] / [{}] (default {}): ",
            options.confirmation_label, options.rejection_label, options.rejection_label
        );
        let _ = std::io::stdout().flush();

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        match lines.next_line().await {
            Ok(Some(answer)) => answer
                .trim()
                .eq_ignore_ascii_case(&options.confirmation_label),
            _ => false,
        }
    }
}

#[async_trait]
impl ImagePicker for TerminalModal {
    async fn reopen(&self) {
        println!("Image discarded. Run again with another image to select it.");
    }
}

struct TerminalReporter;

impl ErrorReporter for TerminalReporter {
    fn show_error(&self, title: &str, message: &str) {
        eprintln!("{}: {}", title, message);
    }
}

/// Remove partial firmware downloads left behind by an earlier run
fn cleanup_partial_downloads(dir: &Path) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };

    let suffix = format!(".{}", config::download::PARTIAL_SUFFIX);
    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with(config::firmware::FILE_PREFIX) && name.ends_with(&suffix) {
            log_info!("main", "Removing partial download: {}", name);
            let _ = std::fs::remove_file(entry.path());
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    logging::init();
    if args.debug {
        logging::set_log_level(true);
    }

    log_info!("main", "=== MCU Imager Starting ===");
    log_info!("main", "Version: {}", env!("CARGO_PKG_VERSION"));
    log_info!(
        "main",
        "OS: {} {}",
        std::env::consts::OS,
        std::env::consts::ARCH
    );

    let mut config = CoordinatorConfig::from_env();
    if let Some(dir) = args.downloads_dir {
        config = config.with_downloads_dir(dir);
    }
    log_info!("main", "Release endpoint: {}", config.release_url);
    log_info!("main", "Downloads directory: {}", config.downloads_dir.display());

    cleanup_partial_downloads(&config.downloads_dir);

    let releases = match RemoteReleaseClient::new(&config) {
        Ok(client) => client,
        Err(e) => {
            log_error!("main", "Failed to create release client: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let (transport, mut completions) = match HttpDownloadTransport::new(&config) {
        Ok(pair) => pair,
        Err(e) => {
            log_error!("main", "Failed to create download client: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let session = Session::new(
        config,
        Collaborators {
            store: Arc::new(MemorySelectionStore::new()),
            extractor: Arc::new(FsMetadataExtractor),
            modal: Arc::new(TerminalModal),
            picker: Arc::new(TerminalModal),
            releases: Arc::new(releases),
            transport: Arc::new(transport),
            sinks: Sinks::new(Arc::new(TerminalReporter), Arc::new(LogSink)),
        },
    );

    let outcome = session.initialize(!args.no_download).await;
    log_info!("main", "Update check: {:?}", outcome);
    session.resolver.wait_for_download(&mut completions).await;

    if let Some(image) = &args.image {
        let outcome = session.selection.select_by_path(image).await;
        log_info!("main", "Selection of {}: {:?}", image.display(), outcome);
    }

    let state = session.resolver.snapshot();
    println!(
        "Firmware: local {} / latest {} ({:?})",
        state.current_version.as_deref().unwrap_or("none"),
        state.available_version.as_deref().unwrap_or("unknown"),
        state.phase
    );
    if session.resolver.is_update_available() {
        println!("{}", session.resolver.download_prompt_label());
    }

    let selected = session.selection.current_basename();
    if selected.is_empty() {
        println!("Selected image: none");
    } else {
        println!("Selected image: {}", selected);
    }

    ExitCode::SUCCESS
}
