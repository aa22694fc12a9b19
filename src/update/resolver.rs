//! Update resolver
//!
//! Joins the remote release check with the local firmware scan, decides
//! whether a newer firmware should be downloaded, and tracks the outcome.
//! Every failure here is absorbed: the user can always pick an image by
//! hand, whatever happens to the background check.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;

use super::local::LocalImageRepository;
use super::release::ReleaseSource;
use super::version;
use crate::download::{CompletionReceiver, DownloadFinished, DownloadRequest, DownloadTransport};
use crate::selection::SelectionCoordinator;
use crate::sinks::Sinks;
use crate::utils::InFlightGuard;
use crate::{log_debug, log_info, log_warn};

const MODULE: &str = "update::resolver";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum UpdatePhase {
    #[default]
    Idle,
    Checking,
    UpToDate,
    UpdateAvailable,
    Downloading,
    DownloadFailed,
}

/// Observable update state, replaced as a whole after each check
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpdateCheckState {
    pub phase: UpdatePhase,
    /// Newest remote version, if the last check reached the endpoint
    pub available_version: Option<String>,
    /// Version of the newest local firmware file
    pub current_version: Option<String>,
    pub downloading: bool,
    #[serde(skip)]
    active_download: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    /// Another check is still running; this one did nothing
    AlreadyRunning,
    /// The release endpoint gave no usable answer
    NoReleaseInfo,
    UpToDate,
    /// Newer firmware exists but downloading was not allowed
    UpdateAvailable,
    /// Newer firmware exists and an earlier download is still running
    DownloadInFlight,
    DownloadStarted { ticket: u64 },
}

pub struct UpdateResolver {
    releases: Arc<dyn ReleaseSource>,
    repository: LocalImageRepository,
    transport: Arc<dyn DownloadTransport>,
    selection: Arc<SelectionCoordinator>,
    sinks: Sinks,
    state: RwLock<UpdateCheckState>,
    checking: AtomicBool,
    next_ticket: AtomicU64,
}

impl UpdateResolver {
    pub fn new(
        releases: Arc<dyn ReleaseSource>,
        repository: LocalImageRepository,
        transport: Arc<dyn DownloadTransport>,
        selection: Arc<SelectionCoordinator>,
        sinks: Sinks,
    ) -> Self {
        Self {
            releases,
            repository,
            transport,
            selection,
            sinks,
            state: RwLock::new(UpdateCheckState::default()),
            checking: AtomicBool::new(false),
            next_ticket: AtomicU64::new(1),
        }
    }

    fn read_state(&self) -> RwLockReadGuard<'_, UpdateCheckState> {
        self.state
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, UpdateCheckState> {
        self.state
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Check remote and local firmware, adopt the newest local file, and
    /// start a download when a newer release exists and `allow_download`.
    pub async fn check_for_update(&self, allow_download: bool) -> CheckOutcome {
        let Some(_guard) = InFlightGuard::try_acquire(&self.checking) else {
            log_debug!(MODULE, "Update check already running");
            return CheckOutcome::AlreadyRunning;
        };

        {
            let mut state = self.write_state();
            if !state.downloading {
                state.phase = UpdatePhase::Checking;
            }
        }
        log_info!(MODULE, "Checking for firmware updates");

        let repository = self.repository.clone();
        let (release, local) = tokio::join!(self.releases.fetch_latest_release(), async move {
            tokio::task::spawn_blocking(move || repository.latest())
                .await
                .unwrap_or_else(|e| {
                    log_warn!(MODULE, "Firmware scan task failed: {}", e);
                    None
                })
        });

        let (outcome, request) = {
            let mut state = self.write_state();
            state.available_version = release.as_ref().map(|r| r.version.clone());
            state.current_version = local.as_ref().map(|l| l.version.clone());

            let newer = match (&state.available_version, &state.current_version) {
                (Some(remote), Some(current)) => {
                    version::update_available(Some(remote.as_str()), Some(current.as_str()))
                }
                (Some(remote), None) => version::parse_version(remote).is_ok(),
                _ => false,
            };

            match &release {
                _ if state.downloading => {
                    state.phase = UpdatePhase::Downloading;
                    (CheckOutcome::DownloadInFlight, None)
                }
                None => {
                    state.phase = UpdatePhase::Idle;
                    (CheckOutcome::NoReleaseInfo, None)
                }
                Some(_) if !newer => {
                    state.phase = UpdatePhase::UpToDate;
                    (CheckOutcome::UpToDate, None)
                }
                Some(_) if !allow_download => {
                    state.phase = UpdatePhase::UpdateAvailable;
                    (CheckOutcome::UpdateAvailable, None)
                }
                Some(release) => match version::parse_version(&release.version) {
                    Ok(parsed) => {
                        let ticket = self.next_ticket.fetch_add(1, Ordering::SeqCst);
                        state.downloading = true;
                        state.active_download = Some(ticket);
                        state.phase = UpdatePhase::Downloading;
                        (
                            CheckOutcome::DownloadStarted { ticket },
                            Some(DownloadRequest {
                                ticket,
                                url: release.download_url.clone(),
                                // the local scan only recognizes major.minor.patch
                                version: format!(
                                    "{}.{}.{}",
                                    parsed.major, parsed.minor, parsed.patch
                                ),
                                sha256: release.sha256.clone(),
                            }),
                        )
                    }
                    Err(e) => {
                        log_warn!(MODULE, "Not downloading release: {}", e);
                        state.phase = UpdatePhase::UpdateAvailable;
                        (CheckOutcome::UpdateAvailable, None)
                    }
                },
            }
        };

        if let Some(local) = &local {
            self.selection.adopt_default_firmware(&local.path);
        }

        if let Some(request) = request {
            log_info!(
                MODULE,
                "Downloading firmware {} (ticket {})",
                release.as_ref().map(|r| r.version.as_str()).unwrap_or(""),
                request.ticket
            );
            self.transport.request_download(request);
        }

        log_debug!(MODULE, "Update check finished: {:?}", outcome);
        outcome
    }

    /// Completion signal for a download started by this resolver
    ///
    /// Completions for any other ticket are ignored. A successful download
    /// is selected and followed by a check that never downloads again.
    pub async fn on_download_complete(&self, finished: DownloadFinished) {
        let accepted = {
            let mut state = self.write_state();
            if state.active_download != Some(finished.ticket) {
                false
            } else {
                state.downloading = false;
                state.active_download = None;
                state.phase = if finished.result.is_ok() {
                    UpdatePhase::Idle
                } else {
                    UpdatePhase::DownloadFailed
                };
                true
            }
        };

        if !accepted {
            log_warn!(
                MODULE,
                "Ignoring completion of unknown download {}",
                finished.ticket
            );
            return;
        }

        match finished.result {
            Ok(path) => {
                log_info!(MODULE, "Firmware downloaded: {}", path.display());
                if !self.selection.select_trusted_firmware(&path) {
                    log_warn!(MODULE, "Selection pending, {} not selected", path.display());
                }
                self.check_for_update(false).await;
            }
            Err(e) => self.sinks.report("Firmware download", &e),
        }
    }

    /// Feed completions into the resolver until no download is running
    pub async fn wait_for_download(&self, completions: &mut CompletionReceiver) {
        while self.is_downloading() {
            match completions.recv().await {
                Some(finished) => self.on_download_complete(finished).await,
                None => {
                    log_warn!(MODULE, "Download channel closed");
                    break;
                }
            }
        }
    }

    /// Label for the UI download button
    pub fn download_prompt_label(&self) -> String {
        let state = self.read_state();
        if state.downloading {
            "Downloading...".to_string()
        } else {
            format!(
                "Download {}",
                state.available_version.as_deref().unwrap_or_default()
            )
        }
    }

    pub fn is_update_available(&self) -> bool {
        let state = self.read_state();
        version::update_available(
            state.available_version.as_deref(),
            state.current_version.as_deref(),
        )
    }

    pub fn is_downloading(&self) -> bool {
        self.read_state().downloading
    }

    pub fn snapshot(&self) -> UpdateCheckState {
        self.read_state().clone()
    }
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::error::CoordinatorError;
    use crate::images::{ExtractionError, FirmwareRelease, Image, MetadataExtractor};
    use crate::selection::{ConfirmationModal, ImagePicker, MemorySelectionStore, ModalOptions};

    struct FixedRelease(Option<FirmwareRelease>);

    #[async_trait]
    impl ReleaseSource for FixedRelease {
        async fn fetch_latest_release(&self) -> Option<FirmwareRelease> {
            self.0.clone()
        }
    }

    #[derive(Default)]
    struct RecordingTransport {
        requests: Mutex<Vec<DownloadRequest>>,
    }

    impl DownloadTransport for RecordingTransport {
        fn request_download(&self, request: DownloadRequest) {
            self.requests.lock().unwrap().push(request);
        }
    }

    struct NoExtractor;

    #[async_trait]
    impl MetadataExtractor for NoExtractor {
        async fn get_image_metadata(&self, _path: &Path) -> Result<Image, ExtractionError> {
            Err(ExtractionError("not used".into()))
        }
    }

    struct NoModal;

    #[async_trait]
    impl ConfirmationModal for NoModal {
        async fn display(&self, _options: ModalOptions) -> bool {
            false
        }
    }

    #[async_trait]
    impl ImagePicker for NoModal {
        async fn reopen(&self) {}
    }

    fn release(version: &str) -> FirmwareRelease {
        FirmwareRelease {
            version: version.to_string(),
            download_url: format!("https://example.com/mcu_v{}.img.zip", version),
            asset_name: None,
            sha256: None,
            published_at: None,
        }
    }

    struct Fixture {
        resolver: UpdateResolver,
        transport: Arc<RecordingTransport>,
        selection: Arc<SelectionCoordinator>,
        _dir: tempfile::TempDir,
        dir_path: PathBuf,
    }

    fn fixture(remote: Option<&str>, local_files: &[&str]) -> Fixture {
        fixture_with(remote.map(release), local_files)
    }

    fn fixture_with(remote: Option<FirmwareRelease>, local_files: &[&str]) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        for name in local_files {
            std::fs::write(dir.path().join(name), b"firmware").unwrap();
        }
        let transport = Arc::new(RecordingTransport::default());
        let selection = Arc::new(SelectionCoordinator::new(
            Arc::new(MemorySelectionStore::new()),
            Arc::new(NoExtractor),
            Arc::new(NoModal),
            Arc::new(NoModal),
            Sinks::default(),
        ));
        let resolver = UpdateResolver::new(
            Arc::new(FixedRelease(remote)),
            LocalImageRepository::new(dir.path()),
            transport.clone(),
            selection.clone(),
            Sinks::default(),
        );
        Fixture {
            resolver,
            transport,
            selection,
            dir_path: dir.path().to_path_buf(),
            _dir: dir,
        }
    }

    #[tokio::test]
    async fn test_newer_remote_starts_exactly_one_download() {
        let f = fixture(Some("1.3.0"), &["mcu_v1.2.0.img.zip"]);

        let first = f.resolver.check_for_update(true).await;
        assert!(matches!(first, CheckOutcome::DownloadStarted { .. }));
        assert!(f.resolver.is_downloading());
        assert_eq!(f.resolver.download_prompt_label(), "Downloading...");

        let second = f.resolver.check_for_update(true).await;
        assert_eq!(second, CheckOutcome::DownloadInFlight);

        let requests = f.transport.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].url, "https://example.com/mcu_v1.3.0.img.zip");
        assert_eq!(requests[0].version, "1.3.0");
    }

    #[tokio::test]
    async fn test_newest_local_firmware_is_adopted() {
        let f = fixture(
            Some("1.2.0"),
            &["mcu_v1.0.0.img.zip", "mcu_v1.2.0.img.zip"],
        );

        assert_eq!(f.resolver.check_for_update(true).await, CheckOutcome::UpToDate);
        assert_eq!(f.selection.current_basename(), "mcu_v1.2.0.img.zip");

        let state = f.resolver.snapshot();
        assert_eq!(state.phase, UpdatePhase::UpToDate);
        assert_eq!(state.current_version.as_deref(), Some("1.2.0"));
        assert_eq!(state.available_version.as_deref(), Some("1.2.0"));
        assert!(f.transport.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_without_permission_only_reports() {
        let f = fixture(Some("1.3.0"), &["mcu_v1.2.0.img.zip"]);

        assert_eq!(
            f.resolver.check_for_update(false).await,
            CheckOutcome::UpdateAvailable
        );
        assert!(f.resolver.is_update_available());
        assert!(!f.resolver.is_downloading());
        assert_eq!(f.resolver.download_prompt_label(), "Download 1.3.0");
        assert!(f.transport.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_no_local_firmware_downloads_remote() {
        let f = fixture(Some("1.0.0"), &[]);

        assert!(matches!(
            f.resolver.check_for_update(true).await,
            CheckOutcome::DownloadStarted { .. }
        ));
        assert_eq!(f.selection.current_basename(), "");
    }

    #[tokio::test]
    async fn test_unreachable_remote_stays_silent() {
        let f = fixture(None, &["mcu_v1.2.0.img.zip"]);

        assert_eq!(
            f.resolver.check_for_update(true).await,
            CheckOutcome::NoReleaseInfo
        );
        let state = f.resolver.snapshot();
        assert_eq!(state.phase, UpdatePhase::Idle);
        assert_eq!(state.available_version, None);
        assert_eq!(state.current_version.as_deref(), Some("1.2.0"));
        assert_eq!(f.resolver.download_prompt_label(), "Download ");
        assert_eq!(f.selection.current_basename(), "mcu_v1.2.0.img.zip");
    }

    #[tokio::test]
    async fn test_successful_download_is_selected_and_rechecked() {
        let f = fixture(Some("1.3.0"), &["mcu_v1.2.0.img.zip"]);
        let CheckOutcome::DownloadStarted { ticket } = f.resolver.check_for_update(true).await
        else {
            panic!("expected a download");
        };

        // the transport would have written this file
        let downloaded = f.dir_path.join("mcu_v1.3.0.img.zip");
        std::fs::write(&downloaded, b"firmware").unwrap();
        f.resolver
            .on_download_complete(DownloadFinished {
                ticket,
                result: Ok(downloaded),
            })
            .await;

        let state = f.resolver.snapshot();
        assert!(!state.downloading);
        assert_eq!(state.phase, UpdatePhase::UpToDate);
        assert_eq!(state.current_version.as_deref(), Some("1.3.0"));
        assert_eq!(f.selection.current_basename(), "mcu_v1.3.0.img.zip");
        assert_eq!(f.resolver.download_prompt_label(), "Download 1.3.0");
        assert_eq!(f.transport.requests.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_download_is_absorbed() {
        let f = fixture(Some("1.3.0"), &["mcu_v1.2.0.img.zip"]);
        let CheckOutcome::DownloadStarted { ticket } = f.resolver.check_for_update(true).await
        else {
            panic!("expected a download");
        };

        f.resolver
            .on_download_complete(DownloadFinished {
                ticket,
                result: Err(CoordinatorError::DownloadFailed("HTTP 500".into())),
            })
            .await;

        let state = f.resolver.snapshot();
        assert!(!state.downloading);
        assert_eq!(state.phase, UpdatePhase::DownloadFailed);
        assert_eq!(f.selection.current_basename(), "mcu_v1.2.0.img.zip");

        // a later check may try again
        assert!(matches!(
            f.resolver.check_for_update(true).await,
            CheckOutcome::DownloadStarted { .. }
        ));
        assert_eq!(f.transport.requests.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_foreign_completion_does_not_clear_downloading() {
        let f = fixture(Some("1.3.0"), &["mcu_v1.2.0.img.zip"]);
        let CheckOutcome::DownloadStarted { ticket } = f.resolver.check_for_update(true).await
        else {
            panic!("expected a download");
        };

        f.resolver
            .on_download_complete(DownloadFinished {
                ticket: ticket + 100,
                result: Ok(PathBuf::from("/elsewhere/mcu_v9.9.9.img.zip")),
            })
            .await;

        assert!(f.resolver.is_downloading());
        assert_eq!(f.selection.current_basename(), "mcu_v1.2.0.img.zip");
    }

    #[tokio::test]
    async fn test_concurrent_checks_are_serialized() {
        let f = fixture(Some("1.3.0"), &["mcu_v1.2.0.img.zip"]);

        let (a, b) = tokio::join!(
            f.resolver.check_for_update(true),
            f.resolver.check_for_update(true)
        );

        let started = [a, b]
            .iter()
            .filter(|o| matches!(o, CheckOutcome::DownloadStarted { .. }))
            .count();
        assert_eq!(started, 1);
        assert_eq!(f.transport.requests.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_recheck_keeps_user_chosen_image() {
        let f = fixture(Some("1.3.0"), &["mcu_v1.2.0.img.zip"]);
        f.resolver.check_for_update(false).await;
        assert_eq!(f.selection.current_basename(), "mcu_v1.2.0.img.zip");

        let user = Image {
            has_mbr: true,
            ..Image::from_path(f.dir_path.join("raspios.img"))
        };
        f.selection.select(user).await;
        std::fs::write(f.dir_path.join("mcu_v1.3.0.img.zip"), b"firmware").unwrap();

        f.resolver.check_for_update(false).await;

        assert_eq!(f.selection.current_basename(), "raspios.img");
        assert_eq!(
            f.resolver.snapshot().current_version.as_deref(),
            Some("1.3.0")
        );
    }

    #[tokio::test]
    async fn test_download_request_names_file_by_version() {
        let mut remote = release("v1.3.0");
        remote.download_url = "https://example.com/assets/firmware.zip".to_string();
        let f = fixture_with(Some(remote), &["mcu_v1.2.0.img.zip"]);

        let CheckOutcome::DownloadStarted { ticket } = f.resolver.check_for_update(true).await
        else {
            panic!("expected a download");
        };
        let version = f.transport.requests.lock().unwrap()[0].version.clone();
        assert_eq!(version, "1.3.0");

        let downloaded = f.dir_path.join(format!("mcu_v{}.img.zip", version));
        std::fs::write(&downloaded, b"firmware").unwrap();
        f.resolver
            .on_download_complete(DownloadFinished {
                ticket,
                result: Ok(downloaded),
            })
            .await;

        assert_eq!(f.selection.current_basename(), "mcu_v1.3.0.img.zip");
        assert_eq!(f.resolver.snapshot().phase, UpdatePhase::UpToDate);
        assert_eq!(f.resolver.check_for_update(true).await, CheckOutcome::UpToDate);
        assert_eq!(f.transport.requests.lock().unwrap().len(), 1);
    }
}
