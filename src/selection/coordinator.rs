//! Selection coordinator
//!
//! Runs candidates through the validation gate and commits the survivors
//! to the selection store. One selection attempt runs at a time.

use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use serde_json::json;

use super::gate::{ImageValidationGate, Verdict};
use super::{ConfirmationModal, ImagePicker, SelectionStore};
use crate::error::CoordinatorError;
use crate::images::{Image, MetadataExtractor, SelectedImage};
use crate::sinks::Sinks;
use crate::utils::{basename, InFlightGuard};
use crate::{log_debug, log_info};

const MODULE: &str = "selection";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectOutcome {
    /// The candidate is now the selected image
    Committed,
    /// Unsupported format; nothing changed
    Rejected,
    /// User chose to pick another image; the prior selection stands
    Reselecting,
    /// Metadata could not be read; nothing changed
    ExtractionFailed,
    /// Another selection is still pending; nothing changed
    Busy,
}

pub struct SelectionCoordinator {
    store: Arc<dyn SelectionStore>,
    gate: ImageValidationGate,
    extractor: Arc<dyn MetadataExtractor>,
    modal: Arc<dyn ConfirmationModal>,
    picker: Arc<dyn ImagePicker>,
    sinks: Sinks,
    selecting: AtomicBool,
}

impl SelectionCoordinator {
    pub fn new(
        store: Arc<dyn SelectionStore>,
        extractor: Arc<dyn MetadataExtractor>,
        modal: Arc<dyn ConfirmationModal>,
        picker: Arc<dyn ImagePicker>,
        sinks: Sinks,
    ) -> Self {
        Self {
            store,
            gate: ImageValidationGate,
            extractor,
            modal,
            picker,
            sinks,
            selecting: AtomicBool::new(false),
        }
    }

    /// Validate and commit an image supplied with its metadata
    pub async fn select(&self, image: Image) -> SelectOutcome {
        let Some(_guard) = InFlightGuard::try_acquire(&self.selecting) else {
            log_debug!(MODULE, "Selection already pending, ignoring {}", image.path.display());
            return SelectOutcome::Busy;
        };
        self.validate_and_commit(image).await
    }

    /// Resolve metadata for `path`, then validate and commit it
    pub async fn select_by_path(&self, path: &Path) -> SelectOutcome {
        let Some(_guard) = InFlightGuard::try_acquire(&self.selecting) else {
            log_debug!(MODULE, "Selection already pending, ignoring {}", path.display());
            return SelectOutcome::Busy;
        };

        match self.extractor.get_image_metadata(path).await {
            Ok(image) => self.validate_and_commit(image).await,
            Err(e) => {
                let error = CoordinatorError::MetadataExtractionFailed {
                    basename: basename(path),
                    message: e.to_string(),
                };
                self.sinks.report("Error opening image", &error);
                SelectOutcome::ExtractionFailed
            }
        }
    }

    /// Commit a freshly downloaded firmware bundle
    ///
    /// Firmware zips are not OS images, so neither metadata extraction nor
    /// the validation gate applies. Returns false when a user selection is
    /// pending and the bundle was not committed.
    pub fn select_trusted_firmware(&self, path: &Path) -> bool {
        let Some(_guard) = InFlightGuard::try_acquire(&self.selecting) else {
            log_debug!(MODULE, "Selection pending, not selecting {}", path.display());
            return false;
        };
        self.commit_firmware(path);
        true
    }

    /// Make `path` the default selection unless the user chose an image
    ///
    /// Only an empty selection or an earlier firmware bundle is replaced.
    pub fn adopt_default_firmware(&self, path: &Path) -> bool {
        let Some(_guard) = InFlightGuard::try_acquire(&self.selecting) else {
            log_debug!(MODULE, "Selection pending, not adopting {}", path.display());
            return false;
        };
        if let Some(current) = self.store.get_image() {
            if !current.trusted_firmware {
                log_debug!(
                    MODULE,
                    "Keeping user image {}, not adopting {}",
                    current.path.display(),
                    path.display()
                );
                return false;
            }
        }
        self.commit_firmware(path);
        true
    }

    fn commit_firmware(&self, path: &Path) {
        if self.store.get_image_path().as_deref() == Some(path) {
            log_debug!(MODULE, "Firmware already selected: {}", path.display());
            return;
        }
        log_info!(MODULE, "Selecting firmware image: {}", path.display());
        self.store.set_image(SelectedImage::trusted_firmware(path));
    }

    /// Base name of the selected image, empty when nothing is selected
    pub fn current_basename(&self) -> String {
        self.store
            .get_image_path()
            .map(|path| basename(&path))
            .unwrap_or_default()
    }

    pub fn current(&self) -> Option<SelectedImage> {
        self.store.get_image()
    }

    async fn validate_and_commit(&self, image: Image) -> SelectOutcome {
        match self.gate.validate(&image) {
            Verdict::Accepted => {}
            Verdict::Rejected(reason) => {
                let error = CoordinatorError::UnsupportedFormat {
                    path: image.path.clone(),
                };
                self.sinks.log_event(
                    "Invalid image",
                    json!({ "image": image.path, "reason": reason.as_str() }),
                );
                self.sinks.report("Invalid image", &error);
                return SelectOutcome::Rejected;
            }
            Verdict::NeedsConfirmation(warning) => {
                self.sinks
                    .log_event(warning.event_name(), json!({ "image": image.path }));

                let should_change = self.modal.display(warning.modal_options()).await;
                if should_change {
                    log_info!(
                        MODULE,
                        "Discarding {} ({}), reopening picker",
                        image.path.display(),
                        warning
                    );
                    self.picker.reopen().await;
                    return SelectOutcome::Reselecting;
                }
                log_info!(MODULE, "User continued despite warning: {}", warning);
            }
        }

        log_info!(MODULE, "Selected image: {}", image.path.display());
        self.store.set_image(SelectedImage::from(image));
        SelectOutcome::Committed
    }
}
