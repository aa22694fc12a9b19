//! Session state
//!
//! One [`Session`] per application run owns the selection coordinator and
//! the update resolver, wired to the collaborators supplied by the host.

use std::sync::Arc;

use crate::config::CoordinatorConfig;
use crate::download::DownloadTransport;
use crate::images::MetadataExtractor;
use crate::log_info;
use crate::selection::{ConfirmationModal, ImagePicker, SelectionCoordinator, SelectionStore};
use crate::sinks::Sinks;
use crate::update::{CheckOutcome, LocalImageRepository, ReleaseSource, UpdateResolver};

/// Host-provided implementations of the external interfaces
pub struct Collaborators {
    pub store: Arc<dyn SelectionStore>,
    pub extractor: Arc<dyn MetadataExtractor>,
    pub modal: Arc<dyn ConfirmationModal>,
    pub picker: Arc<dyn ImagePicker>,
    pub releases: Arc<dyn ReleaseSource>,
    pub transport: Arc<dyn DownloadTransport>,
    pub sinks: Sinks,
}

pub struct Session {
    pub config: CoordinatorConfig,
    pub selection: Arc<SelectionCoordinator>,
    pub resolver: Arc<UpdateResolver>,
}

impl Session {
    pub fn new(config: CoordinatorConfig, collaborators: Collaborators) -> Self {
        let Collaborators {
            store,
            extractor,
            modal,
            picker,
            releases,
            transport,
            sinks,
        } = collaborators;

        let selection = Arc::new(SelectionCoordinator::new(
            store,
            extractor,
            modal,
            picker,
            sinks.clone(),
        ));
        let resolver = Arc::new(UpdateResolver::new(
            releases,
            LocalImageRepository::new(config.downloads_dir.clone()),
            transport,
            selection.clone(),
            sinks,
        ));

        Self {
            config,
            selection,
            resolver,
        }
    }

    /// Startup check: adopt local firmware and look for a newer release
    pub async fn initialize(&self, allow_download: bool) -> CheckOutcome {
        log_info!(
            "session",
            "Scanning {} for firmware images",
            self.config.downloads_dir.display()
        );
        self.resolver.check_for_update(allow_download).await
    }
}
