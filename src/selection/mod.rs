//! Image selection
//!
//! The validation gate, the coordinator that commits selections, and the
//! collaborator contracts they talk to.

mod coordinator;
pub mod gate;
mod store;

use std::path::PathBuf;

use async_trait::async_trait;

use crate::images::SelectedImage;

pub use coordinator::{SelectOutcome, SelectionCoordinator};
pub use gate::{ImageValidationGate, Rejection, Verdict, Warning};
pub use store::MemorySelectionStore;

/// Durable record of the image the user intends to flash
pub trait SelectionStore: Send + Sync {
    fn has_image(&self) -> bool;
    fn get_image(&self) -> Option<SelectedImage>;
    fn get_image_path(&self) -> Option<PathBuf>;
    /// Replaces any prior selection as a whole
    fn set_image(&self, image: SelectedImage);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModalOptions {
    pub confirmation_label: String,
    pub rejection_label: String,
    pub description: String,
}

/// Warning modal with a confirm/cancel contract
#[async_trait]
pub trait ConfirmationModal: Send + Sync {
    /// True when the user picked the confirmation button
    async fn display(&self, options: ModalOptions) -> bool;
}

/// File picker that can be reopened after a discarded candidate
#[async_trait]
pub trait ImagePicker: Send + Sync {
    async fn reopen(&self);
}
