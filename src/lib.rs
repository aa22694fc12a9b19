//! MCU Imager - image acquisition and update coordination
//!
//! Picks the disk image to flash, validates user-chosen images, and keeps
//! the auxiliary MCU firmware image in step with the newest published
//! release.

pub mod config;
pub mod download;
pub mod error;
pub mod images;
pub mod logging;
pub mod selection;
pub mod sinks;
pub mod state;
pub mod update;
pub mod utils;

pub use config::CoordinatorConfig;
pub use error::{CoordinatorError, Disposition};
pub use state::{Collaborators, Session};
