//! Firmware update checking
//!
//! Version comparison, the local firmware scan, the remote release query,
//! and the resolver that ties them together.

mod local;
mod release;
mod resolver;
pub mod version;

pub use local::{parse_firmware_filename, LocalImageRepository};
pub use release::{parse_release, ReleaseSource, RemoteReleaseClient};
pub use resolver::{CheckOutcome, UpdateCheckState, UpdatePhase, UpdateResolver};
