//! Image management module
//!
//! Image data types, the supported-format registry, and metadata
//! extraction from image files.

pub mod formats;
mod metadata;
mod models;

pub use formats::{get_all_extensions, is_supported_image, looks_like_windows_image};
pub use metadata::{read_image_metadata, ExtractionError, FsMetadataExtractor, MetadataExtractor};
pub use models::{FirmwareRelease, Image, LocalFirmwareFile, SelectedImage};
