//! Image metadata extraction
//!
//! Reads the first sector of an image, looking through compression and
//! archive wrappers, to tell whether a partition table is present.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use async_trait::async_trait;
use bzip2::read::BzDecoder;
use flate2::read::GzDecoder;
use thiserror::Error;
use xz2::read::XzDecoder;
use zstd::stream::read::Decoder as ZstdDecoder;

use super::formats::{compression_of, is_supported_image, looks_like_windows_image};
use super::models::Image;
use crate::log_debug;

const MODULE: &str = "images::metadata";

const SECTOR_SIZE: usize = 512;
const MBR_SIGNATURE: [u8; 2] = [0x55, 0xAA];

/// Human-readable reason metadata could not be read
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct ExtractionError(pub String);

impl From<io::Error> for ExtractionError {
    fn from(e: io::Error) -> Self {
        Self(e.to_string())
    }
}

impl From<zip::result::ZipError> for ExtractionError {
    fn from(e: zip::result::ZipError) -> Self {
        Self(e.to_string())
    }
}

#[async_trait]
pub trait MetadataExtractor: Send + Sync {
    async fn get_image_metadata(&self, path: &Path) -> Result<Image, ExtractionError>;
}

/// Extracts metadata from files on the local filesystem
#[derive(Debug, Default, Clone, Copy)]
pub struct FsMetadataExtractor;

#[async_trait]
impl MetadataExtractor for FsMetadataExtractor {
    async fn get_image_metadata(&self, path: &Path) -> Result<Image, ExtractionError> {
        let owned = path.to_path_buf();
        tokio::task::spawn_blocking(move || read_image_metadata(&owned))
            .await
            .map_err(|e| ExtractionError(format!("Task failed: {}", e)))?
    }
}

/// Blocking metadata read
pub fn read_image_metadata(path: &Path) -> Result<Image, ExtractionError> {
    let file = File::open(path)?;
    let size = file.metadata()?.len();

    let sector = match compression_of(path) {
        Some("gz") => read_sector(GzDecoder::new(BufReader::new(file)))?,
        Some("bz2") => read_sector(BzDecoder::new(BufReader::new(file)))?,
        Some("xz") => read_sector(XzDecoder::new(BufReader::new(file)))?,
        Some("zst") => read_sector(ZstdDecoder::new(file)?)?,
        Some(_) => read_archive_sector(file)?,
        None => read_sector(file)?,
    };

    let has_mbr = sector.len() == SECTOR_SIZE && sector[SECTOR_SIZE - 2..] == MBR_SIGNATURE;
    log_debug!(
        MODULE,
        "{}: {} bytes, first sector {} bytes, MBR: {}",
        path.display(),
        size,
        sector.len(),
        has_mbr
    );

    Ok(Image {
        path: path.to_path_buf(),
        size: Some(size),
        has_mbr,
        looks_like_windows_image: looks_like_windows_image(path),
        logo: None,
        bmap: None,
    })
}

fn read_sector<R: Read>(reader: R) -> io::Result<Vec<u8>> {
    let mut sector = Vec::with_capacity(SECTOR_SIZE);
    reader.take(SECTOR_SIZE as u64).read_to_end(&mut sector)?;
    Ok(sector)
}

/// First sector of the first raw image inside a zip archive
fn read_archive_sector(file: File) -> Result<Vec<u8>, ExtractionError> {
    let mut archive = zip::ZipArchive::new(file)?;

    for index in 0..archive.len() {
        let entry = archive.by_index(index)?;
        let is_raw_image = entry.is_file() && {
            let inner = Path::new(entry.name());
            is_supported_image(inner) && compression_of(inner).is_none()
        };
        if is_raw_image {
            log_debug!(MODULE, "Reading archive entry {}", entry.name());
            return Ok(read_sector(entry)?);
        }
    }

    Err(ExtractionError("No disk image found inside archive".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn bootable_sector() -> Vec<u8> {
        let mut sector = vec![0u8; SECTOR_SIZE];
        sector[510] = 0x55;
        sector[511] = 0xAA;
        sector
    }

    #[test]
    fn test_raw_image_with_mbr() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("disk.img");
        let mut data = bootable_sector();
        data.extend_from_slice(&[1u8; 1024]);
        std::fs::write(&path, &data).unwrap();

        let image = read_image_metadata(&path).unwrap();
        assert!(image.has_mbr);
        assert_eq!(image.size, Some(data.len() as u64));
        assert!(!image.looks_like_windows_image);
    }

    #[test]
    fn test_raw_image_without_mbr() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blank.img");
        std::fs::write(&path, vec![0u8; 2048]).unwrap();

        assert!(!read_image_metadata(&path).unwrap().has_mbr);
    }

    #[test]
    fn test_short_file_has_no_mbr() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tiny.img");
        std::fs::write(&path, [0x55, 0xAA]).unwrap();

        assert!(!read_image_metadata(&path).unwrap().has_mbr);
    }

    #[test]
    fn test_gzip_image_is_decoded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("disk.img.gz");
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&bootable_sector()).unwrap();
        std::fs::write(&path, encoder.finish().unwrap()).unwrap();

        assert!(read_image_metadata(&path).unwrap().has_mbr);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = read_image_metadata(Path::new("/nonexistent/disk.img")).unwrap_err();
        assert!(!err.0.is_empty());
    }

    #[tokio::test]
    async fn test_extractor_runs_off_thread() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Win10_x64.iso");
        std::fs::write(&path, bootable_sector()).unwrap();

        let image = FsMetadataExtractor.get_image_metadata(&path).await.unwrap();
        assert!(image.has_mbr);
        assert!(image.looks_like_windows_image);
    }
}
