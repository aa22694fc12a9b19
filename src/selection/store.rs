//! In-memory selection-state store

use std::path::PathBuf;
use std::sync::RwLock;

use super::SelectionStore;
use crate::images::SelectedImage;

/// Holds the selection for the lifetime of the session
#[derive(Debug, Default)]
pub struct MemorySelectionStore {
    image: RwLock<Option<SelectedImage>>,
}

impl MemorySelectionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SelectionStore for MemorySelectionStore {
    fn has_image(&self) -> bool {
        self.get_image().is_some()
    }

    fn get_image(&self) -> Option<SelectedImage> {
        self.image
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn get_image_path(&self) -> Option<PathBuf> {
        self.get_image().map(|image| image.path)
    }

    fn set_image(&self, image: SelectedImage) {
        // whole-value swap under the write lock
        *self
            .image
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(image);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replace_never_merges() {
        let store = MemorySelectionStore::new();
        assert!(!store.has_image());
        assert_eq!(store.get_image_path(), None);

        let a = SelectedImage {
            path: PathBuf::from("/images/a.img"),
            size: Some(10),
            has_mbr: true,
            logo: true,
            bmap: true,
            trusted_firmware: false,
        };
        let b = SelectedImage {
            path: PathBuf::from("/images/b.iso"),
            size: None,
            has_mbr: false,
            logo: false,
            bmap: false,
            trusted_firmware: false,
        };

        store.set_image(a);
        store.set_image(b.clone());

        assert!(store.has_image());
        assert_eq!(store.get_image(), Some(b));
        assert_eq!(store.get_image_path(), Some(PathBuf::from("/images/b.iso")));
    }
}
