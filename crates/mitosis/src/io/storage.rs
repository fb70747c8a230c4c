use std::{
    io::Cursor,
    path::{Path, PathBuf},
};

use image::{DynamicImage, ImageFormat};
use tracing::debug;

use crate::{
    algorithms::load_image,
    error::{MitosisError, Result},
    raster::BinaryMask,
    traits::Storage,
};

/// Filesystem storage rooted at a directory.
///
/// Relative paths are resolved against the root; absolute paths are used as
/// given.
#[derive(Debug, Clone)]
pub struct FsStorage {
    root: PathBuf,
}

impl FsStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

impl Storage for FsStorage {
    fn save(&self, bytes: &[u8], path: &Path) -> Result<PathBuf> {
        let target = self.resolve(path);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(|source| MitosisError::io(parent, source))?;
        }
        std::fs::write(&target, bytes).map_err(|source| MitosisError::io(&target, source))?;

        debug!("Stored {} bytes at {}", bytes.len(), target.display());
        Ok(target)
    }

    fn load(&self, path: &Path) -> Result<DynamicImage> {
        load_image(&self.resolve(path))
    }
}

/// Encode a mask as an 8-bit grayscale PNG
pub fn encode_mask_png(mask: &BinaryMask) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    mask.as_gray().write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}

/// Persist `mask` as PNG at `path`
pub fn save_mask(storage: &dyn Storage, mask: &BinaryMask, path: &Path) -> Result<PathBuf> {
    let bytes = encode_mask_png(mask)?;
    storage.save(&bytes, path)
}

/// Read a stored mask back, re-thresholding it to two levels
pub fn load_mask(storage: &dyn Storage, path: &Path) -> Result<BinaryMask> {
    let image = storage.load(path)?;
    Ok(BinaryMask::from_gray(&image.to_luma8()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_mask_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FsStorage::new(dir.path());
        let mask = BinaryMask::from_fn(12, 7, |x, y| (x + y) % 3 == 0);

        let path = Path::new("results/mask_a.png");
        let written = save_mask(&storage, &mask, path).expect("Should save mask");
        assert!(written.starts_with(dir.path()));
        assert!(written.exists());

        let loaded = load_mask(&storage, path).expect("Should load mask");
        assert_eq!(loaded, mask);
    }

    #[test]
    fn test_load_missing() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FsStorage::new(dir.path());

        let err = storage.load(Path::new("missing.png")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn test_absolute_paths_bypass_root() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FsStorage::new("unused-root");
        let target = dir.path().join("raw.bin");

        let written = storage.save(b"abc", &target).unwrap();
        assert_eq!(written, target);
        assert_eq!(std::fs::read(&target).unwrap(), b"abc");
    }
}
