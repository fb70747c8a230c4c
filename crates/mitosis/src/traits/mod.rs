use std::path::{Path, PathBuf};

use histo_common::Classification;
use image::DynamicImage;
use crate::{
    error::Result,
    raster::{BinaryMask, InputBatch, LabelRaster, ProbabilityMap},
};

/// Trait for turning a probability map into a two-level mask
pub trait Binarizer: Send + Sync {
    /// Decide foreground/background for every pixel
    fn binarize(&self, probabilities: &ProbabilityMap) -> Result<BinaryMask>;
}

/// Trait for connected-component labelling algorithms
pub trait ComponentLabeler: Send + Sync {
    /// Label the foreground regions of a mask
    fn label(&self, mask: &BinaryMask) -> Result<LabelRaster>;
}

/// Trait for region selection rules
pub trait RegionFilter: Send + Sync {
    /// Count the labelled regions that satisfy the rule
    fn count_selected(&self, labels: &LabelRaster) -> usize;
}

/// Segmentation network, treated as an opaque function.
///
/// Implementations are shared between concurrent requests and must be safe
/// to call from several threads at once.
pub trait SegmentationModel: Send + Sync {
    /// Expected input `(height, width)`
    fn input_size(&self) -> (u32, u32);

    /// Foreground probability for every pixel of the (single) input image
    fn predict(&self, batch: &InputBatch) -> Result<ProbabilityMap>;

    fn name(&self) -> &str {
        "segmentation"
    }
}

/// Sample classifier, treated as an opaque function
pub trait ClassificationModel: Send + Sync {
    /// Expected input `(height, width)`
    fn input_size(&self) -> (u32, u32);

    fn classify(&self, batch: &InputBatch) -> Result<Classification>;

    fn name(&self) -> &str {
        "classification"
    }
}

/// Path-addressable storage for uploaded images and generated masks
pub trait Storage: Send + Sync {
    /// Write `bytes` to `path`, returning the location actually written
    fn save(&self, bytes: &[u8], path: &Path) -> Result<PathBuf>;

    /// Decode the image stored at `path`
    fn load(&self, path: &Path) -> Result<DynamicImage>;
}
