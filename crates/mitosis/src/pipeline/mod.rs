pub mod builder;

use tracing::{debug, warn};
use crate::{
    algorithms::{compute_index, region_properties, AreaFilter},
    error::Result,
    raster::{BinaryMask, ProbabilityMap},
    traits::{Binarizer, ComponentLabeler, RegionFilter},
    types::{MaskAnalysis, Region},
};

/// Post-inference analysis: binarize, label, filter by area, compute the index
pub struct MaskPipeline {
    binarizer: Box<dyn Binarizer>,
    labeler: Box<dyn ComponentLabeler>,
    area_filter: AreaFilter,
}

impl MaskPipeline {
    /// Create a new pipeline builder
    pub fn builder() -> builder::MaskPipelineBuilder {
        builder::MaskPipelineBuilder::new()
    }

    pub fn new(
        binarizer: Box<dyn Binarizer>,
        labeler: Box<dyn ComponentLabeler>,
        area_filter: AreaFilter,
    ) -> Self {
        Self {
            binarizer,
            labeler,
            area_filter,
        }
    }

    /// Run a segmentation output through every stage.
    ///
    /// Returns the binary mask alongside its analysis so callers can persist
    /// it.
    pub fn process(&self, probabilities: &ProbabilityMap) -> Result<(BinaryMask, MaskAnalysis)> {
        let mask = self.binarizer.binarize(probabilities)?;
        debug!(
            "Binarized {}x{} probability map: {} foreground pixels",
            mask.width(),
            mask.height(),
            mask.foreground_count()
        );

        let analysis = self.analyze_mask(&mask)?;
        Ok((mask, analysis))
    }

    /// Label, filter and index an existing mask
    pub fn analyze_mask(&self, mask: &BinaryMask) -> Result<MaskAnalysis> {
        let labels = self.labeler.label(mask)?;
        let total_regions = labels.region_count();
        let filtered_regions = self.area_filter.count_selected(&labels);

        if total_regions == 0 {
            warn!("No regions found in {}x{} mask", mask.width(), mask.height());
        }

        let mitotic_index = compute_index(total_regions, filtered_regions);
        debug!(
            "{} regions, {} above {} px, index {:.2}%",
            total_regions, filtered_regions, self.area_filter.min_area, mitotic_index
        );

        Ok(MaskAnalysis {
            image_width: mask.width(),
            image_height: mask.height(),
            total_regions,
            filtered_regions,
            min_area: self.area_filter.min_area,
            mitotic_index,
        })
    }

    /// Per-region area and bounding box of a mask
    pub fn regions(&self, mask: &BinaryMask) -> Result<Vec<Region>> {
        let labels = self.labeler.label(mask)?;
        Ok(region_properties(&labels))
    }

    pub fn min_area(&self) -> i64 {
        self.area_filter.min_area
    }

    /// Get information about the pipeline configuration
    pub fn info(&self) -> String {
        format!("MaskPipeline: min_area {} px", self.area_filter.min_area)
    }
}

impl Default for MaskPipeline {
    fn default() -> Self {
        builder::MaskPipelineBuilder::new().build()
    }
}
