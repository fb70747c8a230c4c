use crate::{
    algorithms::{AreaFilter, ThresholdBinarizer, UnionFindLabeler},
    pipeline::MaskPipeline,
    traits::{Binarizer, ComponentLabeler},
    types::Connectivity,
};

/// Builder for [`MaskPipeline`] with a fluent API.
///
/// Defaults reproduce the reference analysis: threshold 0.5, inverted
/// polarity, 8-connectivity, regions larger than 50 px counted as mitotic.
pub struct MaskPipelineBuilder {
    binarizer: ThresholdBinarizer,
    connectivity: Connectivity,
    area_filter: AreaFilter,
    custom_binarizer: Option<Box<dyn Binarizer>>,
    custom_labeler: Option<Box<dyn ComponentLabeler>>,
}

impl MaskPipelineBuilder {
    pub fn new() -> Self {
        Self {
            binarizer: ThresholdBinarizer::default(),
            connectivity: Connectivity::default(),
            area_filter: AreaFilter::default(),
            custom_binarizer: None,
            custom_labeler: None,
        }
    }

    /// Probability above which a pixel counts as segmented
    pub fn threshold(mut self, threshold: f32) -> Self {
        self.binarizer.threshold = threshold;
        self
    }

    /// Swap foreground and background after thresholding
    pub fn invert(mut self, invert: bool) -> Self {
        self.binarizer.invert = invert;
        self
    }

    pub fn connectivity(mut self, connectivity: Connectivity) -> Self {
        self.connectivity = connectivity;
        self
    }

    /// Regions must be strictly larger than this to be counted as mitotic
    pub fn min_area(mut self, min_area: i64) -> Self {
        self.area_filter.min_area = min_area;
        self
    }

    /// Replace the threshold binarizer; `threshold` and `invert` are then ignored
    pub fn set_binarizer<B>(mut self, binarizer: B) -> Self
    where
        B: Binarizer + 'static,
    {
        self.custom_binarizer = Some(Box::new(binarizer));
        self
    }

    /// Replace the union-find labeller; `connectivity` is then ignored
    pub fn set_labeler<L>(mut self, labeler: L) -> Self
    where
        L: ComponentLabeler + 'static,
    {
        self.custom_labeler = Some(Box::new(labeler));
        self
    }

    pub fn build(self) -> MaskPipeline {
        let binarizer = self
            .custom_binarizer
            .unwrap_or_else(|| Box::new(self.binarizer));

        let labeler = self
            .custom_labeler
            .unwrap_or_else(|| Box::new(UnionFindLabeler::new(self.connectivity)));

        MaskPipeline::new(binarizer, labeler, self.area_filter)
    }
}

impl Default for MaskPipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
