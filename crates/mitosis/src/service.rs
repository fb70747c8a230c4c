use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use histo_common::{utils::mask_path_for, AnalysisReport, Classification};
use serde::{Deserialize, Serialize};
use schemars::JsonSchema;
use tracing::{debug, info};

use crate::{
    algorithms::{ChannelOrder, ImagePreprocessor, ResizeFilter},
    error::{MitosisError, Result},
    io::save_mask,
    pipeline::MaskPipeline,
    raster::BinaryMask,
    traits::{ClassificationModel, SegmentationModel, Storage},
    types::MaskAnalysis,
};

/// The two images of one analysis request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AnalysisRequest {
    /// Image routed through segmentation and the mitotic index
    pub segmentation_image: PathBuf,
    /// Image routed through the classifier
    pub classification_image: PathBuf,
}

impl AnalysisRequest {
    pub fn new(
        segmentation_image: impl Into<PathBuf>,
        classification_image: impl Into<PathBuf>,
    ) -> Self {
        Self {
            segmentation_image: segmentation_image.into(),
            classification_image: classification_image.into(),
        }
    }
}

/// Everything produced for one request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisOutcome {
    pub report: AnalysisReport,
    pub mask: MaskAnalysis,
    /// Where the segmentation image's mask was stored, when storage is configured
    pub mask_path: Option<PathBuf>,
    /// Analysis of the classification image's mask, when a second
    /// segmentation model is configured
    pub classification_mask: Option<MaskAnalysis>,
    pub classification_mask_path: Option<PathBuf>,
}

#[derive(Clone)]
struct MaskOutput {
    storage: Arc<dyn Storage>,
    results_dir: PathBuf,
}

/// Result of one segmentation run, kept in memory until the request succeeds
type Segmented = (BinaryMask, MaskAnalysis);

/// Output of the classification arm
struct Classified {
    classification: Classification,
    mask: Option<Segmented>,
}

/// Request entry point.
///
/// Models are loaded once by the caller and injected here; the service never
/// mutates them and can be cloned cheaply across concurrent requests. Masks
/// are written only once every stage of a request has succeeded.
#[derive(Clone)]
pub struct AnalysisService {
    segmentation: Arc<dyn SegmentationModel>,
    classification_segmentation: Option<Arc<dyn SegmentationModel>>,
    classifier: Arc<dyn ClassificationModel>,
    segmentation_preprocessor: ImagePreprocessor,
    classification_preprocessor: ImagePreprocessor,
    pipeline: Arc<MaskPipeline>,
    mask_output: Option<MaskOutput>,
}

impl AnalysisService {
    /// Service with the reference pipeline: BGR input for segmentation,
    /// RGB input for the classifier
    pub fn new(
        segmentation: Arc<dyn SegmentationModel>,
        classifier: Arc<dyn ClassificationModel>,
    ) -> Self {
        Self {
            segmentation,
            classification_segmentation: None,
            classifier,
            segmentation_preprocessor: ImagePreprocessor::new(
                ChannelOrder::Bgr,
                ResizeFilter::Bilinear,
            ),
            classification_preprocessor: ImagePreprocessor::new(
                ChannelOrder::Rgb,
                ResizeFilter::Bilinear,
            ),
            pipeline: Arc::new(MaskPipeline::default()),
            mask_output: None,
        }
    }

    pub fn with_pipeline(mut self, pipeline: MaskPipeline) -> Self {
        self.pipeline = Arc::new(pipeline);
        self
    }

    pub fn with_preprocessors(
        mut self,
        segmentation: ImagePreprocessor,
        classification: ImagePreprocessor,
    ) -> Self {
        self.segmentation_preprocessor = segmentation;
        self.classification_preprocessor = classification;
        self
    }

    /// Also segment the classification image with `model`
    pub fn with_classification_segmentation(mut self, model: Arc<dyn SegmentationModel>) -> Self {
        self.classification_segmentation = Some(model);
        self
    }

    /// Persist every generated mask as `mask_<image name>` under `results_dir`
    pub fn with_mask_storage(
        mut self,
        storage: Arc<dyn Storage>,
        results_dir: impl Into<PathBuf>,
    ) -> Self {
        self.mask_output = Some(MaskOutput {
            storage,
            results_dir: results_dir.into(),
        });
        self
    }

    /// Segmentation arm: preprocess, infer, binarize and analyse the mask
    pub fn segment(&self, image: &Path) -> Result<(BinaryMask, MaskAnalysis)> {
        self.segment_with(self.segmentation.as_ref(), image)
    }

    fn segment_with(&self, model: &dyn SegmentationModel, image: &Path) -> Result<Segmented> {
        let (height, width) = model.input_size();
        let batch = self.segmentation_preprocessor.prepare(image, height, width)?;

        debug!("Running {} model on {}", model.name(), image.display());
        let probabilities = model.predict(&batch)?;
        if probabilities.dimensions() != (width, height) {
            return Err(MitosisError::shape(format!(
                "{} model returned a {}x{} map for a {}x{} input",
                model.name(),
                probabilities.width(),
                probabilities.height(),
                width,
                height
            )));
        }

        self.pipeline.process(&probabilities)
    }

    /// Classification arm
    pub fn classify(&self, image: &Path) -> Result<Classification> {
        let (height, width) = self.classifier.input_size();
        let batch = self.classification_preprocessor.prepare(image, height, width)?;

        debug!("Running {} model on {}", self.classifier.name(), image.display());
        self.classifier.classify(&batch)
    }

    fn classification_arm(&self, image: &Path) -> Result<Classified> {
        let mask = match &self.classification_segmentation {
            Some(model) => Some(self.segment_with(model.as_ref(), image)?),
            None => None,
        };
        let classification = self.classify(image)?;
        Ok(Classified { classification, mask })
    }

    /// Run both arms one after the other; any failure fails the request
    pub fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisOutcome> {
        info!(
            "Analysing {} (segmentation) and {} (classification)",
            request.segmentation_image.display(),
            request.classification_image.display()
        );

        let segmented = self.segment(&request.segmentation_image)?;
        let classified = self.classification_arm(&request.classification_image)?;

        self.finish(request, segmented, classified)
    }

    /// Run both arms on blocking worker tasks and join them
    pub async fn analyze_concurrently(&self, request: &AnalysisRequest) -> Result<AnalysisOutcome> {
        info!(
            "Analysing {} and {} concurrently",
            request.segmentation_image.display(),
            request.classification_image.display()
        );

        let segmentation = {
            let service = self.clone();
            let image = request.segmentation_image.clone();
            tokio::task::spawn_blocking(move || service.segment(&image))
        };
        let classification = {
            let service = self.clone();
            let image = request.classification_image.clone();
            tokio::task::spawn_blocking(move || service.classification_arm(&image))
        };

        let (segmented, classified) = tokio::try_join!(segmentation, classification)?;
        self.finish(request, segmented?, classified?)
    }

    fn finish(
        &self,
        request: &AnalysisRequest,
        (mask, analysis): Segmented,
        classified: Classified,
    ) -> Result<AnalysisOutcome> {
        let mask_path = self.persist(&mask, &request.segmentation_image)?;

        let (classification_mask, classification_mask_path) = match classified.mask {
            Some((second_mask, second_analysis)) => {
                let path = self.persist(&second_mask, &request.classification_image)?;
                (Some(second_analysis), path)
            }
            None => (None, None),
        };

        let report = AnalysisReport::new(analysis.mitotic_index, classified.classification);
        info!(
            "Mitotic index {:.2}% ({} of {} regions), classification {}",
            report.mitotic_index,
            analysis.filtered_regions,
            analysis.total_regions,
            report.classification_result
        );

        Ok(AnalysisOutcome {
            report,
            mask: analysis,
            mask_path,
            classification_mask,
            classification_mask_path,
        })
    }

    fn persist(&self, mask: &BinaryMask, image: &Path) -> Result<Option<PathBuf>> {
        let Some(output) = &self.mask_output else {
            return Ok(None);
        };
        let path = mask_path_for(&output.results_dir, image)?;
        let written = save_mask(output.storage.as_ref(), mask, &path)?;
        info!("Stored mask of {} at {}", image.display(), written.display());
        Ok(Some(written))
    }
}
