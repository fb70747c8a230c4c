use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use mitosis::{
    AnalysisService, ChannelOrder, Connectivity, FsStorage, ImagePreprocessor, MaskPipeline,
    MitosisError, ResizeFilter,
};
use model_bridge::{ScriptClassificationModel, ScriptModelConfig, ScriptSegmentationModel};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    SerdeError(#[from] serde_json::Error),
    #[error(transparent)]
    TomlDeError(#[from] toml::de::Error),
    #[error(transparent)]
    TomlSerError(#[from] toml::ser::Error),
    #[error(transparent)]
    IoError(#[from] std::io::Error),
    #[error(transparent)]
    AnalysisError(#[from] MitosisError),
    #[error("Unsupported file format. Please use .toml or .json files")]
    UnsupportedFileFormat,
}

/// Mask analysis settings
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct PipelineSection {
    /// Probability above which a pixel counts as segmented
    pub threshold: f32,
    /// Count the pixels at or below the threshold instead
    pub invert: bool,
    pub connectivity: Connectivity,
    /// Regions strictly larger than this many pixels are mitotic
    pub min_area: i64,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            invert: true,
            connectivity: Connectivity::Eight,
            min_area: 50,
        }
    }
}

impl PipelineSection {
    pub fn build(&self) -> MaskPipeline {
        MaskPipeline::builder()
            .threshold(self.threshold)
            .invert(self.invert)
            .connectivity(self.connectivity)
            .min_area(self.min_area)
            .build()
    }
}

/// One external model and how its input is prepared
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct ModelSection {
    pub script: ScriptModelConfig,
    /// Defaults to `bgr` for segmentation and `rgb` for classification
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_order: Option<ChannelOrder>,
    #[serde(default)]
    pub resize_filter: ResizeFilter,
}

impl ModelSection {
    fn new(script: &str, input_size: u32) -> Self {
        Self {
            script: ScriptModelConfig {
                program: PathBuf::from("python"),
                args: vec![script.to_string()],
                working_dir: None,
                input_height: input_size,
                input_width: input_size,
                params: serde_json::Value::Null,
            },
            channel_order: None,
            resize_filter: ResizeFilter::default(),
        }
    }

    pub fn preprocessor(&self, default_order: ChannelOrder) -> ImagePreprocessor {
        ImagePreprocessor::new(self.channel_order.unwrap_or(default_order), self.resize_filter)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct OutputSection {
    /// Directory generated masks are written to
    pub results_dir: PathBuf,
    pub save_masks: bool,
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            results_dir: PathBuf::from("results"),
            save_masks: true,
        }
    }
}

/// Full configuration of an analysis run
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct AnalysisConfig {
    pub pipeline: PipelineSection,
    pub segmentation: ModelSection,
    pub classification: ModelSection,
    /// Optional second segmentation model run on the classification image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification_segmentation: Option<ModelSection>,
    pub output: OutputSection,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            pipeline: PipelineSection::default(),
            segmentation: ModelSection::new("models/segment.py", 256),
            classification: ModelSection::new("models/classify.py", 64),
            classification_segmentation: None,
            output: OutputSection::default(),
        }
    }
}

impl AnalysisConfig {
    /// Load AnalysisConfig from a TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self, CliError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, CliError> {
        Ok(toml::from_str(content)?)
    }

    /// Load AnalysisConfig from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, CliError> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, CliError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Auto-detect file format and load configuration
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, CliError> {
        let path_ref = path.as_ref();
        match path_ref.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml_file(path),
            Some("json") => Self::from_json_file(path),
            _ => Err(CliError::UnsupportedFileFormat),
        }
    }

    pub fn to_toml(&self) -> Result<String, CliError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn to_json(&self) -> Result<String, CliError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// JSON schema of the configuration file
    pub fn schema_json() -> Result<String, CliError> {
        let schema = schemars::schema_for!(AnalysisConfig);
        Ok(serde_json::to_string_pretty(&schema)?)
    }

    /// Wire the script models, preprocessors and mask storage into a service
    pub fn build_service(&self) -> AnalysisService {
        let segmentation =
            Arc::new(ScriptSegmentationModel::from_config(&self.segmentation.script));
        let classifier =
            Arc::new(ScriptClassificationModel::from_config(&self.classification.script));

        let mut service = AnalysisService::new(segmentation, classifier)
            .with_pipeline(self.pipeline.build())
            .with_preprocessors(
                self.segmentation.preprocessor(ChannelOrder::Bgr),
                self.classification.preprocessor(ChannelOrder::Rgb),
            );

        if let Some(section) = &self.classification_segmentation {
            service = service.with_classification_segmentation(Arc::new(
                ScriptSegmentationModel::from_config(&section.script),
            ));
        }

        if self.output.save_masks {
            service.with_mask_storage(Arc::new(FsStorage::new(".")), &self.output.results_dir)
        } else {
            service
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AnalysisConfig::default();
        assert_eq!(config.pipeline.threshold, 0.5);
        assert!(config.pipeline.invert);
        assert_eq!(config.pipeline.connectivity, Connectivity::Eight);
        assert_eq!(config.pipeline.min_area, 50);
        assert_eq!(config.classification.script.input_height, 64);
        assert_eq!(config.segmentation.script.input_width, 256);
        assert_eq!(config.output.results_dir, PathBuf::from("results"));
        assert!(config.classification_segmentation.is_none());

        assert_eq!(
            config.segmentation.preprocessor(ChannelOrder::Bgr).channel_order,
            ChannelOrder::Bgr
        );
        assert_eq!(
            config.classification.preprocessor(ChannelOrder::Rgb).channel_order,
            ChannelOrder::Rgb
        );
    }

    #[test]
    fn test_partial_toml() {
        let config = AnalysisConfig::from_toml(
            r#"
            [pipeline]
            min_area = 30
            connectivity = "four"

            [classification]
            channel_order = "bgr"

            [classification.script]
            program = "uv"
            args = ["run", "python", "classify.py"]
            input_height = 224
            input_width = 224

            [classification.script.params]
            device = "cpu"
            "#,
        )
        .expect("Should parse TOML config");

        assert_eq!(config.pipeline.min_area, 30);
        assert_eq!(config.pipeline.connectivity, Connectivity::Four);
        assert_eq!(config.pipeline.threshold, 0.5);
        assert_eq!(config.classification.script.program, PathBuf::from("uv"));
        assert_eq!(config.classification.script.params["device"], "cpu");
        assert_eq!(
            config.classification.preprocessor(ChannelOrder::Rgb).channel_order,
            ChannelOrder::Bgr
        );
        assert_eq!(config.segmentation, AnalysisConfig::default().segmentation);
        assert_eq!(config.pipeline.build().min_area(), 30);
    }

    #[test]
    fn test_second_segmentation_model() {
        let config = AnalysisConfig::from_toml(
            r#"
            [classification_segmentation.script]
            program = "python"
            args = ["models/segment_second.py"]
            input_height = 128
            input_width = 128
            "#,
        )
        .expect("Should parse second segmentation model");

        let section = config
            .classification_segmentation
            .as_ref()
            .expect("Second model should be configured");
        assert_eq!(section.script.input_height, 128);
        assert_eq!(section.resize_filter, ResizeFilter::default());

        let text = config.to_toml().unwrap();
        assert_eq!(AnalysisConfig::from_toml(&text).unwrap(), config);
    }

    #[test]
    fn test_json_config() {
        let config = AnalysisConfig::from_json(r#"{"output": {"save_masks": false}}"#).unwrap();
        assert!(!config.output.save_masks);
        assert_eq!(config.output.results_dir, PathBuf::from("results"));
    }

    #[test]
    fn test_toml_round_trip() {
        let config = AnalysisConfig::default();
        let text = config.to_toml().expect("Should serialize default config");
        assert_eq!(AnalysisConfig::from_toml(&text).unwrap(), config);
    }

    #[test]
    fn test_from_file_by_extension() {
        let dir = tempfile::tempdir().unwrap();

        let toml_path = dir.path().join("config.toml");
        fs::write(&toml_path, "[pipeline]\nmin_area = 10\n").unwrap();
        assert_eq!(AnalysisConfig::from_file(&toml_path).unwrap().pipeline.min_area, 10);

        let json_path = dir.path().join("config.json");
        fs::write(&json_path, r#"{"pipeline": {"min_area": 20}}"#).unwrap();
        assert_eq!(AnalysisConfig::from_file(&json_path).unwrap().pipeline.min_area, 20);

        let yaml_path = dir.path().join("config.yaml");
        fs::write(&yaml_path, "pipeline: {}").unwrap();
        assert!(matches!(
            AnalysisConfig::from_file(&yaml_path),
            Err(CliError::UnsupportedFileFormat)
        ));
    }

    #[test]
    fn test_schema_lists_sections() {
        let schema = AnalysisConfig::schema_json().unwrap();
        for section in ["pipeline", "segmentation", "classification", "output"] {
            assert!(schema.contains(section), "schema is missing {}", section);
        }
    }
}
