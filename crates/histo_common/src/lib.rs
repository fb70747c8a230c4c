//! # Histo Common - Shared Types and Utilities
//!
//! Data structures shared by the analysis core, the model bridge and the CLI:
//! the request/response contract of a paired-image analysis and a handful of
//! file naming helpers.
//!
//! ## Example
//!
//! ```rust
//! use histo_common::{AnalysisReport, Classification};
//!
//! let report = AnalysisReport::new(33.333, Classification::NonCancerous);
//! assert_eq!(report.mitotic_index, 33.33);
//!
//! let json = serde_json::to_string(&report).unwrap();
//! assert!(json.contains("\"classificationResult\":\"Non-Cancerous\""));
//! ```

use serde::{Deserialize, Serialize};
use schemars::JsonSchema;
use strum::{Display, EnumString};
use thiserror::Error;

/// Result type for shared helpers
pub type Result<T> = std::result::Result<T, CommonError>;

/// Standard error type for shared helpers
#[derive(Error, Debug)]
pub enum CommonError {
    #[error("Unknown class index {index} (expected one of {expected})")]
    UnknownClass { index: usize, expected: usize },

    #[error("Invalid file name: {path}")]
    InvalidFileName { path: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Sample-level classification produced by the classifier model
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash,
    Serialize, Deserialize, JsonSchema,
    Display, EnumString,
)]
pub enum Classification {
    #[serde(rename = "Cancerous")]
    #[strum(serialize = "Cancerous")]
    Cancerous,

    #[serde(rename = "Non-Cancerous")]
    #[strum(serialize = "Non-Cancerous")]
    NonCancerous,
}

impl Classification {
    /// Number of classes the classifier head emits
    pub const CLASS_COUNT: usize = 2;

    /// Map a classifier output index to a label.
    ///
    /// Index 1 is the non-cancerous class, index 0 the cancerous one.
    pub fn from_class_index(index: usize) -> Result<Self> {
        match index {
            0 => Ok(Self::Cancerous),
            1 => Ok(Self::NonCancerous),
            _ => Err(CommonError::UnknownClass {
                index,
                expected: Self::CLASS_COUNT,
            }),
        }
    }

    /// Inverse of [`Classification::from_class_index`]
    pub fn class_index(self) -> usize {
        match self {
            Self::Cancerous => 0,
            Self::NonCancerous => 1,
        }
    }
}

/// Result of analysing one image pair, serialized as
/// `{ "mitoticIndex": .., "classificationResult": .. }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    /// Mitotic index as a percentage, rounded to two decimals
    pub mitotic_index: f64,
    /// Label produced by the classifier for the second image
    pub classification_result: Classification,
}

impl AnalysisReport {
    pub fn new(mitotic_index: f64, classification_result: Classification) -> Self {
        Self {
            mitotic_index: utils::round_to_places(mitotic_index, 2),
            classification_result,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// File and number helpers
pub mod utils {
    use super::*;
    use std::path::{Path, PathBuf};

    /// Round to `places` decimals.
    ///
    /// Works on the exact binary value and breaks exact ties to even, so
    /// `3.125` becomes `3.12` and `0.375` becomes `0.38`.
    pub fn round_to_places(value: f64, places: usize) -> f64 {
        format!("{:.*}", places, value).parse().unwrap_or(value)
    }

    /// Name under which the mask of `image_path` is stored: `mask_<file name>`
    pub fn mask_file_name(image_path: &Path) -> Result<String> {
        image_path
            .file_name()
            .and_then(|name| name.to_str())
            .map(|name| format!("mask_{}", name))
            .ok_or_else(|| CommonError::InvalidFileName {
                path: image_path.display().to_string(),
            })
    }

    /// Path of the mask for `image_path` inside `results_dir`, always with a
    /// `.png` extension
    pub fn mask_path_for(results_dir: &Path, image_path: &Path) -> Result<PathBuf> {
        let mut path = results_dir.join(mask_file_name(image_path)?);
        path.set_extension("png");
        Ok(path)
    }

    /// Check if a file extension indicates a raster image we can decode
    pub fn is_image_file(filename: &str) -> bool {
        matches!(
            get_file_extension(filename).as_deref(),
            Some("png" | "jpg" | "jpeg" | "tif" | "tiff" | "bmp")
        )
    }

    /// Get lowercase file extension from filename
    pub fn get_file_extension(filename: &str) -> Option<String> {
        Path::new(filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase())
    }

    /// Ensure output directory exists
    pub fn ensure_output_dir(path: &Path) -> Result<()> {
        std::fs::create_dir_all(path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_classification_from_index() {
        assert_eq!(Classification::from_class_index(0).unwrap(), Classification::Cancerous);
        assert_eq!(Classification::from_class_index(1).unwrap(), Classification::NonCancerous);
        assert!(Classification::from_class_index(2).is_err());
        assert_eq!(Classification::NonCancerous.class_index(), 1);
    }

    #[test]
    fn test_classification_strings() {
        assert_eq!(Classification::NonCancerous.to_string(), "Non-Cancerous");
        assert_eq!("Cancerous".parse::<Classification>().unwrap(), Classification::Cancerous);

        let json = serde_json::to_string(&Classification::NonCancerous).unwrap();
        assert_eq!(json, "\"Non-Cancerous\"");
    }

    #[test]
    fn test_report_serialization() {
        let report = AnalysisReport::new(25.0, Classification::Cancerous);
        let value = serde_json::to_value(&report).unwrap();

        assert_eq!(value["mitoticIndex"], 25.0);
        assert_eq!(value["classificationResult"], "Cancerous");

        let parsed: AnalysisReport = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, report);
    }

    #[test]
    fn test_report_rounds_index() {
        let report = AnalysisReport::new(100.0 / 3.0, Classification::Cancerous);
        assert_eq!(report.mitotic_index, 33.33);
    }

    #[test]
    fn test_round_to_places() {
        assert_eq!(utils::round_to_places(66.666_666, 2), 66.67);
        assert_eq!(utils::round_to_places(12.344, 2), 12.34);
        assert_eq!(utils::round_to_places(0.0, 2), 0.0);

        // Exact binary ties go to the even digit
        assert_eq!(utils::round_to_places(3.125, 2), 3.12);
        assert_eq!(utils::round_to_places(0.375, 2), 0.38);
    }

    #[test]
    fn test_mask_paths() {
        let name = utils::mask_file_name(Path::new("uploads/slide_01.png")).unwrap();
        assert_eq!(name, "mask_slide_01.png");

        let path =
            utils::mask_path_for(Path::new("results"), Path::new("uploads/slide.jpg")).unwrap();
        assert_eq!(path, Path::new("results/mask_slide.png"));

        let path = utils::mask_path_for(Path::new("results"), Path::new("slide.tif")).unwrap();
        assert_eq!(path, Path::new("results/mask_slide.png"));

        assert!(utils::mask_file_name(Path::new("/")).is_err());
    }

    #[test]
    fn test_file_utilities() {
        assert!(utils::is_image_file("slide.PNG"));
        assert!(utils::is_image_file("slide.jpeg"));
        assert!(!utils::is_image_file("notes.txt"));
        assert_eq!(utils::get_file_extension("slide.TIFF"), Some("tiff".to_string()));
    }
}
