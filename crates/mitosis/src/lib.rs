//! Mitotic index analysis for histopathology images.
//!
//! A segmentation model produces a per-pixel probability map. The map is
//! thresholded into a [`BinaryMask`], the mask's connected components are
//! labelled, and the share of components larger than a minimum area gives the
//! mitotic index. A second image goes through a classifier, and both results
//! are joined into an [`histo_common::AnalysisReport`] by [`AnalysisService`].
//!
//! ```
//! use mitosis::{MaskPipeline, ProbabilityMap};
//!
//! // Low probabilities become foreground under the default inverted polarity
//! let probabilities =
//!     ProbabilityMap::from_fn(8, 8, |x, y| if x < 2 && y < 2 { 0.1 } else { 0.9 });
//! let (_mask, analysis) = MaskPipeline::default().process(&probabilities).unwrap();
//!
//! assert_eq!(analysis.total_regions, 1);
//! assert_eq!(analysis.mitotic_index, 0.0);
//! ```

pub mod algorithms;
pub mod error;
pub mod io;
pub mod pipeline;
pub mod raster;
pub mod service;
pub mod traits;
pub mod types;

pub use algorithms::*;
pub use error::{ErrorKind, MitosisError, Result};
pub use io::*;
pub use pipeline::{builder::MaskPipelineBuilder, MaskPipeline};
pub use raster::*;
pub use service::*;
pub use traits::*;
pub use types::*;
