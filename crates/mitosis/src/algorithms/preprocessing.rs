use std::path::Path;

use image::{imageops::FilterType, DynamicImage};
use serde::{Deserialize, Serialize};
use schemars::JsonSchema;
use strum::{Display, EnumString};
use tracing::debug;

use crate::{
    error::{MitosisError, Result},
    raster::InputBatch,
};

/// Channel layout a model was trained with
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default,
    Serialize, Deserialize, JsonSchema,
    Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ChannelOrder {
    #[default]
    Rgb,
    /// OpenCV-style ordering
    Bgr,
}

/// Interpolation used when resizing to the model input size
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default,
    Serialize, Deserialize, JsonSchema,
    Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ResizeFilter {
    Nearest,
    #[default]
    Bilinear,
}

impl From<ResizeFilter> for FilterType {
    fn from(filter: ResizeFilter) -> Self {
        match filter {
            ResizeFilter::Nearest => FilterType::Nearest,
            ResizeFilter::Bilinear => FilterType::Triangle,
        }
    }
}

/// Loads an image and packages it as a model input batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImagePreprocessor {
    pub channel_order: ChannelOrder,
    pub filter: ResizeFilter,
}

impl ImagePreprocessor {
    pub fn new(channel_order: ChannelOrder, filter: ResizeFilter) -> Self {
        Self { channel_order, filter }
    }

    /// Read `path`, resize to `target_height` x `target_width`, scale samples
    /// to [0, 1] and wrap as a batch of one.
    pub fn prepare(
        &self,
        path: &Path,
        target_height: u32,
        target_width: u32,
    ) -> Result<InputBatch> {
        validate_target(target_height, target_width)?;
        let image = load_image(path)?;
        self.prepare_image(&image, target_height, target_width)
    }

    /// Same as [`ImagePreprocessor::prepare`] for an already decoded image
    pub fn prepare_image(
        &self,
        image: &DynamicImage,
        target_height: u32,
        target_width: u32,
    ) -> Result<InputBatch> {
        validate_target(target_height, target_width)?;

        debug!(
            "Resizing {}x{} image to {}x{} ({}, {})",
            image.width(),
            image.height(),
            target_width,
            target_height,
            self.filter,
            self.channel_order
        );

        let resized = image.resize_exact(target_width, target_height, self.filter.into());
        let mut pixels = resized.to_rgb32f();

        if self.channel_order == ChannelOrder::Bgr {
            for pixel in pixels.pixels_mut() {
                pixel.0.swap(0, 2);
            }
        }

        Ok(InputBatch::single(pixels))
    }
}

/// Decode the image at `path`.
///
/// A missing file surfaces as [`MitosisError::Io`], an undecodable one as
/// [`MitosisError::Image`]; both report [`crate::ErrorKind::Io`].
pub fn load_image(path: &Path) -> Result<DynamicImage> {
    let bytes = std::fs::read(path).map_err(|source| MitosisError::io(path, source))?;
    image::load_from_memory(&bytes).map_err(|source| MitosisError::Image {
        path: path.to_path_buf(),
        source,
    })
}

fn validate_target(target_height: u32, target_width: u32) -> Result<()> {
    if target_height == 0 || target_width == 0 {
        return Err(MitosisError::shape(format!(
            "target dimensions must be positive, got {}x{}",
            target_height, target_width
        )));
    }
    Ok(())
}
