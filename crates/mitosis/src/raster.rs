//! Raster values handed from one pipeline stage to the next.
//!
//! Every type here owns its pixel buffer and is never edited in place once
//! built: stages consume a reference and produce a fresh raster.

use image::{DynamicImage, GrayImage, ImageBuffer, Luma, Rgb32FImage};

use crate::error::{MitosisError, Result};

/// Pixel value of foreground in a [`BinaryMask`]
pub const FOREGROUND: u8 = 255;
/// Pixel value of background in a [`BinaryMask`]
pub const BACKGROUND: u8 = 0;

pub type ProbabilityBuffer = ImageBuffer<Luma<f32>, Vec<f32>>;
pub type LabelBuffer = ImageBuffer<Luma<u32>, Vec<u32>>;

/// Per-pixel foreground probability emitted by a segmentation model
#[derive(Debug, Clone, PartialEq)]
pub struct ProbabilityMap {
    buffer: ProbabilityBuffer,
}

impl ProbabilityMap {
    /// Build from row-major values
    pub fn from_raw(width: u32, height: u32, data: Vec<f32>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(MitosisError::shape(format!(
                "probability map must be non-empty, got {}x{}",
                width, height
            )));
        }

        let expected = width as usize * height as usize;
        let actual = data.len();
        ImageBuffer::from_raw(width, height, data)
            .map(|buffer| Self { buffer })
            .ok_or_else(|| {
                MitosisError::shape(format!(
                    "expected {} values for a {}x{} probability map, got {}",
                    expected, width, height, actual
                ))
            })
    }

    /// Build from a model output tensor.
    ///
    /// Accepts `[h, w]`, `[1, h, w]`, `[h, w, 1]` and `[1, h, w, 1]`: only a
    /// leading batch axis and a trailing channel axis are squeezed, so a
    /// one-pixel-wide map keeps its width.
    pub fn from_shape(shape: &[usize], data: Vec<f32>) -> Result<Self> {
        let (height, width) = match *shape {
            [height, width] | [1, height, width] | [1, height, width, 1] => (height, width),
            [height, width, 1] => (height, width),
            _ => {
                return Err(MitosisError::shape(format!(
                    "expected a 2D probability map, got shape {:?}",
                    shape
                )));
            }
        };

        let height = u32::try_from(height)
            .map_err(|_| MitosisError::shape(format!("height {} out of range", height)))?;
        let width = u32::try_from(width)
            .map_err(|_| MitosisError::shape(format!("width {} out of range", width)))?;

        Self::from_raw(width, height, data)
    }

    /// Build by evaluating `f(x, y)` for every pixel
    pub fn from_fn<F>(width: u32, height: u32, f: F) -> Self
    where
        F: Fn(u32, u32) -> f32,
    {
        Self {
            buffer: ImageBuffer::from_fn(width, height, |x, y| Luma([f(x, y)])),
        }
    }

    /// Interpret a grayscale image as probabilities, scaling the full sample
    /// range (8 or 16 bit) onto [0, 1]
    pub fn from_image(image: &DynamicImage) -> Self {
        Self {
            buffer: image.to_luma32f(),
        }
    }

    pub fn width(&self) -> u32 {
        self.buffer.width()
    }

    pub fn height(&self) -> u32 {
        self.buffer.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.buffer.dimensions()
    }

    pub fn get(&self, x: u32, y: u32) -> f32 {
        self.buffer.get_pixel(x, y)[0]
    }

    pub fn as_buffer(&self) -> &ProbabilityBuffer {
        &self.buffer
    }
}

/// Two-level raster: every pixel is [`FOREGROUND`] or [`BACKGROUND`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryMask {
    buffer: GrayImage,
}

impl BinaryMask {
    /// Build by evaluating a foreground predicate for every pixel
    pub fn from_fn<F>(width: u32, height: u32, is_foreground: F) -> Self
    where
        F: Fn(u32, u32) -> bool,
    {
        let buffer = ImageBuffer::from_fn(width, height, |x, y| {
            Luma([if is_foreground(x, y) { FOREGROUND } else { BACKGROUND }])
        });
        Self { buffer }
    }

    /// Wrap a buffer that already holds only the two sentinel levels
    pub fn try_from_gray(buffer: GrayImage) -> Result<Self> {
        if let Some(value) = buffer
            .as_raw()
            .iter()
            .find(|&&v| v != FOREGROUND && v != BACKGROUND)
        {
            return Err(MitosisError::shape(format!(
                "binary mask pixels must be {} or {}, found {}",
                BACKGROUND, FOREGROUND, value
            )));
        }
        Ok(Self { buffer })
    }

    /// Re-threshold an arbitrary grayscale image at mid-gray.
    ///
    /// Used for masks read back from storage, where a lossy codec may have
    /// smeared the two levels.
    pub fn from_gray(image: &GrayImage) -> Self {
        Self {
            buffer: imageproc::contrast::threshold(image, 127),
        }
    }

    /// A new mask with foreground and background swapped
    pub fn inverted(&self) -> Self {
        let mut buffer = self.buffer.clone();
        for pixel in buffer.pixels_mut() {
            pixel[0] = FOREGROUND - pixel[0];
        }
        Self { buffer }
    }

    pub fn is_foreground(&self, x: u32, y: u32) -> bool {
        self.buffer.get_pixel(x, y)[0] == FOREGROUND
    }

    pub fn foreground_count(&self) -> usize {
        self.buffer.as_raw().iter().filter(|&&v| v == FOREGROUND).count()
    }

    pub fn width(&self) -> u32 {
        self.buffer.width()
    }

    pub fn height(&self) -> u32 {
        self.buffer.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.buffer.dimensions()
    }

    /// Row-major pixel values
    pub fn as_raw(&self) -> &[u8] {
        self.buffer.as_raw()
    }

    pub fn as_gray(&self) -> &GrayImage {
        &self.buffer
    }

    pub fn into_gray(self) -> GrayImage {
        self.buffer
    }
}

/// Connected-region labels of a [`BinaryMask`].
///
/// `0` is background; regions are numbered `1..=region_count` without gaps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelRaster {
    buffer: LabelBuffer,
    region_count: usize,
}

impl LabelRaster {
    pub(crate) fn new(buffer: LabelBuffer, region_count: usize) -> Self {
        Self { buffer, region_count }
    }

    pub fn region_count(&self) -> usize {
        self.region_count
    }

    pub fn label_at(&self, x: u32, y: u32) -> u32 {
        self.buffer.get_pixel(x, y)[0]
    }

    pub fn width(&self) -> u32 {
        self.buffer.width()
    }

    pub fn height(&self) -> u32 {
        self.buffer.height()
    }

    /// Row-major labels
    pub fn labels(&self) -> &[u32] {
        self.buffer.as_raw()
    }

    pub fn as_buffer(&self) -> &LabelBuffer {
        &self.buffer
    }

    pub fn into_parts(self) -> (LabelBuffer, usize) {
        (self.buffer, self.region_count)
    }
}

/// Preprocessed model input: NHWC, three float channels in [0, 1]
#[derive(Debug, Clone, PartialEq)]
pub struct InputBatch {
    images: Vec<Rgb32FImage>,
}

impl InputBatch {
    /// A batch holding exactly one image
    pub fn single(image: Rgb32FImage) -> Self {
        Self { images: vec![image] }
    }

    /// `[batch, height, width, channels]`
    pub fn shape(&self) -> [usize; 4] {
        let (width, height) = self
            .images
            .first()
            .map(|image| image.dimensions())
            .unwrap_or((0, 0));
        [self.images.len(), height as usize, width as usize, 3]
    }

    /// Flattened values in NHWC order
    pub fn to_nhwc(&self) -> Vec<f32> {
        self.images
            .iter()
            .flat_map(|image| image.as_raw().iter().copied())
            .collect()
    }

    pub fn images(&self) -> &[Rgb32FImage] {
        &self.images
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_probability_map_from_shape_squeezes() {
        let map = ProbabilityMap::from_shape(&[1, 2, 3, 1], vec![0.0; 6])
            .expect("Should squeeze batch and channel");
        assert_eq!(map.dimensions(), (3, 2));

        let map =
            ProbabilityMap::from_shape(&[4, 5], vec![0.5; 20]).expect("Should accept plain 2D");
        assert_eq!(map.width(), 5);
        assert_eq!(map.height(), 4);
    }

    #[test]
    fn test_probability_map_keeps_unit_width() {
        let map = ProbabilityMap::from_shape(&[1, 4, 1, 1], vec![0.1, 0.2, 0.3, 0.4])
            .expect("Should keep the width axis of a column map");
        assert_eq!(map.dimensions(), (1, 4));
        assert_eq!(map.get(0, 3), 0.4);

        let map = ProbabilityMap::from_shape(&[1, 1, 3], vec![0.0; 3]).unwrap();
        assert_eq!(map.dimensions(), (3, 1));

        let map = ProbabilityMap::from_shape(&[2, 3, 1], vec![0.0; 6]).unwrap();
        assert_eq!(map.dimensions(), (3, 2));
    }

    #[test]
    fn test_probability_map_rejects_non_2d() {
        let err = ProbabilityMap::from_shape(&[2, 3, 3], vec![0.0; 18]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Shape);

        let err = ProbabilityMap::from_shape(&[6], vec![0.0; 6]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Shape);

        let err = ProbabilityMap::from_shape(&[2, 4, 4, 1], vec![0.0; 32]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Shape);
    }

    #[test]
    fn test_probability_map_length_mismatch() {
        let err = ProbabilityMap::from_raw(3, 3, vec![0.0; 8]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Shape);
    }

    #[test]
    fn test_binary_mask_invariant() {
        let mut gray = GrayImage::new(2, 2);
        gray.put_pixel(0, 0, Luma([FOREGROUND]));
        assert!(BinaryMask::try_from_gray(gray.clone()).is_ok());

        gray.put_pixel(1, 1, Luma([12]));
        let err = BinaryMask::try_from_gray(gray.clone()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Shape);

        let rethresholded = BinaryMask::from_gray(&gray);
        assert!(rethresholded.is_foreground(0, 0));
        assert!(!rethresholded.is_foreground(1, 1));
    }

    #[test]
    fn test_binary_mask_inverted() {
        let mask = BinaryMask::from_fn(4, 4, |x, _| x < 1);
        let inverted = mask.inverted();

        assert_eq!(mask.foreground_count(), 4);
        assert_eq!(inverted.foreground_count(), 12);
        assert_eq!(inverted.inverted(), mask);
    }

    #[test]
    fn test_input_batch_shape() {
        let batch = InputBatch::single(Rgb32FImage::new(5, 4));
        assert_eq!(batch.shape(), [1, 4, 5, 3]);
        assert_eq!(batch.to_nhwc().len(), 60);
        assert_eq!(batch.len(), 1);
    }
}
