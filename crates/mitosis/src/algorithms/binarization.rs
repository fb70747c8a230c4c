use crate::{
    error::Result,
    raster::{BinaryMask, ProbabilityMap},
    traits::Binarizer,
};

/// Fixed-threshold binarizer.
///
/// A pixel is foreground when its probability is strictly above `threshold`.
/// With `invert` set the two levels are swapped in the output, so the
/// labeller sees the complement of the thresholded region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdBinarizer {
    pub threshold: f32,
    pub invert: bool,
}

impl Default for ThresholdBinarizer {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            invert: true,
        }
    }
}

impl Binarizer for ThresholdBinarizer {
    fn binarize(&self, probabilities: &ProbabilityMap) -> Result<BinaryMask> {
        Ok(binarize(probabilities, self.threshold, self.invert))
    }
}

/// Threshold `probabilities` and optionally invert the result
pub fn binarize(probabilities: &ProbabilityMap, threshold: f32, invert: bool) -> BinaryMask {
    let (width, height) = probabilities.dimensions();
    BinaryMask::from_fn(width, height, |x, y| (probabilities.get(x, y) > threshold) != invert)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_map() -> ProbabilityMap {
        ProbabilityMap::from_fn(10, 3, |x, _| x as f32 / 10.0)
    }

    #[test]
    fn test_strict_threshold() {
        let map = ProbabilityMap::from_raw(3, 1, vec![0.49, 0.5, 0.51]).unwrap();
        let mask = binarize(&map, 0.5, false);

        assert!(!mask.is_foreground(0, 0));
        assert!(!mask.is_foreground(1, 0), "Threshold itself is not foreground");
        assert!(mask.is_foreground(2, 0));
    }

    #[test]
    fn test_invert_swaps_levels() {
        let map = gradient_map();
        let plain = binarize(&map, 0.5, false);
        let inverted = binarize(&map, 0.5, true);

        assert_eq!(plain.foreground_count(), 12);
        assert_eq!(inverted.foreground_count(), 18);
        assert_eq!(plain.inverted(), inverted);
    }

    #[test]
    fn test_double_inversion_matches_plain() {
        let map = gradient_map();
        let binarizer = ThresholdBinarizer::default();

        let twice = binarizer.binarize(&map).unwrap().inverted();
        let plain = ThresholdBinarizer { invert: false, ..binarizer }.binarize(&map).unwrap();

        assert_eq!(twice, plain);
    }

    #[test]
    fn test_output_is_two_level() {
        let map = ProbabilityMap::from_fn(7, 7, |x, y| ((x * 7 + y) % 11) as f32 / 10.0);
        let mask = binarize(&map, 0.3, true);
        assert!(BinaryMask::try_from_gray(mask.into_gray()).is_ok());
    }
}
