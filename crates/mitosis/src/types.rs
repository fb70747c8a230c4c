use serde::{Deserialize, Serialize};
use schemars::JsonSchema;
use strum::{Display, EnumString};

/// Pixel adjacency used when growing regions
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default,
    Serialize, Deserialize, JsonSchema,
    Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Connectivity {
    /// Edge neighbours only
    Four,
    /// Edge and diagonal neighbours
    #[default]
    Eight,
}

impl Connectivity {
    /// Offsets `(dx, dy)` of the neighbours already visited in a
    /// top-to-bottom, left-to-right scan
    pub(crate) fn backward_neighbours(self) -> &'static [(i64, i64)] {
        match self {
            Self::Four => &[(-1, 0), (0, -1)],
            Self::Eight => &[(-1, 0), (-1, -1), (0, -1), (1, -1)],
        }
    }
}

/// Inclusive pixel bounds of a region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct BoundingBox {
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
}

impl BoundingBox {
    /// Box covering a single pixel
    pub fn at(x: u32, y: u32) -> Self {
        Self { min_x: x, min_y: y, max_x: x, max_y: y }
    }

    /// Grow to include `(x, y)`
    pub fn extend(&mut self, x: u32, y: u32) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
    }

    pub fn width(&self) -> u32 {
        self.max_x - self.min_x + 1
    }

    pub fn height(&self) -> u32 {
        self.max_y - self.min_y + 1
    }
}

/// One labelled connected component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Region {
    pub label: u32,
    /// Number of member pixels
    pub area: u64,
    pub bbox: BoundingBox,
}

impl Region {
    /// Fraction of the bounding box covered by the region
    pub fn extent(&self) -> f64 {
        self.area as f64 / (self.bbox.width() as f64 * self.bbox.height() as f64)
    }
}

/// Summary of one analysed mask
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MaskAnalysis {
    pub image_width: u32,
    pub image_height: u32,
    /// Connected components in the mask
    pub total_regions: usize,
    /// Components whose area exceeds `min_area`
    pub filtered_regions: usize,
    pub min_area: i64,
    /// Percentage, rounded to two decimals
    pub mitotic_index: f64,
}

impl MaskAnalysis {
    /// No regions at all, so the index was reported as 0.0
    pub fn is_empty(&self) -> bool {
        self.total_regions == 0
    }
}
