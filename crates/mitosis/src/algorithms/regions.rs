use crate::{
    raster::LabelRaster,
    traits::RegionFilter,
    types::{BoundingBox, Region},
};

/// Keeps regions whose pixel area is strictly greater than `min_area`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AreaFilter {
    pub min_area: i64,
}

impl Default for AreaFilter {
    fn default() -> Self {
        Self { min_area: 50 }
    }
}

impl AreaFilter {
    pub fn accepts(&self, region: &Region) -> bool {
        exceeds(region.area, self.min_area)
    }

    /// Regions of `regions` passing the filter
    pub fn select<'a>(&self, regions: &'a [Region]) -> Vec<&'a Region> {
        regions.iter().filter(|region| self.accepts(region)).collect()
    }
}

impl RegionFilter for AreaFilter {
    fn count_selected(&self, labels: &LabelRaster) -> usize {
        filter_by_area(labels, labels.region_count(), self.min_area)
    }
}

/// Count the labels whose pixel area is strictly greater than `min_area`.
///
/// One pass over the raster; returns 0 without scanning when there are no
/// regions.
pub fn filter_by_area(labels: &LabelRaster, region_count: usize, min_area: i64) -> usize {
    if region_count == 0 {
        return 0;
    }

    let mut areas = vec![0u64; region_count + 1];
    for &label in labels.labels() {
        if let Some(area) = areas.get_mut(label as usize) {
            *area += 1;
        }
    }

    areas
        .iter()
        .skip(1)
        .filter(|&&area| exceeds(area, min_area))
        .count()
}

/// Area and bounding box of every region, in label order
pub fn region_properties(labels: &LabelRaster) -> Vec<Region> {
    let mut regions: Vec<Option<Region>> = vec![None; labels.region_count()];

    for (x, y, pixel) in labels.as_buffer().enumerate_pixels() {
        let label = pixel[0];
        let Some(index) = (label as usize).checked_sub(1) else {
            continue;
        };
        let Some(slot) = regions.get_mut(index) else {
            continue;
        };

        let region = slot.get_or_insert(Region {
            label,
            area: 0,
            bbox: BoundingBox::at(x, y),
        });
        region.area += 1;
        region.bbox.extend(x, y);
    }

    regions.into_iter().flatten().collect()
}

fn exceeds(area: u64, min_area: i64) -> bool {
    i128::from(area) > i128::from(min_area)
}
