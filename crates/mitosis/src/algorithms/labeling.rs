use image::{ImageBuffer, Luma};
use imageproc::region_labelling::{connected_components, Connectivity as ImageprocConnectivity};
use tracing::debug;

use crate::{
    error::Result,
    raster::{BinaryMask, LabelBuffer, LabelRaster, BACKGROUND},
    traits::ComponentLabeler,
    types::Connectivity,
};

/// Two-pass labeller with union-find merging of provisional labels.
///
/// Final labels follow raster-scan discovery order: the region containing the
/// first foreground pixel (top-to-bottom, left-to-right) is `1`, and so on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnionFindLabeler {
    pub connectivity: Connectivity,
}

impl UnionFindLabeler {
    pub fn new(connectivity: Connectivity) -> Self {
        Self { connectivity }
    }
}

impl ComponentLabeler for UnionFindLabeler {
    fn label(&self, mask: &BinaryMask) -> Result<LabelRaster> {
        Ok(label(mask, self.connectivity))
    }
}

/// Labeller backed by `imageproc::region_labelling`, with its output compacted
/// to the same contiguous discovery-order numbering
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImageprocLabeler {
    pub connectivity: Connectivity,
}

impl ImageprocLabeler {
    pub fn new(connectivity: Connectivity) -> Self {
        Self { connectivity }
    }
}

impl ComponentLabeler for ImageprocLabeler {
    fn label(&self, mask: &BinaryMask) -> Result<LabelRaster> {
        let connectivity = match self.connectivity {
            Connectivity::Four => ImageprocConnectivity::Four,
            Connectivity::Eight => ImageprocConnectivity::Eight,
        };
        let components = connected_components(mask.as_gray(), connectivity, Luma([BACKGROUND]));
        Ok(compact(components))
    }
}

/// Label the nonzero pixels of `mask`
pub fn label(mask: &BinaryMask, connectivity: Connectivity) -> LabelRaster {
    let (width, height) = mask.dimensions();
    let pixels = mask.as_raw();
    let mut provisional = vec![0u32; pixels.len()];
    let mut sets = DisjointSet::new();

    for y in 0..height as i64 {
        for x in 0..width as i64 {
            let index = (y * width as i64 + x) as usize;
            if pixels[index] == BACKGROUND {
                continue;
            }

            let mut current = 0u32;
            for &(dx, dy) in connectivity.backward_neighbours() {
                let (nx, ny) = (x + dx, y + dy);
                if nx < 0 || ny < 0 || nx >= width as i64 {
                    continue;
                }
                let neighbour = provisional[(ny * width as i64 + nx) as usize];
                if neighbour == 0 {
                    continue;
                }
                current = if current == 0 {
                    neighbour
                } else {
                    sets.union(current, neighbour)
                };
            }

            provisional[index] = if current == 0 { sets.make_set() } else { current };
        }
    }

    // Second pass: resolve to roots and renumber in discovery order
    let mut final_label = vec![0u32; sets.len()];
    let mut region_count = 0u32;
    for value in provisional.iter_mut().filter(|value| **value != 0) {
        let root = sets.find(*value) as usize;
        if final_label[root] == 0 {
            region_count += 1;
            final_label[root] = region_count;
        }
        *value = final_label[root];
    }

    debug!(
        "Labelled {}x{} mask: {} provisional labels, {} regions ({})",
        width,
        height,
        sets.len().saturating_sub(1),
        region_count,
        connectivity
    );

    let buffer = ImageBuffer::from_raw(width, height, provisional)
        .unwrap_or_else(|| LabelBuffer::new(width, height));
    LabelRaster::new(buffer, region_count as usize)
}

/// Renumber arbitrary positive labels to `1..=n` in raster-scan order
fn compact(mut buffer: LabelBuffer) -> LabelRaster {
    let max_label = buffer.as_raw().iter().copied().max().unwrap_or(0) as usize;
    let mut remap = vec![0u32; max_label + 1];
    let mut region_count = 0u32;

    for pixel in buffer.pixels_mut() {
        let label = pixel[0] as usize;
        if label == 0 {
            continue;
        }
        if remap[label] == 0 {
            region_count += 1;
            remap[label] = region_count;
        }
        pixel[0] = remap[label];
    }

    LabelRaster::new(buffer, region_count as usize)
}

/// Union-find over provisional labels; slot 0 is reserved for background
struct DisjointSet {
    parent: Vec<u32>,
}

impl DisjointSet {
    fn new() -> Self {
        Self { parent: vec![0] }
    }

    fn len(&self) -> usize {
        self.parent.len()
    }

    fn make_set(&mut self) -> u32 {
        let id = self.parent.len() as u32;
        self.parent.push(id);
        id
    }

    fn find(&mut self, mut id: u32) -> u32 {
        while self.parent[id as usize] != id {
            let grandparent = self.parent[self.parent[id as usize] as usize];
            self.parent[id as usize] = grandparent;
            id = grandparent;
        }
        id
    }

    /// Merge two sets, keeping the smaller root
    fn union(&mut self, a: u32, b: u32) -> u32 {
        let root_a = self.find(a);
        let root_b = self.find(b);
        let (keep, merge) = if root_a <= root_b { (root_a, root_b) } else { (root_b, root_a) };
        self.parent[merge as usize] = keep;
        keep
    }
}
