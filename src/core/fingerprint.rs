use image::{Rgb, RgbImage};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

use crate::core::config::Config;

/// Per-cell sums of one color channel, stored row-major.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelGrid {
    side: usize,
    cells: Vec<u64>,
    total: u64,
}

impl ChannelGrid {
    pub fn zeroed(side: usize) -> Self {
        Self {
            side,
            cells: vec![0; side * side],
            total: 0,
        }
    }

    /// Panics when `cells` is not `side * side` long.
    pub fn from_cells(side: usize, cells: Vec<u64>) -> Self {
        assert_eq!(cells.len(), side * side, "grid must be square");
        let total = cells.iter().sum();
        Self { side, cells, total }
    }

    pub fn side(&self) -> usize {
        self.side
    }

    pub fn get(&self, row: usize, col: usize) -> u64 {
        self.cells[row * self.side + col]
    }

    pub fn cells(&self) -> &[u64] {
        &self.cells
    }

    /// Sum over every cell, kept up to date while the grid is built.
    pub fn total(&self) -> u64 {
        self.total
    }

    fn add(&mut self, row: usize, col: usize, value: u64) {
        self.cells[row * self.side + col] += value;
        self.total += value;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fingerprint {
    pub red: ChannelGrid,
    pub green: ChannelGrid,
    pub blue: ChannelGrid,
}

impl Fingerprint {
    fn zeroed(side: usize) -> Self {
        Self {
            red: ChannelGrid::zeroed(side),
            green: ChannelGrid::zeroed(side),
            blue: ChannelGrid::zeroed(side),
        }
    }

    pub fn side(&self) -> usize {
        self.red.side()
    }

    pub fn channels(&self) -> [&ChannelGrid; 3] {
        [&self.red, &self.green, &self.blue]
    }

    pub fn is_blank(&self) -> bool {
        self.channels().iter().all(|grid| grid.total() == 0)
    }
}

/// Split `length` into `parts` chunks whose sizes differ by at most one,
/// the leading chunks taking the remainder: `divide_evenly(10, 3) == [4, 3, 3]`.
pub fn divide_evenly(length: u32, parts: usize) -> Vec<u32> {
    if parts == 0 {
        return Vec::new();
    }
    let parts_u32 = parts as u32;
    let base = length / parts_u32;
    let remainder = length % parts_u32;
    (0..parts_u32)
        .map(|i| if i < remainder { base + 1 } else { base })
        .collect()
}

/// Lookup table from a global coordinate on one axis to its chunk index.
///
/// Built by walking the chunks with their cumulative offsets, so position
/// `offset + local` always lands in the chunk that owns it.
fn axis_cells(length: u32, parts: usize) -> Vec<usize> {
    let mut lookup = Vec::with_capacity(length as usize);
    for (chunk, size) in divide_evenly(length, parts).into_iter().enumerate() {
        lookup.extend(std::iter::repeat_n(chunk, size as usize));
    }
    lookup
}

/// Number of most-frequent colors treated as background.
///
/// `floor(distinct * fraction)`, but never less than one color while the
/// fraction is positive, so a flat image is always recognised as all
/// background.
pub fn removal_count(distinct: usize, fraction: f64) -> usize {
    if distinct == 0 || fraction <= 0.0 {
        return 0;
    }
    let count = (distinct as f64 * fraction).floor() as usize;
    count.clamp(1, distinct)
}

/// The most frequent exact colors of `raster`. Frequency ties are broken by
/// channel value so the same raster always yields the same set.
pub fn background_colors(raster: &RgbImage, fraction: f64) -> HashSet<[u8; 3]> {
    let mut counts: HashMap<[u8; 3], u32> = HashMap::new();
    for pixel in raster.pixels() {
        *counts.entry(pixel.0).or_insert(0) += 1;
    }

    let mut ranked: Vec<([u8; 3], u32)> = counts.into_iter().collect();
    ranked.sort_unstable_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    let take = removal_count(ranked.len(), fraction);
    ranked.into_iter().take(take).map(|(color, _)| color).collect()
}

/// Turns normalized rasters into fingerprints of a fixed grid shape.
pub struct Extractor {
    elements_per_dimension: usize,
    removal_fraction: f64,
}

impl Extractor {
    pub fn new(config: &Config) -> Self {
        Self {
            elements_per_dimension: config.elements_per_dimension(),
            removal_fraction: config.background_removal_fraction,
        }
    }

    pub fn extract(&self, raster: &RgbImage) -> Fingerprint {
        let side = self.elements_per_dimension;
        let mut fingerprint = Fingerprint::zeroed(side);

        let background = background_colors(raster, self.removal_fraction);
        let columns = axis_cells(raster.width(), side);
        let rows = axis_cells(raster.height(), side);

        for (x, y, &Rgb([r, g, b])) in raster.enumerate_pixels() {
            if background.contains(&[r, g, b]) {
                continue;
            }
            let row = rows[y as usize];
            let col = columns[x as usize];
            fingerprint.red.add(row, col, u64::from(r));
            fingerprint.green.add(row, col, u64::from(g));
            fingerprint.blue.add(row, col, u64::from(b));
        }

        log::trace!(
            "fingerprinted {}x{} raster, {} background colors dropped",
            raster.width(),
            raster.height(),
            background.len()
        );
        fingerprint
    }
}
