//! Wu's color quantizer (greedy orthogonal bipartitioning).
//!
//! Colors are binned on a 33×33×33 grid (5 bits per channel, index 0 reserved
//! so that cumulative lookups at the lower box edge never underflow). Four
//! cumulative moment tables turn any box sum into an 8-term inclusion-exclusion
//! lookup. Starting from the whole grid, the box with the largest variance is
//! repeatedly cut along the axis and position that best separates its pixels.
//!
//! Reference: Xiaolin Wu, "Color quantization by dynamic programming and
//! principal analysis", ACM Transactions on Graphics 11(4), 1992.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::{Add, Sub};

use crate::argb::{argb_from_rgb, rgb_from_argb};
use crate::histogram::PixelHistogram;
use crate::QuantizeResult;

const INDEX_BITS: u32 = 5;
const SIDE_LENGTH: usize = (1 << INDEX_BITS) + 1;
const TOTAL_SIZE: usize = SIDE_LENGTH * SIDE_LENGTH * SIDE_LENGTH;
const MAX_INDEX: usize = SIDE_LENGTH - 1;

/// Flat grid position of a bin.
#[inline]
fn grid_index(r: usize, g: usize, b: usize) -> usize {
    (r << (INDEX_BITS * 2)) + (r << (INDEX_BITS + 1)) + r + (g << INDEX_BITS) + g + b
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Red,
    Green,
    Blue,
}

/// An axis-aligned box over the grid, `(lo, hi]` in cumulative-table terms.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct ColorBox {
    r0: usize,
    r1: usize,
    g0: usize,
    g1: usize,
    b0: usize,
    b1: usize,
    vol: usize,
}

impl ColorBox {
    fn new(r0: usize, r1: usize, g0: usize, g1: usize, b0: usize, b1: usize) -> Self {
        Self {
            r0,
            r1,
            g0,
            g1,
            b0,
            b1,
            vol: (r1 - r0) * (g1 - g0) * (b1 - b0),
        }
    }

    fn whole_grid() -> Self {
        Self::new(0, MAX_INDEX, 0, MAX_INDEX, 0, MAX_INDEX)
    }
}

/// Sum of a cumulative table over a box.
fn volume<T>(cube: &ColorBox, table: &[T]) -> T
where
    T: Copy + Add<Output = T> + Sub<Output = T>,
{
    let ColorBox {
        r0,
        r1,
        g0,
        g1,
        b0,
        b1,
        ..
    } = *cube;
    let upper = (table[grid_index(r1, g1, b1)] - table[grid_index(r1, g1, b0)])
        - (table[grid_index(r1, g0, b1)] - table[grid_index(r1, g0, b0)]);
    let lower = (table[grid_index(r0, g1, b1)] - table[grid_index(r0, g1, b0)])
        - (table[grid_index(r0, g0, b1)] - table[grid_index(r0, g0, b0)]);
    upper - lower
}

/// Part of the box sum that does not depend on the cut position, with sign
/// flipped so that `bottom + top(position)` is the lower half's sum.
fn bottom<T>(cube: &ColorBox, axis: Axis, table: &[T]) -> T
where
    T: Copy + Add<Output = T> + Sub<Output = T>,
{
    let ColorBox {
        r0,
        r1,
        g0,
        g1,
        b0,
        b1,
        ..
    } = *cube;
    match axis {
        Axis::Red => {
            (table[grid_index(r0, g1, b0)] - table[grid_index(r0, g1, b1)])
                + (table[grid_index(r0, g0, b1)] - table[grid_index(r0, g0, b0)])
        }
        Axis::Green => {
            (table[grid_index(r1, g0, b0)] - table[grid_index(r1, g0, b1)])
                + (table[grid_index(r0, g0, b1)] - table[grid_index(r0, g0, b0)])
        }
        Axis::Blue => {
            (table[grid_index(r1, g0, b0)] - table[grid_index(r1, g1, b0)])
                + (table[grid_index(r0, g1, b0)] - table[grid_index(r0, g0, b0)])
        }
    }
}

/// Cumulative sum of the box's cross-section at `position` along `axis`.
fn top<T>(cube: &ColorBox, axis: Axis, position: usize, table: &[T]) -> T
where
    T: Copy + Add<Output = T> + Sub<Output = T>,
{
    let ColorBox {
        r0,
        r1,
        g0,
        g1,
        b0,
        b1,
        ..
    } = *cube;
    match axis {
        Axis::Red => {
            (table[grid_index(position, g1, b1)] - table[grid_index(position, g1, b0)])
                - (table[grid_index(position, g0, b1)] - table[grid_index(position, g0, b0)])
        }
        Axis::Green => {
            (table[grid_index(r1, position, b1)] - table[grid_index(r1, position, b0)])
                - (table[grid_index(r0, position, b1)] - table[grid_index(r0, position, b0)])
        }
        Axis::Blue => {
            (table[grid_index(r1, g1, position)] - table[grid_index(r1, g0, position)])
                - (table[grid_index(r0, g1, position)] - table[grid_index(r0, g0, position)])
        }
    }
}

/// Pixel weight and channel sums of a region.
#[derive(Debug, Clone, Copy)]
struct Moments {
    r: i64,
    g: i64,
    b: i64,
    w: i64,
}

impl Moments {
    /// `Σ channel² / weight`, the quantity a cut tries to maximize.
    fn spread(self) -> f64 {
        let (r, g, b) = (self.r as f64, self.g as f64, self.b as f64);
        (r * r + g * g + b * b) / self.w as f64
    }
}

/// Cumulative moment tables over the quantized color grid.
///
/// Built once from a histogram and read-only afterwards. Weight and channel
/// sums are kept as integers so box queries are exact.
#[derive(Debug, Clone)]
pub struct MomentTable {
    weights: Vec<i64>,
    moments_r: Vec<i64>,
    moments_g: Vec<i64>,
    moments_b: Vec<i64>,
    moments: Vec<f64>,
}

impl MomentTable {
    pub fn new(histogram: &PixelHistogram) -> Self {
        let mut table = Self {
            weights: vec![0; TOTAL_SIZE],
            moments_r: vec![0; TOTAL_SIZE],
            moments_g: vec![0; TOTAL_SIZE],
            moments_b: vec![0; TOTAL_SIZE],
            moments: vec![0.0; TOTAL_SIZE],
        };
        table.accumulate(histogram);
        table.compute_cumulative();
        table
    }

    fn accumulate(&mut self, histogram: &PixelHistogram) {
        let bits_to_remove = 8 - INDEX_BITS;
        for (argb, count) in histogram.iter() {
            let [r, g, b] = rgb_from_argb(argb);
            let index = grid_index(
                (r >> bits_to_remove) as usize + 1,
                (g >> bits_to_remove) as usize + 1,
                (b >> bits_to_remove) as usize + 1,
            );
            let count = count as i64;
            let (r, g, b) = (r as i64, g as i64, b as i64);

            self.weights[index] += count;
            self.moments_r[index] += r * count;
            self.moments_g[index] += g * count;
            self.moments_b[index] += b * count;
            self.moments[index] += ((r * r + g * g + b * b) * count) as f64;
        }
    }

    /// Turn per-bin sums into 3D prefix sums.
    fn compute_cumulative(&mut self) {
        for r in 1..SIDE_LENGTH {
            let mut area = [0i64; SIDE_LENGTH];
            let mut area_r = [0i64; SIDE_LENGTH];
            let mut area_g = [0i64; SIDE_LENGTH];
            let mut area_b = [0i64; SIDE_LENGTH];
            let mut area2 = [0.0f64; SIDE_LENGTH];

            for g in 1..SIDE_LENGTH {
                let mut line = 0i64;
                let mut line_r = 0i64;
                let mut line_g = 0i64;
                let mut line_b = 0i64;
                let mut line2 = 0.0f64;

                for b in 1..SIDE_LENGTH {
                    let index = grid_index(r, g, b);
                    line += self.weights[index];
                    line_r += self.moments_r[index];
                    line_g += self.moments_g[index];
                    line_b += self.moments_b[index];
                    line2 += self.moments[index];

                    area[b] += line;
                    area_r[b] += line_r;
                    area_g[b] += line_g;
                    area_b[b] += line_b;
                    area2[b] += line2;

                    let previous = grid_index(r - 1, g, b);
                    self.weights[index] = self.weights[previous] + area[b];
                    self.moments_r[index] = self.moments_r[previous] + area_r[b];
                    self.moments_g[index] = self.moments_g[previous] + area_g[b];
                    self.moments_b[index] = self.moments_b[previous] + area_b[b];
                    self.moments[index] = self.moments[previous] + area2[b];
                }
            }
        }
    }

    /// Total pixel weight over the whole grid.
    pub fn total_weight(&self) -> u64 {
        volume(&ColorBox::whole_grid(), &self.weights) as u64
    }

    fn box_moments(&self, cube: &ColorBox) -> Moments {
        Moments {
            r: volume(cube, &self.moments_r),
            g: volume(cube, &self.moments_g),
            b: volume(cube, &self.moments_b),
            w: volume(cube, &self.weights),
        }
    }

    /// Sum of squared deviations from the box mean. Empty boxes have none.
    fn variance(&self, cube: &ColorBox) -> f64 {
        let m = self.box_moments(cube);
        if m.w <= 0 {
            return 0.0;
        }
        volume(cube, &self.moments) - m.spread()
    }

    /// Best cut position along one axis, scanning `first..last`.
    fn maximize(
        &self,
        cube: &ColorBox,
        axis: Axis,
        first: usize,
        last: usize,
        whole: Moments,
    ) -> (Option<usize>, f64) {
        let base = Moments {
            r: bottom(cube, axis, &self.moments_r),
            g: bottom(cube, axis, &self.moments_g),
            b: bottom(cube, axis, &self.moments_b),
            w: bottom(cube, axis, &self.weights),
        };

        let mut max = 0.0;
        let mut cut = None;

        for position in first..last {
            let lower = Moments {
                r: base.r + top(cube, axis, position, &self.moments_r),
                g: base.g + top(cube, axis, position, &self.moments_g),
                b: base.b + top(cube, axis, position, &self.moments_b),
                w: base.w + top(cube, axis, position, &self.weights),
            };
            if lower.w == 0 {
                continue;
            }

            let upper = Moments {
                r: whole.r - lower.r,
                g: whole.g - lower.g,
                b: whole.b - lower.b,
                w: whole.w - lower.w,
            };
            if upper.w == 0 {
                continue;
            }

            let score = lower.spread() + upper.spread();
            if score > max {
                max = score;
                cut = Some(position);
            }
        }

        (cut, max)
    }

    /// Split a box in two, or `None` if no position separates its pixels.
    fn cut(&self, one: &ColorBox) -> Option<(ColorBox, ColorBox)> {
        let whole = self.box_moments(one);

        let (cut_r, max_r) = self.maximize(one, Axis::Red, one.r0 + 1, one.r1, whole);
        let (cut_g, max_g) = self.maximize(one, Axis::Green, one.g0 + 1, one.g1, whole);
        let (cut_b, max_b) = self.maximize(one, Axis::Blue, one.b0 + 1, one.b1, whole);

        // Ties go to the earlier axis.
        let (axis, position) = if max_r >= max_g && max_r >= max_b {
            (Axis::Red, cut_r?)
        } else if max_g >= max_r && max_g >= max_b {
            (Axis::Green, cut_g?)
        } else {
            (Axis::Blue, cut_b?)
        };

        let ColorBox {
            r0,
            r1,
            g0,
            g1,
            b0,
            b1,
            ..
        } = *one;
        Some(match axis {
            Axis::Red => (
                ColorBox::new(r0, position, g0, g1, b0, b1),
                ColorBox::new(position, r1, g0, g1, b0, b1),
            ),
            Axis::Green => (
                ColorBox::new(r0, r1, g0, position, b0, b1),
                ColorBox::new(r0, r1, position, g1, b0, b1),
            ),
            Axis::Blue => (
                ColorBox::new(r0, r1, g0, g1, b0, position),
                ColorBox::new(r0, r1, g0, g1, position, b1),
            ),
        })
    }

    fn split_variance(&self, cube: &ColorBox) -> f64 {
        if cube.vol > 1 {
            self.variance(cube)
        } else {
            0.0
        }
    }

    /// Greedily split the grid into at most `max_boxes` boxes.
    ///
    /// Returns the box arena and the number of active boxes.
    fn create_boxes(&self, max_boxes: usize) -> (Vec<ColorBox>, usize) {
        let mut boxes = vec![ColorBox::default(); max_boxes];
        boxes[0] = ColorBox::whole_grid();

        let mut volume_variance = vec![0.0f64; max_boxes];
        let mut next = 0;
        let mut generated = max_boxes;
        let mut i = 1;

        while i < max_boxes {
            match self.cut(&boxes[next]) {
                Some((one, two)) => {
                    boxes[next] = one;
                    boxes[i] = two;
                    volume_variance[next] = self.split_variance(&one);
                    volume_variance[i] = self.split_variance(&two);
                }
                None => {
                    // Unsplittable: retire it and retry this slot with another box.
                    volume_variance[next] = 0.0;
                    i -= 1;
                }
            }

            next = 0;
            let mut largest = volume_variance[0];
            for (j, &v) in volume_variance.iter().enumerate().take(i + 1).skip(1) {
                if v > largest {
                    largest = v;
                    next = j;
                }
            }
            if largest <= 0.0 {
                generated = i + 1;
                break;
            }
            i += 1;
        }

        (boxes, generated)
    }

    /// Weighted mean color of a box, or `None` if it holds no pixels.
    fn box_color(&self, cube: &ColorBox) -> Option<(u32, u64)> {
        let m = self.box_moments(cube);
        if m.w <= 0 {
            return None;
        }
        let w = m.w as f64;
        let channel = |sum: i64| (sum as f64 / w).round().clamp(0.0, 255.0) as u8;
        Some((argb_from_rgb(channel(m.r), channel(m.g), channel(m.b)), m.w as u64))
    }
}

/// Output of the histogram stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WuOutput {
    /// Representative color and pixel weight of every non-empty box, in arena order.
    /// Equal colors from different boxes are kept as separate seeds.
    pub seeds: Vec<(u32, u64)>,
    /// Number of boxes asked for.
    pub requested: usize,
    /// Number of boxes the split loop actually produced.
    pub produced: usize,
}

impl WuOutput {
    /// Seed colors only.
    pub fn colors(&self) -> Vec<u32> {
        self.seeds.iter().map(|&(argb, _)| argb).collect()
    }

    /// Seed colors with repeats removed, in first-occurrence order.
    ///
    /// These are the starting clusters handed to the refiner, so each center
    /// occupies only one cluster slot.
    pub fn distinct_colors(&self) -> Vec<u32> {
        let mut seen = BTreeSet::new();
        self.seeds
            .iter()
            .map(|&(argb, _)| argb)
            .filter(|&argb| seen.insert(argb))
            .collect()
    }

    /// Seeds as a color → weight mapping. Weights of repeated colors add up.
    pub fn into_result(self) -> QuantizeResult {
        let mut colors = BTreeMap::new();
        for (argb, weight) in self.seeds {
            *colors.entry(argb).or_insert(0) += weight;
        }
        QuantizeResult::new(colors, None)
    }
}

/// Partition the histogram into at most `max_boxes` boxes and return their
/// weighted mean colors.
///
/// Fewer boxes than requested is a normal outcome when the colors run out.
pub fn quantize_wu(histogram: &PixelHistogram, max_boxes: usize) -> WuOutput {
    if histogram.is_empty() || max_boxes == 0 {
        return WuOutput {
            seeds: Vec::new(),
            requested: max_boxes,
            produced: 0,
        };
    }

    let table = MomentTable::new(histogram);
    // Every produced box holds at least one distinct color.
    let capacity = max_boxes.min(histogram.len());
    let (boxes, produced) = table.create_boxes(capacity);

    let seeds = boxes[..produced]
        .iter()
        .filter_map(|cube| table.box_color(cube))
        .collect();

    WuOutput {
        seeds,
        requested: max_boxes,
        produced,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Deterministic spread of colors via a multiplicative hash.
    fn hashed_histogram(n: u32) -> PixelHistogram {
        PixelHistogram::from_counts((0..n).map(|i| {
            let h = i.wrapping_mul(2654435761);
            (0xFF00_0000 | (h & 0x00FF_FFFF), i % 7 + 1)
        }))
    }

    #[test]
    fn grid_index_is_row_major() {
        assert_eq!(grid_index(0, 0, 0), 0);
        assert_eq!(grid_index(0, 0, 1), 1);
        assert_eq!(grid_index(0, 1, 0), SIDE_LENGTH);
        assert_eq!(grid_index(1, 0, 0), SIDE_LENGTH * SIDE_LENGTH);
        assert_eq!(grid_index(MAX_INDEX, MAX_INDEX, MAX_INDEX), TOTAL_SIZE - 1);
    }

    #[test]
    fn full_grid_weight_equals_pixel_count() {
        for n in [1, 2, 17, 500, 3000] {
            let hist = hashed_histogram(n);
            let table = MomentTable::new(&hist);
            assert_eq!(table.total_weight(), hist.total(), "n = {n}");
        }
    }

    #[test]
    fn box_query_matches_brute_force() {
        let hist = hashed_histogram(2000);
        let table = MomentTable::new(&hist);
        let cube = ColorBox::new(4, 20, 9, 31, 0, 13);

        let mut weight = 0i64;
        let mut red = 0i64;
        for (argb, count) in hist.iter() {
            let [r, g, b] = rgb_from_argb(argb);
            let (ri, gi, bi) = (
                (r >> 3) as usize + 1,
                (g >> 3) as usize + 1,
                (b >> 3) as usize + 1,
            );
            if ri > cube.r0 && ri <= cube.r1 && gi > cube.g0 && gi <= cube.g1 && bi > cube.b0 && bi <= cube.b1 {
                weight += count as i64;
                red += r as i64 * count as i64;
            }
        }
        let m = table.box_moments(&cube);
        assert_eq!(m.w, weight);
        assert_eq!(m.r, red);
    }

    #[test]
    fn single_color_single_seed() {
        let hist = PixelHistogram::from_counts([(0xFFAABBCC, 42)]);
        let out = quantize_wu(&hist, 16);
        assert_eq!(out.seeds, vec![(0xFFAABBCC, 42)]);
        assert_eq!(out.requested, 16);
        assert_eq!(out.produced, 1);
    }

    #[test]
    fn one_box_is_weighted_mean() {
        let hist = PixelHistogram::from_counts([(0xFF000000, 3), (0xFF646464, 1)]);
        let out = quantize_wu(&hist, 1);
        assert_eq!(out.seeds, vec![(0xFF191919, 4)]);
    }

    #[test]
    fn separates_distant_colors() {
        let hist = PixelHistogram::from_counts([(0xFFFF0000, 10), (0xFF0000FF, 30)]);
        let out = quantize_wu(&hist, 2);
        let mut seeds = out.seeds.clone();
        seeds.sort();
        assert_eq!(seeds, vec![(0xFF0000FF, 30), (0xFFFF0000, 10)]);
    }

    #[test]
    fn underfilled_partition_is_reported() {
        // Both colors share one grid cell, so no cut can separate them.
        let hist = PixelHistogram::from_counts([(0xFF101010, 1), (0xFF111111, 1)]);
        let out = quantize_wu(&hist, 8);
        assert_eq!(out.produced, 1);
        assert_eq!(out.seeds.len(), 1);
    }

    #[test]
    fn failed_cut_retries_slot_with_next_box() {
        // The heavy pair shares one grid cell: highest variance, but no cut.
        // The slot then goes to the light pair, which sits in two cells.
        let hist = PixelHistogram::from_counts([
            (0xFFC8C8C8, 1000),
            (0xFFCFCFCF, 1000),
            (0xFF000000, 1),
            (0xFF080000, 1),
        ]);
        let out = quantize_wu(&hist, 3);
        assert_eq!(out.produced, 3);
        let mut seeds = out.seeds.clone();
        seeds.sort();
        assert_eq!(
            seeds,
            vec![(0xFF000000, 1), (0xFF080000, 1), (0xFFCCCCCC, 2000)]
        );

        // Nothing left to split after that.
        assert_eq!(quantize_wu(&hist, 4).produced, 3);
    }

    #[test]
    fn weights_are_conserved() {
        let hist = hashed_histogram(1000);
        let out = quantize_wu(&hist, 32);
        assert_eq!(out.produced, 32);
        let total: u64 = out.seeds.iter().map(|&(_, w)| w).sum();
        assert_eq!(total, hist.total());
    }

    #[test]
    fn empty_histogram_produces_nothing() {
        let out = quantize_wu(&PixelHistogram::default(), 4);
        assert!(out.seeds.is_empty());
        assert_eq!(out.produced, 0);
    }

    #[test]
    fn result_merges_equal_seed_weights() {
        let out = WuOutput {
            seeds: vec![(0xFF010203, 2), (0xFF010203, 5), (0xFF000000, 1)],
            requested: 3,
            produced: 3,
        };
        let result = out.into_result();
        assert_eq!(result.len(), 2);
        assert_eq!(result.colors()[&0xFF010203], 7);
    }

    #[test]
    fn distinct_colors_keep_first_occurrence_order() {
        let out = WuOutput {
            seeds: vec![
                (0xFF808080, 1),
                (0xFF010203, 2),
                (0xFF808080, 4),
                (0xFF000000, 1),
                (0xFF010203, 5),
            ],
            requested: 5,
            produced: 5,
        };
        assert_eq!(out.distinct_colors(), vec![0xFF808080, 0xFF010203, 0xFF000000]);
        assert_eq!(out.colors().len(), 5);
    }
}
