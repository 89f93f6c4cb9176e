use std::collections::BTreeMap;

use crate::argb::{argb_from_rgb, argb_from_rgba, is_opaque};
use crate::QuantizeResult;

/// Distinct opaque colors of an image with their pixel counts.
///
/// Colors are stored in ascending ARGB order, which keeps every later stage
/// deterministic. Counts are always at least 1 and sum to the number of
/// opaque pixels the histogram was built from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PixelHistogram {
    colors: Vec<u32>,
    counts: Vec<u64>,
}

impl PixelHistogram {
    /// Build from packed ARGB colors. Pixels with alpha below 255 are skipped.
    pub fn from_argb(pixels: impl IntoIterator<Item = u32>) -> Self {
        let mut buckets: BTreeMap<u32, u64> = BTreeMap::new();
        for argb in pixels {
            if !is_opaque(argb) {
                continue;
            }
            *buckets.entry(argb).or_insert(0) += 1;
        }
        Self::from_buckets(buckets)
    }

    /// Build from RGB pixels, all of which are opaque.
    pub fn from_rgb(pixels: &[rgb::RGB<u8>]) -> Self {
        Self::from_argb(pixels.iter().map(|p| argb_from_rgb(p.r, p.g, p.b)))
    }

    /// Build from RGBA pixels. Pixels with alpha below 255 are skipped.
    pub fn from_rgba(pixels: &[rgb::RGBA<u8>]) -> Self {
        Self::from_argb(pixels.iter().map(|p| argb_from_rgba(p.r, p.g, p.b, p.a)))
    }

    /// Build from `(color, count)` pairs. Translucent colors and zero counts
    /// are dropped, repeated colors are merged.
    pub fn from_counts(pairs: impl IntoIterator<Item = (u32, u32)>) -> Self {
        let mut buckets: BTreeMap<u32, u64> = BTreeMap::new();
        for (argb, count) in pairs {
            if count == 0 || !is_opaque(argb) {
                continue;
            }
            *buckets.entry(argb).or_insert(0) += u64::from(count);
        }
        Self::from_buckets(buckets)
    }

    fn from_buckets(buckets: BTreeMap<u32, u64>) -> Self {
        let (colors, counts) = buckets.into_iter().unzip();
        Self { colors, counts }
    }

    /// Distinct colors, ascending.
    pub fn colors(&self) -> &[u32] {
        &self.colors
    }

    /// Pixel count per distinct color, parallel to [`colors`](Self::colors).
    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// Iterate `(color, count)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (u32, u64)> + '_ {
        self.colors.iter().copied().zip(self.counts.iter().copied())
    }

    /// Number of distinct colors.
    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// Total number of pixels.
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// The exact, unreduced color → count mapping.
    pub fn into_result(self) -> QuantizeResult {
        QuantizeResult::new(self.iter().collect(), None)
    }
}
