#![forbid(unsafe_code)]

//! Dominant color extraction.
//!
//! Pixels are reduced to distinct opaque colors with counts, coarsely
//! partitioned by Wu's histogram quantizer, and the resulting box colors seed
//! a weighted k-means pass in a perceptual color space (CIE L*a*b* by
//! default). The output maps each final color to the number of pixels it
//! represents.
//!
//! ```
//! use celebi::QuantizeConfig;
//!
//! let pixels = vec![rgb::RGB { r: 200, g: 30, b: 40 }; 16];
//! let result = celebi::quantize(&pixels, &QuantizeConfig::new().max_colors(4)).unwrap();
//! assert_eq!(result.colors()[&0xFFC81E28], 16);
//! ```

pub mod argb;
pub mod error;
pub mod histogram;
pub mod lab;
pub mod oklab;
pub mod point;
pub mod wsmeans;
pub mod wu;

pub use error::QuantizeError;
pub use histogram::PixelHistogram;
pub use lab::LabPointProvider;
pub use oklab::OkLabPointProvider;
pub use point::{ColorPoint, PointProvider};

use std::collections::BTreeMap;

use crate::argb::{argb_from_rgb, argb_from_rgba};
use crate::wsmeans::{DEFAULT_MAX_ITERATIONS, DEFAULT_SEED, RefineOptions};

/// Configuration for dominant color quantization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuantizeConfig {
    /// Maximum number of output colors (at least 1).
    pub max_colors: u32,
    /// Upper bound on k-means rounds (at least 1).
    pub max_iterations: u32,
    /// Seed for sampling extra k-means starting clusters.
    pub seed: u64,
    /// Also report which output color every distinct input color maps to.
    pub map_pixels: bool,
}

impl Default for QuantizeConfig {
    fn default() -> Self {
        Self {
            max_colors: 128,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            seed: DEFAULT_SEED,
            map_pixels: false,
        }
    }
}

impl QuantizeConfig {
    /// Create a config with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of output colors (must be at least 1).
    pub fn max_colors(mut self, n: u32) -> Self {
        self.max_colors = n;
        self
    }

    /// Set the upper bound on k-means rounds (must be at least 1).
    pub fn max_iterations(mut self, n: u32) -> Self {
        self.max_iterations = n;
        self
    }

    /// Set the seed used when the histogram stage yields too few starting clusters.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Enable or disable the input color → output color map.
    pub fn map_pixels(mut self, enabled: bool) -> Self {
        self.map_pixels = enabled;
        self
    }

    fn refine_options(&self) -> RefineOptions {
        RefineOptions {
            max_iterations: self.max_iterations,
            seed: self.seed,
            map_pixels: self.map_pixels,
        }
    }
}

/// Channel layout of a flat sample buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelLayout {
    /// `r, g, b` triples, all opaque.
    Rgb,
    /// `r, g, b, a` quadruples; anything below full alpha is dropped.
    Rgba,
}

impl PixelLayout {
    pub fn channels(self) -> usize {
        match self {
            Self::Rgb => 3,
            Self::Rgba => 4,
        }
    }
}

/// Quantization result.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QuantizeResult {
    colors: BTreeMap<u32, u64>,
    input_to_cluster: Option<BTreeMap<u32, u32>>,
}

impl QuantizeResult {
    pub(crate) fn new(
        colors: BTreeMap<u32, u64>,
        input_to_cluster: Option<BTreeMap<u32, u32>>,
    ) -> Self {
        Self {
            colors,
            input_to_cluster,
        }
    }

    /// Output ARGB color → pixel count.
    pub fn colors(&self) -> &BTreeMap<u32, u64> {
        &self.colors
    }

    /// Distinct input color → output color, if it was requested.
    pub fn input_to_cluster(&self) -> Option<&BTreeMap<u32, u32>> {
        self.input_to_cluster.as_ref()
    }

    /// Number of output colors.
    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// Sum of all reported counts.
    pub fn population(&self) -> u64 {
        self.colors.values().sum()
    }

    /// Output colors, most frequent first. Equal counts keep ascending color order.
    pub fn dominant(&self) -> Vec<(u32, u64)> {
        let mut entries: Vec<(u32, u64)> = self.colors.iter().map(|(&c, &n)| (c, n)).collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1));
        entries
    }
}

/// Quantize opaque RGB pixels.
pub fn quantize(
    pixels: &[rgb::RGB<u8>],
    config: &QuantizeConfig,
) -> Result<QuantizeResult, QuantizeError> {
    validate_config(config)?;
    if pixels.is_empty() {
        return Err(QuantizeError::EmptyInput);
    }
    let hist = PixelHistogram::from_rgb(pixels);
    tracing::debug!(pixels = pixels.len(), distinct = hist.len(), "built color histogram");
    quantize_histogram_with(&hist, config, &LabPointProvider)
}

/// Quantize RGBA pixels. Pixels that are not fully opaque are ignored.
pub fn quantize_rgba(
    pixels: &[rgb::RGBA<u8>],
    config: &QuantizeConfig,
) -> Result<QuantizeResult, QuantizeError> {
    validate_config(config)?;
    if pixels.is_empty() {
        return Err(QuantizeError::EmptyInput);
    }
    let hist = PixelHistogram::from_rgba(pixels);
    tracing::debug!(pixels = pixels.len(), distinct = hist.len(), "built color histogram");
    quantize_histogram_with(&hist, config, &LabPointProvider)
}

/// Quantize packed `0xAARRGGBB` pixels. Pixels that are not fully opaque are ignored.
pub fn quantize_argb(pixels: &[u32], config: &QuantizeConfig) -> Result<QuantizeResult, QuantizeError> {
    validate_config(config)?;
    if pixels.is_empty() {
        return Err(QuantizeError::EmptyInput);
    }
    let hist = PixelHistogram::from_argb(pixels.iter().copied());
    tracing::debug!(pixels = pixels.len(), distinct = hist.len(), "built color histogram");
    quantize_histogram_with(&hist, config, &LabPointProvider)
}

/// Quantize a flat buffer of 8-bit samples in the given layout.
pub fn quantize_bytes(
    samples: &[u8],
    layout: PixelLayout,
    config: &QuantizeConfig,
) -> Result<QuantizeResult, QuantizeError> {
    validate_config(config)?;
    let channels = layout.channels();
    if samples.len() % channels != 0 {
        return Err(QuantizeError::BufferLength {
            len: samples.len(),
            channels,
        });
    }
    if samples.is_empty() {
        return Err(QuantizeError::EmptyInput);
    }
    let pixels = samples.chunks_exact(channels).map(|px| match layout {
        PixelLayout::Rgb => argb_from_rgb(px[0], px[1], px[2]),
        PixelLayout::Rgba => argb_from_rgba(px[0], px[1], px[2], px[3]),
    });
    let hist = PixelHistogram::from_argb(pixels);
    tracing::debug!(
        pixels = samples.len() / channels,
        distinct = hist.len(),
        "built color histogram"
    );
    quantize_histogram_with(&hist, config, &LabPointProvider)
}

/// Run both stages over an existing histogram in the given perceptual space.
///
/// The Wu stage works in raw channel space and only supplies starting
/// colors; clustering and the reported colors come from `provider`.
pub fn quantize_histogram_with<P: PointProvider>(
    histogram: &PixelHistogram,
    config: &QuantizeConfig,
    provider: &P,
) -> Result<QuantizeResult, QuantizeError> {
    validate_config(config)?;
    if histogram.is_empty() {
        return Err(QuantizeError::NoOpaquePixels);
    }

    let boxes = wu::quantize_wu(histogram, config.max_colors as usize);
    tracing::debug!(
        requested = boxes.requested,
        produced = boxes.produced,
        seeds = boxes.seeds.len(),
        "histogram stage done"
    );

    let result = wsmeans::refine(
        histogram,
        &boxes.distinct_colors(),
        config.max_colors,
        provider,
        &config.refine_options(),
    )?;
    tracing::debug!(colors = result.len(), population = result.population(), "quantized");
    Ok(result)
}

fn validate_config(config: &QuantizeConfig) -> Result<(), QuantizeError> {
    if config.max_colors == 0 {
        return Err(QuantizeError::InvalidMaxColors(config.max_colors));
    }
    if config.max_iterations == 0 {
        return Err(QuantizeError::InvalidMaxIterations(config.max_iterations));
    }
    Ok(())
}
