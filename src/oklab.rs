use crate::argb::{argb_from_rgb, rgb_from_argb};
use crate::point::{ColorPoint, PointProvider};

/// OKLab color representation.
///
/// Bjorn Ottosson's perceptually uniform color space.
/// L: lightness [0, 1], a: green-red, b: blue-yellow.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OKLab {
    pub l: f64,
    pub a: f64,
    pub b: f64,
}

impl OKLab {
    pub const fn new(l: f64, a: f64, b: f64) -> Self {
        Self { l, a, b }
    }

    /// Squared Euclidean distance in OKLab space.
    /// Approximates perceptual difference since OKLab is perceptually uniform.
    pub fn distance_sq(self, other: Self) -> f64 {
        let dl = self.l - other.l;
        let da = self.a - other.a;
        let db = self.b - other.b;
        dl * dl + da * da + db * db
    }
}

// --- sRGB transfer function (delegated to linear-srgb crate) ---

/// sRGB gamma → linear (single channel, 0..255 → 0.0..1.0)
#[inline(always)]
fn srgb_to_linear(c: u8) -> f64 {
    f64::from(linear_srgb::default::srgb_u8_to_linear(c))
}

/// Linear → sRGB gamma (single channel, 0.0..1.0 → 0..255)
#[inline(always)]
fn linear_to_srgb(c: f64) -> u8 {
    linear_srgb::default::linear_to_srgb_u8(c.clamp(0.0, 1.0) as f32)
}

// --- OKLab conversion (Bjorn Ottosson) ---
// Matrix constants are from the OKLab reference implementation.

/// Convert sRGB (0..255 per channel) to OKLab.
#[allow(clippy::excessive_precision)]
pub fn srgb_to_oklab(r: u8, g: u8, b: u8) -> OKLab {
    let r = srgb_to_linear(r);
    let g = srgb_to_linear(g);
    let b = srgb_to_linear(b);

    // Linear sRGB → LMS (Ottosson's M1 matrix)
    let l = 0.4122214708 * r + 0.5363325363 * g + 0.0514459929 * b;
    let m = 0.2119034982 * r + 0.6806995451 * g + 0.1073969566 * b;
    let s = 0.0883024619 * r + 0.2817188376 * g + 0.6299787005 * b;

    let l_ = l.cbrt();
    let m_ = m.cbrt();
    let s_ = s.cbrt();

    // LMS → OKLab (Ottosson's M2 matrix)
    OKLab {
        l: 0.2104542553 * l_ + 0.7936177850 * m_ - 0.0040720468 * s_,
        a: 1.9779984951 * l_ - 2.4285922050 * m_ + 0.4505937099 * s_,
        b: 0.0259040371 * l_ + 0.7827717662 * m_ - 0.8086757660 * s_,
    }
}

/// Convert OKLab to sRGB (0..255 per channel).
#[allow(clippy::excessive_precision)]
pub fn oklab_to_srgb(lab: OKLab) -> (u8, u8, u8) {
    // OKLab → LMS (inverse of M2)
    let l_ = lab.l + 0.3963377774 * lab.a + 0.2158037573 * lab.b;
    let m_ = lab.l - 0.1055613458 * lab.a - 0.0638541728 * lab.b;
    let s_ = lab.l - 0.0894841775 * lab.a - 1.2914855480 * lab.b;

    let l = l_ * l_ * l_;
    let m = m_ * m_ * m_;
    let s = s_ * s_ * s_;

    // LMS → linear sRGB (inverse of M1)
    let r = 4.0767416621 * l - 3.3077115913 * m + 0.2309699292 * s;
    let g = -1.2684380046 * l + 2.6097574011 * m - 0.3413193965 * s;
    let b = -0.0041960863 * l - 0.7034186147 * m + 1.7076147010 * s;

    (linear_to_srgb(r), linear_to_srgb(g), linear_to_srgb(b))
}

/// Point provider over OKLab with squared Euclidean distance.
#[derive(Debug, Clone, Copy, Default)]
pub struct OkLabPointProvider;

impl PointProvider for OkLabPointProvider {
    #[inline]
    fn to_point(&self, argb: u32) -> ColorPoint {
        let [r, g, b] = rgb_from_argb(argb);
        let lab = srgb_to_oklab(r, g, b);
        [lab.l, lab.a, lab.b]
    }

    #[inline]
    fn to_argb(&self, point: ColorPoint) -> u32 {
        let (r, g, b) = oklab_to_srgb(OKLab::new(point[0], point[1], point[2]));
        argb_from_rgb(r, g, b)
    }

    #[inline]
    fn distance(&self, a: ColorPoint, b: ColorPoint) -> f64 {
        OKLab::new(a[0], a[1], a[2]).distance_sq(OKLab::new(b[0], b[1], b[2]))
    }
}
