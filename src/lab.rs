//! CIE L*a*b* (D65) conversion and the reference point provider.

use crate::argb::{argb_from_rgb, rgb_from_argb};
use crate::point::{ColorPoint, PointProvider, distance_sq};

/// Linear sRGB (0..100) → XYZ.
const SRGB_TO_XYZ: [[f64; 3]; 3] = [
    [0.41233895, 0.35762064, 0.18051042],
    [0.2126, 0.7152, 0.0722],
    [0.01932141, 0.11916382, 0.95034478],
];

/// XYZ → linear sRGB (0..100).
const XYZ_TO_SRGB: [[f64; 3]; 3] = [
    [3.2413774792388685, -1.5376652402851851, -0.49885366846268053],
    [-0.9691452513005321, 1.8758853451067872, 0.04156585616912061],
    [0.05562093689691305, -0.20395524564742123, 1.0571799111220335],
];

const WHITE_POINT_D65: [f64; 3] = [95.047, 100.0, 108.883];

const EPSILON: f64 = 216.0 / 24389.0;
const KAPPA: f64 = 24389.0 / 27.0;

/// A color in CIE L*a*b*. L: 0..100.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lab {
    pub l: f64,
    pub a: f64,
    pub b: f64,
}

impl Lab {
    pub const fn new(l: f64, a: f64, b: f64) -> Self {
        Self { l, a, b }
    }
}

/// sRGB channel → linear light on the 0..100 scale.
fn linearized(c: u8) -> f64 {
    f64::from(linear_srgb::default::srgb_u8_to_linear(c)) * 100.0
}

/// Linear light on the 0..100 scale → sRGB channel, rounded and clamped.
///
/// Goes through the scalar transfer curve rather than the u8 table so that
/// every channel value survives a round trip exactly.
fn delinearized(c: f64) -> u8 {
    let encoded = linear_srgb::default::linear_to_srgb((c / 100.0).clamp(0.0, 1.0) as f32);
    (encoded * 255.0).round().clamp(0.0, 255.0) as u8
}

fn mul3(m: &[[f64; 3]; 3], v: [f64; 3]) -> [f64; 3] {
    [
        m[0][0] * v[0] + m[0][1] * v[1] + m[0][2] * v[2],
        m[1][0] * v[0] + m[1][1] * v[1] + m[1][2] * v[2],
        m[2][0] * v[0] + m[2][1] * v[1] + m[2][2] * v[2],
    ]
}

fn lab_f(t: f64) -> f64 {
    if t > EPSILON {
        t.cbrt()
    } else {
        (KAPPA * t + 16.0) / 116.0
    }
}

fn lab_invf(ft: f64) -> f64 {
    let ft3 = ft * ft * ft;
    if ft3 > EPSILON {
        ft3
    } else {
        (116.0 * ft - 16.0) / KAPPA
    }
}

/// Convert an ARGB color to L*a*b*. Alpha is ignored.
pub fn lab_from_argb(argb: u32) -> Lab {
    let linear = rgb_from_argb(argb).map(linearized);
    let xyz = mul3(&SRGB_TO_XYZ, linear);

    let fx = lab_f(xyz[0] / WHITE_POINT_D65[0]);
    let fy = lab_f(xyz[1] / WHITE_POINT_D65[1]);
    let fz = lab_f(xyz[2] / WHITE_POINT_D65[2]);

    Lab {
        l: 116.0 * fy - 16.0,
        a: 500.0 * (fx - fy),
        b: 200.0 * (fy - fz),
    }
}

/// Convert L*a*b* to an opaque ARGB color. Out-of-gamut values clamp.
pub fn argb_from_lab(lab: Lab) -> u32 {
    let fy = (lab.l + 16.0) / 116.0;
    let fx = lab.a / 500.0 + fy;
    let fz = fy - lab.b / 200.0;

    let xyz = [
        lab_invf(fx) * WHITE_POINT_D65[0],
        lab_invf(fy) * WHITE_POINT_D65[1],
        lab_invf(fz) * WHITE_POINT_D65[2],
    ];
    let [r, g, b] = mul3(&XYZ_TO_SRGB, xyz).map(delinearized);
    argb_from_rgb(r, g, b)
}

/// Point provider over CIE L*a*b* with squared delta-E as the distance.
///
/// The square root of CIE76 delta-E is skipped: the refiner only compares
/// distances, and the ordering is unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct LabPointProvider;

impl PointProvider for LabPointProvider {
    #[inline]
    fn to_point(&self, argb: u32) -> ColorPoint {
        let lab = lab_from_argb(argb);
        [lab.l, lab.a, lab.b]
    }

    #[inline]
    fn to_argb(&self, point: ColorPoint) -> u32 {
        argb_from_lab(Lab::new(point[0], point[1], point[2]))
    }

    #[inline]
    fn distance(&self, a: ColorPoint, b: ColorPoint) -> f64 {
        distance_sq(a, b)
    }
}
