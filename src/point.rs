//! The color-space seam used by the refinement stage.

/// A color as three coordinates in some perceptual space.
pub type ColorPoint = [f64; 3];

/// Conversion between packed colors and a perceptual space, plus a distance.
///
/// Implementations are pure: no interior state, no side effects. The
/// refiner is generic over this trait, so any conforming space can be
/// dropped in without touching the clustering code.
pub trait PointProvider {
    /// Convert an ARGB color to a point. Alpha is ignored.
    fn to_point(&self, argb: u32) -> ColorPoint;

    /// Convert a point back to an opaque ARGB color, channels rounded and clamped.
    fn to_argb(&self, point: ColorPoint) -> u32;

    /// Comparison distance between two points.
    ///
    /// Only the ordering has to match the true perceptual distance, so a
    /// squared Euclidean distance is a valid choice.
    fn distance(&self, a: ColorPoint, b: ColorPoint) -> f64;
}

/// Squared Euclidean distance.
#[inline]
pub fn distance_sq(a: ColorPoint, b: ColorPoint) -> f64 {
    let d0 = a[0] - b[0];
    let d1 = a[1] - b[1];
    let d2 = a[2] - b[2];
    d0 * d0 + d1 * d1 + d2 * d2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_symmetric_and_zero_on_identity() {
        let a = [50.0, 10.0, -20.0];
        let b = [40.0, -5.0, 3.0];
        assert_eq!(distance_sq(a, b), distance_sq(b, a));
        assert_eq!(distance_sq(a, a), 0.0);
        assert_eq!(distance_sq([0.0; 3], [1.0, 2.0, 2.0]), 9.0);
    }
}
