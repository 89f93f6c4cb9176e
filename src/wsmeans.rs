//! Weighted k-means over distinct colors.
//!
//! Each distinct color is a point weighted by its pixel count. Starting
//! centers come from the caller (usually the Wu stage), topped up with a
//! seeded random sample of the input when there are too few. Reassignment
//! skips candidate centers that the triangle inequality rules out, using a
//! per-cluster list of center distances sorted ascending.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::SeedableRng;

use crate::error::QuantizeError;
use crate::histogram::PixelHistogram;
use crate::point::{ColorPoint, PointProvider};
use crate::QuantizeResult;

pub const DEFAULT_MAX_ITERATIONS: u32 = 5;

/// Seed for topping up starting clusters. Fixed so equal input gives equal output.
pub const DEFAULT_SEED: u64 = 0x42688;

/// Tuning for [`refine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefineOptions {
    /// Upper bound on assignment/update rounds.
    pub max_iterations: u32,
    /// Seed for sampling extra starting clusters.
    pub seed: u64,
    /// Also report which output color every input color ended up in.
    pub map_pixels: bool,
}

impl Default for RefineOptions {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            seed: DEFAULT_SEED,
            map_pixels: false,
        }
    }
}

/// Distances from one cluster center to every center (itself included), ascending.
type NeighborList = Vec<(f64, usize)>;

fn build_neighbors<P: PointProvider>(
    clusters: &[ColorPoint],
    provider: &P,
    neighbors: &mut [NeighborList],
) {
    for list in neighbors.iter_mut() {
        list.clear();
    }
    for i in 0..clusters.len() {
        neighbors[i].push((0.0, i));
        for j in (i + 1)..clusters.len() {
            let d = provider.distance(clusters[i], clusters[j]);
            neighbors[i].push((d, j));
            neighbors[j].push((d, i));
        }
    }
    for list in neighbors.iter_mut() {
        list.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
    }
}

/// Move every point to its nearest center. Returns how many points changed cluster.
///
/// A center `c` can only beat the current center `k` if
/// `distance(k, c) < 4 * distance(p, k)`, which holds for squared Euclidean
/// distances. Neighbor lists are sorted, so the scan stops at the first
/// center outside that bound.
fn reassign<P: PointProvider>(
    points: &[ColorPoint],
    clusters: &[ColorPoint],
    neighbors: &[NeighborList],
    assignments: &mut [usize],
    provider: &P,
) -> usize {
    let mut moved = 0;
    for (point, assigned) in points.iter().zip(assignments.iter_mut()) {
        let current = *assigned;
        let previous_distance = provider.distance(*point, clusters[current]);
        let bound = 4.0 * previous_distance;

        let mut best = current;
        let mut best_distance = previous_distance;
        for &(center_distance, candidate) in &neighbors[current] {
            if center_distance >= bound {
                break;
            }
            if candidate == current {
                continue;
            }
            let d = provider.distance(*point, clusters[candidate]);
            if d < best_distance {
                best_distance = d;
                best = candidate;
            }
        }

        if best != current {
            *assigned = best;
            moved += 1;
        }
    }
    moved
}

/// Recompute every center as the count-weighted mean of its points.
/// Clusters left without points collapse to the origin.
fn update_centers(
    points: &[ColorPoint],
    counts: &[u64],
    assignments: &[usize],
    clusters: &mut [ColorPoint],
    populations: &mut [u64],
) {
    let mut sums = vec![[0.0f64; 3]; clusters.len()];
    populations.fill(0);

    for ((point, &count), &cluster) in points.iter().zip(counts).zip(assignments) {
        populations[cluster] += count;
        let w = count as f64;
        for (sum, &coord) in sums[cluster].iter_mut().zip(point) {
            *sum += coord * w;
        }
    }

    for ((center, sum), &population) in clusters.iter_mut().zip(&sums).zip(populations.iter()) {
        *center = if population == 0 {
            [0.0; 3]
        } else {
            let w = population as f64;
            [sum[0] / w, sum[1] / w, sum[2] / w]
        };
    }
}

/// Refine starting colors into at most `max_colors` clusters.
///
/// `seeds` beyond the cluster budget are ignored. Centers only move between
/// rounds, never while points are being reassigned. Clusters that end up
/// empty are left out, and when two clusters convert to the same output color
/// only the first one is reported (its population is not merged with the
/// later one).
pub fn refine<P: PointProvider>(
    histogram: &PixelHistogram,
    seeds: &[u32],
    max_colors: u32,
    provider: &P,
    options: &RefineOptions,
) -> Result<QuantizeResult, QuantizeError> {
    if max_colors == 0 {
        return Err(QuantizeError::InvalidMaxColors(max_colors));
    }
    if options.max_iterations == 0 {
        return Err(QuantizeError::InvalidMaxIterations(options.max_iterations));
    }
    if histogram.is_empty() {
        return Err(QuantizeError::EmptyInput);
    }

    let points: Vec<ColorPoint> = histogram
        .colors()
        .iter()
        .map(|&argb| provider.to_point(argb))
        .collect();
    let counts = histogram.counts();
    let point_count = points.len();
    let cluster_count = (max_colors as usize).min(point_count);

    let mut clusters: Vec<ColorPoint> = seeds
        .iter()
        .take(cluster_count)
        .map(|&argb| provider.to_point(argb))
        .collect();
    let additional = cluster_count - clusters.len();
    if additional > 0 {
        let mut rng = StdRng::seed_from_u64(options.seed);
        clusters.extend(
            sample(&mut rng, point_count, additional)
                .into_iter()
                .map(|i| points[i]),
        );
    }

    let mut assignments: Vec<usize> = (0..point_count).map(|i| i % cluster_count).collect();
    let mut populations = vec![0u64; cluster_count];
    let mut neighbors: Vec<NeighborList> = vec![Vec::with_capacity(cluster_count); cluster_count];

    for iteration in 0..options.max_iterations {
        build_neighbors(&clusters, provider, &mut neighbors);
        let moved = reassign(&points, &clusters, &neighbors, &mut assignments, provider);
        tracing::trace!(iteration, moved, "refinement round");

        if moved == 0 && iteration > 0 {
            tracing::debug!(iteration, "refinement converged");
            break;
        }

        update_centers(&points, counts, &assignments, &mut clusters, &mut populations);
    }

    let cluster_argbs: Vec<u32> = clusters.iter().map(|&p| provider.to_argb(p)).collect();

    let mut colors = BTreeMap::new();
    for (&argb, &population) in cluster_argbs.iter().zip(&populations) {
        if population == 0 {
            continue;
        }
        colors.entry(argb).or_insert(population);
    }

    let input_to_cluster = options.map_pixels.then(|| {
        histogram
            .colors()
            .iter()
            .zip(&assignments)
            .map(|(&input, &cluster)| (input, cluster_argbs[cluster]))
            .collect()
    });

    Ok(QuantizeResult::new(colors, input_to_cluster))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::argb::{argb_from_rgb, rgb_from_argb};
    use crate::lab::LabPointProvider;
    use crate::point::distance_sq;

    /// Plain RGB coordinates, handy for hand-checkable centroids.
    struct RgbProvider;

    impl PointProvider for RgbProvider {
        fn to_point(&self, argb: u32) -> ColorPoint {
            rgb_from_argb(argb).map(|c| c as f64)
        }

        fn to_argb(&self, point: ColorPoint) -> u32 {
            let [r, g, b] = point.map(|c| c.round().clamp(0.0, 255.0) as u8);
            argb_from_rgb(r, g, b)
        }

        fn distance(&self, a: ColorPoint, b: ColorPoint) -> f64 {
            distance_sq(a, b)
        }
    }

    /// Maps every point to black on the way out.
    struct CollapsingProvider;

    impl PointProvider for CollapsingProvider {
        fn to_point(&self, argb: u32) -> ColorPoint {
            RgbProvider.to_point(argb)
        }

        fn to_argb(&self, _point: ColorPoint) -> u32 {
            0xFF000000
        }

        fn distance(&self, a: ColorPoint, b: ColorPoint) -> f64 {
            distance_sq(a, b)
        }
    }

    fn two_groups() -> PixelHistogram {
        PixelHistogram::from_counts([
            (0xFFFF0000, 20),
            (0xFFFA0505, 10),
            (0xFF0000FF, 25),
            (0xFF0505FA, 5),
        ])
    }

    #[test]
    fn seeded_two_groups() {
        let hist = two_groups();
        let result = refine(
            &hist,
            &[0xFFFF0000, 0xFF0000FF],
            2,
            &RgbProvider,
            &RefineOptions::default(),
        )
        .unwrap();
        assert_eq!(result.len(), 2);
        // Weighted means: red (20*255 + 10*250) / 30 ≈ 253.3, g/b = 50/30 ≈ 1.7
        assert_eq!(result.colors()[&argb_from_rgb(253, 2, 2)], 30);
        // Blue: (25*255 + 5*250) / 30 ≈ 254.2, r/g = 25/30 ≈ 0.8
        assert_eq!(result.colors()[&argb_from_rgb(1, 1, 254)], 30);
        assert_eq!(result.population(), 60);
    }

    #[test]
    fn sampled_seeds_are_deterministic() {
        let hist = two_groups();
        let options = RefineOptions::default();
        let a = refine(&hist, &[], 3, &LabPointProvider, &options).unwrap();
        let b = refine(&hist, &[], 3, &LabPointProvider, &options).unwrap();
        assert_eq!(a, b);
        assert!(a.len() <= 3);
    }

    #[test]
    fn cluster_count_capped_by_distinct_colors() {
        let hist = two_groups();
        let result = refine(&hist, &[], 64, &LabPointProvider, &RefineOptions::default()).unwrap();
        assert!(result.len() <= 4);
        assert_eq!(result.population(), 60);
    }

    #[test]
    fn empty_clusters_are_dropped() {
        let hist = two_groups();
        // Green attracts nothing once points settle.
        let result = refine(
            &hist,
            &[0xFFFF0000, 0xFF0000FF, 0xFF00FF00],
            3,
            &RgbProvider,
            &RefineOptions::default(),
        )
        .unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result.population(), 60);
    }

    #[test]
    fn duplicate_output_colors_keep_first_population() {
        let hist = two_groups();
        let result = refine(
            &hist,
            &[0xFFFF0000, 0xFF0000FF],
            2,
            &CollapsingProvider,
            &RefineOptions::default(),
        )
        .unwrap();
        assert_eq!(result.len(), 1);
        // Cluster 0 (red seed) wins; the blue cluster's 30 pixels are not added.
        assert_eq!(result.colors()[&0xFF000000], 30);
    }

    #[test]
    fn assignment_map_covers_every_input_color() {
        let hist = two_groups();
        let options = RefineOptions {
            map_pixels: true,
            ..RefineOptions::default()
        };
        let result = refine(&hist, &[0xFFFF0000, 0xFF0000FF], 2, &RgbProvider, &options).unwrap();
        let map = result.input_to_cluster().unwrap();
        assert_eq!(map.len(), hist.len());
        assert_eq!(map[&0xFFFA0505], argb_from_rgb(253, 2, 2));
        assert_eq!(map[&0xFF0505FA], argb_from_rgb(1, 1, 254));
        for cluster in map.values() {
            assert!(result.colors().contains_key(cluster));
        }
    }

    #[test]
    fn round_robin_start_is_corrected() {
        // Seeds in the "wrong" order relative to the round-robin start.
        let hist = PixelHistogram::from_counts([(0xFF000000, 4), (0xFFFFFFFF, 6)]);
        let result = refine(
            &hist,
            &[0xFFFFFFFF, 0xFF000000],
            2,
            &LabPointProvider,
            &RefineOptions::default(),
        )
        .unwrap();
        assert_eq!(result.colors()[&0xFF000000], 4);
        assert_eq!(result.colors()[&0xFFFFFFFF], 6);
    }

    #[test]
    fn single_iteration_still_reports() {
        let hist = two_groups();
        let options = RefineOptions {
            max_iterations: 1,
            ..RefineOptions::default()
        };
        let result = refine(&hist, &[0xFFFF0000, 0xFF0000FF], 2, &RgbProvider, &options).unwrap();
        assert_eq!(result.population(), 60);
    }

    #[test]
    fn rejects_bad_arguments() {
        let hist = two_groups();
        let options = RefineOptions::default();
        assert_eq!(
            refine(&hist, &[], 0, &LabPointProvider, &options),
            Err(QuantizeError::InvalidMaxColors(0))
        );
        assert_eq!(
            refine(&PixelHistogram::default(), &[], 4, &LabPointProvider, &options),
            Err(QuantizeError::EmptyInput)
        );
        let options = RefineOptions {
            max_iterations: 0,
            ..RefineOptions::default()
        };
        assert_eq!(
            refine(&hist, &[], 4, &LabPointProvider, &options),
            Err(QuantizeError::InvalidMaxIterations(0))
        );
    }

    fn nearest_distance<P: PointProvider>(
        point: ColorPoint,
        clusters: &[ColorPoint],
        provider: &P,
    ) -> f64 {
        clusters
            .iter()
            .map(|&c| provider.distance(point, c))
            .fold(f64::INFINITY, f64::min)
    }

    #[test]
    fn pruned_reassignment_matches_exhaustive_search() {
        let provider = LabPointProvider;
        let hist = PixelHistogram::from_counts((0..4000u32).map(|i| {
            let h = i.wrapping_mul(2654435761);
            (0xFF00_0000 | (h & 0x00FF_FFFF), i % 5 + 1)
        }));
        let points: Vec<ColorPoint> = hist.colors().iter().map(|&c| provider.to_point(c)).collect();
        let mut clusters: Vec<ColorPoint> =
            points.iter().step_by(points.len() / 42).take(42).copied().collect();
        assert_eq!(clusters.len(), 42);

        let mut assignments: Vec<usize> = (0..points.len()).map(|i| i % clusters.len()).collect();
        let mut populations = vec![0u64; clusters.len()];
        let mut neighbors = vec![Vec::new(); clusters.len()];

        for _ in 0..3 {
            build_neighbors(&clusters, &provider, &mut neighbors);
            reassign(&points, &clusters, &neighbors, &mut assignments, &provider);
            for (point, &cluster) in points.iter().zip(&assignments) {
                assert_eq!(
                    provider.distance(*point, clusters[cluster]),
                    nearest_distance(*point, &clusters, &provider)
                );
            }
            update_centers(&points, hist.counts(), &assignments, &mut clusters, &mut populations);
        }
    }

    #[test]
    fn neighbor_lists_sorted_with_self_first() {
        let clusters = [[0.0, 0.0, 0.0], [10.0, 0.0, 0.0], [1.0, 0.0, 0.0]];
        let mut neighbors = vec![Vec::new(); 3];
        build_neighbors(&clusters, &RgbProvider, &mut neighbors);
        assert_eq!(neighbors[0], vec![(0.0, 0), (1.0, 2), (100.0, 1)]);
        assert_eq!(neighbors[1], vec![(0.0, 1), (81.0, 2), (100.0, 0)]);
    }
}
