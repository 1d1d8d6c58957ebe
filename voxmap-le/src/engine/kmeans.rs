//! K-means engine
//!
//! Fine clustering of voters in reduced (PCA) space. K comes from a small
//! configured menu scaled to the voter count; initialization is k-means++
//! from an `StdRng` seeded off the poll id so repeated runs on unchanged
//! data assign the same clusters. Silhouette over the fine assignment is the
//! second soft quality signal.

use crate::error::{EngineError, EngineResult};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const MAX_ITERATIONS: usize = 100;

/// Fine clustering output
#[derive(Debug, Clone)]
pub struct KMeansResult {
    /// Cluster centroids, k x dims
    pub centroids: Vec<Vec<f64>>,
    /// Cluster index per input point
    pub assignments: Vec<usize>,
    /// K actually used
    pub k: usize,
    /// Mean silhouette score over all points, in [-1, 1]
    pub silhouette: f64,
}

/// Pick K from the candidate menu, scaled to the voter count
///
/// Largest menu value with at least 3 voters per cluster; small polls fall
/// back to voters/3, floored at 2.
pub fn select_k(voter_count: usize, menu: &[usize]) -> usize {
    menu.iter()
        .copied()
        .filter(|k| k * 3 <= voter_count)
        .max()
        .unwrap_or_else(|| (voter_count / 3).max(2))
}

/// Run k-means on the reduced coordinates
pub fn run_kmeans(points: &[Vec<f64>], k: usize, seed: u64) -> EngineResult<KMeansResult> {
    if points.is_empty() {
        return Err(EngineError::Numerical("k-means on empty input".to_string()));
    }
    let k = k.min(points.len()).max(1);
    let dims = points[0].len();

    let mut rng = StdRng::seed_from_u64(seed);
    let mut centroids = plus_plus_init(points, k, &mut rng);
    let mut assignments = vec![0usize; points.len()];

    for _ in 0..MAX_ITERATIONS {
        // Assignment step
        let mut changed = false;
        for (i, point) in points.iter().enumerate() {
            let nearest = nearest_centroid(point, &centroids);
            if assignments[i] != nearest {
                assignments[i] = nearest;
                changed = true;
            }
        }

        // Update step
        let mut sums = vec![vec![0.0f64; dims]; k];
        let mut counts = vec![0usize; k];
        for (point, &cluster) in points.iter().zip(assignments.iter()) {
            counts[cluster] += 1;
            for d in 0..dims {
                sums[cluster][d] += point[d];
            }
        }
        for cluster in 0..k {
            if counts[cluster] == 0 {
                // Empty cluster: reseed from the point farthest from its centroid
                let mut farthest = 0usize;
                let mut farthest_dist = -1.0f64;
                for (i, point) in points.iter().enumerate() {
                    let d = squared_distance(point, &centroids[assignments[i]]);
                    if d > farthest_dist {
                        farthest_dist = d;
                        farthest = i;
                    }
                }
                centroids[cluster] = points[farthest].clone();
                changed = true;
            } else {
                for d in 0..dims {
                    centroids[cluster][d] = sums[cluster][d] / counts[cluster] as f64;
                }
            }
        }

        if !changed {
            break;
        }
    }

    for centroid in &centroids {
        if centroid.iter().any(|c| !c.is_finite()) {
            return Err(EngineError::Numerical(format!(
                "NaN centroid (k={}, n={})",
                k,
                points.len()
            )));
        }
    }

    let silhouette = silhouette_score(points, &assignments, k);

    Ok(KMeansResult {
        centroids,
        assignments,
        k,
        silhouette,
    })
}

/// k-means++ initialization: spread starting centroids proportionally to
/// squared distance from the nearest already-chosen one
fn plus_plus_init(points: &[Vec<f64>], k: usize, rng: &mut StdRng) -> Vec<Vec<f64>> {
    let mut centroids = Vec::with_capacity(k);
    centroids.push(points[rng.gen_range(0..points.len())].clone());

    while centroids.len() < k {
        let distances: Vec<f64> = points
            .iter()
            .map(|p| {
                centroids
                    .iter()
                    .map(|c| squared_distance(p, c))
                    .fold(f64::INFINITY, f64::min)
            })
            .collect();
        let total: f64 = distances.iter().sum();
        if total <= 0.0 {
            // All points coincide with existing centroids; duplicate one
            centroids.push(points[rng.gen_range(0..points.len())].clone());
            continue;
        }

        let mut draw = rng.gen::<f64>() * total;
        let mut chosen = points.len() - 1;
        for (i, d) in distances.iter().enumerate() {
            draw -= d;
            if draw <= 0.0 {
                chosen = i;
                break;
            }
        }
        centroids.push(points[chosen].clone());
    }

    centroids
}

fn nearest_centroid(point: &[f64], centroids: &[Vec<f64>]) -> usize {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (i, c) in centroids.iter().enumerate() {
        let d = squared_distance(point, c);
        if d < best_dist {
            best_dist = d;
            best = i;
        }
    }
    best
}

pub(crate) fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Mean silhouette over all points; single-cluster results score 0
///
/// O(n^2), acceptable at the voter counts this engine sees per poll.
fn silhouette_score(points: &[Vec<f64>], assignments: &[usize], k: usize) -> f64 {
    let n = points.len();
    if n < 2 || k < 2 {
        return 0.0;
    }

    let mut cluster_sizes = vec![0usize; k];
    for &a in assignments {
        cluster_sizes[a] += 1;
    }

    let mut total = 0.0f64;
    let mut counted = 0usize;
    for i in 0..n {
        let own = assignments[i];
        if cluster_sizes[own] < 2 {
            // Singleton clusters contribute 0 by convention
            counted += 1;
            continue;
        }

        // Mean distance to own cluster (a) and nearest other cluster (b)
        let mut intra = 0.0f64;
        let mut inter = vec![0.0f64; k];
        let mut inter_counts = vec![0usize; k];
        for j in 0..n {
            if i == j {
                continue;
            }
            let d = squared_distance(&points[i], &points[j]).sqrt();
            if assignments[j] == own {
                intra += d;
            } else {
                inter[assignments[j]] += d;
                inter_counts[assignments[j]] += 1;
            }
        }
        let a = intra / (cluster_sizes[own] - 1) as f64;
        let b = (0..k)
            .filter(|&c| c != own && inter_counts[c] > 0)
            .map(|c| inter[c] / inter_counts[c] as f64)
            .fold(f64::INFINITY, f64::min);

        if b.is_finite() {
            let denom = a.max(b);
            if denom > 0.0 {
                total += (b - a) / denom;
            }
            counted += 1;
        } else {
            counted += 1;
        }
    }

    if counted == 0 {
        0.0
    } else {
        (total / counted as f64).clamp(-1.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_blobs() -> Vec<Vec<f64>> {
        let mut points = Vec::new();
        for i in 0..10 {
            points.push(vec![10.0 + (i % 3) as f64 * 0.1, 10.0 + (i % 2) as f64 * 0.1]);
            points.push(vec![-10.0 - (i % 3) as f64 * 0.1, -10.0 - (i % 2) as f64 * 0.1]);
        }
        points
    }

    #[test]
    fn tc_u_kmeans_separates_two_blobs() {
        let points = two_blobs();
        let result = run_kmeans(&points, 2, 42).unwrap();

        // All even-indexed points (first blob) share one cluster, odd the other
        let first = result.assignments[0];
        let second = result.assignments[1];
        assert_ne!(first, second);
        for (i, &a) in result.assignments.iter().enumerate() {
            if i % 2 == 0 {
                assert_eq!(a, first);
            } else {
                assert_eq!(a, second);
            }
        }
        // Well-separated blobs score high
        assert!(result.silhouette > 0.8, "silhouette {}", result.silhouette);
    }

    #[test]
    fn tc_u_kmeans_deterministic_under_fixed_seed() {
        let points = two_blobs();
        let a = run_kmeans(&points, 4, 7).unwrap();
        let b = run_kmeans(&points, 4, 7).unwrap();
        assert_eq!(a.assignments, b.assignments);
        assert_eq!(a.centroids, b.centroids);
    }

    #[test]
    fn tc_u_kmeans_silhouette_bounds() {
        let points = two_blobs();
        for k in [2, 3, 5] {
            let result = run_kmeans(&points, k, 1).unwrap();
            assert!((-1.0..=1.0).contains(&result.silhouette));
        }
    }

    #[test]
    fn tc_u_kmeans_k_capped_at_point_count() {
        let points = vec![vec![0.0, 0.0], vec![1.0, 1.0], vec![2.0, 2.0]];
        let result = run_kmeans(&points, 10, 3).unwrap();
        assert!(result.k <= 3);
        assert_eq!(result.assignments.len(), 3);
    }

    #[test]
    fn tc_u_kmeans_identical_points_do_not_crash() {
        let points = vec![vec![1.0, 1.0]; 8];
        let result = run_kmeans(&points, 3, 9).unwrap();
        assert_eq!(result.assignments.len(), 8);
        for c in &result.centroids {
            assert!(c.iter().all(|x| x.is_finite()));
        }
    }

    #[test]
    fn select_k_scales_with_voter_count() {
        let menu = vec![20, 50, 100];
        assert_eq!(select_k(20, &menu), 6); // fallback: 20/3
        assert_eq!(select_k(60, &menu), 20);
        assert_eq!(select_k(200, &menu), 50);
        assert_eq!(select_k(400, &menu), 100);
        assert_eq!(select_k(7, &menu), 2);
    }
}
