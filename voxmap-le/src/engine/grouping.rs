//! Coarse grouping
//!
//! Hierarchically merges fine k-means clusters into at most a handful of
//! human-legible opinion groups by agglomerating nearest centroids in the
//! reduced space. Fine clusters are too numerous to label for end users; a
//! single coarse k-means pass would destroy the within-cluster nuance the
//! bridge detector needs, hence the two-level design.

use crate::engine::kmeans::{squared_distance, KMeansResult};
use crate::models::CoarseGroup;

/// Assignment of voters to coarse groups, plus the group records
#[derive(Debug, Clone)]
pub struct CoarseResult {
    pub groups: Vec<CoarseGroup>,
    /// Coarse group id per voter, aligned with the k-means input order
    pub assignments: Vec<usize>,
}

/// Merge fine clusters down to at most `target` coarse groups
pub fn coarse_group(fine: &KMeansResult, target: usize) -> CoarseResult {
    let target = target.max(1);

    // Voter count per fine cluster (weights for centroid merging)
    let mut fine_counts = vec![0usize; fine.k];
    for &a in &fine.assignments {
        fine_counts[a] += 1;
    }

    // Working set: one proto-group per non-empty fine cluster
    struct Proto {
        centroid: Vec<f64>,
        fine_ids: Vec<usize>,
        voter_count: usize,
    }
    let mut protos: Vec<Proto> = (0..fine.k)
        .filter(|&i| fine_counts[i] > 0)
        .map(|i| Proto {
            centroid: fine.centroids[i].clone(),
            fine_ids: vec![i],
            voter_count: fine_counts[i],
        })
        .collect();

    // Agglomerate nearest pair until the target count is reached
    while protos.len() > target {
        let mut best = (0usize, 1usize);
        let mut best_dist = f64::INFINITY;
        for i in 0..protos.len() {
            for j in (i + 1)..protos.len() {
                let d = squared_distance(&protos[i].centroid, &protos[j].centroid);
                if d < best_dist {
                    best_dist = d;
                    best = (i, j);
                }
            }
        }

        let (i, j) = best;
        // i < j, so swap_remove(j) never moves the keeper at i
        let absorbed = protos.swap_remove(j);
        let keeper = &mut protos[i];
        let total = keeper.voter_count + absorbed.voter_count;
        for (d, c) in keeper.centroid.iter_mut().enumerate() {
            *c = (*c * keeper.voter_count as f64
                + absorbed.centroid[d] * absorbed.voter_count as f64)
                / total as f64;
        }
        keeper.voter_count = total;
        keeper.fine_ids.extend(absorbed.fine_ids);
    }

    // Stable group ids: order by voter count descending so "Group A" is the
    // largest, then assign labels
    protos.sort_by(|a, b| b.voter_count.cmp(&a.voter_count));

    let groups: Vec<CoarseGroup> = protos
        .iter()
        .enumerate()
        .map(|(id, p)| CoarseGroup {
            id,
            label: group_label(id),
            centroid: p.centroid.clone(),
            fine_cluster_ids: {
                let mut ids = p.fine_ids.clone();
                ids.sort_unstable();
                ids
            },
            voter_count: p.voter_count,
        })
        .collect();

    // Map fine cluster -> coarse group id
    let mut fine_to_coarse = vec![0usize; fine.k];
    for group in &groups {
        for &fid in &group.fine_cluster_ids {
            fine_to_coarse[fid] = group.id;
        }
    }

    let assignments = fine
        .assignments
        .iter()
        .map(|&fine_id| fine_to_coarse[fine_id])
        .collect();

    CoarseResult {
        groups,
        assignments,
    }
}

/// "Group A" through "Group Z", then numeric
fn group_label(id: usize) -> String {
    if id < 26 {
        format!("Group {}", (b'A' + id as u8) as char)
    } else {
        format!("Group {}", id + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::kmeans::run_kmeans;

    fn clustered_points() -> Vec<Vec<f64>> {
        let mut points = Vec::new();
        // Three separated blobs of unequal size
        for i in 0..12 {
            points.push(vec![10.0 + (i % 4) as f64 * 0.1, 10.0]);
        }
        for i in 0..8 {
            points.push(vec![-10.0, -10.0 - (i % 3) as f64 * 0.1]);
        }
        for i in 0..4 {
            points.push(vec![10.0, -10.0 + (i % 2) as f64 * 0.1]);
        }
        points
    }

    #[test]
    fn tc_u_coarse_merges_to_target() {
        let points = clustered_points();
        let fine = run_kmeans(&points, 8, 11).unwrap();
        let coarse = coarse_group(&fine, 3);

        assert!(coarse.groups.len() <= 3);
        assert_eq!(coarse.assignments.len(), points.len());
        // Every assignment references a group id present in the list
        for &a in &coarse.assignments {
            assert!(coarse.groups.iter().any(|g| g.id == a));
        }
    }

    #[test]
    fn tc_u_coarse_voter_counts_sum_to_total() {
        let points = clustered_points();
        let fine = run_kmeans(&points, 6, 5).unwrap();
        let coarse = coarse_group(&fine, 3);

        let total: usize = coarse.groups.iter().map(|g| g.voter_count).sum();
        assert_eq!(total, points.len());
    }

    #[test]
    fn tc_u_coarse_retains_fine_cluster_ids() {
        let points = clustered_points();
        let fine = run_kmeans(&points, 6, 5).unwrap();
        let coarse = coarse_group(&fine, 2);

        // Every non-empty fine cluster appears in exactly one coarse group
        let mut seen = std::collections::HashSet::new();
        for group in &coarse.groups {
            for &fid in &group.fine_cluster_ids {
                assert!(seen.insert(fid), "fine cluster {} in two groups", fid);
            }
        }
    }

    #[test]
    fn tc_u_coarse_largest_group_is_group_a() {
        let points = clustered_points();
        let fine = run_kmeans(&points, 8, 11).unwrap();
        let coarse = coarse_group(&fine, 3);

        assert_eq!(coarse.groups[0].label, "Group A");
        for pair in coarse.groups.windows(2) {
            assert!(pair[0].voter_count >= pair[1].voter_count);
        }
    }

    #[test]
    fn tc_u_coarse_fewer_fine_than_target_passes_through() {
        let points = vec![vec![0.0, 0.0], vec![10.0, 10.0], vec![0.1, 0.1], vec![10.1, 10.1]];
        let fine = run_kmeans(&points, 2, 1).unwrap();
        let coarse = coarse_group(&fine, 5);
        assert_eq!(coarse.groups.len(), 2);
    }
}
