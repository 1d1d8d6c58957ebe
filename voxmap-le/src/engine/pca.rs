//! PCA engine
//!
//! Projects the opinion matrix onto its top principal components (at least
//! two). Missing cells are imputed with the column mean computed over present
//! values only; after centering, an imputed cell is exactly zero, so it
//! contributes nothing to the covariance. A column with no observed votes
//! gets mean 0.0 and zero variance. Components come from power iteration
//! with deflation on the covariance matrix, started from a fixed-seed vector
//! so repeated runs on the same data produce the same basis.

use crate::engine::matrix::OpinionMatrix;
use crate::error::{EngineError, EngineResult};

const POWER_ITERATIONS: usize = 300;
const CONVERGENCE_EPS: f64 = 1e-10;

/// PCA decomposition output
#[derive(Debug, Clone)]
pub struct PcaResult {
    /// Component vectors (component-major, each of statement-count length)
    pub components: Vec<Vec<f64>>,
    /// Column means over present values (imputation + centering vector)
    pub mean: Vec<f64>,
    /// Per-component fraction of total variance, each in [0, 1]
    pub variance_explained: Vec<f64>,
    /// Voter coordinates in reduced space, aligned with matrix rows
    pub coordinates: Vec<Vec<f64>>,
}

impl PcaResult {
    /// Variance captured by the first two components (quality gate signal)
    pub fn total_variance_first_two(&self) -> f64 {
        self.variance_explained.iter().take(2).sum::<f64>().min(1.0)
    }
}

/// Compute the top `n_components` principal components of the matrix
pub fn compute_pca(matrix: &OpinionMatrix, n_components: usize) -> EngineResult<PcaResult> {
    let n = matrix.voter_count();
    let m = matrix.statement_count();
    if n == 0 || m == 0 {
        return Err(EngineError::Numerical(format!(
            "Empty matrix: {} voters x {} statements",
            n, m
        )));
    }
    let n_components = n_components.max(2).min(m);

    // Column means over present values only; empty column -> 0.0
    let mut mean = vec![0.0f64; m];
    for col in 0..m {
        let mut sum = 0.0;
        let mut count = 0usize;
        for row in &matrix.rows {
            if let Some(v) = row[col] {
                sum += v;
                count += 1;
            }
        }
        if count > 0 {
            mean[col] = sum / count as f64;
        }
    }

    // Center and impute: a missing cell becomes the column mean, which is
    // zero after centering
    let centered: Vec<Vec<f64>> = matrix
        .rows
        .iter()
        .map(|row| {
            row.iter()
                .enumerate()
                .map(|(col, cell)| match cell {
                    Some(v) => v - mean[col],
                    None => 0.0,
                })
                .collect()
        })
        .collect();

    // Covariance matrix, divisor N-1 (N=1 degenerates to all-zero)
    let divisor = if n > 1 { (n - 1) as f64 } else { 1.0 };
    let mut cov = vec![vec![0.0f64; m]; m];
    for row in &centered {
        for i in 0..m {
            if row[i] == 0.0 {
                continue;
            }
            for j in i..m {
                cov[i][j] += row[i] * row[j];
            }
        }
    }
    for i in 0..m {
        for j in i..m {
            cov[i][j] /= divisor;
            cov[j][i] = cov[i][j];
        }
    }

    let total_variance: f64 = (0..m).map(|i| cov[i][i]).sum();

    // Power iteration with deflation for the leading eigenpairs
    let mut components = Vec::with_capacity(n_components);
    let mut eigenvalues = Vec::with_capacity(n_components);
    let mut deflated = cov;

    for comp_idx in 0..n_components {
        let (eigenvector, eigenvalue) = power_iteration(&deflated, comp_idx)?;

        // Deflate: remove the found component's contribution
        for i in 0..m {
            for j in 0..m {
                deflated[i][j] -= eigenvalue * eigenvector[i] * eigenvector[j];
            }
        }

        components.push(eigenvector);
        eigenvalues.push(eigenvalue.max(0.0));
    }

    let variance_explained: Vec<f64> = eigenvalues
        .iter()
        .map(|ev| {
            if total_variance > 0.0 {
                (ev / total_variance).clamp(0.0, 1.0)
            } else {
                0.0
            }
        })
        .collect();

    // Project voters onto the basis
    let coordinates: Vec<Vec<f64>> = centered
        .iter()
        .map(|row| {
            components
                .iter()
                .map(|comp| row.iter().zip(comp.iter()).map(|(a, b)| a * b).sum())
                .collect()
        })
        .collect();

    for coords in &coordinates {
        if coords.iter().any(|c: &f64| !c.is_finite()) {
            return Err(EngineError::Numerical(format!(
                "Non-finite PCA coordinate ({}x{} matrix)",
                n, m
            )));
        }
    }

    Ok(PcaResult {
        components,
        mean,
        variance_explained,
        coordinates,
    })
}

/// Leading eigenpair of a symmetric matrix by power iteration
///
/// The start vector is deterministic (unit vector rotated by component
/// index) so the decomposition is reproducible run to run. A zero matrix
/// (no variance left) returns a zero eigenvalue with an arbitrary unit
/// vector rather than failing, per the degenerate-input contract.
fn power_iteration(matrix: &[Vec<f64>], component_index: usize) -> EngineResult<(Vec<f64>, f64)> {
    let m = matrix.len();
    let mut v: Vec<f64> = (0..m)
        .map(|i| if i == component_index % m { 1.0 } else { 1e-4 })
        .collect();
    normalize(&mut v);

    let mut eigenvalue = 0.0f64;
    for _ in 0..POWER_ITERATIONS {
        let mut next = vec![0.0f64; m];
        for i in 0..m {
            for j in 0..m {
                next[i] += matrix[i][j] * v[j];
            }
        }

        let norm = next.iter().map(|x| x * x).sum::<f64>().sqrt();
        if norm < CONVERGENCE_EPS {
            // Zero-variance space: legitimate degenerate case
            return Ok((v, 0.0));
        }
        for x in next.iter_mut() {
            *x /= norm;
        }

        let new_eigenvalue = rayleigh_quotient(matrix, &next);
        if !new_eigenvalue.is_finite() {
            return Err(EngineError::Numerical(
                "Power iteration produced non-finite eigenvalue".to_string(),
            ));
        }
        let converged = (new_eigenvalue - eigenvalue).abs() < CONVERGENCE_EPS;
        eigenvalue = new_eigenvalue;
        v = next;
        if converged {
            break;
        }
    }

    Ok((v, eigenvalue))
}

fn rayleigh_quotient(matrix: &[Vec<f64>], v: &[f64]) -> f64 {
    let m = matrix.len();
    let mut mv = vec![0.0f64; m];
    for i in 0..m {
        for j in 0..m {
            mv[i] += matrix[i][j] * v[j];
        }
    }
    v.iter().zip(mv.iter()).map(|(a, b)| a * b).sum()
}

fn normalize(v: &mut [f64]) {
    let norm = v.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::statements::ApprovedStatement;
    use crate::db::votes::Vote;
    use crate::engine::matrix::OpinionMatrix;
    use chrono::Utc;
    use uuid::Uuid;

    fn build_matrix(rows: &[&[Option<f64>]]) -> OpinionMatrix {
        let statements: Vec<ApprovedStatement> = (0..rows[0].len())
            .map(|i| ApprovedStatement {
                id: Uuid::from_u128(i as u128 + 1),
                created_at: Utc::now(),
            })
            .collect();

        let mut votes = Vec::new();
        for (voter, row) in rows.iter().enumerate() {
            for (col, cell) in row.iter().enumerate() {
                if let Some(v) = cell {
                    votes.push(Vote {
                        voter_id: Uuid::from_u128(1000 + voter as u128),
                        statement_id: statements[col].id,
                        value: *v as i32,
                    });
                }
            }
        }
        OpinionMatrix::build(&statements, &votes)
    }

    #[test]
    fn tc_u_pca_mean_over_present_values_only() {
        // Column 0: values 1, -1, missing -> mean 0; column 1: 1, 1, missing -> mean 1
        let matrix = build_matrix(&[
            &[Some(1.0), Some(1.0)],
            &[Some(-1.0), Some(1.0)],
            &[None, None],
        ]);
        let pca = compute_pca(&matrix, 2).unwrap();
        assert!((pca.mean[0] - 0.0).abs() < 1e-12);
        assert!((pca.mean[1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn tc_u_pca_variance_explained_in_unit_interval() {
        let matrix = build_matrix(&[
            &[Some(1.0), Some(1.0), Some(-1.0)],
            &[Some(1.0), Some(-1.0), Some(-1.0)],
            &[Some(-1.0), Some(1.0), Some(1.0)],
            &[Some(-1.0), Some(-1.0), Some(1.0)],
        ]);
        let pca = compute_pca(&matrix, 2).unwrap();
        for ve in &pca.variance_explained {
            assert!((0.0..=1.0).contains(ve), "variance explained {}", ve);
        }
        assert!(pca.total_variance_first_two() <= 1.0);
    }

    #[test]
    fn tc_u_pca_first_component_captures_dominant_axis() {
        // Two blocs answering the first two statements in lockstep
        let matrix = build_matrix(&[
            &[Some(1.0), Some(1.0), Some(1.0)],
            &[Some(1.0), Some(1.0), Some(-1.0)],
            &[Some(-1.0), Some(-1.0), Some(1.0)],
            &[Some(-1.0), Some(-1.0), Some(-1.0)],
        ]);
        let pca = compute_pca(&matrix, 2).unwrap();
        // First component should separate the blocs on its first coordinate
        let bloc_a = pca.coordinates[0][0];
        let bloc_b = pca.coordinates[2][0];
        assert!(
            (bloc_a - bloc_b).abs() > 1.0,
            "blocs not separated: {} vs {}",
            bloc_a,
            bloc_b
        );
        assert!(pca.variance_explained[0] > pca.variance_explained[1]);
    }

    #[test]
    fn tc_u_pca_empty_column_does_not_crash() {
        // Third statement has no observed votes at all
        let matrix = build_matrix(&[
            &[Some(1.0), Some(-1.0), None],
            &[Some(-1.0), Some(1.0), None],
            &[Some(1.0), Some(1.0), None],
        ]);
        let pca = compute_pca(&matrix, 2).unwrap();
        assert_eq!(pca.mean[2], 0.0);
        for coords in &pca.coordinates {
            assert!(coords.iter().all(|c| c.is_finite()));
        }
    }

    #[test]
    fn tc_u_pca_zero_variance_matrix_yields_zero_coordinates() {
        // Everyone votes identically: no variance anywhere
        let matrix = build_matrix(&[
            &[Some(1.0), Some(1.0)],
            &[Some(1.0), Some(1.0)],
            &[Some(1.0), Some(1.0)],
        ]);
        let pca = compute_pca(&matrix, 2).unwrap();
        for coords in &pca.coordinates {
            for c in coords {
                assert!(c.abs() < 1e-9);
            }
        }
        assert_eq!(pca.total_variance_first_two(), 0.0);
    }

    #[test]
    fn tc_u_pca_deterministic_across_runs() {
        let matrix = build_matrix(&[
            &[Some(1.0), Some(-1.0), Some(1.0)],
            &[Some(-1.0), Some(1.0), None],
            &[Some(1.0), None, Some(-1.0)],
            &[Some(-1.0), Some(-1.0), Some(1.0)],
        ]);
        let a = compute_pca(&matrix, 2).unwrap();
        let b = compute_pca(&matrix, 2).unwrap();
        assert_eq!(a.coordinates, b.coordinates);
        assert_eq!(a.variance_explained, b.variance_explained);
    }
}
