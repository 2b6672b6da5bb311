// ============================================
// Truncated SVD (seeded orthogonal iteration)
// ============================================
//
// Iterates V <- orthonormalize(A^T A V) from a seeded random start until
// the singular value estimates settle, then recovers sigma and U from
// A V. Deterministic for a given matrix and seed, which keeps retrains
// on identical interactions reproducible.

use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const MAX_ITERATIONS: usize = 200;
const TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone)]
pub struct TruncatedSvd {
    /// Left singular vectors, one column per factor (n_rows x k).
    pub u: Array2<f64>,
    /// Singular values, strongest first.
    pub sigma: Array1<f64>,
    /// Right singular vectors, one row per matrix column (n_cols x k).
    pub v: Array2<f64>,
}

pub fn truncated_svd(matrix: &Array2<f64>, rank: usize, seed: u64) -> TruncatedSvd {
    let (n_rows, n_cols) = matrix.dim();
    let k = rank.min(n_rows).min(n_cols);
    if k == 0 {
        return TruncatedSvd {
            u: Array2::zeros((n_rows, 0)),
            sigma: Array1::zeros(0),
            v: Array2::zeros((n_cols, 0)),
        };
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut v = Array2::from_shape_fn((n_cols, k), |_| rng.gen::<f64>() - 0.5);
    orthonormalize_columns(&mut v);

    let mut estimates = Array1::<f64>::zeros(k);
    for iteration in 0..MAX_ITERATIONS {
        let projected = matrix.dot(&v);
        let mut next = matrix.t().dot(&projected);

        // before orthonormalization the j-th column norm approximates
        // sigma_j^2, which doubles as the convergence signal
        let mut current = Array1::<f64>::zeros(k);
        for j in 0..k {
            let squared: f64 = (0..n_cols).map(|i| next[[i, j]] * next[[i, j]]).sum();
            current[j] = squared.sqrt();
        }

        orthonormalize_columns(&mut next);
        v = next;

        let drift = estimates
            .iter()
            .zip(current.iter())
            .map(|(previous, latest)| (previous - latest).abs())
            .fold(0.0, f64::max);
        estimates = current;
        if iteration > 0 && drift < TOLERANCE {
            break;
        }
    }

    // recover sigma and U from the converged subspace
    let projected = matrix.dot(&v);
    let mut u = Array2::zeros((n_rows, k));
    let mut sigma = Array1::zeros(k);
    for j in 0..k {
        let norm: f64 = (0..n_rows)
            .map(|i| projected[[i, j]] * projected[[i, j]])
            .sum::<f64>()
            .sqrt();
        sigma[j] = norm;
        if norm > f64::EPSILON {
            for i in 0..n_rows {
                u[[i, j]] = projected[[i, j]] / norm;
            }
        }
    }

    sort_by_singular_value(&mut u, &mut sigma, &mut v);
    fix_signs(&mut u, &mut v);

    TruncatedSvd { u, sigma, v }
}

/// Modified Gram-Schmidt over columns. Columns that collapse below
/// machine precision (rank-deficient input) are zeroed rather than
/// renormalized, and their singular values come out as zero.
fn orthonormalize_columns(matrix: &mut Array2<f64>) {
    let (rows, cols) = matrix.dim();
    for j in 0..cols {
        for prior in 0..j {
            let dot: f64 = (0..rows).map(|i| matrix[[i, j]] * matrix[[i, prior]]).sum();
            for i in 0..rows {
                matrix[[i, j]] -= dot * matrix[[i, prior]];
            }
        }
        let norm: f64 = (0..rows)
            .map(|i| matrix[[i, j]] * matrix[[i, j]])
            .sum::<f64>()
            .sqrt();
        if norm > f64::EPSILON {
            for i in 0..rows {
                matrix[[i, j]] /= norm;
            }
        } else {
            for i in 0..rows {
                matrix[[i, j]] = 0.0;
            }
        }
    }
}

fn sort_by_singular_value(u: &mut Array2<f64>, sigma: &mut Array1<f64>, v: &mut Array2<f64>) {
    let k = sigma.len();
    let mut order: Vec<usize> = (0..k).collect();
    order.sort_by(|&a, &b| {
        sigma[b]
            .partial_cmp(&sigma[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let u_sorted = reorder_columns(u, &order);
    let v_sorted = reorder_columns(v, &order);
    let sigma_sorted = Array1::from_iter(order.iter().map(|&j| sigma[j]));
    *u = u_sorted;
    *v = v_sorted;
    *sigma = sigma_sorted;
}

fn reorder_columns(matrix: &Array2<f64>, order: &[usize]) -> Array2<f64> {
    let (rows, _) = matrix.dim();
    let mut reordered = Array2::zeros((rows, order.len()));
    for (target, &source) in order.iter().enumerate() {
        for i in 0..rows {
            reordered[[i, target]] = matrix[[i, source]];
        }
    }
    reordered
}

/// Flip each factor so the largest-magnitude component of its right
/// singular vector is positive. Removes the sign ambiguity of the
/// decomposition without changing the reconstruction.
fn fix_signs(u: &mut Array2<f64>, v: &mut Array2<f64>) {
    let (v_rows, cols) = v.dim();
    let (u_rows, _) = u.dim();
    for j in 0..cols {
        let mut pivot = 0usize;
        let mut magnitude = 0.0;
        for i in 0..v_rows {
            if v[[i, j]].abs() > magnitude {
                magnitude = v[[i, j]].abs();
                pivot = i;
            }
        }
        if v[[pivot, j]] < 0.0 {
            for i in 0..v_rows {
                v[[i, j]] = -v[[i, j]];
            }
            for i in 0..u_rows {
                u[[i, j]] = -u[[i, j]];
            }
        }
    }
}
