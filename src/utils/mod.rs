//! # Utilities
//!
//! Shared helpers for Cholesky-based solves, summary statistics, and
//! working with faer matrices.

use faer::Mat;

const INITIAL_JITTER: f64 = 1.0e-10;
const JITTER_ATTEMPTS: usize = 8;

#[must_use]
pub fn usize_to_f64(value: usize) -> f64 {
    f64::from(u32::try_from(value).unwrap_or(u32::MAX))
}

#[must_use]
pub fn matrix_is_finite(matrix: &Mat<f64>) -> bool {
    for i in 0..matrix.nrows() {
        for j in 0..matrix.ncols() {
            if !matrix[(i, j)].is_finite() {
                return false;
            }
        }
    }
    true
}

/// Lower Cholesky factor of a symmetric positive-definite matrix.
#[must_use]
pub fn cholesky_lower(matrix: &Mat<f64>) -> Option<Mat<f64>> {
    let dim = matrix.ncols();
    if matrix.nrows() != dim {
        return None;
    }
    let mut lower = Mat::<f64>::zeros(dim, dim);
    for row in 0..dim {
        for col in 0..=row {
            let mut sum = matrix[(row, col)];
            for k in 0..col {
                sum -= lower[(row, k)] * lower[(col, k)];
            }
            if row == col {
                if !(sum > 0.0 && sum.is_finite()) {
                    return None;
                }
                lower[(row, col)] = sum.sqrt();
            } else {
                lower[(row, col)] = sum / lower[(col, col)];
            }
        }
    }
    Some(lower)
}

/// Cholesky factor with escalating diagonal jitter for near-singular input.
///
/// The jitter is scaled by the mean diagonal entry so that it stays
/// negligible relative to the matrix.
#[must_use]
pub fn cholesky_with_jitter(matrix: &Mat<f64>) -> Option<Mat<f64>> {
    if let Some(lower) = cholesky_lower(matrix) {
        return Some(lower);
    }
    let dim = matrix.ncols();
    let mean_diagonal = if dim == 0 {
        1.0
    } else {
        ((0..dim).map(|idx| matrix[(idx, idx)].abs()).sum::<f64>() / usize_to_f64(dim)).max(1.0)
    };
    let mut jitter = INITIAL_JITTER * mean_diagonal;
    for _ in 0..JITTER_ATTEMPTS {
        let regularized = Mat::from_fn(dim, dim, |row, col| {
            if row == col {
                matrix[(row, col)] + jitter
            } else {
                matrix[(row, col)]
            }
        });
        if let Some(lower) = cholesky_lower(&regularized) {
            return Some(lower);
        }
        jitter *= 100.0;
    }
    None
}

/// `log|A|` from the lower Cholesky factor of `A`.
#[must_use]
pub fn log_determinant_from_cholesky(lower: &Mat<f64>) -> f64 {
    2.0 * (0..lower.nrows())
        .map(|idx| lower[(idx, idx)].ln())
        .sum::<f64>()
}

/// Solve `A x = b` given the lower Cholesky factor of `A`.
#[must_use]
pub fn cholesky_solve(lower: &Mat<f64>, rhs: &[f64]) -> Vec<f64> {
    let dim = lower.nrows();
    let mut forward = vec![0.0; dim];
    for row in 0..dim {
        let mut sum = rhs[row];
        for col in 0..row {
            sum -= lower[(row, col)] * forward[col];
        }
        forward[row] = sum / lower[(row, row)];
    }

    let mut solution = vec![0.0; dim];
    for row in (0..dim).rev() {
        let mut sum = forward[row];
        for col in (row + 1)..dim {
            sum -= lower[(col, row)] * solution[col];
        }
        solution[row] = sum / lower[(row, row)];
    }
    solution
}

#[must_use]
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[must_use]
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / usize_to_f64(values.len())
}

/// Population variance (divides by `n`).
#[must_use]
pub fn variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let centre = mean(values);
    values
        .iter()
        .map(|value| {
            let centered = value - centre;
            centered * centered
        })
        .sum::<f64>()
        / usize_to_f64(values.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn spd_matrix() -> Mat<f64> {
        Mat::from_fn(3, 3, |i, j| match (i, j) {
            (0, 0) => 4.0,
            (1, 1) => 3.0,
            (2, 2) => 2.0,
            (0, 1) | (1, 0) => 1.0,
            (1, 2) | (2, 1) => 0.5,
            _ => 0.0,
        })
    }

    #[test]
    fn cholesky_reconstructs_matrix() {
        let matrix = spd_matrix();
        let lower = cholesky_lower(&matrix).expect("matrix is positive definite");
        let rebuilt = &lower * lower.transpose();
        for i in 0..3 {
            for j in 0..3 {
                assert_relative_eq!(rebuilt[(i, j)], matrix[(i, j)], epsilon = 1.0e-12);
            }
        }
    }

    #[test]
    fn cholesky_rejects_indefinite_matrix() {
        let matrix = Mat::from_fn(2, 2, |i, j| if i == j { 1.0 } else { 2.0 });
        assert!(cholesky_lower(&matrix).is_none());
    }

    #[test]
    fn jitter_rescues_singular_matrix() {
        let matrix = Mat::from_fn(2, 2, |_, _| 1.0);
        assert!(cholesky_lower(&matrix).is_none());
        assert!(cholesky_with_jitter(&matrix).is_some());
    }

    #[test]
    fn cholesky_solve_matches_direct_product() {
        let matrix = spd_matrix();
        let lower = cholesky_lower(&matrix).expect("matrix is positive definite");
        let solution = cholesky_solve(&lower, &[1.0, -2.0, 0.5]);
        for row in 0..3 {
            let value = (0..3).map(|col| matrix[(row, col)] * solution[col]).sum::<f64>();
            let expected = [1.0, -2.0, 0.5][row];
            assert_relative_eq!(value, expected, epsilon = 1.0e-12);
        }
    }

    #[test]
    fn log_determinant_of_diagonal_matrix() {
        let matrix = Mat::from_fn(2, 2, |i, j| if i == j { 2.0 + usize_to_f64(i) } else { 0.0 });
        let lower = cholesky_lower(&matrix).expect("diagonal is positive");
        assert_relative_eq!(
            log_determinant_from_cholesky(&lower),
            6.0_f64.ln(),
            epsilon = 1.0e-12
        );
    }

    #[test]
    fn summary_statistics_of_small_sample() {
        let values = [1.0, 2.0, 3.0, 4.0];
        assert_relative_eq!(mean(&values), 2.5);
        assert_relative_eq!(variance(&values), 1.25);
        assert!(mean(&[]).is_nan());
    }
}
