//! Least squares.
//!
//! The perturbation sweep reduces each predictor's response curve to a single
//! number by regressing predicted responses on the perturbation grid:
//!
//! ```text
//! minimize Σ (y_i - a - b x_i)^2
//! ```
//!
//! Implementation choices:
//! - SVD solve, so a tall design matrix (many grid points, two columns) is fine.
//! - Progressively looser tolerances before giving up on a near-singular system.

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    for &tol in &[1e-12, 1e-10, 1e-8] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Fitted simple regression line `y = intercept + slope * x`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Line {
    pub intercept: f64,
    pub slope: f64,
}

/// Ordinary least squares line with intercept.
///
/// Returns `None` for mismatched lengths, fewer than two points, or an `x` with
/// no spread (slope not identified).
pub fn fit_line(x: &[f64], y: &[f64]) -> Option<Line> {
    let n = x.len();
    if n < 2 || y.len() != n {
        return None;
    }
    let first = x[0];
    if x.iter().all(|&v| v == first) {
        return None;
    }

    let design = DMatrix::from_fn(n, 2, |i, j| if j == 0 { 1.0 } else { x[i] });
    let target = DVector::from_column_slice(y);
    let beta = solve_least_squares(&design, &target)?;

    Some(Line {
        intercept: beta[0],
        slope: beta[1],
    })
}
