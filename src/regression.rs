//! Multivariate least-squares fits of basis features onto corrected trajectories.

use nalgebra::linalg::{Cholesky, SVD};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::error::{GssaError, Result};

/// Regression strategies for the coefficient update.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FitMethod {
    /// Normal equations `C = (Φ'Φ)⁻¹ Φ'Y`, solved through a Cholesky factorization.
    #[default]
    Ols,
    /// Least squares through a singular value decomposition of `Φ`.
    ///
    /// Avoids squaring the condition number of `Φ`; still rejects rank-deficient features.
    LeastSquaresSvd,
}

impl FitMethod {
    /// Fits `targets` (M×K) on `features` (M×B) and returns the B×K coefficient matrix.
    pub fn fit(&self, features: &DMatrix<f64>, targets: &DMatrix<f64>) -> Result<DMatrix<f64>> {
        if features.nrows() != targets.nrows() {
            return Err(GssaError::dimension_mismatch(
                "regression target rows",
                features.nrows(),
                targets.nrows(),
            ));
        }
        if features.nrows() < features.ncols() {
            return Err(GssaError::dimension_mismatch(
                "regression observations",
                features.ncols(),
                features.nrows(),
            ));
        }
        if features.iter().chain(targets.iter()).any(|v| !v.is_finite()) {
            return Err(GssaError::NumericalError {
                context: "regression inputs",
            });
        }

        let coefficients = match self {
            FitMethod::Ols => normal_equations(features, targets)?,
            FitMethod::LeastSquaresSvd => svd_least_squares(features, targets)?,
        };

        if coefficients.iter().any(|v| !v.is_finite()) {
            return Err(GssaError::NumericalError {
                context: "regression coefficients",
            });
        }
        Ok(coefficients)
    }
}

fn normal_equations(features: &DMatrix<f64>, targets: &DMatrix<f64>) -> Result<DMatrix<f64>> {
    let phi_t = features.transpose();
    let gram = &phi_t * features;
    let rhs = &phi_t * targets;

    let cholesky = Cholesky::new(gram).ok_or_else(|| GssaError::singular("Φ'Φ"))?;

    // A pivot that is tiny relative to the largest one means Φ'Φ is numerically rank deficient.
    let pivots = cholesky.l_dirty().diagonal();
    let largest = pivots.iter().fold(0.0_f64, |acc, p| acc.max(p.abs()));
    let smallest = pivots.iter().fold(f64::INFINITY, |acc, p| acc.min(p.abs()));
    let threshold = f64::EPSILON * features.ncols() as f64;
    if (smallest / largest).powi(2) <= threshold {
        return Err(GssaError::singular("Φ'Φ"));
    }

    Ok(cholesky.solve(&rhs))
}

fn svd_least_squares(features: &DMatrix<f64>, targets: &DMatrix<f64>) -> Result<DMatrix<f64>> {
    let svd = SVD::new(features.clone(), true, true);
    let largest = svd.singular_values.max();
    let cutoff = largest * f64::EPSILON * features.nrows().max(features.ncols()) as f64;
    if svd.singular_values.iter().any(|s| *s <= cutoff) {
        return Err(GssaError::singular("Φ (SVD)"));
    }

    svd.solve(targets, cutoff)
        .map_err(|_| GssaError::singular("Φ (SVD)"))
}
