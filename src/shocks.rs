//! Exogenous shock process: a first-order vector autoregression with Gaussian innovations.

use log::trace;
use nalgebra::linalg::Cholesky;
use nalgebra::{DMatrix, DVector};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use rand_distr::{Distribution, StandardNormal};

use crate::error::{GssaError, Result};

/// `Z[t] = Z[t-1]·N + ε[t]` with `ε[t] ~ N(0, Σ)`; shocks are row vectors.
#[derive(Clone, Debug)]
pub struct ShockProcess {
    var: DMatrix<f64>,
    covariance: DMatrix<f64>,
    /// Lower-triangular `L` with `L·Lᵀ = Σ`.
    scale: DMatrix<f64>,
}

impl ShockProcess {
    /// Validates the VAR matrix `N` and the innovation covariance `Σ`.
    pub fn new(var: DMatrix<f64>, covariance: DMatrix<f64>) -> Result<Self> {
        let nz = var.nrows();
        if nz == 0 {
            return Err(GssaError::dimension_mismatch("shock dimension", 1, 0));
        }
        if var.ncols() != nz {
            return Err(GssaError::dimension_mismatch("VAR matrix columns", nz, var.ncols()));
        }
        if covariance.nrows() != nz || covariance.ncols() != nz {
            return Err(GssaError::dimension_mismatch(
                "shock covariance",
                nz,
                covariance.nrows(),
            ));
        }
        if var.iter().chain(covariance.iter()).any(|v| !v.is_finite()) {
            return Err(GssaError::NumericalError {
                context: "shock process parameters",
            });
        }
        let asymmetry = (&covariance - covariance.transpose()).amax();
        if asymmetry > 1e-12 {
            return Err(GssaError::invalid_configuration(
                "shock covariance",
                format!("covariance must be symmetric (max asymmetry {asymmetry})"),
            ));
        }

        let scale = Cholesky::new(covariance.clone())
            .ok_or_else(|| GssaError::singular("shock covariance"))?
            .unpack();

        Ok(Self {
            var,
            covariance,
            scale,
        })
    }

    /// Single AR(1) shock with persistence `rho` and innovation variance `variance`.
    pub fn ar1(rho: f64, variance: f64) -> Result<Self> {
        Self::new(
            DMatrix::from_element(1, 1, rho),
            DMatrix::from_element(1, 1, variance),
        )
    }

    /// Number of shock dimensions (`nz`).
    pub fn dimension(&self) -> usize {
        self.var.nrows()
    }

    /// VAR coefficient matrix `N`.
    pub fn var(&self) -> &DMatrix<f64> {
        &self.var
    }

    /// Innovation covariance `Σ`.
    pub fn covariance(&self) -> &DMatrix<f64> {
        &self.covariance
    }

    /// Expected next-period shock given the current one: `z·N`, returned as a column.
    pub fn conditional_mean(&self, shock: &DVector<f64>) -> DVector<f64> {
        self.var.tr_mul(shock)
    }

    /// Maps independent standard-normal draws onto correlated innovations.
    pub fn innovation(&self, standard: &DVector<f64>) -> DVector<f64> {
        &self.scale * standard
    }

    /// Draws a `length × nz` shock history starting from `Z[0] = 0`.
    pub fn simulate(&self, length: usize, seed: u64) -> DMatrix<f64> {
        let nz = self.dimension();
        let mut rng = SmallRng::seed_from_u64(seed);
        let mut history = DMatrix::zeros(length, nz);

        for t in 1..length {
            let draws = DVector::from_fn(nz, |_, _| StandardNormal.sample(&mut rng));
            let previous = history.row(t - 1).transpose();
            let next = self.conditional_mean(&previous) + self.innovation(&draws);
            history.row_mut(t).copy_from(&next.transpose());
        }

        trace!("simulated {length} periods of a {nz}-dimensional shock process (seed {seed})");
        history
    }
}
