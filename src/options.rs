//! Configuration structures for a GSSA run.

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::basis::Basis;
use crate::error::{GssaError, Result};
use crate::regression::FitMethod;
use crate::solving::FixedPointOptions;

/// How the coefficient matrix is seeded before the first simulation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum InitialGuess {
    /// Log-linear rule around the steady state:
    /// `ln x' = (1 - persistence)·ln x̄ + persistence·ln x + shock_response·Σ z`,
    /// jump variables held at their steady-state levels.
    LogLinear {
        persistence: f64,
        shock_response: f64,
    },
    /// Every coefficient in column `j` set to `value·(j + 1)`.
    Uniform(f64),
    /// A previously estimated coefficient matrix (`B × (nx + ny)`).
    Provided(DMatrix<f64>),
}

impl Default for InitialGuess {
    fn default() -> Self {
        InitialGuess::LogLinear {
            persistence: 0.9,
            shock_response: 0.1,
        }
    }
}

/// Aggregated solver configuration used when solving a [`GssaProblem`](crate::GssaProblem).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GssaOptions {
    /// Number of simulated periods `T`.
    pub simulation_length: usize,
    /// Functional form of the decision rule.
    pub basis: Basis,
    /// Quadrature points per shock dimension.
    pub quadrature_points: usize,
    /// Regression used for the coefficient update.
    pub fit: FitMethod,
    /// Seed for the one-time shock history.
    pub seed: u64,
    /// Seeding of the coefficient matrix.
    pub initial_guess: InitialGuess,
    /// Damped fixed-point iteration settings.
    pub fixed_point: FixedPointOptions,
}

impl Default for GssaOptions {
    fn default() -> Self {
        Self {
            simulation_length: 20,
            basis: Basis::default(),
            quadrature_points: 2,
            fit: FitMethod::default(),
            seed: 0,
            initial_guess: InitialGuess::default(),
            fixed_point: FixedPointOptions::default(),
        }
    }
}

impl GssaOptions {
    /// Override the simulation length while preserving other defaults.
    pub fn with_simulation_length(mut self, length: usize) -> Self {
        self.simulation_length = length;
        self
    }

    /// Use a polynomial basis of the given order.
    pub fn with_polynomial_order(mut self, order: usize) -> Self {
        self.basis = Basis::Polynomial { order };
        self
    }

    /// Set the number of quadrature points per shock dimension.
    pub fn with_quadrature_points(mut self, points: usize) -> Self {
        self.quadrature_points = points;
        self
    }

    /// Select the regression strategy.
    pub fn with_fit(mut self, fit: FitMethod) -> Self {
        self.fit = fit;
        self
    }

    /// Set the seed of the shock history.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Override the coefficient seeding.
    pub fn with_initial_guess(mut self, guess: InitialGuess) -> Self {
        self.initial_guess = guess;
        self
    }

    /// Override the fixed-point settings.
    pub fn with_fixed_point(mut self, fixed_point: FixedPointOptions) -> Self {
        self.fixed_point = fixed_point;
        self
    }

    /// Set the damping factor of the coefficient update.
    pub fn with_damping(mut self, damping: f64) -> Self {
        self.fixed_point.damping = damping;
        self
    }

    /// Set the convergence tolerance on the coefficient distance.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.fixed_point.tolerance = tolerance;
        self
    }

    /// Set the iteration cap.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.fixed_point.max_iterations = max_iterations;
        self
    }

    /// Rejects settings the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.simulation_length < 2 {
            return Err(GssaError::invalid_configuration(
                "simulation length",
                format!(
                    "at least two periods are required, found {}",
                    self.simulation_length
                ),
            ));
        }
        self.basis.validate()?;
        if self.quadrature_points == 0 {
            return Err(GssaError::invalid_configuration(
                "quadrature points",
                "at least one quadrature point is required",
            ));
        }
        if let InitialGuess::LogLinear {
            persistence,
            shock_response,
        } = self.initial_guess
        {
            if !(persistence.is_finite() && shock_response.is_finite()) {
                return Err(GssaError::invalid_configuration(
                    "initial guess",
                    "log-linear coefficients must be finite",
                ));
            }
        }
        self.fixed_point.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let options = GssaOptions::default();
        assert!(options.validate().is_ok());
        assert_eq!(options.simulation_length, 20);
        assert_eq!(options.quadrature_points, 2);
        assert_eq!(options.basis, Basis::Polynomial { order: 3 });
    }

    #[test]
    fn zero_damping_is_rejected() {
        let options = GssaOptions::default().with_damping(0.0);
        assert!(matches!(
            options.validate(),
            Err(GssaError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn short_simulations_and_zero_order_are_rejected() {
        assert!(GssaOptions::default()
            .with_simulation_length(1)
            .validate()
            .is_err());
        assert!(GssaOptions::default()
            .with_polynomial_order(0)
            .validate()
            .is_err());
        assert!(GssaOptions::default()
            .with_quadrature_points(0)
            .validate()
            .is_err());
    }
}
