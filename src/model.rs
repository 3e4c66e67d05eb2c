//! Interface between the solution engine and a concrete economic model.
//!
//! The engine never looks inside a model: it only evaluates equilibrium
//! residuals through [`Model::dynamics`]. Residuals follow a multiplicative
//! convention: residual `i` is the proportional correction to level `i`
//! implied by the equilibrium condition (`multiplier - 1`). It is zero at an
//! equilibrium and positive when the decision rule's choice is too low. State
//! residuals come first, followed by one residual per jump variable.

use log::trace;
use nalgebra::DVector;

use crate::error::{GssaError, Result};

/// Arguments of the equilibrium conditions for a single period.
///
/// With `state = X[t-1]`, `next_state = X[t]` is chosen in period `t` together
/// with the jump variables `jumps = Y[t]`, under shock `shock = Z[t]`.
#[derive(Clone, Copy, Debug)]
pub struct DynamicsInputs<'a> {
    /// State chosen next period, `X[t+1]`.
    pub state_after_next: &'a DVector<f64>,
    /// State chosen this period, `X[t]`.
    pub next_state: &'a DVector<f64>,
    /// State carried into this period, `X[t-1]`.
    pub state: &'a DVector<f64>,
    /// Jump variables next period, `Y[t+1]`.
    pub next_jumps: &'a DVector<f64>,
    /// Jump variables this period, `Y[t]`.
    pub jumps: &'a DVector<f64>,
    /// Shock next period, `Z[t+1]`.
    pub next_shock: &'a DVector<f64>,
    /// Shock this period, `Z[t]`.
    pub shock: &'a DVector<f64>,
}

/// Capability interface implemented once per economic model.
///
/// Parameters live inside the implementing type, so the same model type can be
/// instantiated for several parameterisations without shared state.
pub trait Model {
    /// Derived quantities (output, prices, consumption, ...) for a single period.
    type Definitions;

    /// Number of endogenous state variables (`nx`).
    fn state_dim(&self) -> usize;

    /// Number of jump variables (`ny`); may be zero.
    fn jump_dim(&self) -> usize;

    /// Number of exogenous shocks (`nz`).
    fn shock_dim(&self) -> usize;

    /// Derived quantities given this period's choice, carried-in state, jumps and shock.
    fn definitions(
        &self,
        next_state: &DVector<f64>,
        state: &DVector<f64>,
        jumps: &DVector<f64>,
        shock: &DVector<f64>,
    ) -> Self::Definitions;

    /// Equilibrium residuals of length `nx + ny`.
    fn dynamics(&self, inputs: &DynamicsInputs<'_>) -> DVector<f64>;
}

/// Evaluates the residuals with every period held at the stacked point `[x̄, ȳ]` and zero shocks.
///
/// This is the function an external root finder drives to zero.
pub fn stationary_residuals<M: Model + ?Sized>(
    model: &M,
    stacked: &DVector<f64>,
) -> Result<DVector<f64>> {
    let nx = model.state_dim();
    let ny = model.jump_dim();
    if stacked.len() != nx + ny {
        return Err(GssaError::dimension_mismatch(
            "steady-state vector",
            nx + ny,
            stacked.len(),
        ));
    }
    let state = stacked.rows(0, nx).into_owned();
    let jumps = stacked.rows(nx, ny).into_owned();
    let zero_shock = DVector::zeros(model.shock_dim());

    let residuals = model.dynamics(&DynamicsInputs {
        state_after_next: &state,
        next_state: &state,
        state: &state,
        next_jumps: &jumps,
        jumps: &jumps,
        next_shock: &zero_shock,
        shock: &zero_shock,
    });
    if residuals.len() != nx + ny {
        return Err(GssaError::dimension_mismatch(
            "model residuals",
            nx + ny,
            residuals.len(),
        ));
    }
    Ok(residuals)
}

/// External nonlinear root finder for the deterministic steady state.
///
/// Receives the model (dynamics, parameters and dimensions), an initial guess
/// of length `nx + ny`, and the zero shock vector. Closures with the same
/// signature implement this trait.
pub trait SteadyStateSolver<M: Model + ?Sized> {
    fn solve(
        &self,
        model: &M,
        guess: &DVector<f64>,
        zero_shock: &DVector<f64>,
    ) -> Result<DVector<f64>>;
}

impl<M, F> SteadyStateSolver<M> for F
where
    M: Model + ?Sized,
    F: Fn(&M, &DVector<f64>, &DVector<f64>) -> Result<DVector<f64>>,
{
    fn solve(
        &self,
        model: &M,
        guess: &DVector<f64>,
        zero_shock: &DVector<f64>,
    ) -> Result<DVector<f64>> {
        self(model, guess, zero_shock)
    }
}

/// A deterministic steady state whose residuals have been checked.
#[derive(Clone, Debug, PartialEq)]
pub struct SteadyState {
    state: DVector<f64>,
    jumps: DVector<f64>,
    max_residual: f64,
}

impl SteadyState {
    /// Default tolerance on the max-norm of the stationary residuals.
    pub const DEFAULT_TOLERANCE: f64 = 1e-6;

    /// Accepts `[x̄, ȳ]` only if it zeroes the residuals within `tolerance`
    /// and every level is strictly positive.
    pub fn validate<M: Model + ?Sized>(
        model: &M,
        stacked: &DVector<f64>,
        tolerance: f64,
    ) -> Result<Self> {
        let residuals = stationary_residuals(model, stacked)?;
        if residuals.iter().any(|r| !r.is_finite()) {
            return Err(GssaError::NumericalError {
                context: "steady-state residuals",
            });
        }
        let max_residual = residuals.amax();
        trace!("steady-state max |residual| = {max_residual:e}");
        if max_residual > tolerance {
            return Err(GssaError::SteadyStateResidual {
                max_residual,
                tolerance,
            });
        }
        if let Some((index, value)) = stacked.iter().enumerate().find(|(_, v)| **v <= 0.0) {
            return Err(GssaError::NonPositiveState {
                period: None,
                index,
                value: *value,
            });
        }

        let nx = model.state_dim();
        Ok(Self {
            state: stacked.rows(0, nx).into_owned(),
            jumps: stacked.rows(nx, model.jump_dim()).into_owned(),
            max_residual,
        })
    }

    /// Runs an external solver from `guess` and validates its answer.
    pub fn find<M, S>(model: &M, solver: &S, guess: &DVector<f64>, tolerance: f64) -> Result<Self>
    where
        M: Model + ?Sized,
        S: SteadyStateSolver<M> + ?Sized,
    {
        let zero_shock = DVector::zeros(model.shock_dim());
        let stacked = solver.solve(model, guess, &zero_shock)?;
        Self::validate(model, &stacked, tolerance)
    }

    /// Steady-state levels of the endogenous states.
    pub fn state(&self) -> &DVector<f64> {
        &self.state
    }

    /// Steady-state levels of the jump variables.
    pub fn jumps(&self) -> &DVector<f64> {
        &self.jumps
    }

    /// Largest absolute residual observed during validation.
    pub fn max_residual(&self) -> f64 {
        self.max_residual
    }
}
