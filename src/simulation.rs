//! Forward simulation of state and jump trajectories under a fixed decision rule.

use nalgebra::{DMatrix, DVector};

use crate::error::{GssaError, Result};
use crate::rule::DecisionRule;

/// Simulated paths: row `t` of `states` is `X[t]`, row `t` of `jumps` is `Y[t]`.
#[derive(Clone, Debug, PartialEq)]
pub struct Trajectory {
    start: DVector<f64>,
    states: DMatrix<f64>,
    jumps: DMatrix<f64>,
}

impl Trajectory {
    /// Number of simulated periods.
    pub fn len(&self) -> usize {
        self.states.nrows()
    }

    /// Whether no periods were simulated.
    pub fn is_empty(&self) -> bool {
        self.states.nrows() == 0
    }

    /// State carried into period 0.
    pub fn start(&self) -> &DVector<f64> {
        &self.start
    }

    /// `T × nx` state levels.
    pub fn states(&self) -> &DMatrix<f64> {
        &self.states
    }

    /// `T × ny` jump-variable levels.
    pub fn jumps(&self) -> &DMatrix<f64> {
        &self.jumps
    }

    /// State chosen in period `t`, `X[t]`.
    pub fn state(&self, t: usize) -> DVector<f64> {
        self.states.row(t).transpose()
    }

    /// State carried into period `t`: the start for `t = 0`, otherwise `X[t-1]`.
    pub fn previous_state(&self, t: usize) -> DVector<f64> {
        if t == 0 {
            self.start.clone()
        } else {
            self.state(t - 1)
        }
    }

    /// Jump variables of period `t`, `Y[t]`.
    pub fn jump(&self, t: usize) -> DVector<f64> {
        self.jumps.row(t).transpose()
    }
}

/// Unrolls `(X[t], Y[t]) = rule(X[t-1], Z[t])` over the whole shock history.
///
/// Deterministic: the only randomness lives in `shocks`.
pub fn simulate(
    rule: &DecisionRule,
    start: &DVector<f64>,
    shocks: &DMatrix<f64>,
) -> Result<Trajectory> {
    if shocks.ncols() != rule.shock_dim() {
        return Err(GssaError::dimension_mismatch(
            "shock history columns",
            rule.shock_dim(),
            shocks.ncols(),
        ));
    }
    let periods = shocks.nrows();
    let mut states = DMatrix::zeros(periods, rule.state_dim());
    let mut jumps = DMatrix::zeros(periods, rule.jump_dim());

    let mut previous = start.clone();
    for t in 0..periods {
        let shock = shocks.row(t).transpose();
        let (next, jump) = rule.evaluate_in(Some(t), &previous, &shock)?;
        states.row_mut(t).copy_from(&next.transpose());
        jumps.row_mut(t).copy_from(&jump.transpose());
        previous = next;
    }

    Ok(Trajectory {
        start: start.clone(),
        states,
        jumps,
    })
}
