//! Quadrature-based conditional expectations of the equilibrium multipliers.
//!
//! For period `t` every grid node `ε` yields a next-period shock
//! `Zp = Z[t]·N + L·ε`, a next-period choice `(Xp, Yp) = rule(X[t], Zp)` and a
//! residual vector from the model. The multiplier of each level is
//! `1 + residual`; `Gamma[t]` and `Lambda[t]` are their probability-weighted
//! averages over the grid.

use nalgebra::{DMatrix, DVector};

use crate::error::{GssaError, Result};
use crate::model::{DynamicsInputs, Model};
use crate::quadrature::{QuadratureGrid, QuadratureTable};
use crate::rule::DecisionRule;
use crate::shocks::ShockProcess;
use crate::simulation::Trajectory;

/// Expected multipliers for every period: `gamma` is `T × nx`, `lambda` is `T × ny`.
#[derive(Clone, Debug, PartialEq)]
pub struct Multipliers {
    pub gamma: DMatrix<f64>,
    pub lambda: DMatrix<f64>,
}

impl Multipliers {
    /// Largest deviation of any multiplier from one; zero along an exact solution.
    pub fn max_euler_error(&self) -> f64 {
        self.gamma
            .iter()
            .chain(self.lambda.iter())
            .fold(0.0_f64, |acc, m| acc.max((m - 1.0).abs()))
    }
}

/// Discrete expectation operator over next-period innovations.
#[derive(Clone, Debug)]
pub struct ExpectationOperator {
    grid: QuadratureGrid,
}

impl ExpectationOperator {
    /// Equal-mass rule with `points` nodes per dimension over `dimension` shocks.
    pub fn new(points: usize, dimension: usize) -> Result<Self> {
        let table = QuadratureTable::equal_mass(points)?;
        Ok(Self {
            grid: QuadratureGrid::tensor(&table, dimension)?,
        })
    }

    /// Operator over an explicit grid.
    pub fn from_grid(grid: QuadratureGrid) -> Self {
        Self { grid }
    }

    /// Underlying quadrature grid.
    pub fn grid(&self) -> &QuadratureGrid {
        &self.grid
    }

    /// Expected `(Gamma[t], Lambda[t])` for a single period.
    pub fn period_multipliers<M: Model + ?Sized>(
        &self,
        model: &M,
        rule: &DecisionRule,
        process: &ShockProcess,
        trajectory: &Trajectory,
        shocks: &DMatrix<f64>,
        t: usize,
    ) -> Result<(DVector<f64>, DVector<f64>)> {
        let nx = rule.state_dim();
        let ny = rule.jump_dim();
        if self.grid.dimension() != process.dimension() {
            return Err(GssaError::dimension_mismatch(
                "quadrature grid dimension",
                process.dimension(),
                self.grid.dimension(),
            ));
        }

        let state = trajectory.previous_state(t);
        let next_state = trajectory.state(t);
        let jumps = trajectory.jump(t);
        let shock = shocks.row(t).transpose();
        let mean_shock = process.conditional_mean(&shock);

        let mut gamma = DVector::zeros(nx);
        let mut lambda = DVector::zeros(ny);

        for (node, weight) in self.grid.nodes().row_iter().zip(self.grid.weights().iter()) {
            let next_shock = &mean_shock + process.innovation(&node.transpose());
            let (state_after_next, next_jumps) =
                rule.evaluate_in(Some(t + 1), &next_state, &next_shock)?;

            let residuals = model.dynamics(&DynamicsInputs {
                state_after_next: &state_after_next,
                next_state: &next_state,
                state: &state,
                next_jumps: &next_jumps,
                jumps: &jumps,
                next_shock: &next_shock,
                shock: &shock,
            });
            if residuals.len() != nx + ny {
                return Err(GssaError::dimension_mismatch(
                    "model residuals",
                    nx + ny,
                    residuals.len(),
                ));
            }
            if residuals.iter().any(|r| !r.is_finite()) {
                return Err(GssaError::NumericalError {
                    context: "model residuals",
                });
            }

            for i in 0..nx {
                gamma[i] += weight * (1.0 + residuals[i]);
            }
            for k in 0..ny {
                lambda[k] += weight * (1.0 + residuals[nx + k]);
            }
        }

        Ok((gamma, lambda))
    }

    /// Expected multipliers over the whole trajectory.
    pub fn multipliers<M: Model + ?Sized>(
        &self,
        model: &M,
        rule: &DecisionRule,
        process: &ShockProcess,
        trajectory: &Trajectory,
        shocks: &DMatrix<f64>,
    ) -> Result<Multipliers> {
        if shocks.nrows() != trajectory.len() {
            return Err(GssaError::dimension_mismatch(
                "shock history length",
                trajectory.len(),
                shocks.nrows(),
            ));
        }
        let periods = trajectory.len();
        let mut gamma = DMatrix::zeros(periods, rule.state_dim());
        let mut lambda = DMatrix::zeros(periods, rule.jump_dim());

        for t in 0..periods {
            let (g, l) = self.period_multipliers(model, rule, process, trajectory, shocks, t)?;
            gamma.row_mut(t).copy_from(&g.transpose());
            lambda.row_mut(t).copy_from(&l.transpose());
        }

        Ok(Multipliers { gamma, lambda })
    }
}
