//! High-level GSSA problem: a model, its shock process, and a validated steady state.

use log::trace;
use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;

use crate::error::{GssaError, Result};
use crate::expectation::{ExpectationOperator, Multipliers};
use crate::model::{Model, SteadyState};
use crate::options::GssaOptions;
use crate::rule::DecisionRule;
use crate::shocks::ShockProcess;
use crate::simulation::Trajectory;
use crate::solving::{FixedPointController, FixedPointSummary};

/// One model parameterisation ready to be solved.
///
/// Each call to [`solve`](GssaProblem::solve) draws its own shock history and
/// owns its coefficients, so problems never share mutable state.
#[derive(Clone, Debug)]
pub struct GssaProblem<M: Model> {
    model: M,
    process: ShockProcess,
    steady_state: SteadyState,
    start: DVector<f64>,
}

impl<M: Model> GssaProblem<M> {
    /// Starts a builder for `model`.
    pub fn builder(model: M) -> GssaProblemBuilder<M> {
        GssaProblemBuilder::new(model)
    }

    /// Accessor for the model adapter.
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Accessor for the shock process.
    pub fn shock_process(&self) -> &ShockProcess {
        &self.process
    }

    /// Validated deterministic steady state.
    pub fn steady_state(&self) -> &SteadyState {
        &self.steady_state
    }

    /// State carried into the first simulated period.
    pub fn start(&self) -> &DVector<f64> {
        &self.start
    }

    /// Runs the damped fixed-point iteration.
    ///
    /// Hitting the iteration cap is not an error; inspect
    /// [`GssaSolution::summary`] for the terminal status.
    pub fn solve(&self, options: &GssaOptions) -> Result<GssaSolution> {
        options.validate()?;

        let shocks = self
            .process
            .simulate(options.simulation_length, options.seed);
        let rule = DecisionRule::initial(
            options.basis,
            &options.initial_guess,
            &self.steady_state,
            self.process.dimension(),
        )?;
        let operator =
            ExpectationOperator::new(options.quadrature_points, self.process.dimension())?;

        let controller = FixedPointController::new(
            &self.model,
            &self.process,
            &shocks,
            &self.start,
            operator,
            options.fit,
            &options.fixed_point,
        )?;
        let outcome = controller.run(rule)?;

        Ok(GssaSolution {
            rule: outcome.rule,
            trajectory: outcome.trajectory,
            shocks,
            multipliers: outcome.multipliers,
            summary: outcome.summary,
        })
    }
}

/// Builder that validates dimensions and the steady state before constructing [`GssaProblem`].
#[derive(Debug)]
pub struct GssaProblemBuilder<M: Model> {
    model: M,
    process: Option<ShockProcess>,
    candidate: Option<DVector<f64>>,
    steady_state: Option<SteadyState>,
    tolerance: f64,
    start: Option<DVector<f64>>,
}

impl<M: Model> GssaProblemBuilder<M> {
    pub fn new(model: M) -> Self {
        Self {
            model,
            process: None,
            candidate: None,
            steady_state: None,
            tolerance: SteadyState::DEFAULT_TOLERANCE,
            start: None,
        }
    }

    /// Sets the exogenous shock process.
    pub fn shocks(mut self, process: ShockProcess) -> Self {
        self.process = Some(process);
        self
    }

    /// Supplies `[x̄, ȳ]` from an external solver; it is validated at build time.
    pub fn steady_state(mut self, stacked: DVector<f64>) -> Self {
        self.candidate = Some(stacked);
        self
    }

    /// Supplies a steady state that has already been validated.
    pub fn validated_steady_state(mut self, steady_state: SteadyState) -> Self {
        self.steady_state = Some(steady_state);
        self
    }

    /// Tolerance used when validating a candidate steady state.
    pub fn steady_state_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Overrides the starting state (defaults to the steady state).
    pub fn start(mut self, start: DVector<f64>) -> Self {
        self.start = Some(start);
        self
    }

    /// Finalizes construction after validating shapes and the steady state.
    pub fn build(self) -> Result<GssaProblem<M>> {
        let process = self
            .process
            .ok_or_else(|| GssaError::missing_component("shock process"))?;
        if process.dimension() != self.model.shock_dim() {
            return Err(GssaError::dimension_mismatch(
                "shock process dimension",
                self.model.shock_dim(),
                process.dimension(),
            ));
        }

        let steady_state = match (self.steady_state, self.candidate) {
            (Some(validated), _) => validated,
            (None, Some(candidate)) => {
                SteadyState::validate(&self.model, &candidate, self.tolerance)?
            }
            (None, None) => return Err(GssaError::missing_component("steady state")),
        };
        let nx = self.model.state_dim();
        if steady_state.state().len() != nx || steady_state.jumps().len() != self.model.jump_dim()
        {
            return Err(GssaError::dimension_mismatch(
                "steady-state vector",
                nx + self.model.jump_dim(),
                steady_state.state().len() + steady_state.jumps().len(),
            ));
        }

        let start = self.start.unwrap_or_else(|| steady_state.state().clone());
        if start.len() != nx {
            return Err(GssaError::dimension_mismatch("start state", nx, start.len()));
        }
        if let Some((index, value)) = start
            .iter()
            .enumerate()
            .find(|(_, v)| v.is_nan() || **v <= 0.0)
        {
            return Err(GssaError::NonPositiveState {
                period: None,
                index,
                value: *value,
            });
        }
        trace!("problem built: nx = {nx}, start = {start:?}");

        Ok(GssaProblem {
            model: self.model,
            process,
            steady_state,
            start,
        })
    }
}

/// Describes the result of a GSSA run.
#[derive(Clone, Debug)]
pub struct GssaSolution {
    /// Decision rule after the final damped update.
    pub rule: DecisionRule,
    /// Trajectory simulated in the final pass.
    pub trajectory: Trajectory,
    /// Shock history shared by every pass (`T × nz`).
    pub shocks: DMatrix<f64>,
    /// Expected multipliers evaluated in the final pass.
    pub multipliers: Multipliers,
    /// Iteration diagnostics and terminal status.
    pub summary: FixedPointSummary,
}

impl GssaSolution {
    /// Whether the coefficient distance met the tolerance before the cap.
    pub fn converged(&self) -> bool {
        self.summary.converged()
    }

    /// Final coefficient matrix (`B × (nx + ny)`).
    pub fn coefficients(&self) -> &DMatrix<f64> {
        self.rule.coefficients()
    }

    /// Model definitions along the final trajectory, one entry per period.
    pub fn derived_series<M: Model + ?Sized>(&self, model: &M) -> Vec<M::Definitions> {
        (0..self.trajectory.len())
            .map(|t| {
                model.definitions(
                    &self.trajectory.state(t),
                    &self.trajectory.previous_state(t),
                    &self.trajectory.jump(t),
                    &self.shocks.row(t).transpose(),
                )
            })
            .collect()
    }
}

/// Solves independent problems in parallel; result `i` belongs to `problems[i]`.
pub fn solve_batch<M>(
    problems: &[GssaProblem<M>],
    options: &GssaOptions,
) -> Vec<Result<GssaSolution>>
where
    M: Model + Sync,
{
    problems
        .par_iter()
        .map(|problem| problem.solve(options))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BrockMirman;

    #[test]
    fn builder_requires_shocks_and_steady_state() {
        let model = BrockMirman::new(0.35, 0.98);
        let missing_shocks = GssaProblem::builder(model)
            .steady_state(model.steady_state())
            .build();
        assert!(matches!(
            missing_shocks,
            Err(GssaError::MissingComponent { .. })
        ));

        let missing_steady = GssaProblem::builder(model)
            .shocks(ShockProcess::ar1(0.9, 1e-4).unwrap())
            .build();
        assert!(matches!(
            missing_steady,
            Err(GssaError::MissingComponent { .. })
        ));
    }

    #[test]
    fn builder_rejects_unvalidated_steady_state() {
        let model = BrockMirman::new(0.35, 0.98);
        let result = GssaProblem::builder(model)
            .shocks(ShockProcess::ar1(0.9, 1e-4).unwrap())
            .steady_state(model.steady_state() * 2.0)
            .build();
        assert!(matches!(result, Err(GssaError::SteadyStateResidual { .. })));
    }

    #[test]
    fn builder_checks_shock_dimension_and_start() {
        let model = BrockMirman::new(0.35, 0.98);
        let two_shocks =
            ShockProcess::new(DMatrix::identity(2, 2) * 0.5, DMatrix::identity(2, 2)).unwrap();
        let result = GssaProblem::builder(model)
            .shocks(two_shocks)
            .steady_state(model.steady_state())
            .build();
        assert!(matches!(result, Err(GssaError::DimensionMismatch { .. })));

        let result = GssaProblem::builder(model)
            .shocks(ShockProcess::ar1(0.9, 1e-4).unwrap())
            .steady_state(model.steady_state())
            .start(DVector::from_element(1, 0.0))
            .build();
        assert!(matches!(result, Err(GssaError::NonPositiveState { .. })));
    }

    #[test]
    fn invalid_options_abort_before_iterating() {
        let model = BrockMirman::new(0.35, 0.98);
        let problem = GssaProblem::builder(model)
            .shocks(ShockProcess::ar1(0.9, 1e-4).unwrap())
            .steady_state(model.steady_state())
            .build()
            .unwrap();
        let options = GssaOptions::default().with_damping(0.0);
        assert!(matches!(
            problem.solve(&options),
            Err(GssaError::InvalidConfiguration { .. })
        ));
    }
}
