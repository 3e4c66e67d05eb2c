//! Damped fixed-point iteration over the decision-rule coefficients.

use log::{debug, info, trace, warn};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::error::{GssaError, Result};
use crate::expectation::{ExpectationOperator, Multipliers};
use crate::model::Model;
use crate::regression::FitMethod;
use crate::rule::DecisionRule;
use crate::shocks::ShockProcess;
use crate::simulation::{simulate, Trajectory};

/// Configuration for the damped coefficient iteration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FixedPointOptions {
    /// Supremum-norm tolerance on the coefficient change.
    pub tolerance: f64,
    /// Maximum number of passes before giving up.
    pub max_iterations: usize,
    /// Weight on the freshly fitted coefficients, in `(0, 1]` (1.0 is undamped replacement).
    pub damping: f64,
}

impl Default for FixedPointOptions {
    fn default() -> Self {
        Self {
            tolerance: 1e-8,
            max_iterations: 500,
            damping: 0.05,
        }
    }
}

impl FixedPointOptions {
    /// Rejects tolerances, caps and damping factors that cannot terminate sensibly.
    pub fn validate(&self) -> Result<()> {
        if !(self.tolerance.is_finite() && self.tolerance >= 0.0) {
            return Err(GssaError::invalid_configuration(
                "tolerance",
                format!("must be finite and non-negative, found {}", self.tolerance),
            ));
        }
        if self.max_iterations == 0 {
            return Err(GssaError::invalid_configuration(
                "max iterations",
                "at least one iteration is required",
            ));
        }
        if !(self.damping > 0.0 && self.damping <= 1.0) {
            return Err(GssaError::invalid_configuration(
                "damping",
                format!("must lie in (0, 1], found {}", self.damping),
            ));
        }
        Ok(())
    }
}

/// Phases of a single controller run.
///
/// The shock history and the seeded rule arrive through
/// [`FixedPointController::new`] and [`FixedPointController::run`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Checks the seeded rule against the model and the shock history.
    Initializing,
    /// Unrolls a trajectory under the current rule.
    Simulating,
    /// Evaluates Gamma and Lambda over every period.
    Expecting,
    /// Fits, measures the distance and applies the damped update.
    Regressing,
    Converged,
    MaxIterExceeded,
}

/// How a run ended. Both outcomes carry usable coefficients.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminalStatus {
    /// The coefficient change fell to or below the tolerance.
    Converged,
    /// The iteration cap was reached first; coefficients are best effort.
    MaxIterExceeded,
}

/// Diagnostics returned alongside the fitted decision rule.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FixedPointSummary {
    /// Number of passes performed.
    pub iterations: usize,
    /// Coefficient distance in the final pass.
    pub distance: f64,
    /// Coefficient distance of every pass, in order.
    pub distances: Vec<f64>,
    /// Terminal state of the run.
    pub status: TerminalStatus,
}

impl FixedPointSummary {
    /// Whether the tolerance was met before the cap.
    pub fn converged(&self) -> bool {
        self.status == TerminalStatus::Converged
    }
}

/// Everything a controller run leaves behind.
#[derive(Clone, Debug)]
pub struct FixedPointOutcome {
    pub rule: DecisionRule,
    /// Trajectory simulated in the final pass.
    pub trajectory: Trajectory,
    /// Multipliers evaluated in the final pass.
    pub multipliers: Multipliers,
    pub summary: FixedPointSummary,
}

/// Drives simulate → expect → regress → damp until convergence or the cap.
pub struct FixedPointController<'a, M: Model + ?Sized> {
    model: &'a M,
    process: &'a ShockProcess,
    shocks: &'a DMatrix<f64>,
    start: &'a DVector<f64>,
    operator: ExpectationOperator,
    fit: FitMethod,
    options: &'a FixedPointOptions,
}

impl<'a, M: Model + ?Sized> FixedPointController<'a, M> {
    /// Binds one run's immutable inputs; the shock history is reused by every pass.
    pub fn new(
        model: &'a M,
        process: &'a ShockProcess,
        shocks: &'a DMatrix<f64>,
        start: &'a DVector<f64>,
        operator: ExpectationOperator,
        fit: FitMethod,
        options: &'a FixedPointOptions,
    ) -> Result<Self> {
        options.validate()?;
        if shocks.nrows() < 2 {
            return Err(GssaError::dimension_mismatch("shock history length", 2, shocks.nrows()));
        }
        if shocks.ncols() != process.dimension() {
            return Err(GssaError::dimension_mismatch(
                "shock history columns",
                process.dimension(),
                shocks.ncols(),
            ));
        }
        Ok(Self {
            model,
            process,
            shocks,
            start,
            operator,
            fit,
            options,
        })
    }

    fn check_rule(&self, rule: &DecisionRule) -> Result<()> {
        let expected = [
            ("rule state dimension", self.model.state_dim(), rule.state_dim()),
            ("rule jump dimension", self.model.jump_dim(), rule.jump_dim()),
            ("rule shock dimension", self.shocks.ncols(), rule.shock_dim()),
            ("start state", rule.state_dim(), self.start.len()),
        ];
        for (context, want, found) in expected {
            if want != found {
                return Err(GssaError::dimension_mismatch(context, want, found));
            }
        }
        Ok(())
    }

    /// Iterates from `rule` and returns the final rule with diagnostics.
    pub fn run(&self, mut rule: DecisionRule) -> Result<FixedPointOutcome> {
        let mut phase = Phase::Initializing;
        let mut distances = Vec::new();
        let mut iteration = 0usize;
        let mut last: Option<(Trajectory, Multipliers)> = None;
        let mut trajectory: Option<Trajectory> = None;
        let mut multipliers: Option<Multipliers> = None;

        loop {
            trace!("fixed-point phase {phase:?} at iteration {iteration}");
            phase = match phase {
                Phase::Initializing => {
                    self.check_rule(&rule)?;
                    Phase::Simulating
                }
                Phase::Simulating => {
                    trajectory = Some(simulate(&rule, self.start, self.shocks)?);
                    Phase::Expecting
                }
                Phase::Expecting => {
                    let path = trajectory
                        .as_ref()
                        .ok_or_else(|| GssaError::missing_component("simulated trajectory"))?;
                    multipliers = Some(self.operator.multipliers(
                        self.model,
                        &rule,
                        self.process,
                        path,
                        self.shocks,
                    )?);
                    Phase::Regressing
                }
                Phase::Regressing => {
                    let path = trajectory
                        .take()
                        .ok_or_else(|| GssaError::missing_component("simulated trajectory"))?;
                    let expected = multipliers
                        .take()
                        .ok_or_else(|| GssaError::missing_component("expected multipliers"))?;

                    let (features, targets) =
                        regression_data(&rule, &path, &expected, self.shocks)?;
                    let fitted = self.fit.fit(&features, &targets)?;

                    let distance = (rule.coefficients() - &fitted).amax();
                    let damping = self.options.damping;
                    let updated = rule.coefficients() * (1.0 - damping) + fitted * damping;
                    rule.set_coefficients(updated);

                    iteration += 1;
                    distances.push(distance);
                    debug!(
                        "iteration {iteration}: distance {distance:e}, max Euler error {:e}",
                        expected.max_euler_error()
                    );
                    last = Some((path, expected));

                    if distance <= self.options.tolerance {
                        Phase::Converged
                    } else if iteration >= self.options.max_iterations {
                        Phase::MaxIterExceeded
                    } else {
                        Phase::Simulating
                    }
                }
                Phase::Converged | Phase::MaxIterExceeded => break,
            };
        }

        let status = if phase == Phase::Converged {
            info!("coefficients converged after {iteration} iterations");
            TerminalStatus::Converged
        } else {
            warn!(
                "no convergence within {} iterations; last distance {:e}",
                self.options.max_iterations,
                distances.last().copied().unwrap_or(f64::NAN)
            );
            TerminalStatus::MaxIterExceeded
        };

        let (trajectory, multipliers) =
            last.ok_or_else(|| GssaError::missing_component("completed iteration"))?;
        let distance = distances.last().copied().unwrap_or(f64::INFINITY);

        Ok(FixedPointOutcome {
            rule,
            trajectory,
            multipliers,
            summary: FixedPointSummary {
                iterations: iteration,
                distance,
                distances,
                status,
            },
        })
    }
}

/// Lagged regression rows: features `basis(ln X[t-1], Z[t])`, targets
/// `[ln(Gamma⊙X)[t], ln(Lambda⊙Y)[t]]` for `t = 1..T-1`.
///
/// The shock paired with `X[t-1]` is `Z[t]`, not `Z[t-1]`: it is the shock the
/// rule saw when it chose `X[t]`, so the rows reproduce the simulation exactly.
pub fn regression_data(
    rule: &DecisionRule,
    trajectory: &Trajectory,
    multipliers: &Multipliers,
    shocks: &DMatrix<f64>,
) -> Result<(DMatrix<f64>, DMatrix<f64>)> {
    let nx = rule.state_dim();
    let ny = rule.jump_dim();
    let periods = trajectory.len();
    let rows = periods.saturating_sub(1);
    let basis = rule.basis();
    let terms = basis.term_count(nx + rule.shock_dim());

    let corrected_states = multipliers.gamma.component_mul(trajectory.states());
    let corrected_jumps = multipliers.lambda.component_mul(trajectory.jumps());

    let mut features = DMatrix::zeros(rows, terms);
    let mut targets = DMatrix::zeros(rows, nx + ny);

    for t in 1..periods {
        let row = t - 1;
        let shock = shocks.row(t).transpose();
        let inputs = rule.log_inputs(&trajectory.state(t - 1), &shock, Some(t))?;
        features
            .row_mut(row)
            .copy_from(&basis.expand(&inputs)?.transpose());

        let corrected = corrected_states
            .row(t)
            .iter()
            .chain(corrected_jumps.row(t).iter())
            .copied()
            .collect::<Vec<_>>();
        for (index, level) in corrected.into_iter().enumerate() {
            if level.is_nan() || level <= 0.0 {
                return Err(GssaError::NonPositiveState {
                    period: Some(t),
                    index,
                    value: level,
                });
            }
            targets[(row, index)] = level.ln();
        }
    }

    Ok((features, targets))
}
