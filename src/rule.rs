//! Polynomial decision rule mapping today's state and shock to tomorrow's state and jumps.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::basis::Basis;
use crate::error::{GssaError, Result};
use crate::model::SteadyState;
use crate::options::InitialGuess;

/// Coefficients together with the basis they were estimated against.
///
/// Inputs are `[ln x, z]`; outputs are `[ln x', ln y]`, so levels are always
/// recovered through `exp`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DecisionRule {
    basis: Basis,
    coefficients: DMatrix<f64>,
    state_dim: usize,
    jump_dim: usize,
    shock_dim: usize,
}

impl DecisionRule {
    /// Wraps a `B × (nx + ny)` coefficient matrix after checking its shape.
    pub fn new(
        basis: Basis,
        coefficients: DMatrix<f64>,
        state_dim: usize,
        jump_dim: usize,
        shock_dim: usize,
    ) -> Result<Self> {
        basis.validate()?;
        let terms = basis.term_count(state_dim + shock_dim);
        if coefficients.nrows() != terms {
            return Err(GssaError::dimension_mismatch(
                "coefficient rows",
                terms,
                coefficients.nrows(),
            ));
        }
        if coefficients.ncols() != state_dim + jump_dim {
            return Err(GssaError::dimension_mismatch(
                "coefficient columns",
                state_dim + jump_dim,
                coefficients.ncols(),
            ));
        }
        Ok(Self {
            basis,
            coefficients,
            state_dim,
            jump_dim,
            shock_dim,
        })
    }

    /// Seeds a rule from the steady state according to `guess`.
    pub fn initial(
        basis: Basis,
        guess: &InitialGuess,
        steady_state: &SteadyState,
        shock_dim: usize,
    ) -> Result<Self> {
        basis.validate()?;
        let nx = steady_state.state().len();
        let ny = steady_state.jumps().len();
        let terms = basis.term_count(nx + shock_dim);

        let coefficients = match guess {
            InitialGuess::Provided(matrix) => matrix.clone(),
            InitialGuess::Uniform(value) => {
                DMatrix::from_fn(terms, nx + ny, |_, column| value * (column as f64 + 1.0))
            }
            InitialGuess::LogLinear {
                persistence,
                shock_response,
            } => {
                let mut matrix = DMatrix::zeros(terms, nx + ny);
                let linear_terms = matches!(basis, Basis::Polynomial { order } if order >= 2);
                for i in 0..nx {
                    let log_level = steady_state.state()[i].ln();
                    if linear_terms {
                        matrix[(0, i)] = (1.0 - persistence) * log_level;
                        matrix[(1 + i, i)] = *persistence;
                        for j in 0..shock_dim {
                            matrix[(1 + nx + j, i)] = *shock_response;
                        }
                    } else {
                        matrix[(0, i)] = log_level;
                    }
                }
                for k in 0..ny {
                    matrix[(0, nx + k)] = steady_state.jumps()[k].ln();
                }
                matrix
            }
        };

        Self::new(basis, coefficients, nx, ny, shock_dim)
    }

    /// Basis the coefficients refer to.
    pub fn basis(&self) -> Basis {
        self.basis
    }

    /// Coefficient matrix (`B × (nx + ny)`).
    pub fn coefficients(&self) -> &DMatrix<f64> {
        &self.coefficients
    }

    /// Consumes the rule and returns its coefficients.
    pub fn into_coefficients(self) -> DMatrix<f64> {
        self.coefficients
    }

    /// Number of endogenous states.
    pub fn state_dim(&self) -> usize {
        self.state_dim
    }

    /// Number of jump variables.
    pub fn jump_dim(&self) -> usize {
        self.jump_dim
    }

    /// Number of shocks.
    pub fn shock_dim(&self) -> usize {
        self.shock_dim
    }

    pub(crate) fn set_coefficients(&mut self, coefficients: DMatrix<f64>) {
        debug_assert_eq!(coefficients.shape(), self.coefficients.shape());
        self.coefficients = coefficients;
    }

    /// Builds the regression input `[ln x, z]`, rejecting non-positive levels.
    pub fn log_inputs(
        &self,
        state: &DVector<f64>,
        shock: &DVector<f64>,
        period: Option<usize>,
    ) -> Result<DVector<f64>> {
        if state.len() != self.state_dim {
            return Err(GssaError::dimension_mismatch(
                "state length",
                self.state_dim,
                state.len(),
            ));
        }
        if shock.len() != self.shock_dim {
            return Err(GssaError::dimension_mismatch(
                "shock length",
                self.shock_dim,
                shock.len(),
            ));
        }
        let mut inputs = DVector::zeros(self.state_dim + self.shock_dim);
        for (index, level) in state.iter().enumerate() {
            if level.is_nan() || *level <= 0.0 {
                return Err(GssaError::NonPositiveState {
                    period,
                    index,
                    value: *level,
                });
            }
            inputs[index] = level.ln();
        }
        inputs.rows_mut(self.state_dim, self.shock_dim).copy_from(shock);
        Ok(inputs)
    }

    /// Next-period state and this period's jump variables, both in levels.
    pub fn evaluate(
        &self,
        state: &DVector<f64>,
        shock: &DVector<f64>,
    ) -> Result<(DVector<f64>, DVector<f64>)> {
        self.evaluate_in(None, state, shock)
    }

    pub(crate) fn evaluate_in(
        &self,
        period: Option<usize>,
        state: &DVector<f64>,
        shock: &DVector<f64>,
    ) -> Result<(DVector<f64>, DVector<f64>)> {
        let inputs = self.log_inputs(state, shock, period)?;
        let features = self.basis.expand(&inputs)?;
        let logs = self.coefficients.tr_mul(&features);

        let levels = logs.map(f64::exp);
        if levels.iter().any(|v| !v.is_finite()) {
            return Err(GssaError::NumericalError {
                context: "decision rule evaluation",
            });
        }
        let next_state = levels.rows(0, self.state_dim).into_owned();
        let jumps = levels.rows(self.state_dim, self.jump_dim).into_owned();
        Ok((next_state, jumps))
    }
}
