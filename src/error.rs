use thiserror::Error;

/// Unified error type for `gssa` operations.
#[derive(Debug, Error)]
pub enum GssaError {
    /// Raised when provided arrays or matrices have incompatible dimensions.
    #[error("dimension mismatch in {context}: expected {expected} but found {found}")]
    DimensionMismatch {
        /// Human-readable context describing the operation.
        context: &'static str,
        /// The required dimension, often the model-implied value.
        expected: usize,
        /// The dimension that was actually supplied.
        found: usize,
    },

    /// Raised when a solver option or model parameter is outside its admissible range.
    #[error("invalid configuration for `{parameter}`: {reason}")]
    InvalidConfiguration {
        parameter: &'static str,
        reason: String,
    },

    /// Raised when a state level is not strictly positive before the log transform.
    #[error("state {index} in period {period:?} must be positive before taking logs, found {value}")]
    NonPositiveState {
        /// Simulation period, or `None` outside of a trajectory.
        period: Option<usize>,
        index: usize,
        value: f64,
    },

    /// Raised when linear algebra operations encounter a singular system.
    #[error("matrix in {context} is singular")]
    SingularMatrix { context: &'static str },

    /// Raised when numerical routines produce NaN or infinite values.
    #[error("encountered a non-finite value during {context}")]
    NumericalError { context: &'static str },

    /// Raised when a candidate steady state does not zero the equilibrium residuals.
    #[error("steady state rejected: max |residual| {max_residual} exceeds tolerance {tolerance}")]
    SteadyStateResidual { max_residual: f64, tolerance: f64 },

    /// Raised when the external steady-state solver reports a failure.
    #[error("steady-state solver failed: {reason}")]
    SteadyStateSolver { reason: String },

    /// Raised when a required component has not been provided to a builder.
    #[error("{component} must be provided before solving the problem")]
    MissingComponent { component: &'static str },
}

impl GssaError {
    /// Helper to format a [`DimensionMismatch`](GssaError::DimensionMismatch) error.
    pub fn dimension_mismatch(context: &'static str, expected: usize, found: usize) -> Self {
        Self::DimensionMismatch {
            context,
            expected,
            found,
        }
    }

    /// Helper for rejecting an option or parameter value.
    pub fn invalid_configuration(parameter: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            parameter,
            reason: reason.into(),
        }
    }

    /// Helper to raise when a matrix factorization fails due to singularity.
    pub fn singular(context: &'static str) -> Self {
        Self::SingularMatrix { context }
    }

    /// Helper for bubbling up missing component errors from builders.
    pub fn missing_component(component: &'static str) -> Self {
        Self::MissingComponent { component }
    }
}

/// Type alias for results returned by this crate.
pub type Result<T> = std::result::Result<T, GssaError>;
