//! Polynomial feature expansion shared by the decision rule and the regression step.
//!
//! The layout of the feature vector is part of the contract between
//! [`DecisionRule`](crate::rule::DecisionRule) and the fitted coefficient matrix:
//! a row of coefficients is only meaningful for the term it was estimated
//! against, so every caller must expand inputs through the same [`Basis`].

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::error::{GssaError, Result};

/// Closed set of supported basis families, resolved once at configuration time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Basis {
    /// A constant, the pure powers `v^1 .. v^(order-1)` of every input, and all
    /// pairwise cross products `v[i] * v[j]` with `i < j`.
    Polynomial {
        /// Polynomial order; must be at least one.
        order: usize,
    },
}

impl Default for Basis {
    fn default() -> Self {
        Basis::Polynomial { order: 3 }
    }
}

impl Basis {
    /// Rejects basis settings that cannot produce a feature vector.
    pub fn validate(&self) -> Result<()> {
        match *self {
            Basis::Polynomial { order } if order == 0 => Err(GssaError::invalid_configuration(
                "basis order",
                "polynomial order must be at least 1",
            )),
            Basis::Polynomial { .. } => Ok(()),
        }
    }

    /// Number of features produced for an input vector of length `inputs`.
    pub fn term_count(&self, inputs: usize) -> usize {
        match *self {
            Basis::Polynomial { order } => {
                let powers = order.saturating_sub(1) * inputs;
                let cross = inputs * inputs.saturating_sub(1) / 2;
                1 + powers + cross
            }
        }
    }

    /// Expands a single observation into its feature vector.
    pub fn expand(&self, input: &DVector<f64>) -> Result<DVector<f64>> {
        self.validate()?;
        let n = input.len();
        let mut features = Vec::with_capacity(self.term_count(n));

        match *self {
            Basis::Polynomial { order } => {
                features.push(1.0);
                for power in 1..order {
                    // Full block per power: v[0]^p, v[1]^p, ...
                    features.extend(input.iter().map(|value| value.powi(power as i32)));
                }
                for i in 0..n {
                    for j in (i + 1)..n {
                        features.push(input[i] * input[j]);
                    }
                }
            }
        }

        Ok(DVector::from_vec(features))
    }

    /// Expands each row of `inputs` into the corresponding row of a feature matrix.
    pub fn expand_rows(&self, inputs: &DMatrix<f64>) -> Result<DMatrix<f64>> {
        let terms = self.term_count(inputs.ncols());
        let mut features = DMatrix::zeros(inputs.nrows(), terms);
        for (row_index, row) in inputs.row_iter().enumerate() {
            let expanded = self.expand(&row.transpose())?;
            features.row_mut(row_index).copy_from(&expanded.transpose());
        }
        Ok(features)
    }
}
