use nalgebra::DVector;

use crate::model::{DynamicsInputs, Model};

/// Stochastic growth with log utility and full depreciation.
///
/// Output is `e^z k^α`; consumption is output less next period's capital.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BrockMirman {
    /// Capital share, in `(0, 1)`.
    pub alpha: f64,
    /// Discount factor, in `(0, 1)`.
    pub beta: f64,
}

/// Period quantities of the Brock–Mirman economy.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BrockMirmanDefinitions {
    pub output: f64,
    pub rental_rate: f64,
    pub consumption: f64,
}

impl BrockMirman {
    pub fn new(alpha: f64, beta: f64) -> Self {
        Self { alpha, beta }
    }

    /// `k̄ = (αβ)^(1/(1-α))`.
    pub fn steady_state(&self) -> DVector<f64> {
        let capital = (self.alpha * self.beta).powf(1.0 / (1.0 - self.alpha));
        DVector::from_element(1, capital)
    }

    /// Exact policy `k' = αβ e^z k^α`.
    pub fn policy(&self, capital: f64, shock: f64) -> f64 {
        self.alpha * self.beta * shock.exp() * capital.powf(self.alpha)
    }
}

impl Model for BrockMirman {
    type Definitions = BrockMirmanDefinitions;

    fn state_dim(&self) -> usize {
        1
    }

    fn jump_dim(&self) -> usize {
        0
    }

    fn shock_dim(&self) -> usize {
        1
    }

    fn definitions(
        &self,
        next_state: &DVector<f64>,
        state: &DVector<f64>,
        _jumps: &DVector<f64>,
        shock: &DVector<f64>,
    ) -> Self::Definitions {
        let capital = state[0];
        let output = shock[0].exp() * capital.powf(self.alpha);
        BrockMirmanDefinitions {
            output,
            rental_rate: self.alpha * output / capital,
            consumption: output - next_state[0],
        }
    }

    fn dynamics(&self, inputs: &DynamicsInputs<'_>) -> DVector<f64> {
        let now = self.definitions(inputs.next_state, inputs.state, inputs.jumps, inputs.shock);
        let next = self.definitions(
            inputs.state_after_next,
            inputs.next_state,
            inputs.next_jumps,
            inputs.next_shock,
        );
        // 1/c = β E[r'/c']
        let euler = self.beta * next.rental_rate * now.consumption / next.consumption;
        DVector::from_element(1, euler - 1.0)
    }
}
