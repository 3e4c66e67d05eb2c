use nalgebra::DVector;

use crate::error::{GssaError, Result};
use crate::model::{DynamicsInputs, Model};

/// Structural parameters of the [`Rbc`] economy.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RbcParameters {
    /// Capital share.
    pub alpha: f64,
    /// Discount factor.
    pub beta: f64,
    /// Coefficient of relative risk aversion.
    pub gamma: f64,
    /// Depreciation rate.
    pub delta: f64,
    /// Weight on labour disutility.
    pub chi: f64,
    /// Inverse Frisch elasticity.
    pub theta: f64,
    /// Proportional income tax, rebated lump sum.
    pub tau: f64,
}

impl Default for RbcParameters {
    fn default() -> Self {
        Self {
            alpha: 0.35,
            beta: 0.99,
            gamma: 2.5,
            delta: 0.08,
            chi: 10.0,
            theta: 2.0,
            tau: 0.05,
        }
    }
}

/// Real business cycle model with capital as the state and labour as the jump variable.
///
/// Output is `k^α (e^z ℓ)^(1-α)`. Equilibrium conditions:
/// - Euler: `c^-γ = β E[c'^-γ (1 + (1-τ)(r' - δ))]`
/// - labour supply: `c^-γ (1-τ) w = χ ℓ^θ`
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rbc {
    params: RbcParameters,
}

/// Period quantities of the [`Rbc`] economy.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RbcDefinitions {
    pub output: f64,
    pub wage: f64,
    pub rental_rate: f64,
    pub transfer: f64,
    pub consumption: f64,
    pub investment: f64,
    pub utility: f64,
}

impl Rbc {
    /// Validates the parameters.
    pub fn new(params: RbcParameters) -> Result<Self> {
        let unit = |name: &'static str, value: f64| {
            if value > 0.0 && value < 1.0 {
                Ok(())
            } else {
                Err(GssaError::invalid_configuration(
                    name,
                    format!("must lie in (0, 1), found {value}"),
                ))
            }
        };
        unit("alpha", params.alpha)?;
        unit("beta", params.beta)?;
        if !(0.0..=1.0).contains(&params.delta) {
            return Err(GssaError::invalid_configuration(
                "delta",
                format!("must lie in [0, 1], found {}", params.delta),
            ));
        }
        if !(0.0..1.0).contains(&params.tau) {
            return Err(GssaError::invalid_configuration(
                "tau",
                format!("must lie in [0, 1), found {}", params.tau),
            ));
        }
        for (name, value) in [
            ("gamma", params.gamma),
            ("chi", params.chi),
            ("theta", params.theta),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(GssaError::invalid_configuration(
                    name,
                    format!("must be positive, found {value}"),
                ));
            }
        }
        Ok(Self { params })
    }

    pub fn params(&self) -> &RbcParameters {
        &self.params
    }

    /// Closed-form `[k̄, ℓ̄]`.
    pub fn steady_state(&self) -> DVector<f64> {
        let RbcParameters {
            alpha,
            beta,
            gamma,
            delta,
            chi,
            theta,
            tau,
        } = self.params;

        let rental_rate = delta + (1.0 / beta - 1.0) / (1.0 - tau);
        let capital_per_worker = (alpha / rental_rate).powf(1.0 / (1.0 - alpha));
        let wage = (1.0 - alpha) * capital_per_worker.powf(alpha);
        let consumption_per_worker = wage + (rental_rate - delta) * capital_per_worker;
        let labour = ((1.0 - tau) * wage * consumption_per_worker.powf(-gamma) / chi)
            .powf(1.0 / (theta + gamma));

        DVector::from_vec(vec![capital_per_worker * labour, labour])
    }
}

impl Model for Rbc {
    type Definitions = RbcDefinitions;

    fn state_dim(&self) -> usize {
        1
    }

    fn jump_dim(&self) -> usize {
        1
    }

    fn shock_dim(&self) -> usize {
        1
    }

    fn definitions(
        &self,
        next_state: &DVector<f64>,
        state: &DVector<f64>,
        jumps: &DVector<f64>,
        shock: &DVector<f64>,
    ) -> Self::Definitions {
        let p = &self.params;
        let capital = state[0];
        let labour = jumps[0];

        let output = capital.powf(p.alpha) * (shock[0].exp() * labour).powf(1.0 - p.alpha);
        let rental_rate = p.alpha * output / capital;
        let wage = (1.0 - p.alpha) * output / labour;
        let income = wage * labour + (rental_rate - p.delta) * capital;
        let transfer = p.tau * income;
        let consumption = (1.0 - p.tau) * income + transfer + capital - next_state[0];
        let utility = consumption.powf(1.0 - p.gamma) / (1.0 - p.gamma)
            - p.chi * labour.powf(1.0 + p.theta) / (1.0 + p.theta);

        RbcDefinitions {
            output,
            wage,
            rental_rate,
            transfer,
            consumption,
            investment: output - consumption,
            utility,
        }
    }

    fn dynamics(&self, inputs: &DynamicsInputs<'_>) -> DVector<f64> {
        let p = &self.params;
        let now = self.definitions(inputs.next_state, inputs.state, inputs.jumps, inputs.shock);
        let next = self.definitions(
            inputs.state_after_next,
            inputs.next_state,
            inputs.next_jumps,
            inputs.next_shock,
        );

        let marginal_utility = now.consumption.powf(-p.gamma);
        let next_marginal_utility = next.consumption.powf(-p.gamma);
        let gross_return = 1.0 + (1.0 - p.tau) * (next.rental_rate - p.delta);

        let euler = p.beta * next_marginal_utility * gross_return / marginal_utility;
        let labour_supply =
            marginal_utility * (1.0 - p.tau) * now.wage / (p.chi * inputs.jumps[0].powf(p.theta));

        DVector::from_vec(vec![euler - 1.0, labour_supply - 1.0])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::stationary_residuals;
    use approx::assert_relative_eq;

    #[test]
    fn closed_form_steady_state_zeroes_both_conditions() {
        let model = Rbc::new(RbcParameters::default()).unwrap();
        let steady = model.steady_state();
        let residuals = stationary_residuals(&model, &steady).unwrap();
        assert_relative_eq!(residuals, DVector::zeros(2), epsilon = 1e-12);

        let k = DVector::from_element(1, steady[0]);
        let l = DVector::from_element(1, steady[1]);
        let defs = model.definitions(&k, &k, &l, &DVector::zeros(1));
        assert_relative_eq!(
            defs.investment,
            model.params().delta * steady[0],
            max_relative = 1e-10
        );
    }

    #[test]
    fn rejects_out_of_range_parameters() {
        let params = RbcParameters {
            beta: 1.2,
            ..RbcParameters::default()
        };
        assert!(matches!(
            Rbc::new(params),
            Err(GssaError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn too_little_labour_raises_the_labour_multiplier() {
        let model = Rbc::new(RbcParameters::default()).unwrap();
        let steady = model.steady_state();
        let mut low = steady.clone();
        low[1] *= 0.9;
        let residuals = stationary_residuals(&model, &low).unwrap();
        assert!(residuals[1] > 0.0);
    }
}
