//! Generalized Stochastic Simulation Algorithm (GSSA) for nonlinear rational-expectations models.
//!
//! This crate approximates the decision rule of a dynamic stochastic model
//! (endogenous states, optional jump variables, shocks following a vector
//! autoregression) by a polynomial in `[ln x, z]`. Following Judd, Maliar and
//! Maliar (2011), each pass
//!
//! - simulates a trajectory under the current rule (`simulation` module),
//! - evaluates expected equilibrium multipliers with a discrete quadrature
//!   over next-period innovations (`expectation` and `quadrature` modules),
//! - regresses the corrected trajectory back onto the polynomial basis
//!   (`basis` and `regression` modules), and
//! - takes a damped step towards the fitted coefficients (`solving` module),
//!
//! until the coefficients stop moving or an iteration cap is reached.
//!
//! Models plug in through the [`Model`](model::Model) trait. The steady state
//! comes from an external root finder and is validated before any iteration.
//!
//! # Quick start
//!
//! ```no_run
//! use gssa::models::BrockMirman;
//! use gssa::shocks::ShockProcess;
//! use gssa::{GssaOptions, GssaProblem};
//! use nalgebra::DVector;
//!
//! let model = BrockMirman::new(0.36, 0.96);
//! let problem = GssaProblem::builder(model)
//!     .shocks(ShockProcess::ar1(0.9, 1e-4).expect("valid AR(1)"))
//!     .steady_state(model.steady_state())
//!     .start(model.steady_state() * 0.9)
//!     .build()
//!     .expect("well-formed problem");
//!
//! let options = GssaOptions::default().with_simulation_length(200);
//! let solution = problem.solve(&options).expect("no domain errors");
//! println!("converged: {}", solution.converged());
//! println!("coefficients: {}", solution.coefficients());
//!
//! let (next, _jumps) = solution
//!     .rule
//!     .evaluate(&DVector::from_element(1, 0.2), &DVector::zeros(1))
//!     .expect("positive state");
//! println!("k' at k = 0.2: {}", next[0]);
//! ```
//!
//! Convergence is not guaranteed: the iteration is a damped fixed-point
//! heuristic and a run may end at the iteration cap. That outcome is reported
//! through [`TerminalStatus`], not as an error.

pub mod basis;
pub mod error;
pub mod expectation;
pub mod model;
pub mod models;
pub mod options;
pub mod problem;
pub mod quadrature;
pub mod regression;
pub mod rule;
pub mod shocks;
pub mod simulation;
pub mod solving;

pub use error::{GssaError, Result};
pub use options::{GssaOptions, InitialGuess};
pub use problem::{solve_batch, GssaProblem, GssaProblemBuilder, GssaSolution};
pub use solving::{FixedPointOptions, FixedPointSummary, TerminalStatus};
