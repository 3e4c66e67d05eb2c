//! Example model adapters with closed-form steady states.
//!
//! - [`BrockMirman`]: log utility and full depreciation; the exact decision
//!   rule `ln k' = ln(αβ) + α ln k + z` lies inside the quadratic basis, which
//!   makes it a convenient accuracy benchmark.
//! - [`Rbc`]: CRRA utility, partial depreciation, endogenous labour as a jump
//!   variable, and a proportional income tax rebated lump sum.

mod brock_mirman;
mod rbc;

pub use brock_mirman::{BrockMirman, BrockMirmanDefinitions};
pub use rbc::{Rbc, RbcDefinitions, RbcParameters};
