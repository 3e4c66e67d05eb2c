//! Discrete approximations of Gaussian expectations over next-period innovations.

use nalgebra::{DMatrix, DVector};
use statrs::distribution::{ContinuousCDF, Normal};

use crate::error::{GssaError, Result};

/// Equal-mass discretisation of the standard normal distribution.
///
/// The unit interval is cut into `npts` cells of equal probability; each node
/// is the normal quantile of its cell's midpoint and carries weight `1/npts`.
#[derive(Clone, Debug)]
pub struct QuadratureTable {
    nodes: DVector<f64>,
    weights: DVector<f64>,
}

impl QuadratureTable {
    /// Builds a table from explicit nodes and weights.
    pub fn new(nodes: DVector<f64>, weights: DVector<f64>) -> Result<Self> {
        if nodes.is_empty() {
            return Err(GssaError::dimension_mismatch("quadrature nodes", 1, 0));
        }
        if nodes.len() != weights.len() {
            return Err(GssaError::dimension_mismatch(
                "quadrature weight length",
                nodes.len(),
                weights.len(),
            ));
        }
        if let Some(weight) = weights.iter().find(|weight| **weight <= 0.0) {
            return Err(GssaError::invalid_configuration(
                "quadrature weights",
                format!("weights must be strictly positive, found {weight}"),
            ));
        }
        let slack = (weights.sum() - 1.0).abs();
        if slack > 1e-10 {
            return Err(GssaError::invalid_configuration(
                "quadrature weights",
                format!("weights must sum to one (slack {slack})"),
            ));
        }

        Ok(Self { nodes, weights })
    }

    /// Equal-probability rectangular rule with `npts` points.
    pub fn equal_mass(npts: usize) -> Result<Self> {
        if npts == 0 {
            return Err(GssaError::invalid_configuration(
                "quadrature points",
                "at least one quadrature point is required",
            ));
        }
        let standard = Normal::new(0.0, 1.0)
            .map_err(|err| GssaError::invalid_configuration("quadrature", err.to_string()))?;

        let cell = 1.0 / npts as f64;
        let mut nodes = DVector::from_fn(npts, |i, _| {
            standard.inverse_cdf((i as f64 + 0.5) * cell)
        });
        // Mirror the upper half onto the lower half so the rule is exactly symmetric.
        for i in 0..npts / 2 {
            let magnitude = 0.5 * (nodes[npts - 1 - i] - nodes[i]);
            nodes[i] = -magnitude;
            nodes[npts - 1 - i] = magnitude;
        }
        if npts % 2 == 1 {
            nodes[npts / 2] = 0.0;
        }
        let weights = DVector::from_element(npts, cell);

        Self::new(nodes, weights)
    }

    /// Number of quadrature points.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Tables always hold at least one node.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Standard-normal nodes.
    pub fn nodes(&self) -> &DVector<f64> {
        &self.nodes
    }

    /// Probability weights (normalized to sum to one).
    pub fn weights(&self) -> &DVector<f64> {
        &self.weights
    }
}

/// Outer product of a one-dimensional table across every shock dimension.
///
/// A grid over `nz` dimensions holds `npts^nz` nodes; row `k` of
/// [`nodes`](QuadratureGrid::nodes) is one joint innovation and
/// `weights[k]` the product of the per-dimension weights.
#[derive(Clone, Debug)]
pub struct QuadratureGrid {
    nodes: DMatrix<f64>,
    weights: DVector<f64>,
}

impl QuadratureGrid {
    /// Tensor-product grid of `table` over `dimension` independent standard normals.
    pub fn tensor(table: &QuadratureTable, dimension: usize) -> Result<Self> {
        let npts = table.len();
        let count = u32::try_from(dimension)
            .ok()
            .and_then(|exponent| npts.checked_pow(exponent))
            .ok_or_else(|| {
                GssaError::invalid_configuration(
                    "quadrature points",
                    format!("{npts}^{dimension} grid nodes overflow the address space"),
                )
            })?;
        let mut nodes = DMatrix::zeros(count, dimension);
        let mut weights = DVector::from_element(count, 1.0);

        for k in 0..count {
            // Mixed-radix digits of `k` select one node per dimension, last dimension fastest.
            let mut remainder = k;
            for d in (0..dimension).rev() {
                let digit = remainder % npts;
                remainder /= npts;
                nodes[(k, d)] = table.nodes()[digit];
                weights[k] *= table.weights()[digit];
            }
        }

        Ok(Self { nodes, weights })
    }

    /// Number of joint nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.nrows()
    }

    /// Number of shock dimensions.
    pub fn dimension(&self) -> usize {
        self.nodes.ncols()
    }

    /// Joint nodes, one per row.
    pub fn nodes(&self) -> &DMatrix<f64> {
        &self.nodes
    }

    /// Joint weights.
    pub fn weights(&self) -> &DVector<f64> {
        &self.weights
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn two_point_rule_is_symmetric() {
        let table = QuadratureTable::equal_mass(2).unwrap();
        assert_relative_eq!(table.weights()[0], 0.5);
        assert_relative_eq!(table.weights()[1], 0.5);
        assert_eq!(table.nodes()[0], -table.nodes()[1]);
        // Quantile of 0.75 under the standard normal.
        assert_relative_eq!(table.nodes()[1], 0.674_489_750_196_081_7, epsilon = 1e-9);

        let mean = table.nodes().dot(table.weights());
        assert_relative_eq!(mean, 0.0, epsilon = 1e-15);
    }

    #[test]
    fn odd_rule_has_a_zero_centre_node() {
        let table = QuadratureTable::equal_mass(5).unwrap();
        assert_eq!(table.nodes()[2], 0.0);
        for i in 0..2 {
            assert_eq!(table.nodes()[i], -table.nodes()[4 - i]);
        }
        assert_relative_eq!(table.weights().sum(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn rejects_zero_points() {
        assert!(matches!(
            QuadratureTable::equal_mass(0),
            Err(GssaError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn tensor_grid_covers_every_combination() {
        let table = QuadratureTable::equal_mass(3).unwrap();
        let grid = QuadratureGrid::tensor(&table, 2).unwrap();

        assert_eq!(grid.node_count(), 9);
        assert_eq!(grid.dimension(), 2);
        assert_relative_eq!(grid.weights().sum(), 1.0, epsilon = 1e-12);
        // Row 5 = digits (1, 2).
        assert_eq!(grid.nodes()[(5, 0)], table.nodes()[1]);
        assert_eq!(grid.nodes()[(5, 1)], table.nodes()[2]);

        let column_mean = grid.nodes().transpose() * grid.weights();
        assert_relative_eq!(column_mean, DVector::zeros(2), epsilon = 1e-12);
    }

    #[test]
    fn zero_dimensional_grid_is_a_single_certain_node() {
        let table = QuadratureTable::equal_mass(2).unwrap();
        let grid = QuadratureGrid::tensor(&table, 0).unwrap();
        assert_eq!(grid.node_count(), 1);
        assert_relative_eq!(grid.weights()[0], 1.0);
    }

    #[test]
    fn oversized_grid_is_rejected_instead_of_overflowing() {
        let table = QuadratureTable::equal_mass(10).unwrap();
        assert!(matches!(
            QuadratureGrid::tensor(&table, 64),
            Err(GssaError::InvalidConfiguration { .. })
        ));
    }
}
