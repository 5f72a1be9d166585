//! Dense linear maps
//!
//! Compiled transforms — convolution with a constant, involution,
//! cross-vocabulary translation, and their compositions — are all expressed
//! as one dense matrix type so the downstream graph builder receives a
//! uniform representation.

use serde::{Deserialize, Serialize};

use super::{check_dimensions, SemanticPointer};
use crate::Result;

/// A dense row-major matrix mapping vectors of `cols` dimensions to
/// vectors of `rows` dimensions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearMap {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl LinearMap {
    /// An all-zero map of the given shape.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    /// The identity map on `dimensions`.
    pub fn identity(dimensions: usize) -> Self {
        let mut map = Self::zeros(dimensions, dimensions);
        for i in 0..dimensions {
            map.set(i, i, 1.0);
        }
        map
    }

    /// The circulant matrix of `v`: `convolution(v).apply(u) == bind(u, v)`.
    ///
    /// This is how a bind with a compile-time constant operand is realized
    /// as a single linear transform on the variable operand.
    pub fn convolution(v: &SemanticPointer) -> Self {
        let d = v.dimensions();
        let mut map = Self::zeros(d, d);
        for i in 0..d {
            for j in 0..d {
                map.set(i, j, v[(d + i - j) % d]);
            }
        }
        map
    }

    /// The index-reversal permutation realizing [`super::involution`].
    pub fn involution(dimensions: usize) -> Self {
        let mut map = Self::zeros(dimensions, dimensions);
        for i in 0..dimensions {
            map.set(i, (dimensions - i) % dimensions, 1.0);
        }
        map
    }

    /// Output dimensionality.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Input dimensionality.
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Element accessor.
    pub fn at(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.cols + col]
    }

    /// Element mutator.
    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.data[row * self.cols + col] = value;
    }

    /// Apply the map to a vector.
    pub fn apply(&self, x: &SemanticPointer) -> Result<SemanticPointer> {
        check_dimensions(self.cols, x.dimensions())?;
        let mut out = vec![0.0; self.rows];
        for (i, slot) in out.iter_mut().enumerate() {
            let row = &self.data[i * self.cols..(i + 1) * self.cols];
            *slot = row.iter().zip(x.data().iter()).map(|(m, v)| m * v).sum();
        }
        Ok(SemanticPointer::new(out))
    }

    /// Compose with another map applied first: `(self ∘ inner)(x) =
    /// self(inner(x))`.
    pub fn compose(&self, inner: &LinearMap) -> Result<LinearMap> {
        check_dimensions(self.cols, inner.rows)?;
        let mut out = LinearMap::zeros(self.rows, inner.cols);
        for i in 0..self.rows {
            for k in 0..self.cols {
                let a = self.at(i, k);
                if a == 0.0 {
                    continue;
                }
                for j in 0..inner.cols {
                    let v = out.at(i, j) + a * inner.at(k, j);
                    out.set(i, j, v);
                }
            }
        }
        Ok(out)
    }

    /// Transposed copy.
    pub fn transpose(&self) -> LinearMap {
        let mut out = LinearMap::zeros(self.cols, self.rows);
        for i in 0..self.rows {
            for j in 0..self.cols {
                out.set(j, i, self.at(i, j));
            }
        }
        out
    }
}
