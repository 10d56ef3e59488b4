//! Shape representation for matrix expressions.
//!
//! Every expression is a matrix:
//! - a scalar is `1 x 1`
//! - a vector of length n is `n x 1`
//! - an m x n matrix is `m x n`

use std::fmt;

use serde::{Deserialize, Serialize};

/// Shape of a matrix expression.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Shape {
    rows: usize,
    cols: usize,
}

impl Shape {
    /// Create a scalar shape.
    pub fn scalar() -> Self {
        Shape::matrix(1, 1)
    }

    /// Create a column vector shape.
    pub fn vector(n: usize) -> Self {
        Shape::matrix(n, 1)
    }

    /// Create a matrix shape.
    pub fn matrix(rows: usize, cols: usize) -> Self {
        Shape { rows, cols }
    }

    /// Create a square matrix shape.
    pub fn square(n: usize) -> Self {
        Shape::matrix(n, n)
    }

    /// Total number of elements.
    pub fn size(&self) -> usize {
        self.rows * self.cols
    }

    /// Number of rows.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns.
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Check if this is a scalar.
    pub fn is_scalar(&self) -> bool {
        self.rows == 1 && self.cols == 1
    }

    /// Check if this is a square matrix.
    pub fn is_square(&self) -> bool {
        self.rows == self.cols
    }

    /// Get the transposed shape.
    pub fn transpose(&self) -> Self {
        Shape::matrix(self.cols, self.rows)
    }

    /// Check if matrix multiplication is valid and return result shape.
    pub fn matmul(&self, other: &Shape) -> Option<Shape> {
        (self.cols == other.rows).then(|| Shape::matrix(self.rows, other.cols))
    }
}

impl fmt::Debug for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Shape({}, {})", self.rows, self.cols)
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.rows, self.cols)
    }
}

// Conversion traits
impl From<()> for Shape {
    fn from(_: ()) -> Self {
        Shape::scalar()
    }
}

impl From<usize> for Shape {
    fn from(n: usize) -> Self {
        Shape::vector(n)
    }
}

impl From<(usize, usize)> for Shape {
    fn from((m, n): (usize, usize)) -> Self {
        Shape::matrix(m, n)
    }
}
