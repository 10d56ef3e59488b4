//! Constant expression creation.

use nalgebra::DMatrix;
use nalgebra_sparse::CscMatrix;

use super::expression::{Expr, Op};
use super::shape::Shape;
use crate::sparse::csc_to_dense;

/// Create a constant expression from a scalar.
pub fn constant(value: f64) -> Expr {
    Expr::from_op(Op::Constant(DMatrix::from_element(1, 1, value)))
}

/// Create a constant expression from a dense matrix given in column-major order.
pub fn constant_matrix(values: Vec<f64>, rows: usize, cols: usize) -> Expr {
    constant_dmatrix(DMatrix::from_vec(rows, cols, values))
}

/// Create a constant expression from a nalgebra DMatrix.
pub fn constant_dmatrix(matrix: DMatrix<f64>) -> Expr {
    Expr::from_op(Op::Constant(matrix))
}

/// Create a constant expression from a sparse CSC matrix.
pub fn constant_sparse(matrix: &CscMatrix<f64>) -> Expr {
    constant_dmatrix(csc_to_dense(matrix))
}

/// Create a zero constant with the given shape.
pub fn zeros(shape: impl Into<Shape>) -> Expr {
    let shape = shape.into();
    constant_dmatrix(DMatrix::zeros(shape.rows(), shape.cols()))
}

/// Create an identity matrix constant.
pub fn eye(n: usize) -> Expr {
    constant_dmatrix(DMatrix::identity(n, n))
}
