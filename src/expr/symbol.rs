//! Symbolic matrix variables with builder pattern.

use super::expression::{Expr, Op, SymbolData};
use super::shape::Shape;

/// Builder for creating symbols.
pub struct SymbolBuilder {
    name: String,
    shape: Shape,
}

impl SymbolBuilder {
    /// Create a new symbol builder with the given shape.
    pub fn new(shape: impl Into<Shape>) -> Self {
        Self {
            name: "x".to_string(),
            shape: shape.into(),
        }
    }

    /// Create a scalar symbol builder.
    pub fn scalar() -> Self {
        Self::new(Shape::scalar())
    }

    /// Create a matrix symbol builder.
    pub fn matrix(m: usize, n: usize) -> Self {
        Self::new(Shape::matrix(m, n))
    }

    /// Set the name of the symbol.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Build the symbol expression.
    pub fn build(self) -> Expr {
        Expr::from_op(Op::Symbol(SymbolData {
            name: self.name,
            shape: self.shape,
        }))
    }
}

/// Create a named symbol with the given shape.
///
/// # Examples
///
/// ```
/// use dlesolve::expr::{sym, Shape};
///
/// let a = sym("a", (3, 3));
/// assert_eq!(a.shape(), Shape::square(3));
/// assert_eq!(a.name(), Some("a"));
/// ```
pub fn sym(name: impl Into<String>, shape: impl Into<Shape>) -> Expr {
    SymbolBuilder::new(shape).name(name).build()
}

/// Create a named scalar symbol.
pub fn scalar_sym(name: impl Into<String>) -> Expr {
    SymbolBuilder::scalar().name(name).build()
}
