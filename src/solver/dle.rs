//! Discrete Lyapunov equation `P = A P Aᵀ + V`.

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use super::frontend::{Solver, Structure};
use super::registry::{Plugin, DLE_PLUGINS};
use crate::error::{DleError, Result};
use crate::expr::{sym, Array, Expr, Shape};

/// Shapes of the DLE inputs. Both must be square and of equal size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DleStructure {
    pub a: Shape,
    pub v: Shape,
}

impl DleStructure {
    pub fn new(a: impl Into<Shape>, v: impl Into<Shape>) -> Self {
        DleStructure {
            a: a.into(),
            v: v.into(),
        }
    }

    /// Structure for an `n×n` problem.
    pub fn square(n: usize) -> Self {
        DleStructure::new(Shape::square(n), Shape::square(n))
    }
}

/// Symbols handed to a DLE plugin.
#[derive(Debug, Clone)]
pub struct DleInputs {
    pub a: Expr,
    pub v: Expr,
}

impl Structure for DleStructure {
    type Inputs = DleInputs;

    const KIND: &'static str = "DLE";
    const OUTPUT: &'static str = "p";

    fn plugins() -> &'static [Plugin<DleInputs>] {
        DLE_PLUGINS
    }

    fn validate(&self) -> Result<()> {
        if !self.a.is_square() {
            return Err(DleError::shape_mismatch("square A", self.a));
        }
        if self.v != self.a {
            return Err(DleError::shape_mismatch(format!("V of shape {}", self.a), self.v));
        }
        Ok(())
    }

    fn declare(&self) -> (DleInputs, Vec<(&'static str, Expr)>) {
        let a = sym("A", self.a);
        let v = sym("V", self.v);
        let named = vec![("a", a.clone()), ("v", v.clone())];
        (DleInputs { a, v }, named)
    }

    fn output_shape(&self) -> Shape {
        self.a
    }
}

/// Solver for the discrete Lyapunov equation.
pub type DleSolver = Solver<DleStructure>;

impl Solver<DleStructure> {
    /// Solve for `P` given numeric `A` and `V`.
    pub fn solve(&self, a: impl Into<Array>, v: impl Into<Array>) -> Result<DMatrix<f64>> {
        self.eval(&[a.into(), v.into()])
    }
}
