//! Low-rank discrete Lyapunov equation `P = A P Aᵀ + C V Cᵀ`.
//!
//! An optional `H` factor replaces the output by a projection of `P`: the
//! columns of `H` are split into blocks `H_k` and the output is the block
//! diagonal matrix of the `H_kᵀ P H_k`.

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use super::frontend::{Solver, Structure};
use super::registry::{Plugin, LR_DLE_PLUGINS};
use crate::error::{DleError, Result};
use crate::expr::{sym, Array, Expr, Shape};
use crate::ops::{congruence, diagcat, horzsplit};

/// Shapes of the LR-DLE inputs.
///
/// `a` is `n×n`. With `c` present it is `n×m` and `v` is `m×m`; without it
/// `v` is `n×n`. With `h` present it is `n×k` and `h_blocks` lists the
/// widths of its column blocks, which sum to `k`; an empty list means a
/// single block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LrDleStructure {
    pub a: Shape,
    pub v: Shape,
    #[serde(default)]
    pub c: Option<Shape>,
    #[serde(default)]
    pub h: Option<Shape>,
    #[serde(default)]
    pub h_blocks: Vec<usize>,
}

impl LrDleStructure {
    pub fn new(a: impl Into<Shape>, v: impl Into<Shape>) -> Self {
        LrDleStructure {
            a: a.into(),
            v: v.into(),
            c: None,
            h: None,
            h_blocks: Vec::new(),
        }
    }

    /// Add a `C` factor of the given shape.
    pub fn with_c(mut self, c: impl Into<Shape>) -> Self {
        self.c = Some(c.into());
        self
    }

    /// Project the output onto the column blocks of an `H` factor.
    pub fn with_h(mut self, h: impl Into<Shape>, blocks: Vec<usize>) -> Self {
        self.h = Some(h.into());
        self.h_blocks = blocks;
        self
    }

    /// Widths of the `H` column blocks, empty without `H`.
    pub fn block_widths(&self) -> Vec<usize> {
        match self.h {
            Some(h) if self.h_blocks.is_empty() => vec![h.cols()],
            Some(_) => self.h_blocks.clone(),
            None => Vec::new(),
        }
    }
}

/// Symbols handed to an LR-DLE plugin.
#[derive(Debug, Clone)]
pub struct LrDleInputs {
    pub a: Expr,
    pub v: Expr,
    pub c: Option<Expr>,
    pub h: Option<Expr>,
    /// Column block widths of `h`.
    pub h_blocks: Vec<usize>,
}

impl LrDleInputs {
    /// Inputs without `C` or `H`.
    pub fn new(a: Expr, v: Expr) -> Self {
        LrDleInputs {
            a,
            v,
            c: None,
            h: None,
            h_blocks: Vec::new(),
        }
    }

    /// The `H_k` blocks, empty without `H`.
    pub fn h_split(&self) -> Vec<Expr> {
        match &self.h {
            Some(h) => horzsplit(h, &self.h_blocks),
            None => Vec::new(),
        }
    }

    /// Apply the output projection to a solution `p`, if `H` is present.
    pub fn project(&self, p: Expr) -> Expr {
        if self.h.is_none() {
            return p;
        }
        let blocks: Vec<Expr> = self.h_split().iter().map(|hk| congruence(&hk.t(), &p)).collect();
        diagcat(&blocks)
    }
}

impl Structure for LrDleStructure {
    type Inputs = LrDleInputs;

    const KIND: &'static str = "LR-DLE";
    const OUTPUT: &'static str = "y";

    fn plugins() -> &'static [Plugin<LrDleInputs>] {
        LR_DLE_PLUGINS
    }

    fn validate(&self) -> Result<()> {
        if !self.a.is_square() {
            return Err(DleError::shape_mismatch("square A", self.a));
        }
        let n = self.a.rows();
        let m = match self.c {
            Some(c) if c.rows() != n => {
                return Err(DleError::shape_mismatch(format!("C with {} rows", n), c));
            }
            Some(c) => c.cols(),
            None => n,
        };
        if self.v != Shape::square(m) {
            return Err(DleError::shape_mismatch(Shape::square(m), self.v));
        }
        if let Some(h) = self.h {
            if h.rows() != n {
                return Err(DleError::shape_mismatch(format!("H with {} rows", n), h));
            }
            let widths = self.block_widths();
            if widths.contains(&0) || widths.iter().sum::<usize>() != h.cols() {
                return Err(DleError::shape_mismatch(
                    format!("H blocks {:?} covering its columns", widths),
                    h,
                ));
            }
        }
        Ok(())
    }

    fn declare(&self) -> (LrDleInputs, Vec<(&'static str, Expr)>) {
        let a = sym("A", self.a);
        let v = sym("V", self.v);
        let c = self.c.map(|shape| sym("C", shape));
        let h = self.h.map(|shape| sym("H", shape));

        let mut named = vec![("a", a.clone()), ("v", v.clone())];
        if let Some(c) = &c {
            named.push(("c", c.clone()));
        }
        if let Some(h) = &h {
            named.push(("h", h.clone()));
        }
        let inputs = LrDleInputs {
            a,
            v,
            c,
            h,
            h_blocks: self.block_widths(),
        };
        (inputs, named)
    }

    fn output_shape(&self) -> Shape {
        match self.h {
            Some(h) => Shape::square(h.cols()),
            None => self.a,
        }
    }
}

/// Solver for the low-rank discrete Lyapunov equation.
pub type LrDleSolver = Solver<LrDleStructure>;

impl Solver<LrDleStructure> {
    /// Solve for `Y` given numeric `A`, `V` and, if the structure declares
    /// them, `C` and `H`.
    pub fn solve(
        &self,
        a: impl Into<Array>,
        v: impl Into<Array>,
        c: Option<Array>,
        h: Option<Array>,
    ) -> Result<DMatrix<f64>> {
        let mut args = vec![a.into(), v.into()];
        args.extend(c);
        args.extend(h);
        self.eval(&args)
    }
}
