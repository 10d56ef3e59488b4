//! # dlesolve
//!
//! Differentiable solvers for the discrete Lyapunov equation
//!
//! ```text
//! P = A P Aᵀ + V
//! ```
//!
//! Solvers are built once from a problem structure and an options dictionary.
//! Construction unrolls the chosen algorithm into a symbolic matrix expression
//! graph and compiles it into a [`Function`](function::Function). Evaluating
//! the solver replays that graph on numeric `A` and `V`; forward and reverse
//! derivatives are new functions generated from the same graph.
//!
//! ## Quick Start
//!
//! ```
//! use dlesolve::prelude::*;
//! use nalgebra::DMatrix;
//!
//! let opts = Options::new().with("iter", 50).with("freq_doubling", true);
//! let solver = DleSolver::new("lyap", "fixed_smith", DleStructure::square(2), opts)?;
//!
//! let a = DMatrix::from_row_slice(2, 2, &[0.5, 0.1, 0.0, 0.4]);
//! let v = DMatrix::identity(2, 2);
//! let p = solver.solve(&a, &v)?;
//!
//! let residual = &a * &p * a.transpose() + &v - &p;
//! assert!(residual.norm() < 1e-10);
//! # Ok::<(), dlesolve::DleError>(())
//! ```
//!
//! ## Plugins
//!
//! - `fixed_smith`: fixed-point Smith iteration, optionally with frequency
//!   doubling (DLE and low-rank DLE)
//! - `lrdle`: a DLE solved through any low-rank DLE plugin
//! - `simple`: exact solve of the `n² × n²` Kronecker system (DLE and
//!   low-rank DLE)
//!
//! ## Architecture
//!
//! - **Expression graphs** of `Arc`-shared nodes with unique ids
//! - **Functions** compiled to a linear tape, with symbolic forward and
//!   reverse derivatives
//! - **Static registry** of plugins selected by name

pub mod error;
pub mod expr;
pub mod function;
pub mod ops;
pub mod solver;
pub mod sparse;

/// Prelude module for convenient imports.
///
/// ```
/// use dlesolve::prelude::*;
/// ```
pub mod prelude {
    // Expression types
    pub use crate::expr::{
        constant, constant_dmatrix, constant_matrix, constant_sparse, eye, scalar_sym, sym,
        zeros, Array, Expr, ExprId, Shape, SymbolBuilder,
    };

    // Operations
    pub use crate::ops::{
        attach_assert, congruence, diagcat, horzsplit, kron, matmul, mul3, reshape, solve,
        symmetrize, transpose, vectorize,
    };

    // Functions
    pub use crate::function::Function;

    // Solvers
    pub use crate::solver::{
        fixed_smith_dle, kronecker_dle, DleSolver, DleStructure, FixedSmithOptions, LrDleSolver,
        LrDleStructure, OptionValue, Options, Solver,
    };

    // Errors
    pub use crate::error::{DleError, Result};
}

// Re-export main types at crate root
pub use error::{DleError, Result};
pub use function::Function;
pub use solver::{DleSolver, LrDleSolver, Options};
