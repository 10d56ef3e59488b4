//! Expression types and creation utilities.
//!
//! This module provides the symbolic matrix expression graph:
//! - `Expr` - handle to an immutable, shared expression node
//! - `Shape` - matrix dimensions of an expression
//! - Symbol creation via `sym()` and `SymbolBuilder`
//! - Constant creation via `constant()` and related functions

pub mod constant;
pub mod expression;
pub mod shape;
pub mod symbol;

// Re-export main types
pub use constant::{constant, constant_dmatrix, constant_matrix, constant_sparse, eye, zeros};
pub use expression::{Array, Expr, ExprId, Op, SymbolData};
pub use shape::Shape;
pub use symbol::{scalar_sym, sym, SymbolBuilder};
