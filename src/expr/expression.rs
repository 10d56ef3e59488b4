//! Core expression types for dlesolve.
//!
//! An `Expr` is a cheap handle to an immutable node of a matrix expression DAG.
//! Nodes are shared through `Arc`; cloning a handle never copies the graph.
//! Every node carries a unique `ExprId` so graph algorithms can memoize on it.

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use nalgebra::DMatrix;
use nalgebra_sparse::CscMatrix;

use super::shape::Shape;
use crate::error::{DleError, Result};
use crate::sparse::csc_to_dense;

/// Unique identifier for expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExprId(u64);

impl ExprId {
    /// Generate a new unique ID.
    pub fn new() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(0);
        ExprId(NEXT_ID.fetch_add(1, Ordering::SeqCst))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for ExprId {
    fn default() -> Self {
        Self::new()
    }
}

/// Numeric value supplied to a function (dense, sparse, or scalar).
#[derive(Debug, Clone)]
pub enum Array {
    /// Dense matrix storage.
    Dense(DMatrix<f64>),
    /// Sparse CSC matrix storage.
    Sparse(CscMatrix<f64>),
    /// Scalar value.
    Scalar(f64),
}

impl Array {
    /// Get the shape of the array.
    pub fn shape(&self) -> Shape {
        match self {
            Array::Dense(m) => Shape::matrix(m.nrows(), m.ncols()),
            Array::Sparse(m) => Shape::matrix(m.nrows(), m.ncols()),
            Array::Scalar(_) => Shape::scalar(),
        }
    }

    /// Try to get as a scalar value.
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Array::Scalar(v) => Some(*v),
            Array::Dense(m) if m.nrows() == 1 && m.ncols() == 1 => Some(m[(0, 0)]),
            _ => None,
        }
    }

    /// Convert to a dense matrix (missing sparse entries become zero).
    pub fn to_dense(&self) -> DMatrix<f64> {
        match self {
            Array::Dense(m) => m.clone(),
            Array::Sparse(m) => csc_to_dense(m),
            Array::Scalar(v) => DMatrix::from_element(1, 1, *v),
        }
    }

    /// Create from a vector.
    pub fn from_vec(v: Vec<f64>) -> Self {
        let n = v.len();
        Array::Dense(DMatrix::from_vec(n, 1, v))
    }

    /// Create from a dense matrix.
    pub fn from_matrix(m: DMatrix<f64>) -> Self {
        Array::Dense(m)
    }
}

impl From<f64> for Array {
    fn from(v: f64) -> Self {
        Array::Scalar(v)
    }
}

impl From<Vec<f64>> for Array {
    fn from(v: Vec<f64>) -> Self {
        Array::from_vec(v)
    }
}

impl From<DMatrix<f64>> for Array {
    fn from(m: DMatrix<f64>) -> Self {
        Array::Dense(m)
    }
}

impl From<&DMatrix<f64>> for Array {
    fn from(m: &DMatrix<f64>) -> Self {
        Array::Dense(m.clone())
    }
}

impl From<CscMatrix<f64>> for Array {
    fn from(m: CscMatrix<f64>) -> Self {
        Array::Sparse(m)
    }
}

/// Data for a symbolic leaf.
#[derive(Debug, Clone)]
pub struct SymbolData {
    /// Name used when binding the symbol as a function input.
    pub name: String,
    /// Shape of the symbol.
    pub shape: Shape,
}

/// Operation stored in a node.
#[derive(Debug, Clone)]
pub enum Op {
    // ========== Leaf nodes ==========
    /// A symbolic matrix variable.
    Symbol(SymbolData),
    /// A dense constant.
    Constant(DMatrix<f64>),

    // ========== Linear ==========
    /// Addition: a + b (equal shapes).
    Add(Expr, Expr),
    /// Negation: -a
    Neg(Expr),
    /// Scaling by a real number: c * a
    Scale(f64, Expr),
    /// Transpose.
    Transpose(Expr),

    // ========== Bilinear ==========
    /// Matrix-matrix multiplication.
    MatMul(Expr, Expr),
    /// Kronecker product `a ⊗ b`.
    Kron(Expr, Expr),
    /// `(g, b)` with `g` shaped like `a ⊗ b`: the `a`-shaped result
    /// `r[i, j] = Σ_kl g[i p + k, j q + l] b[k, l]` for `b` of shape `p×q`.
    KronContractLeft(Expr, Expr),
    /// `(g, a)` with `g` shaped like `a ⊗ b`: the `b`-shaped result
    /// `r[k, l] = Σ_ij g[i p + k, j q + l] a[i, j]`.
    KronContractRight(Expr, Expr),

    // ========== Structural ==========
    /// Column-major reshape to the given shape.
    Reshape(Expr, Shape),

    // ========== Linear systems ==========
    /// Solution `x` of `m x = b` for square `m`.
    Solve(Expr, Expr),

    // ========== Checks ==========
    /// Pass `x` through, failing at evaluation unless the scalar condition is exactly 1.
    Assertion(Expr, Expr, String),
}

impl Op {
    /// Operands of this operation, in order.
    pub fn operands(&self) -> Vec<&Expr> {
        match self {
            Op::Symbol(_) | Op::Constant(_) => Vec::new(),
            Op::Neg(a) | Op::Scale(_, a) | Op::Transpose(a) | Op::Reshape(a, _) => vec![a],
            Op::Add(a, b)
            | Op::MatMul(a, b)
            | Op::Kron(a, b)
            | Op::KronContractLeft(a, b)
            | Op::KronContractRight(a, b)
            | Op::Solve(a, b)
            | Op::Assertion(a, b, _) => vec![a, b],
        }
    }

    /// Short name of the operation.
    pub fn name(&self) -> &'static str {
        match self {
            Op::Symbol(_) => "symbol",
            Op::Constant(_) => "constant",
            Op::Add(_, _) => "add",
            Op::Neg(_) => "neg",
            Op::Scale(_, _) => "scale",
            Op::Transpose(_) => "transpose",
            Op::MatMul(_, _) => "mul",
            Op::Kron(_, _) => "kron",
            Op::KronContractLeft(_, _) => "kron_contract_left",
            Op::KronContractRight(_, _) => "kron_contract_right",
            Op::Reshape(_, _) => "reshape",
            Op::Solve(_, _) => "solve",
            Op::Assertion(_, _, _) => "assertion",
        }
    }

    /// Result shape, assuming the operands are compatible.
    ///
    /// Incompatible operands still produce a shape here; they are rejected by
    /// [`Expr::check_operands`] when the graph is bound into a function.
    fn result_shape(&self) -> Shape {
        match self {
            Op::Symbol(s) => s.shape,
            Op::Constant(m) => Shape::matrix(m.nrows(), m.ncols()),
            Op::Add(a, _) | Op::Neg(a) | Op::Scale(_, a) | Op::Assertion(a, _, _) => a.shape(),
            Op::Transpose(a) => a.shape().transpose(),
            Op::MatMul(a, b) => Shape::matrix(a.shape().rows(), b.shape().cols()),
            Op::Kron(a, b) => Shape::matrix(
                a.shape().rows() * b.shape().rows(),
                a.shape().cols() * b.shape().cols(),
            ),
            Op::KronContractLeft(g, f) | Op::KronContractRight(g, f) => Shape::matrix(
                g.shape().rows().checked_div(f.shape().rows()).unwrap_or(0),
                g.shape().cols().checked_div(f.shape().cols()).unwrap_or(0),
            ),
            Op::Reshape(_, shape) => *shape,
            Op::Solve(m, b) => Shape::matrix(m.shape().cols(), b.shape().cols()),
        }
    }
}

#[derive(Debug)]
struct Node {
    id: ExprId,
    shape: Shape,
    op: Op,
}

impl Node {
    fn take_operands(&mut self) -> Vec<Expr> {
        match std::mem::replace(&mut self.op, Op::Constant(DMatrix::zeros(0, 0))) {
            Op::Symbol(_) | Op::Constant(_) => Vec::new(),
            Op::Neg(a) | Op::Scale(_, a) | Op::Transpose(a) | Op::Reshape(a, _) => vec![a],
            Op::Add(a, b)
            | Op::MatMul(a, b)
            | Op::Kron(a, b)
            | Op::KronContractLeft(a, b)
            | Op::KronContractRight(a, b)
            | Op::Solve(a, b)
            | Op::Assertion(a, b, _) => vec![a, b],
        }
    }
}

// Unrolled iterations build very deep chains; drop them without recursion.
impl Drop for Node {
    fn drop(&mut self) {
        let mut stack = self.take_operands();
        while let Some(expr) = stack.pop() {
            if let Ok(mut node) = Arc::try_unwrap(expr.0) {
                stack.extend(node.take_operands());
            }
        }
    }
}

/// Handle to an immutable expression node.
///
/// All expressions are immutable and use `Arc` for efficient sharing.
/// Operations never modify their operands; they return a new node.
#[derive(Clone)]
pub struct Expr(Arc<Node>);

impl Expr {
    /// Create a new node from an operation.
    pub fn from_op(op: Op) -> Expr {
        let shape = op.result_shape();
        Expr(Arc::new(Node {
            id: ExprId::new(),
            shape,
            op,
        }))
    }

    /// Unique identifier of this node.
    pub fn id(&self) -> ExprId {
        self.0.id
    }

    /// Get the shape of the expression.
    pub fn shape(&self) -> Shape {
        self.0.shape
    }

    /// Operation of this node.
    pub fn op(&self) -> &Op {
        &self.0.op
    }

    /// Check if this expression is a symbol.
    pub fn is_symbol(&self) -> bool {
        matches!(self.op(), Op::Symbol(_))
    }

    /// Check if this expression is a constant.
    pub fn is_constant(&self) -> bool {
        matches!(self.op(), Op::Constant(_))
    }

    /// Symbol name, if this is a symbol.
    pub fn name(&self) -> Option<&str> {
        match self.op() {
            Op::Symbol(s) => Some(&s.name),
            _ => None,
        }
    }

    /// Get the constant value if this is a constant expression.
    pub fn constant_value(&self) -> Option<&DMatrix<f64>> {
        match self.op() {
            Op::Constant(m) => Some(m),
            _ => None,
        }
    }

    /// Check whether two handles refer to the same node.
    pub fn is_same(&self, other: &Expr) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Collect all symbols this expression depends on, ordered by creation.
    pub fn symbols(&self) -> Vec<Expr> {
        let mut seen = HashSet::new();
        let mut stack = vec![self.clone()];
        let mut symbols = Vec::new();
        while let Some(e) = stack.pop() {
            if !seen.insert(e.id()) {
                continue;
            }
            if e.is_symbol() {
                symbols.push(e.clone());
            }
            stack.extend(e.op().operands().into_iter().cloned());
        }
        symbols.sort_by_key(|s| s.id());
        symbols
    }

    /// Number of distinct nodes in the graph rooted here.
    pub fn node_count(&self) -> usize {
        let mut seen = HashSet::new();
        let mut stack = vec![self.clone()];
        while let Some(e) = stack.pop() {
            if seen.insert(e.id()) {
                stack.extend(e.op().operands().into_iter().cloned());
            }
        }
        seen.len()
    }

    /// Check that the operands of this node have compatible shapes.
    pub fn check_operands(&self) -> Result<()> {
        match self.op() {
            Op::Add(a, b) if a.shape() != b.shape() => Err(DleError::shape_mismatch(
                format!("{} in addition", a.shape()),
                b.shape(),
            )),
            Op::MatMul(a, b) if a.shape().matmul(&b.shape()).is_none() => {
                Err(DleError::shape_mismatch(
                    format!("{} rows in matrix product with {}", a.shape().cols(), a.shape()),
                    b.shape(),
                ))
            }
            Op::KronContractLeft(g, f) | Op::KronContractRight(g, f)
                if f.shape().size() == 0
                    || g.shape().rows() != f.shape().rows() * self.shape().rows()
                    || g.shape().cols() != f.shape().cols() * self.shape().cols() =>
            {
                Err(DleError::shape_mismatch(
                    format!("Kronecker factor dividing {}", g.shape()),
                    f.shape(),
                ))
            }
            Op::Reshape(x, shape) if x.shape().size() != shape.size() => {
                Err(DleError::shape_mismatch(
                    format!("{} elements to reshape", shape.size()),
                    x.shape(),
                ))
            }
            Op::Solve(m, b) if !m.shape().is_square() || m.shape().rows() != b.shape().rows() => {
                Err(DleError::shape_mismatch(
                    format!("square system matrix with {} rows", b.shape().rows()),
                    m.shape(),
                ))
            }
            Op::Assertion(_, cond, _) if !cond.shape().is_scalar() => Err(
                DleError::shape_mismatch("scalar assertion condition", cond.shape()),
            ),
            _ => Ok(()),
        }
    }
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.op() {
            Op::Symbol(s) => write!(f, "{}#{}[{}]", s.name, self.id().raw(), self.shape()),
            op => write!(f, "{}#{}[{}]", op.name(), self.id().raw(), self.shape()),
        }
    }
}

// Convenient From implementations for automatic conversion
impl From<f64> for Expr {
    fn from(value: f64) -> Self {
        crate::expr::constant(value)
    }
}

impl From<DMatrix<f64>> for Expr {
    fn from(value: DMatrix<f64>) -> Self {
        crate::expr::constant_dmatrix(value)
    }
}

impl From<&Expr> for Expr {
    fn from(expr: &Expr) -> Self {
        expr.clone()
    }
}
