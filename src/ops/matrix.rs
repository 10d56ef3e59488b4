//! Matrix operations: products, Kronecker algebra, linear solves and checks.

use nalgebra::DMatrix;

use crate::expr::{constant_dmatrix, zeros, Expr, Op, Shape};

/// Matrix-matrix multiplication.
pub fn matmul(a: &Expr, b: &Expr) -> Expr {
    Expr::from_op(Op::MatMul(a.clone(), b.clone()))
}

/// Transpose an expression.
pub fn transpose(expr: &Expr) -> Expr {
    Expr::from_op(Op::Transpose(expr.clone()))
}

/// Triple product `a * b * c`, associated as `a * (b * c)`.
pub fn mul3(a: &Expr, b: &Expr, c: &Expr) -> Expr {
    matmul(a, &matmul(b, c))
}

/// Congruence transform `a * x * a'`.
pub fn congruence(a: &Expr, x: &Expr) -> Expr {
    mul3(a, x, &transpose(a))
}

/// Symmetric part `(x + x') / 2`.
pub fn symmetrize(x: &Expr) -> Expr {
    (x + transpose(x)) / 2.0
}

/// Kronecker product `a ⊗ b`.
pub fn kron(a: &Expr, b: &Expr) -> Expr {
    Expr::from_op(Op::Kron(a.clone(), b.clone()))
}

/// Contract the right factor out of a Kronecker-shaped `g`.
///
/// With `b` of shape `p x q`, `r[i, j] = sum_kl g[i p + k, j q + l] b[k, l]`.
/// This is the adjoint of `a -> kron(a, b)`.
pub fn kron_contract_left(g: &Expr, b: &Expr) -> Expr {
    Expr::from_op(Op::KronContractLeft(g.clone(), b.clone()))
}

/// Contract the left factor out of a Kronecker-shaped `g`.
///
/// With `a` of shape `m x n`, `r[k, l] = sum_ij g[i p + k, j q + l] a[i, j]`.
/// This is the adjoint of `b -> kron(a, b)`.
pub fn kron_contract_right(g: &Expr, a: &Expr) -> Expr {
    Expr::from_op(Op::KronContractRight(g.clone(), a.clone()))
}

/// Reinterpret `x` with a new shape of the same size, in column-major order.
pub fn reshape(x: &Expr, shape: impl Into<Shape>) -> Expr {
    let shape = shape.into();
    if shape == x.shape() {
        return x.clone();
    }
    Expr::from_op(Op::Reshape(x.clone(), shape))
}

/// Stack the columns of `x` into a single column.
pub fn vectorize(x: &Expr) -> Expr {
    reshape(x, Shape::vector(x.shape().size()))
}

/// Solution `x` of the linear system `m x = b`.
pub fn solve(m: &Expr, b: &Expr) -> Expr {
    Expr::from_op(Op::Solve(m.clone(), b.clone()))
}

/// Split the columns of `x` into consecutive blocks of the given widths.
///
/// Each block is `x * s` for a constant column selector `s`.
pub fn horzsplit(x: &Expr, widths: &[usize]) -> Vec<Expr> {
    let cols = x.shape().cols();
    let mut offset = 0;
    widths
        .iter()
        .map(|&w| {
            let selector =
                DMatrix::from_fn(cols, w, |i, j| if i == offset + j { 1.0 } else { 0.0 });
            offset += w;
            matmul(x, &constant_dmatrix(selector))
        })
        .collect()
}

/// Block-diagonal concatenation of `blocks`.
pub fn diagcat(blocks: &[Expr]) -> Expr {
    match blocks {
        [] => zeros((0, 0)),
        [single] => single.clone(),
        _ => {
            let rows: usize = blocks.iter().map(|b| b.shape().rows()).sum();
            let cols: usize = blocks.iter().map(|b| b.shape().cols()).sum();
            let (mut r0, mut c0) = (0, 0);
            let mut terms = blocks.iter().map(|b| {
                let shape = b.shape();
                let left = DMatrix::from_fn(rows, shape.rows(), |i, j| {
                    if i == r0 + j { 1.0 } else { 0.0 }
                });
                let right = DMatrix::from_fn(shape.cols(), cols, |i, j| {
                    if j == c0 + i { 1.0 } else { 0.0 }
                });
                r0 += shape.rows();
                c0 += shape.cols();
                mul3(&constant_dmatrix(left), b, &constant_dmatrix(right))
            });
            let first = terms.next().unwrap_or_else(|| zeros((rows, cols)));
            terms.fold(first, |acc, term| acc + term)
        }
    }
}

/// Attach a runtime check to `x`.
///
/// The result evaluates to `x`. Evaluation fails with `message` unless the
/// scalar `condition` equals exactly 1. Derivatives pass straight through to `x`.
pub fn attach_assert(x: &Expr, condition: &Expr, message: impl Into<String>) -> Expr {
    Expr::from_op(Op::Assertion(x.clone(), condition.clone(), message.into()))
}

impl Expr {
    /// Transpose of this expression.
    pub fn t(&self) -> Expr {
        transpose(self)
    }

    /// Matrix product `self * rhs`.
    pub fn matmul(&self, rhs: &Expr) -> Expr {
        matmul(self, rhs)
    }

    /// Kronecker product `self ⊗ rhs`.
    pub fn kron(&self, rhs: &Expr) -> Expr {
        kron(self, rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{scalar_sym, sym, Shape};

    #[test]
    fn test_matmul_shape() {
        let a = sym("a", (3, 4));
        let b = sym("b", (4, 2));
        assert_eq!(matmul(&a, &b).shape(), Shape::matrix(3, 2));
        assert_eq!(a.matmul(&b).shape(), Shape::matrix(3, 2));
    }

    #[test]
    fn test_transpose() {
        let x = sym("x", (3, 4));
        assert_eq!(transpose(&x).shape(), Shape::matrix(4, 3));
        assert_eq!(x.t().t().shape(), Shape::matrix(3, 4));
    }

    #[test]
    fn test_congruence_shape() {
        let a = sym("a", (3, 2));
        let x = sym("x", (2, 2));
        assert_eq!(congruence(&a, &x).shape(), Shape::square(3));
    }

    #[test]
    fn test_symmetrize_reuses_operand() {
        let v = sym("v", (2, 2));
        let s = symmetrize(&v);
        assert_eq!(s.shape(), Shape::square(2));
        // v, v', v + v', (v + v') / 2
        assert_eq!(s.node_count(), 4);
    }

    #[test]
    fn test_kron_and_reshape() {
        let a = sym("a", (2, 3));
        let b = sym("b", (4, 1));
        let k = kron(&a, &b);
        assert_eq!(k.shape(), Shape::matrix(8, 3));
        assert_eq!(kron_contract_left(&k, &b).shape(), a.shape());
        assert_eq!(kron_contract_right(&k, &a).shape(), b.shape());
        assert_eq!(vectorize(&a).shape(), Shape::vector(6));
        // same shape is a no-op
        assert!(reshape(&a, (2, 3)).is_same(&a));
    }

    #[test]
    fn test_split_and_diagcat_shapes() {
        let x = sym("x", (3, 5));
        let parts = horzsplit(&x, &[2, 3]);
        assert_eq!(parts[0].shape(), Shape::matrix(3, 2));
        assert_eq!(parts[1].shape(), Shape::matrix(3, 3));

        let d = diagcat(&[sym("p", (2, 2)), sym("q", (1, 3))]);
        assert_eq!(d.shape(), Shape::matrix(3, 5));
        let single = sym("s", (2, 2));
        assert!(diagcat(std::slice::from_ref(&single)).is_same(&single));
    }

    #[test]
    fn test_assertion_keeps_shape() {
        let x = sym("x", (2, 3));
        let c = scalar_sym("c");
        let y = attach_assert(&x, &c, "c must hold");
        assert_eq!(y.shape(), x.shape());
        assert!(matches!(y.op(), Op::Assertion(_, _, m) if m == "c must hold"));
    }
}
