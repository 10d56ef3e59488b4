//! Operator overloading for `Expr`.
//!
//! Every operator returns a new node that references its operands; the
//! operands themselves are never modified.

use std::ops::{Add, Div, Mul, Neg, Sub};

use crate::expr::{Expr, Op};

// ============================================================================
// Negation
// ============================================================================

impl Neg for Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        Expr::from_op(Op::Neg(self))
    }
}

impl Neg for &Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        Expr::from_op(Op::Neg(self.clone()))
    }
}

// ============================================================================
// Addition and subtraction
// ============================================================================

impl Add for Expr {
    type Output = Expr;

    fn add(self, rhs: Expr) -> Expr {
        Expr::from_op(Op::Add(self, rhs))
    }
}

impl Add for &Expr {
    type Output = Expr;

    fn add(self, rhs: &Expr) -> Expr {
        Expr::from_op(Op::Add(self.clone(), rhs.clone()))
    }
}

impl Add<&Expr> for Expr {
    type Output = Expr;

    fn add(self, rhs: &Expr) -> Expr {
        Expr::from_op(Op::Add(self, rhs.clone()))
    }
}

impl Add<Expr> for &Expr {
    type Output = Expr;

    fn add(self, rhs: Expr) -> Expr {
        Expr::from_op(Op::Add(self.clone(), rhs))
    }
}

impl Sub for Expr {
    type Output = Expr;

    fn sub(self, rhs: Expr) -> Expr {
        self + (-rhs)
    }
}

impl Sub for &Expr {
    type Output = Expr;

    fn sub(self, rhs: &Expr) -> Expr {
        self + (-rhs)
    }
}

impl Sub<&Expr> for Expr {
    type Output = Expr;

    fn sub(self, rhs: &Expr) -> Expr {
        self + (-rhs)
    }
}

impl Sub<Expr> for &Expr {
    type Output = Expr;

    fn sub(self, rhs: Expr) -> Expr {
        self + (-rhs)
    }
}

// ============================================================================
// Scaling by a real number
// ============================================================================

impl Mul<f64> for Expr {
    type Output = Expr;

    fn mul(self, rhs: f64) -> Expr {
        Expr::from_op(Op::Scale(rhs, self))
    }
}

impl Mul<f64> for &Expr {
    type Output = Expr;

    fn mul(self, rhs: f64) -> Expr {
        Expr::from_op(Op::Scale(rhs, self.clone()))
    }
}

impl Mul<Expr> for f64 {
    type Output = Expr;

    fn mul(self, rhs: Expr) -> Expr {
        Expr::from_op(Op::Scale(self, rhs))
    }
}

impl Mul<&Expr> for f64 {
    type Output = Expr;

    fn mul(self, rhs: &Expr) -> Expr {
        Expr::from_op(Op::Scale(self, rhs.clone()))
    }
}

impl Div<f64> for Expr {
    type Output = Expr;

    fn div(self, rhs: f64) -> Expr {
        Expr::from_op(Op::Scale(1.0 / rhs, self))
    }
}

impl Div<f64> for &Expr {
    type Output = Expr;

    fn div(self, rhs: f64) -> Expr {
        Expr::from_op(Op::Scale(1.0 / rhs, self.clone()))
    }
}

#[cfg(test)]
mod tests {
    use crate::expr::{sym, Op, Shape};

    #[test]
    fn test_add() {
        let x = sym("x", (2, 3));
        let y = sym("y", (2, 3));
        let z = &x + &y;
        assert_eq!(z.shape(), Shape::matrix(2, 3));
        assert!(matches!(z.op(), Op::Add(a, b) if a.is_same(&x) && b.is_same(&y)));
    }

    #[test]
    fn test_sub_is_add_of_neg() {
        let x = sym("x", 4);
        let y = sym("y", 4);
        let z = &x - &y;
        match z.op() {
            Op::Add(a, b) => {
                assert!(a.is_same(&x));
                assert!(matches!(b.op(), Op::Neg(inner) if inner.is_same(&y)));
            }
            other => panic!("Expected Add, got {:?}", other),
        }
    }

    #[test]
    fn test_scale_and_div() {
        let x = sym("x", (2, 2));
        assert!(matches!((2.0 * &x).op(), Op::Scale(c, _) if *c == 2.0));
        assert!(matches!((&x * 3.0).op(), Op::Scale(c, _) if *c == 3.0));
        assert!(matches!((&x / 2.0).op(), Op::Scale(c, _) if *c == 0.5));
    }

    #[test]
    fn test_operators_do_not_mutate_operands() {
        let x = sym("x", (2, 2));
        let before = x.node_count();
        let _ = &x + &x;
        let _ = -&x;
        assert_eq!(x.node_count(), before);
    }
}
