//! Forward- and reverse-mode derivative generation.
//!
//! Derivatives are built by transforming the expression graph: each rule emits
//! new nodes in terms of the primal nodes, so a derivative function is itself
//! an ordinary [`Function`] and can be differentiated again.
//!
//! Structural zeros are tracked as `None` and only materialized when a seed
//! has no path to an output.

use std::collections::HashMap;

use tracing::debug;

use super::graph::topological_order;
use super::Function;
use crate::error::Result;
use crate::expr::{sym, zeros, Expr, ExprId, Op};
use crate::ops::{kron, kron_contract_left, kron_contract_right, matmul, reshape, solve};

impl Function {
    /// Generate a function computing `nfwd` forward directional derivatives.
    ///
    /// Inputs: the original inputs, then one seed `fwd{d}_{x}` per direction `d`
    /// and input `x`. Outputs: the original outputs, then the sensitivities
    /// `fwd{d}_{y}` per direction `d` and output `y`.
    pub fn der_forward(&self, nfwd: usize) -> Result<Function> {
        let order = topological_order(&self.output_exprs());
        let mut inputs = self.inputs().to_vec();
        let mut outputs = self.outputs().to_vec();

        for d in 0..nfwd {
            let seeds = seed_symbols(self.inputs(), "fwd", d);
            let seed_of: HashMap<ExprId, Expr> = self
                .inputs()
                .iter()
                .zip(&seeds)
                .map(|((_, x), (_, s))| (x.id(), s.clone()))
                .collect();

            let tangents = forward_sweep(&order, &seed_of);
            for (name, y) in self.outputs() {
                let sens = tangents
                    .get(&y.id())
                    .cloned()
                    .unwrap_or_else(|| zeros(y.shape()));
                outputs.push((format!("fwd{}_{}", d, name), sens));
            }
            inputs.extend(seeds);
        }

        debug!(function = %self.name(), nfwd, nodes = order.len(), "forward derivative");
        Function::new(format!("fwd{}_{}", nfwd, self.name()), inputs, outputs)
    }

    /// Generate a function computing `nadj` adjoint (reverse) derivatives.
    ///
    /// Inputs: the original inputs, then one seed `adj{d}_{y}` per direction `d`
    /// and output `y`. Outputs: the original outputs, then the adjoint
    /// sensitivities `adj{d}_{x}` per direction `d` and input `x`.
    pub fn der_reverse(&self, nadj: usize) -> Result<Function> {
        let order = topological_order(&self.output_exprs());
        let mut inputs = self.inputs().to_vec();
        let mut outputs = self.outputs().to_vec();

        for d in 0..nadj {
            let seeds = seed_symbols(self.outputs(), "adj", d);
            let mut adjoints: HashMap<ExprId, Expr> = HashMap::new();
            for ((_, y), (_, seed)) in self.outputs().iter().zip(&seeds) {
                accumulate(&mut adjoints, y, seed.clone());
            }

            reverse_sweep(&order, &mut adjoints);
            for (name, x) in self.inputs() {
                let sens = adjoints
                    .get(&x.id())
                    .cloned()
                    .unwrap_or_else(|| zeros(x.shape()));
                outputs.push((format!("adj{}_{}", d, name), sens));
            }
            inputs.extend(seeds);
        }

        debug!(function = %self.name(), nadj, nodes = order.len(), "reverse derivative");
        Function::new(format!("adj{}_{}", nadj, self.name()), inputs, outputs)
    }

    fn output_exprs(&self) -> Vec<Expr> {
        self.outputs().iter().map(|(_, e)| e.clone()).collect()
    }
}

/// Fresh seed symbols shaped like `like`, named `{prefix}{d}_{name}`.
fn seed_symbols(like: &[(String, Expr)], prefix: &str, d: usize) -> Vec<(String, Expr)> {
    like.iter()
        .map(|(name, e)| {
            let seed_name = format!("{}{}_{}", prefix, d, name);
            (seed_name.clone(), sym(seed_name, e.shape()))
        })
        .collect()
}

fn add_opt(a: Option<Expr>, b: Option<Expr>) -> Option<Expr> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a + b),
        (a, None) => a,
        (None, b) => b,
    }
}

/// Propagate tangents from seeded symbols through `order` (operands first).
fn forward_sweep(order: &[Expr], seeds: &HashMap<ExprId, Expr>) -> HashMap<ExprId, Expr> {
    let mut dot: HashMap<ExprId, Expr> = HashMap::new();

    for node in order {
        let t = |e: &Expr| dot.get(&e.id()).cloned();
        let tangent = match node.op() {
            Op::Symbol(_) => seeds.get(&node.id()).cloned(),
            Op::Constant(_) => None,
            Op::Add(a, b) => add_opt(t(a), t(b)),
            Op::Neg(a) => t(a).map(|da| -da),
            Op::Scale(c, a) => t(a).map(|da| *c * da),
            Op::Transpose(a) => t(a).map(|da| da.t()),
            Op::MatMul(a, b) => add_opt(
                t(a).map(|da| matmul(&da, b)),
                t(b).map(|db| matmul(a, &db)),
            ),
            Op::Kron(a, b) => add_opt(t(a).map(|da| kron(&da, b)), t(b).map(|db| kron(a, &db))),
            Op::KronContractLeft(g, b) => add_opt(
                t(g).map(|dg| kron_contract_left(&dg, b)),
                t(b).map(|db| kron_contract_left(g, &db)),
            ),
            Op::KronContractRight(g, a) => add_opt(
                t(g).map(|dg| kron_contract_right(&dg, a)),
                t(a).map(|da| kron_contract_right(g, &da)),
            ),
            Op::Reshape(x, shape) => t(x).map(|dx| reshape(&dx, *shape)),
            // m x = b  =>  m dx = db - dm x
            Op::Solve(m, b) => add_opt(t(b), t(m).map(|dm| -matmul(&dm, node)))
                .map(|rhs| solve(m, &rhs)),
            // the check is not part of the derivative
            Op::Assertion(x, _, _) => t(x),
        };
        if let Some(tangent) = tangent {
            dot.insert(node.id(), tangent);
        }
    }

    dot
}

fn accumulate(adjoints: &mut HashMap<ExprId, Expr>, node: &Expr, contribution: Expr) {
    let total = match adjoints.remove(&node.id()) {
        Some(prev) => prev + contribution,
        None => contribution,
    };
    adjoints.insert(node.id(), total);
}

/// Pull adjoints back through `order` from the outputs to the symbols.
fn reverse_sweep(order: &[Expr], adjoints: &mut HashMap<ExprId, Expr>) {
    for node in order.iter().rev() {
        let Some(bar) = adjoints.get(&node.id()).cloned() else {
            continue;
        };
        match node.op() {
            Op::Symbol(_) | Op::Constant(_) => {}
            Op::Add(a, b) => {
                accumulate(adjoints, a, bar.clone());
                accumulate(adjoints, b, bar);
            }
            Op::Neg(a) => accumulate(adjoints, a, -bar),
            Op::Scale(c, a) => accumulate(adjoints, a, *c * bar),
            Op::Transpose(a) => accumulate(adjoints, a, bar.t()),
            Op::MatMul(a, b) => {
                accumulate(adjoints, a, matmul(&bar, &b.t()));
                accumulate(adjoints, b, matmul(&a.t(), &bar));
            }
            Op::Kron(a, b) => {
                accumulate(adjoints, a, kron_contract_left(&bar, b));
                accumulate(adjoints, b, kron_contract_right(&bar, a));
            }
            Op::KronContractLeft(g, b) => {
                accumulate(adjoints, g, kron(&bar, b));
                accumulate(adjoints, b, kron_contract_right(g, &bar));
            }
            Op::KronContractRight(g, a) => {
                accumulate(adjoints, g, kron(a, &bar));
                accumulate(adjoints, a, kron_contract_left(g, &bar));
            }
            Op::Reshape(x, _) => accumulate(adjoints, x, reshape(&bar, x.shape())),
            Op::Solve(m, b) => {
                let b_bar = solve(&m.t(), &bar);
                accumulate(adjoints, m, -matmul(&b_bar, &node.t()));
                accumulate(adjoints, b, b_bar);
            }
            Op::Assertion(x, _, _) => accumulate(adjoints, x, bar),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{constant_dmatrix, Array};
    use approx::assert_relative_eq;
    use nalgebra::DMatrix;

    fn m(rows: usize, cols: usize, data: &[f64]) -> DMatrix<f64> {
        DMatrix::from_row_slice(rows, cols, data)
    }

    /// y = a * b' + 2 a
    fn bilinear() -> Function {
        let a = sym("a", (2, 3));
        let b = sym("b", (2, 3));
        let y = matmul(&a, &b.t());
        let y = &y + &(2.0 * &matmul(&a, &constant_dmatrix(DMatrix::from_element(3, 2, 0.5))));
        Function::new("bilinear", [("a", a), ("b", b)], [("y", y)]).unwrap()
    }

    #[test]
    fn test_forward_layout() {
        let df = bilinear().der_forward(2).unwrap();
        assert_eq!(df.name(), "fwd2_bilinear");
        assert_eq!(
            df.input_names(),
            vec!["a", "b", "fwd0_a", "fwd0_b", "fwd1_a", "fwd1_b"]
        );
        assert_eq!(df.output_names(), vec!["y", "fwd0_y", "fwd1_y"]);
    }

    #[test]
    fn test_reverse_layout() {
        let df = bilinear().der_reverse(1).unwrap();
        assert_eq!(df.name(), "adj1_bilinear");
        assert_eq!(df.input_names(), vec!["a", "b", "adj0_y"]);
        assert_eq!(df.output_names(), vec!["y", "adj0_a", "adj0_b"]);
    }

    #[test]
    fn test_forward_matches_product_rule() {
        let f = bilinear();
        let df = f.der_forward(1).unwrap();
        let a = m(2, 3, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let b = m(2, 3, &[0.5, -1.0, 2.0, 1.0, 0.0, -3.0]);
        let da = m(2, 3, &[1.0, 0.0, 0.0, 0.0, 0.0, 1.0]);
        let db = m(2, 3, &[0.0, 1.0, 0.0, 2.0, 0.0, 0.0]);

        let out = df
            .eval(&[a.clone().into(), b.clone().into(), da.clone().into(), db.clone().into()])
            .unwrap();
        let c = DMatrix::from_element(3, 2, 0.5);
        let expected = &da * b.transpose() + &a * db.transpose() + 2.0 * &da * &c;
        assert_relative_eq!(out[1], expected, epsilon = 1e-12);
        assert_relative_eq!(out[0], f.eval(&[a.into(), b.into()]).unwrap()[0], epsilon = 1e-12);
    }

    #[test]
    fn test_reverse_is_transpose_of_forward() {
        let f = bilinear();
        let fwd = f.der_forward(1).unwrap();
        let adj = f.der_reverse(1).unwrap();
        let a = m(2, 3, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let b = m(2, 3, &[0.5, -1.0, 2.0, 1.0, 0.0, -3.0]);
        let da = m(2, 3, &[0.3, 0.1, -0.2, 0.0, 1.0, 0.4]);
        let db = m(2, 3, &[0.0, 1.0, 0.5, 2.0, -1.0, 0.0]);
        let w = m(2, 2, &[1.0, -2.0, 0.5, 3.0]);

        let jv = fwd
            .eval(&[a.clone().into(), b.clone().into(), da.clone().into(), db.clone().into()])
            .unwrap();
        let vj = adj.eval(&[a.into(), b.into(), w.clone().into()]).unwrap();

        let lhs = w.dot(&jv[1]);
        let rhs = vj[1].dot(&da) + vj[2].dot(&db);
        assert_relative_eq!(lhs, rhs, epsilon = 1e-10);
    }

    #[test]
    fn test_unused_input_gets_zero_sensitivity() {
        let a = sym("a", (2, 2));
        let unused = sym("u", (3, 1));
        let f = Function::new("f", [("a", a.clone()), ("u", unused)], [("y", a.t())]).unwrap();

        let fwd = f.der_forward(1).unwrap();
        let args: Vec<Array> = vec![
            DMatrix::<f64>::identity(2, 2).into(),
            DMatrix::<f64>::zeros(3, 1).into(),
            DMatrix::<f64>::zeros(2, 2).into(),
            DMatrix::<f64>::from_element(3, 1, 1.0).into(),
        ];
        assert_eq!(fwd.eval(&args).unwrap()[1], DMatrix::zeros(2, 2));

        let adj = f.der_reverse(1).unwrap();
        let out = adj
            .eval(&[
                DMatrix::<f64>::identity(2, 2).into(),
                DMatrix::<f64>::zeros(3, 1).into(),
                m(2, 2, &[1.0, 2.0, 3.0, 4.0]).into(),
            ])
            .unwrap();
        assert_eq!(out[1], m(2, 2, &[1.0, 3.0, 2.0, 4.0]));
        assert_eq!(out[2], DMatrix::zeros(3, 1));
    }

    #[test]
    fn test_shared_operand_accumulates() {
        // y = a * a, dy/da . e = e a + a e
        let a = sym("a", (1, 1));
        let f = Function::new("sq", [("a", a.clone())], [("y", matmul(&a, &a))]).unwrap();
        let adj = f.der_reverse(1).unwrap();
        let out = adj.eval(&[Array::Scalar(3.0), Array::Scalar(1.0)]).unwrap();
        assert_relative_eq!(out[1][(0, 0)], 6.0);
    }

    #[test]
    fn test_second_order() {
        // y = a^3 for a scalar: d2y/da2 = 6a
        let a = sym("a", (1, 1));
        let y = matmul(&a, &matmul(&a, &a));
        let f = Function::new("cube", [("a", a)], [("y", y)]).unwrap();
        let fwd = f.der_forward(1).unwrap();
        let fwd_adj = fwd.der_reverse(1).unwrap();
        // inputs: a, fwd0_a, adj0_y, adj0_fwd0_y
        let out = fwd_adj
            .eval(&[
                Array::Scalar(2.0),
                Array::Scalar(1.0),
                Array::Scalar(0.0),
                Array::Scalar(1.0),
            ])
            .unwrap();
        // outputs: y, fwd0_y, adj0_a, adj0_fwd0_a
        assert_relative_eq!(out[1][(0, 0)], 12.0);
        assert_relative_eq!(out[2][(0, 0)], 12.0);
        assert_relative_eq!(out[3][(0, 0)], 12.0);
    }

    /// p = reshape(solve(I - a ⊗ a, vec(v)))
    fn kronecker_lyapunov() -> Function {
        let a = sym("a", (2, 2));
        let v = sym("v", (2, 2));
        let system = crate::expr::eye(4) - kron(&a, &a);
        let p = reshape(&solve(&system, &crate::ops::vectorize(&v)), (2, 2));
        Function::new("kl", [("a", a), ("v", v)], [("p", p)]).unwrap()
    }

    fn lyapunov_point() -> (DMatrix<f64>, DMatrix<f64>, DMatrix<f64>, DMatrix<f64>) {
        (
            m(2, 2, &[0.5, 0.2, -0.1, 0.3]),
            m(2, 2, &[1.0, 0.5, -0.25, 2.0]),
            m(2, 2, &[0.1, -0.3, 0.2, 0.4]),
            m(2, 2, &[0.0, 1.0, 0.5, -1.0]),
        )
    }

    #[test]
    fn test_solve_forward_matches_finite_differences() {
        let f = kronecker_lyapunov();
        let (a, v, da, dv) = lyapunov_point();
        let out = f
            .der_forward(1)
            .unwrap()
            .eval(&[(&a).into(), (&v).into(), (&da).into(), (&dv).into()])
            .unwrap();

        let h = 1e-6;
        let plus = f.eval(&[(&a + &da * h).into(), (&v + &dv * h).into()]).unwrap();
        let minus = f.eval(&[(&a - &da * h).into(), (&v - &dv * h).into()]).unwrap();
        let fd = (&plus[0] - &minus[0]) / (2.0 * h);
        assert_relative_eq!(out[1], fd, epsilon = 1e-7, max_relative = 1e-7);

        // the primal satisfies p = a p a' + v
        let p = &out[0];
        assert_relative_eq!(*p, &a * p * a.transpose() + &v, epsilon = 1e-12);
    }

    #[test]
    fn test_solve_reverse_is_adjoint_of_forward() {
        let f = kronecker_lyapunov();
        let (a, v, da, dv) = lyapunov_point();
        let w = m(2, 2, &[1.0, -2.0, 0.5, 3.0]);

        let jv = f
            .der_forward(1)
            .unwrap()
            .eval(&[(&a).into(), (&v).into(), (&da).into(), (&dv).into()])
            .unwrap();
        let vj = f
            .der_reverse(1)
            .unwrap()
            .eval(&[(&a).into(), (&v).into(), (&w).into()])
            .unwrap();
        let lhs = w.dot(&jv[1]);
        let rhs = vj[1].dot(&da) + vj[2].dot(&dv);
        assert_relative_eq!(lhs, rhs, epsilon = 1e-10, max_relative = 1e-10);
    }

    #[test]
    fn test_kron_contractions_are_adjoint() {
        let g = sym("g", (4, 6));
        let a = sym("a", (2, 3));
        let b = sym("b", (2, 2));
        let f = Function::new(
            "contract",
            [("g", g.clone()), ("a", a.clone()), ("b", b.clone())],
            [
                ("l", kron_contract_left(&g, &b)),
                ("r", kron_contract_right(&g, &a)),
            ],
        )
        .unwrap();

        let gv = DMatrix::from_fn(4, 6, |i, j| (i as f64) - 0.5 * (j as f64));
        let av = m(2, 3, &[1.0, -1.0, 0.5, 2.0, 0.0, 1.5]);
        let bv = m(2, 2, &[0.5, 1.0, -2.0, 0.25]);
        let dg = DMatrix::from_fn(4, 6, |i, j| ((i + 2 * j) % 3) as f64 - 1.0);
        let da = m(2, 3, &[0.0, 1.0, 0.0, -1.0, 2.0, 0.5]);
        let db = m(2, 2, &[1.0, 0.0, 0.5, -0.5]);
        let wl = m(2, 3, &[1.0, 2.0, 3.0, -1.0, 0.0, 1.0]);
        let wr = m(2, 2, &[0.5, -1.0, 1.0, 2.0]);

        let jv = f
            .der_forward(1)
            .unwrap()
            .eval(&[
                (&gv).into(),
                (&av).into(),
                (&bv).into(),
                (&dg).into(),
                (&da).into(),
                (&db).into(),
            ])
            .unwrap();
        let vj = f
            .der_reverse(1)
            .unwrap()
            .eval(&[(&gv).into(), (&av).into(), (&bv).into(), (&wl).into(), (&wr).into()])
            .unwrap();

        // outputs: l, r, fwd0_l, fwd0_r / l, r, adj0_g, adj0_a, adj0_b
        let lhs = wl.dot(&jv[2]) + wr.dot(&jv[3]);
        let rhs = vj[2].dot(&dg) + vj[3].dot(&da) + vj[4].dot(&db);
        assert_relative_eq!(lhs, rhs, epsilon = 1e-10, max_relative = 1e-10);
    }

    #[test]
    fn test_kron_second_order() {
        // forward derivative of the reverse function goes through the contractions
        let f = kronecker_lyapunov();
        let (a, v, da, _) = lyapunov_point();
        let w = m(2, 2, &[1.0, -2.0, 0.5, 3.0]);
        let adj = f.der_reverse(1).unwrap();
        let fwd_adj = adj.der_forward(1).unwrap();

        let zero = DMatrix::<f64>::zeros(2, 2);
        let out = fwd_adj
            .eval(&[
                (&a).into(),
                (&v).into(),
                (&w).into(),
                (&da).into(),
                (&zero).into(),
                (&zero).into(),
            ])
            .unwrap();
        // outputs: p, adj0_a, adj0_v, fwd0_p, fwd0_adj0_a, fwd0_adj0_v
        let h = 1e-6;
        let at = |x: DMatrix<f64>| adj.eval(&[x.into(), (&v).into(), (&w).into()]).unwrap();
        let fd = (&at(&a + &da * h)[1] - &at(&a - &da * h)[1]) / (2.0 * h);
        assert_relative_eq!(out[4], fd, epsilon = 1e-6, max_relative = 1e-6);
    }
}
