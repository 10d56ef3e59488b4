//! Linear evaluation tape compiled from an expression graph.
//!
//! The graph is flattened once, in topological order, into a list of
//! instructions over numbered slots. Evaluation replays the list on fresh
//! numeric inputs without revisiting the graph.

use std::collections::HashMap;

use nalgebra::DMatrix;

use super::graph::topological_order;
use crate::error::{DleError, Result};
use crate::expr::{Expr, ExprId, Op};

/// One tape instruction. Operands refer to earlier slots.
#[derive(Debug, Clone)]
enum Instr {
    Input(usize),
    Const(DMatrix<f64>),
    Add(usize, usize),
    Neg(usize),
    Scale(f64, usize),
    Transpose(usize),
    MatMul(usize, usize),
    Kron(usize, usize),
    KronContractLeft(usize, usize),
    KronContractRight(usize, usize),
    Reshape(usize, usize, usize),
    Solve(usize, usize),
    Assert(usize, usize, String),
}

/// Compiled evaluation tape.
#[derive(Debug, Clone)]
pub struct Tape {
    instrs: Vec<Instr>,
    outputs: Vec<usize>,
}

impl Tape {
    /// Compile the graph reachable from `outputs`.
    ///
    /// `inputs` maps the id of each input symbol to its position. Any other
    /// symbol reachable from the outputs is reported as a free symbol, and every
    /// node's operand shapes are checked.
    pub fn compile(inputs: &HashMap<ExprId, usize>, outputs: &[Expr]) -> Result<Tape> {
        let order = topological_order(outputs);
        let mut slot_of: HashMap<ExprId, usize> = HashMap::with_capacity(order.len());
        let mut instrs = Vec::with_capacity(order.len());

        for node in &order {
            node.check_operands()?;
            let slot = |e: &Expr| slot_of[&e.id()];
            let instr = match node.op() {
                Op::Symbol(s) => match inputs.get(&node.id()) {
                    Some(&i) => Instr::Input(i),
                    None => return Err(DleError::FreeSymbol(s.name.clone())),
                },
                Op::Constant(m) => Instr::Const(m.clone()),
                Op::Add(a, b) => Instr::Add(slot(a), slot(b)),
                Op::Neg(a) => Instr::Neg(slot(a)),
                Op::Scale(c, a) => Instr::Scale(*c, slot(a)),
                Op::Transpose(a) => Instr::Transpose(slot(a)),
                Op::MatMul(a, b) => Instr::MatMul(slot(a), slot(b)),
                Op::Kron(a, b) => Instr::Kron(slot(a), slot(b)),
                Op::KronContractLeft(g, b) => Instr::KronContractLeft(slot(g), slot(b)),
                Op::KronContractRight(g, a) => Instr::KronContractRight(slot(g), slot(a)),
                Op::Reshape(x, shape) => Instr::Reshape(slot(x), shape.rows(), shape.cols()),
                Op::Solve(m, b) => Instr::Solve(slot(m), slot(b)),
                Op::Assertion(x, cond, msg) => Instr::Assert(slot(x), slot(cond), msg.clone()),
            };
            slot_of.insert(node.id(), instrs.len());
            instrs.push(instr);
        }

        let outputs = outputs.iter().map(|e| slot_of[&e.id()]).collect();
        Ok(Tape { instrs, outputs })
    }

    /// Number of instructions.
    pub fn len(&self) -> usize {
        self.instrs.len()
    }

    /// Whether the tape has no instructions.
    pub fn is_empty(&self) -> bool {
        self.instrs.is_empty()
    }

    /// Evaluate on dense inputs whose shapes have already been checked.
    pub fn eval(&self, inputs: &[DMatrix<f64>]) -> Result<Vec<DMatrix<f64>>> {
        let mut work: Vec<DMatrix<f64>> = Vec::with_capacity(self.instrs.len());

        for instr in &self.instrs {
            let value = match instr {
                Instr::Input(i) => inputs[*i].clone(),
                Instr::Const(m) => m.clone(),
                Instr::Add(a, b) => &work[*a] + &work[*b],
                Instr::Neg(a) => -&work[*a],
                Instr::Scale(c, a) => &work[*a] * *c,
                Instr::Transpose(a) => work[*a].transpose(),
                Instr::MatMul(a, b) => &work[*a] * &work[*b],
                Instr::Kron(a, b) => work[*a].kronecker(&work[*b]),
                Instr::KronContractLeft(g, b) => kron_contract_left(&work[*g], &work[*b]),
                Instr::KronContractRight(g, a) => kron_contract_right(&work[*g], &work[*a]),
                Instr::Reshape(x, rows, cols) => {
                    DMatrix::from_column_slice(*rows, *cols, work[*x].as_slice())
                }
                Instr::Solve(m, b) => {
                    let n = work[*m].nrows();
                    work[*m].clone().lu().solve(&work[*b]).ok_or_else(|| {
                        DleError::SingularMatrix(format!("{}x{} linear system", n, n))
                    })?
                }
                Instr::Assert(x, cond, msg) => {
                    if work[*cond][(0, 0)] != 1.0 {
                        return Err(DleError::AssertionFailed(msg.clone()));
                    }
                    work[*x].clone()
                }
            };
            work.push(value);
        }

        Ok(self.outputs.iter().map(|&s| work[s].clone()).collect())
    }
}

/// `r[i, j] = Σ_kl g[i p + k, j q + l] b[k, l]` for `b` of shape `p×q`.
fn kron_contract_left(g: &DMatrix<f64>, b: &DMatrix<f64>) -> DMatrix<f64> {
    let (p, q) = b.shape();
    DMatrix::from_fn(g.nrows() / p, g.ncols() / q, |i, j| {
        g.view((i * p, j * q), (p, q)).dot(b)
    })
}

/// `r[k, l] = Σ_ij g[i p + k, j q + l] a[i, j]`.
fn kron_contract_right(g: &DMatrix<f64>, a: &DMatrix<f64>) -> DMatrix<f64> {
    let (m, n) = a.shape();
    let (p, q) = (g.nrows() / m, g.ncols() / n);
    let mut r = DMatrix::zeros(p, q);
    for j in 0..n {
        for i in 0..m {
            r += g.view((i * p, j * q), (p, q)) * a[(i, j)];
        }
    }
    r
}
