//! Direct solve through the Kronecker form.
//!
//! `P = A P Aᵀ + V` is the linear system `(I - A ⊗ A) vec(P) = vec(V)` of
//! size `n²`. It is solved with a dense LU factorization on every
//! evaluation, and its derivatives come from the `solve` node, so the cost
//! grows as `n⁶` and the plugins suit small problems and reference checks.

use tracing::debug;

use super::dle::DleInputs;
use super::frontend::reject_pos_def;
use super::lr_dle::LrDleInputs;
use super::options::Options;
use super::registry::Plugin;
use crate::error::Result;
use crate::expr::{eye, Expr, Shape};
use crate::ops::{congruence, kron, reshape, solve, symmetrize, vectorize};

pub const DLE_PLUGIN: Plugin<DleInputs> = Plugin {
    name: "simple",
    doc: "Exact solve of (I - A ⊗ A) vec(P) = vec(V) with a dense LU factorization.",
    version: 23,
    options: &[],
    build: build_dle,
};

pub const LR_DLE_PLUGIN: Plugin<LrDleInputs> = Plugin {
    name: "simple",
    doc: "Exact solve of the Kronecker system for P = A P A' + C V C'.",
    version: 23,
    options: &[],
    build: build_lr_dle,
};

/// Solution of `P = A P Aᵀ + rhs`, with `rhs` used as given.
fn kronecker_solve(a: &Expr, rhs: &Expr) -> Expr {
    let n = a.shape().rows();
    let system = eye(n * n) - kron(a, a);
    reshape(&solve(&system, &vectorize(rhs)), Shape::square(n))
}

/// Exact solution of `P = A P Aᵀ + V`. `v` is symmetrized before use.
pub fn kronecker_dle(a: &Expr, v: &Expr) -> Expr {
    kronecker_solve(a, &symmetrize(v))
}

/// Exact solution of `P = A P Aᵀ + C Vs Cᵀ`, projected onto `H` if present.
pub fn kronecker_lr_dle(inputs: &LrDleInputs) -> Expr {
    let mut vs = symmetrize(&inputs.v);
    if let Some(c) = &inputs.c {
        vs = congruence(c, &vs);
    }
    inputs.project(kronecker_solve(&inputs.a, &vs))
}

fn build_dle(inputs: &DleInputs, options: &Options) -> Result<Expr> {
    reject_pos_def(options)?;
    debug!(n = inputs.a.shape().rows(), "building Kronecker solve");
    Ok(kronecker_dle(&inputs.a, &inputs.v))
}

fn build_lr_dle(inputs: &LrDleInputs, options: &Options) -> Result<Expr> {
    reject_pos_def(options)?;
    debug!(
        n = inputs.a.shape().rows(),
        low_rank = inputs.c.is_some(),
        h_blocks = inputs.h_blocks.len(),
        "building Kronecker solve"
    );
    Ok(kronecker_lr_dle(inputs))
}
