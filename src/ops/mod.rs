//! Operations for building expressions.
//!
//! - **Arithmetic**: `+`, `-`, unary `-`, `* f64`, `/ f64`
//! - **Matrix**: `matmul`, `transpose`, `mul3`, `congruence`, `symmetrize`
//! - **Kronecker**: `kron`, `reshape`, `vectorize`, `solve`
//! - **Blocks**: `horzsplit`, `diagcat`
//! - **Checks**: `attach_assert`

pub mod arith;
pub mod matrix;

pub use matrix::{
    attach_assert, congruence, diagcat, horzsplit, kron, kron_contract_left, kron_contract_right,
    matmul, mul3, reshape, solve, symmetrize, transpose, vectorize,
};
