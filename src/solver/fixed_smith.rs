//! Fixed-point Smith iteration.
//!
//! The iteration is unrolled into the expression graph at construction, so
//! evaluation is a fixed sequence of matrix products and derivatives follow
//! from the graph. No convergence check is performed: the result after
//! `iter` steps is returned whether or not the series has converged.
//!
//! For `P = A P Aᵀ + V` with `V0 = (V + Vᵀ)/2`:
//!
//! ```text
//! P = V0, A_k = A
//! repeat iter times:
//!     P = A_k P A_kᵀ + V0
//!     if freq_doubling:
//!         V0 = A_k V0 A_kᵀ + V0
//!         A_k = A_k A_k
//! ```
//!
//! Without doubling, step `k` adds one term of `Σ Aⁱ V0 (Aⁱ)ᵀ`. With doubling
//! the number of summed terms doubles every step.

use tracing::{debug, warn};

use super::dle::DleInputs;
use super::frontend::reject_pos_def;
use super::lr_dle::LrDleInputs;
use super::options::{OptionDefault, OptionKind, OptionSpec, Options};
use super::registry::Plugin;
use crate::error::Result;
use crate::expr::{zeros, Expr};
use crate::ops::{congruence, diagcat, matmul, symmetrize};

const ITER: OptionSpec = OptionSpec {
    name: "iter",
    kind: OptionKind::Int,
    default: OptionDefault::Int(100),
    description: "Number of iterations",
};

/// Options of the DLE plugin.
pub const DLE_OPTIONS: &[OptionSpec] = &[
    ITER,
    OptionSpec {
        name: "freq_doubling",
        kind: OptionKind::Bool,
        default: OptionDefault::Bool(false),
        description: "Use frequency doubling",
    },
];

/// Options of the LR-DLE plugin.
pub const LR_DLE_OPTIONS: &[OptionSpec] = &[ITER];

pub const DLE_PLUGIN: Plugin<DleInputs> = Plugin {
    name: "fixed_smith",
    doc: "Fixed-point Smith iteration for P = A P A' + V, unrolled for a fixed number of steps.",
    version: 23,
    options: DLE_OPTIONS,
    build: build_dle,
};

pub const LR_DLE_PLUGIN: Plugin<LrDleInputs> = Plugin {
    name: "fixed_smith",
    doc: "Truncated Smith series for P = A P A' + C V C', unrolled for a fixed number of steps.",
    version: 23,
    options: LR_DLE_OPTIONS,
    build: build_lr_dle,
};

/// Typed view of the Smith options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedSmithOptions {
    pub iter: usize,
    pub freq_doubling: bool,
}

impl Default for FixedSmithOptions {
    fn default() -> Self {
        FixedSmithOptions {
            iter: 100,
            freq_doubling: false,
        }
    }
}

impl FixedSmithOptions {
    /// Read from an options dictionary, falling back to defaults.
    ///
    /// # Errors
    ///
    /// `InvalidOption` if `iter` is negative.
    pub fn from_options(options: &Options) -> Result<Self> {
        let default = FixedSmithOptions::default();
        Ok(FixedSmithOptions {
            iter: options.count("iter", default.iter)?,
            freq_doubling: options.bool_or("freq_doubling", default.freq_doubling),
        })
    }
}

/// Unrolled Smith iteration for `P = A P Aᵀ + V`.
///
/// `v` is symmetrized before use.
pub fn fixed_smith_dle(a: &Expr, v: &Expr, iter: usize, freq_doubling: bool) -> Expr {
    let mut v0 = symmetrize(v);
    let mut p = v0.clone();
    let mut ak = a.clone();

    for _ in 0..iter {
        p = congruence(&ak, &p) + &v0;
        if freq_doubling {
            v0 = congruence(&ak, &v0) + &v0;
            ak = matmul(&ak, &ak);
        }
    }
    p
}

/// Truncated series `Σ_{i<iter} Aⁱ C Vs Cᵀ (Aⁱ)ᵀ` with `Vs = (V + Vᵀ)/2`.
///
/// Without `C` the identity is used; `iter = 0` gives a zero matrix. With
/// `H` each block `H_kᵀ (·) H_k` is accumulated term by term, so the full
/// `n×n` sum is never formed.
pub fn fixed_smith_lr_dle(inputs: &LrDleInputs, iter: usize) -> Expr {
    let vs = symmetrize(&inputs.v);
    let h_blocks = inputs.h_split();
    let mut d = inputs.c.clone();
    let mut y: Option<Expr> = None;
    let mut projected: Vec<Option<Expr>> = vec![None; h_blocks.len()];

    for _ in 0..iter {
        if inputs.h.is_some() {
            for (hk, acc) in h_blocks.iter().zip(projected.iter_mut()) {
                // H_kᵀ D
                let w = match &d {
                    Some(d) => matmul(&hk.t(), d),
                    None => hk.t(),
                };
                accumulate(acc, congruence(&w, &vs));
            }
        } else {
            let term = match &d {
                Some(d) => congruence(d, &vs),
                None => vs.clone(),
            };
            accumulate(&mut y, term);
        }
        d = Some(match d {
            Some(d) => matmul(&inputs.a, &d),
            None => inputs.a.clone(),
        });
    }

    if inputs.h.is_some() {
        let blocks: Vec<Expr> = projected
            .into_iter()
            .zip(&inputs.h_blocks)
            .map(|(acc, &w)| acc.unwrap_or_else(|| zeros((w, w))))
            .collect();
        return diagcat(&blocks);
    }
    y.unwrap_or_else(|| zeros(inputs.a.shape()))
}

fn accumulate(sum: &mut Option<Expr>, term: Expr) {
    *sum = Some(match sum.take() {
        Some(s) => s + term,
        None => term,
    });
}

fn build_dle(inputs: &DleInputs, options: &Options) -> Result<Expr> {
    reject_pos_def(options)?;
    let opts = FixedSmithOptions::from_options(options)?;
    if opts.iter == 0 {
        warn!("fixed_smith with iter = 0 returns the symmetrized V");
    }
    debug!(iter = opts.iter, freq_doubling = opts.freq_doubling, "building Smith iteration");
    Ok(fixed_smith_dle(&inputs.a, &inputs.v, opts.iter, opts.freq_doubling))
}

fn build_lr_dle(inputs: &LrDleInputs, options: &Options) -> Result<Expr> {
    reject_pos_def(options)?;
    let iter = options.count("iter", FixedSmithOptions::default().iter)?;
    if iter == 0 {
        warn!("fixed_smith LR-DLE with iter = 0 returns zero");
    }
    debug!(
        iter,
        low_rank = inputs.c.is_some(),
        h_blocks = inputs.h_blocks.len(),
        "building truncated Smith series"
    );
    Ok(fixed_smith_lr_dle(inputs, iter))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DleError;
    use crate::expr::sym;
    use crate::function::Function;
    use approx::assert_relative_eq;
    use nalgebra::DMatrix;

    fn eval(a: &Expr, v: &Expr, y: Expr, am: &DMatrix<f64>, vm: &DMatrix<f64>) -> DMatrix<f64> {
        let f = Function::new("f", [("a", a.clone()), ("v", v.clone())], [("y", y)]).unwrap();
        f.eval(&[am.into(), vm.into()]).unwrap().remove(0)
    }

    #[test]
    fn test_one_step() {
        let a = sym("A", (2, 2));
        let v = sym("V", (2, 2));
        let am = DMatrix::from_row_slice(2, 2, &[0.5, 0.1, 0.0, 0.3]);
        let vm = DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 2.0, 1.0]);
        let vs = (&vm + vm.transpose()) * 0.5;

        let p = eval(&a, &v, fixed_smith_dle(&a, &v, 1, false), &am, &vm);
        assert_relative_eq!(p, &am * &vs * am.transpose() + &vs, epsilon = 1e-14);

        let p = eval(&a, &v, fixed_smith_dle(&a, &v, 0, false), &am, &vm);
        assert_relative_eq!(p, vs, epsilon = 1e-14);
    }

    #[test]
    fn test_doubling_sums_powers_of_two_terms() {
        let a = sym("A", (2, 2));
        let v = sym("V", (2, 2));
        let am = DMatrix::from_row_slice(2, 2, &[0.4, 0.2, -0.1, 0.3]);
        let vm = DMatrix::identity(2, 2);

        // three doubling steps sum 2^3 terms of the series
        let doubled = eval(&a, &v, fixed_smith_dle(&a, &v, 3, true), &am, &vm);
        let plain = eval(&a, &v, fixed_smith_dle(&a, &v, 7, false), &am, &vm);
        assert_relative_eq!(doubled, plain, epsilon = 1e-12);
    }

    #[test]
    fn test_graph_stays_linear_in_iter() {
        let a = sym("A", (3, 3));
        let v = sym("V", (3, 3));
        let p = fixed_smith_dle(&a, &v, 50, true);
        assert!(p.node_count() < 50 * 10);
    }

    #[test]
    fn test_lr_series() {
        let a = sym("A", (2, 2));
        let v = sym("V", (2, 2));
        let am = DMatrix::from_row_slice(2, 2, &[0.5, 0.1, 0.0, 0.3]);
        let vm = DMatrix::from_row_slice(2, 2, &[2.0, 1.0, 1.0, 2.0]);

        let inputs = LrDleInputs::new(a.clone(), v.clone());

        let y = eval(&a, &v, fixed_smith_lr_dle(&inputs, 0), &am, &vm);
        assert_eq!(y, DMatrix::zeros(2, 2));

        let y = eval(&a, &v, fixed_smith_lr_dle(&inputs, 2), &am, &vm);
        assert_relative_eq!(y, &am * &vm * am.transpose() + &vm, epsilon = 1e-14);
    }

    #[test]
    fn test_lr_series_projected() {
        let a = sym("A", (2, 2));
        let v = sym("V", (2, 2));
        let am = DMatrix::from_row_slice(2, 2, &[0.5, 0.1, 0.0, 0.3]);
        let vm = DMatrix::from_row_slice(2, 2, &[2.0, 1.0, 1.0, 2.0]);
        let hm = DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 1.0, 2.0]);
        let h = crate::expr::constant_dmatrix(hm.clone());

        let mut inputs = LrDleInputs::new(a.clone(), v.clone());
        let full = eval(&a, &v, fixed_smith_lr_dle(&inputs, 3), &am, &vm);

        inputs.h = Some(h);
        inputs.h_blocks = vec![1, 1];
        let y = eval(&a, &v, fixed_smith_lr_dle(&inputs, 3), &am, &vm);
        let hph = hm.transpose() * &full * &hm;
        // off-diagonal blocks are dropped
        let expected = DMatrix::from_row_slice(2, 2, &[hph[(0, 0)], 0.0, 0.0, hph[(1, 1)]]);
        assert_relative_eq!(y, expected, epsilon = 1e-12);

        let y = eval(&a, &v, fixed_smith_lr_dle(&inputs, 0), &am, &vm);
        assert_eq!(y, DMatrix::zeros(2, 2));
    }

    #[test]
    fn test_options() {
        assert_eq!(
            FixedSmithOptions::from_options(&Options::new()).unwrap(),
            FixedSmithOptions::default()
        );
        let opts = Options::new().with("iter", 5).with("freq_doubling", true);
        assert_eq!(
            FixedSmithOptions::from_options(&opts).unwrap(),
            FixedSmithOptions {
                iter: 5,
                freq_doubling: true
            }
        );
        let err = FixedSmithOptions::from_options(&Options::new().with("iter", -3)).unwrap_err();
        assert!(matches!(err, DleError::InvalidOption { .. }));
    }

    #[test]
    fn test_pos_def_rejected() {
        let inputs = DleInputs {
            a: sym("A", (2, 2)),
            v: sym("V", (2, 2)),
        };
        let err = build_dle(&inputs, &Options::new().with("pos_def", true)).unwrap_err();
        assert!(matches!(err, DleError::Configuration(_)));
    }
}
