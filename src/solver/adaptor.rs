//! DLE solved through a low-rank DLE plugin.
//!
//! `P = A P Aᵀ + V` is the LR-DLE with no `C` factor. The nested plugin is
//! built directly on this plugin's symbols, so the resulting graph is
//! differentiable end to end.

use tracing::debug;

use super::dle::DleInputs;
use super::lr_dle::LrDleInputs;
use super::options::{OptionDefault, OptionKind, OptionSpec, OptionValue, Options, GENERIC_OPTIONS};
use super::registry::{lookup, Plugin, LR_DLE_PLUGINS};
use crate::error::{DleError, Result};
use crate::expr::Expr;

/// Options of the adaptor.
pub const LRDLE_OPTIONS: &[OptionSpec] = &[
    OptionSpec {
        name: "lr_dle_solver",
        kind: OptionKind::Str,
        default: OptionDefault::Str("fixed_smith"),
        description: "Low-rank DLE solver to use",
    },
    OptionSpec {
        name: "lr_dle_solver_options",
        kind: OptionKind::Dict,
        default: OptionDefault::EmptyDict,
        description: "Options passed to the low-rank DLE solver",
    },
];

/// The adaptor's own generic options, `pos_def` included, stay with the
/// adaptor. Only `lr_dle_solver_options` reaches the nested plugin, so a
/// nested `pos_def` has to be set there.
pub const LRDLE_PLUGIN: Plugin<DleInputs> = Plugin {
    name: "lrdle",
    doc: "Solve the DLE with a low-rank DLE solver, taking C as the identity.",
    version: 23,
    options: LRDLE_OPTIONS,
    build,
};

fn build(inputs: &DleInputs, options: &Options) -> Result<Expr> {
    let name = options
        .get("lr_dle_solver")
        .and_then(OptionValue::as_str)
        .unwrap_or("fixed_smith");
    let plugin = lookup(LR_DLE_PLUGINS, name)
        .ok_or_else(|| DleError::UnknownSolver(format!("LR-DLE plugin '{}'", name)))?;

    let nested = options
        .get("lr_dle_solver_options")
        .and_then(OptionValue::as_dict)
        .cloned()
        .unwrap_or_default()
        .resolve(&[GENERIC_OPTIONS, plugin.options])?;

    debug!(lr_dle_solver = name, "delegating DLE to LR-DLE plugin");
    let lr_inputs = LrDleInputs::new(inputs.a.clone(), inputs.v.clone());
    (plugin.build)(&lr_inputs, &nested)
}
