//! Static plugin registry.
//!
//! Plugins are plain values in immutable tables, one table per problem class.
//! A plugin builds the solution expression from the declared input symbols and
//! the resolved options; the front-end binds it into a [`Function`].
//!
//! [`Function`]: crate::function::Function

use std::fmt;

use super::adaptor;
use super::dle::DleInputs;
use super::fixed_smith;
use super::lr_dle::LrDleInputs;
use super::options::{OptionSpec, Options};
use super::simple;
use crate::error::Result;
use crate::expr::Expr;

/// A registered solver.
pub struct Plugin<I> {
    /// Name used to select the plugin.
    pub name: &'static str,
    /// Documentation string.
    pub doc: &'static str,
    /// Plugin interface version.
    pub version: u32,
    /// Options understood by this plugin, in addition to the generic ones.
    pub options: &'static [OptionSpec],
    /// Build the output expression from the declared input symbols.
    pub build: fn(&I, &Options) -> Result<Expr>,
}

impl<I> fmt::Debug for Plugin<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plugin")
            .field("name", &self.name)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

/// Discrete Lyapunov equation solvers.
pub static DLE_PLUGINS: &[Plugin<DleInputs>] = &[
    fixed_smith::DLE_PLUGIN,
    adaptor::LRDLE_PLUGIN,
    simple::DLE_PLUGIN,
];

/// Low-rank discrete Lyapunov equation solvers.
pub static LR_DLE_PLUGINS: &[Plugin<LrDleInputs>] =
    &[fixed_smith::LR_DLE_PLUGIN, simple::LR_DLE_PLUGIN];

/// Find a plugin by name.
pub fn lookup<I>(plugins: &'static [Plugin<I>], name: &str) -> Option<&'static Plugin<I>> {
    plugins.iter().find(|p| p.name == name)
}
