//! Generic solver front-end.
//!
//! A [`Solver`] is built once from a problem structure, a plugin name and an
//! options dictionary. Construction declares the input symbols, lets the
//! plugin build the solution graph and compiles it into a [`Function`];
//! afterwards the solver is immutable.

use std::collections::HashMap;

use nalgebra::DMatrix;
use tracing::debug;

use super::options::{Options, GENERIC_OPTIONS};
use super::registry::{lookup, Plugin};
use crate::error::{DleError, Result};
use crate::expr::{Array, Expr, Shape};
use crate::function::Function;

/// A problem class: its input structure, symbols and plugin table.
pub trait Structure: Clone + std::fmt::Debug {
    /// Symbols handed to the plugin's builder.
    type Inputs: 'static;

    /// Problem class name, used in messages.
    const KIND: &'static str;

    /// Name of the single output.
    const OUTPUT: &'static str;

    /// Plugins registered for this class.
    fn plugins() -> &'static [Plugin<Self::Inputs>];

    /// Check that the shapes describe a well-posed problem.
    fn validate(&self) -> Result<()>;

    /// Declare fresh input symbols, returned both for the builder and as the
    /// named inputs of the compiled function.
    fn declare(&self) -> (Self::Inputs, Vec<(&'static str, Expr)>);

    /// Shape of the output.
    fn output_shape(&self) -> Shape;
}

/// A configured solver for the problem class `S`.
#[derive(Debug, Clone)]
pub struct Solver<S: Structure> {
    name: String,
    plugin: &'static Plugin<S::Inputs>,
    structure: S,
    user_options: Options,
    options: Options,
    function: Function,
}

impl<S: Structure> Solver<S> {
    /// Build a solver named `name` using the plugin `solver`.
    ///
    /// # Errors
    ///
    /// - `UnknownSolver` if no plugin is registered under `solver`
    /// - `ShapeMismatch` if the structure is not well-posed
    /// - `InvalidOption` for unknown or ill-typed options
    /// - `Configuration` if the plugin rejects the configuration
    #[tracing::instrument(level = "debug", skip(structure, options), fields(kind = S::KIND))]
    pub fn new(name: &str, solver: &str, structure: S, options: Options) -> Result<Self> {
        let plugin = lookup(S::plugins(), solver)
            .ok_or_else(|| DleError::UnknownSolver(format!("{} plugin '{}'", S::KIND, solver)))?;
        structure.validate()?;
        let resolved = options.resolve(&[GENERIC_OPTIONS, plugin.options])?;

        let (inputs, symbols) = structure.declare();
        let output = (plugin.build)(&inputs, &resolved)?;
        let expected = structure.output_shape();
        if output.shape() != expected {
            return Err(DleError::shape_mismatch(
                format!("{} for output '{}'", expected, S::OUTPUT),
                output.shape(),
            ));
        }

        let function = Function::new(name, symbols, [(S::OUTPUT, output)])?;
        debug!(
            plugin = plugin.name,
            instructions = function.instruction_count(),
            "solver initialized"
        );

        Ok(Solver {
            name: name.to_string(),
            plugin,
            structure,
            user_options: options,
            options: resolved,
            function,
        })
    }

    /// Whether a plugin called `name` is registered for this class.
    pub fn has_plugin(name: &str) -> bool {
        lookup(S::plugins(), name).is_some()
    }

    /// Documentation of the plugin called `name`.
    pub fn plugin_doc(name: &str) -> Option<&'static str> {
        lookup(S::plugins(), name).map(|p| p.doc)
    }

    /// Names of all plugins registered for this class.
    pub fn plugin_names() -> Vec<&'static str> {
        S::plugins().iter().map(|p| p.name).collect()
    }

    /// Name of the solver.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the plugin in use.
    pub fn plugin_name(&self) -> &'static str {
        self.plugin.name
    }

    /// Problem structure.
    pub fn structure(&self) -> &S {
        &self.structure
    }

    /// Options after defaults were filled in.
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Compiled function `inputs -> output`.
    pub fn function(&self) -> &Function {
        &self.function
    }

    /// Evaluate on named inputs.
    pub fn call<'a, I>(&self, args: I) -> Result<HashMap<String, DMatrix<f64>>>
    where
        I: IntoIterator<Item = (&'a str, Array)>,
    {
        self.function.call(args)
    }

    /// Evaluate on positional inputs and return the single output.
    pub fn eval(&self, args: &[Array]) -> Result<DMatrix<f64>> {
        self.function
            .eval(args)?
            .into_iter()
            .next()
            .ok_or_else(|| DleError::InvalidFunction(format!("'{}' has no output", self.name)))
    }

    /// Forward derivative with `nfwd` directions.
    pub fn der_forward(&self, nfwd: usize) -> Result<Function> {
        self.function.der_forward(nfwd)
    }

    /// Reverse derivative with `nadj` adjoint directions.
    pub fn der_reverse(&self, nadj: usize) -> Result<Function> {
        self.function.der_reverse(nadj)
    }

    /// Construct an independent solver from the same structure and options.
    ///
    /// `clone()` is shallow: the copy shares the immutable expression graph
    /// with `self` through reference counting. `rebuild()` declares fresh
    /// symbols and runs the plugin again, so the result shares no graph
    /// nodes with `self`.
    pub fn rebuild(&self) -> Result<Self> {
        Solver::new(
            &self.name,
            self.plugin.name,
            self.structure.clone(),
            self.user_options.clone(),
        )
    }
}

/// Fail if the generic `pos_def` option is set.
pub(crate) fn reject_pos_def(options: &Options) -> Result<()> {
    if options.bool_or("pos_def", false) {
        return Err(DleError::Configuration(
            "pos_def option set to true: solver only handles the indefinite case".into(),
        ));
    }
    Ok(())
}
