//! Callable, differentiable functions over expression graphs.
//!
//! A `Function` binds named input symbols to named output expressions. The
//! graph is validated and compiled once at construction; evaluation replays
//! the compiled tape on numeric values.
//!
//! ```
//! use dlesolve::prelude::*;
//! use nalgebra::DMatrix;
//!
//! let a = sym("a", (2, 2));
//! let f = Function::new("square", [("a", a.clone())], [("y", matmul(&a, &a))]).unwrap();
//!
//! let m = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 3.0, 4.0]);
//! let y = f.eval(&[m.clone().into()]).unwrap();
//! assert_eq!(y[0], &m * &m);
//! ```

pub mod derivative;
pub mod graph;
pub mod tape;

use std::collections::{HashMap, HashSet};

use nalgebra::DMatrix;
use tracing::debug;

use crate::error::{DleError, Result};
use crate::expr::{Array, Expr, Shape};

pub use graph::topological_order;
pub use tape::Tape;

/// A compiled function from named symbolic inputs to named outputs.
#[derive(Debug, Clone)]
pub struct Function {
    name: String,
    inputs: Vec<(String, Expr)>,
    outputs: Vec<(String, Expr)>,
    tape: Tape,
}

impl Function {
    /// Bind `inputs` (symbols) to `outputs` and compile the graph.
    ///
    /// # Errors
    ///
    /// - `InvalidFunction` if an input is not a symbol, a symbol is bound twice,
    ///   or input/output names are repeated
    /// - `FreeSymbol` if an output depends on a symbol that is not an input
    /// - `ShapeMismatch` if any node combines operands of incompatible shapes
    pub fn new<I, O, N, M>(name: impl Into<String>, inputs: I, outputs: O) -> Result<Function>
    where
        I: IntoIterator<Item = (N, Expr)>,
        O: IntoIterator<Item = (M, Expr)>,
        N: Into<String>,
        M: Into<String>,
    {
        let name = name.into();
        let inputs: Vec<(String, Expr)> = inputs.into_iter().map(|(n, e)| (n.into(), e)).collect();
        let outputs: Vec<(String, Expr)> =
            outputs.into_iter().map(|(n, e)| (n.into(), e)).collect();

        let mut positions = HashMap::with_capacity(inputs.len());
        let mut names = HashSet::with_capacity(inputs.len());
        for (i, (input_name, expr)) in inputs.iter().enumerate() {
            if !expr.is_symbol() {
                return Err(DleError::InvalidFunction(format!(
                    "input '{}' of '{}' is not a symbol",
                    input_name, name
                )));
            }
            if !names.insert(input_name.as_str()) {
                return Err(DleError::InvalidFunction(format!(
                    "duplicate input name '{}' in '{}'",
                    input_name, name
                )));
            }
            if positions.insert(expr.id(), i).is_some() {
                return Err(DleError::InvalidFunction(format!(
                    "symbol bound to more than one input of '{}'",
                    name
                )));
            }
        }

        let mut out_names = HashSet::with_capacity(outputs.len());
        for (output_name, _) in &outputs {
            if !out_names.insert(output_name.as_str()) {
                return Err(DleError::InvalidFunction(format!(
                    "duplicate output name '{}' in '{}'",
                    output_name, name
                )));
            }
        }

        let roots: Vec<Expr> = outputs.iter().map(|(_, e)| e.clone()).collect();
        let tape = Tape::compile(&positions, &roots)?;

        debug!(
            function = %name,
            n_in = inputs.len(),
            n_out = outputs.len(),
            instructions = tape.len(),
            "compiled function"
        );

        Ok(Function {
            name,
            inputs,
            outputs,
            tape,
        })
    }

    /// Name of the function.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of inputs.
    pub fn n_in(&self) -> usize {
        self.inputs.len()
    }

    /// Number of outputs.
    pub fn n_out(&self) -> usize {
        self.outputs.len()
    }

    /// Input names, in order.
    pub fn input_names(&self) -> Vec<&str> {
        self.inputs.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Output names, in order.
    pub fn output_names(&self) -> Vec<&str> {
        self.outputs.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Symbolic inputs with their names.
    pub fn inputs(&self) -> &[(String, Expr)] {
        &self.inputs
    }

    /// Symbolic outputs with their names.
    pub fn outputs(&self) -> &[(String, Expr)] {
        &self.outputs
    }

    /// Shape of the input at position `i`.
    pub fn input_shape(&self, i: usize) -> Option<Shape> {
        self.inputs.get(i).map(|(_, e)| e.shape())
    }

    /// Shape of the output at position `i`.
    pub fn output_shape(&self, i: usize) -> Option<Shape> {
        self.outputs.get(i).map(|(_, e)| e.shape())
    }

    /// Position of the input called `name`.
    pub fn input_index(&self, name: &str) -> Option<usize> {
        self.inputs.iter().position(|(n, _)| n == name)
    }

    /// Position of the output called `name`.
    pub fn output_index(&self, name: &str) -> Option<usize> {
        self.outputs.iter().position(|(n, _)| n == name)
    }

    /// Number of instructions in the compiled tape.
    pub fn instruction_count(&self) -> usize {
        self.tape.len()
    }

    /// Evaluate on positional inputs.
    ///
    /// All inputs are checked against the declared shapes before any
    /// computation is performed.
    pub fn eval(&self, args: &[Array]) -> Result<Vec<DMatrix<f64>>> {
        if args.len() != self.inputs.len() {
            return Err(DleError::shape_mismatch(
                format!("{} inputs for '{}'", self.inputs.len(), self.name),
                format!("{} inputs", args.len()),
            ));
        }
        let dense = self.check_dimensions(args)?;
        self.tape.eval(&dense)
    }

    /// Evaluate on named inputs, returning named outputs.
    pub fn call<'a, I>(&self, args: I) -> Result<HashMap<String, DMatrix<f64>>>
    where
        I: IntoIterator<Item = (&'a str, Array)>,
    {
        let mut slots: Vec<Option<Array>> = vec![None; self.inputs.len()];
        for (arg_name, value) in args {
            let i = self
                .input_index(arg_name)
                .ok_or_else(|| DleError::UnknownInput(arg_name.to_string()))?;
            slots[i] = Some(value);
        }
        let positional = slots
            .into_iter()
            .zip(&self.inputs)
            .map(|(slot, (n, _))| slot.ok_or_else(|| DleError::MissingInput(n.clone())))
            .collect::<Result<Vec<_>>>()?;

        let values = self.eval(&positional)?;
        Ok(self
            .outputs
            .iter()
            .map(|(n, _)| n.clone())
            .zip(values)
            .collect())
    }

    /// Check input shapes and densify the values.
    fn check_dimensions(&self, args: &[Array]) -> Result<Vec<DMatrix<f64>>> {
        args.iter()
            .zip(&self.inputs)
            .map(|(arg, (n, sym))| {
                if arg.shape() != sym.shape() {
                    return Err(DleError::shape_mismatch(
                        format!("{} for input '{}'", sym.shape(), n),
                        arg.shape(),
                    ));
                }
                Ok(arg.to_dense())
            })
            .collect()
    }
}
