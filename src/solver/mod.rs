//! Discrete Lyapunov equation solvers.
//!
//! This module provides:
//! - Problem structures for the DLE and the low-rank DLE
//! - Typed option dictionaries
//! - A static registry of solver plugins
//! - The fixed-point Smith plugins and a DLE-through-LR-DLE adaptor
//! - Direct Kronecker-form plugins for small problems

pub mod adaptor;
pub mod dle;
pub mod fixed_smith;
pub mod frontend;
pub mod lr_dle;
pub mod options;
pub mod registry;
pub mod simple;

pub use dle::{DleInputs, DleSolver, DleStructure};
pub use fixed_smith::{fixed_smith_dle, fixed_smith_lr_dle, FixedSmithOptions};
pub use frontend::{Solver, Structure};
pub use lr_dle::{LrDleInputs, LrDleSolver, LrDleStructure};
pub use options::{OptionDefault, OptionKind, OptionSpec, OptionValue, Options, GENERIC_OPTIONS};
pub use registry::{lookup, Plugin, DLE_PLUGINS, LR_DLE_PLUGINS};
pub use simple::{kronecker_dle, kronecker_lr_dle};
