//! The unit of IR-to-IR rewriting.

use bridge_ir::{IrContext, OpRef};
use derive_more::{Display, Error};

/// Outcome of running a pass on one unit.
pub type PassResult = Result<(), PassFailure>;

/// A pass failed. The message is diagnostic only: it is logged by the pass
/// manager and never inspected by callers.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
#[display("{message}")]
pub struct PassFailure {
    #[error(not(source))]
    pub message: String,
}

impl PassFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Which operations a pass is scheduled on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum PassScope {
    /// The pass runs once on the `core.module`.
    #[display("builtin.module")]
    Module,
    /// The pass runs once per `func.func` directly inside the module.
    #[display("func.func")]
    Function,
}

/// A rewrite over the operation handed to [`Pass::run`].
///
/// Module-scoped passes receive the `core.module` op; function-scoped passes
/// receive each `func.func` op in turn.
pub trait Pass {
    /// Human-readable name, used in logs and timing reports.
    fn name(&self) -> &'static str;

    /// Command-line style identifier, used in pipeline descriptions and dump
    /// file tags.
    fn argument(&self) -> &'static str;

    fn run(&mut self, ctx: &mut IrContext, op: OpRef) -> PassResult;
}

/// Static description of a scheduled pass, handed to instrumentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassInfo {
    pub name: &'static str,
    pub argument: &'static str,
    pub scope: PassScope,
    /// Position in the pipeline, starting at 0.
    pub index: usize,
}
