//! Pass infrastructure and the rewrite passes lowering functional TF IR to
//! the executor dialect.
//!
//! A [`PassManager`] runs an ordered list of [`Pass`]es over a module, each
//! scheduled either on the module itself or on every function in it.
//! [`PassInstrumentation`]s observe the run; [`IrPrinting`] and
//! [`PassTiming`] are the built-in ones.

pub mod execution;
pub mod instrumentation;
pub mod islands;
pub mod manager;
pub mod pass;
pub mod passes;

#[cfg(test)]
mod testing;

pub use execution::ExecutionContext;
pub use instrumentation::{IrPrinting, PassInstrumentation, PassTiming, SnapshotSink, TimingReport};
pub use manager::{PassManager, PassManagerOptions, PipelineError};
pub use pass::{Pass, PassFailure, PassInfo, PassResult, PassScope};
