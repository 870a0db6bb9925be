//! Lowers TF dialect modules into the TF executor dialect, ready for graph
//! export.
//!
//! [`export_tf_dialect_to_executor`] assembles the fixed lowering pipeline
//! ([`pipeline::add_graph_export_lowering_passes`]), decides which debug
//! output to produce ([`InstrumentationPlan`]) and runs it once. Everything
//! the conversion consults from the outside world comes in through a
//! [`BridgeConfig`].

pub mod config;
pub mod demo;
pub mod dump;
pub mod export;
pub mod flags;
pub mod instrumentation;
pub mod pipeline;
pub mod snapshot;
pub mod verbosity;

pub use config::BridgeConfig;
pub use dump::{DebugDataDumper, DumpRegistry};
pub use export::{ExportError, export_tf_dialect_to_executor, export_tf_dialect_to_executor_with};
pub use flags::{FeatureFlags, MlirCommonFlags};
pub use instrumentation::InstrumentationPlan;
pub use snapshot::{DumpError, FileSnapshotWriter, SnapshotWriter};
pub use verbosity::{FixedVerbosity, VerbosityLevel};
