//! Deciding which debug output a conversion produces.

use std::sync::Arc;

use bridge_ir::{IrContext, Module};
use bridge_passes::{ExecutionContext, IrPrinting, PassInfo, PassManager, PassTiming, SnapshotSink};

use crate::dump::{DumpRegistry, MAIN_GROUP, PHASE1_GROUP};
use crate::snapshot::SnapshotWriter;
use crate::verbosity::VerbosityLevel;

/// Debug output requested for one conversion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InstrumentationPlan {
    /// Snapshot the module before and after the pipeline.
    pub dump_main: bool,
    /// Snapshot after every pass, time each pass, and run single-threaded.
    pub trace_passes: bool,
}

impl InstrumentationPlan {
    /// The two decisions are independent: phase-1 tracing may be on while the
    /// before/after dumps are off, and vice versa. Phase-1 tracing is not
    /// nested under the main dump condition, so `bridge_phase1` alone traces.
    pub fn decide(module_name: &str, verbosity: &dyn VerbosityLevel, registry: &dyn DumpRegistry) -> Self {
        let level = verbosity.current_verbosity_level();
        Self {
            dump_main: level >= 1 || registry.should_dump(module_name, MAIN_GROUP),
            trace_passes: level >= 2 || registry.should_dump(module_name, PHASE1_GROUP),
        }
    }

    /// Install per-pass tracing on `pm` and force `exec` single-threaded when
    /// tracing is requested. Does nothing otherwise.
    pub fn apply(
        &self,
        pm: &mut PassManager,
        exec: &mut ExecutionContext,
        module_name: &str,
        registry: Arc<dyn DumpRegistry>,
        writer: Arc<dyn SnapshotWriter>,
    ) {
        if !self.trace_passes {
            return;
        }
        tracing::debug!(module = module_name, "enabling per-pass IR snapshots and timing");
        let sink = PhaseSnapshots {
            module_name: module_name.to_owned(),
            pipeline: pm.pipeline_description(),
            registry,
            writer,
        };
        pm.add_instrumentation(Box::new(IrPrinting::new(Box::new(sink))));
        pm.add_instrumentation(Box::new(PassTiming::new()));
        exec.disable_multithreading();
    }
}

/// Writes a `bridge_phase1` snapshot after each pass, tagged with the pass
/// argument.
struct PhaseSnapshots {
    module_name: String,
    pipeline: String,
    registry: Arc<dyn DumpRegistry>,
    writer: Arc<dyn SnapshotWriter>,
}

impl SnapshotSink for PhaseSnapshots {
    fn after_pass(&mut self, pass: &PassInfo, ctx: &IrContext, module: Module) {
        let Some(path) = self
            .registry
            .dump_filename(&self.module_name, PHASE1_GROUP, pass.argument)
        else {
            tracing::warn!(
                pass = pass.argument,
                "not dumping IR: no dump location set through TF_DUMP_GRAPH_PREFIX"
            );
            return;
        };
        if let Err(err) = self.writer.write_snapshot(ctx, module, &path, &self.pipeline) {
            tracing::warn!(pass = pass.argument, %err, "failed to dump IR after pass");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dump::DebugDataDumper;
    use crate::verbosity::FixedVerbosity;

    struct Groups(&'static [&'static str]);

    impl DumpRegistry for Groups {
        fn should_dump(&self, _module_name: &str, group: &str) -> bool {
            self.0.contains(&group)
        }

        fn dump_filename(&self, _module_name: &str, _group: &str, _tag: &str) -> Option<std::path::PathBuf> {
            None
        }
    }

    #[test]
    fn verbosity_thresholds() {
        let quiet = DebugDataDumper::disabled();
        let plan = |level| InstrumentationPlan::decide("m", &FixedVerbosity(level), &quiet);
        assert_eq!(plan(0), InstrumentationPlan::default());
        assert_eq!(
            plan(1),
            InstrumentationPlan {
                dump_main: true,
                trace_passes: false
            }
        );
        assert_eq!(
            plan(2),
            InstrumentationPlan {
                dump_main: true,
                trace_passes: true
            }
        );
    }

    #[test]
    fn groups_decide_independently() {
        let quiet = FixedVerbosity(0);
        let phase1_only = InstrumentationPlan::decide("m", &quiet, &Groups(&[PHASE1_GROUP]));
        assert!(!phase1_only.dump_main);
        assert!(phase1_only.trace_passes);

        let main_only = InstrumentationPlan::decide("m", &quiet, &Groups(&[MAIN_GROUP]));
        assert!(main_only.dump_main);
        assert!(!main_only.trace_passes);
    }

    #[test]
    fn apply_without_tracing_leaves_execution_alone() {
        let mut pm = PassManager::new();
        let mut exec = ExecutionContext::new();
        InstrumentationPlan::default().apply(
            &mut pm,
            &mut exec,
            "m",
            Arc::new(DebugDataDumper::disabled()),
            Arc::new(crate::snapshot::FileSnapshotWriter),
        );
        assert!(exec.is_multithreading_enabled());
    }
}
