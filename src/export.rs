//! Running the lowering pipeline on a module.

use bridge_ir::{IrContext, Module};
use bridge_passes::{ExecutionContext, PassManager};
use derive_more::{Display, Error};

use crate::config::BridgeConfig;
use crate::dump::MAIN_GROUP;
use crate::instrumentation::InstrumentationPlan;
use crate::pipeline::add_graph_export_lowering_passes;

const BEFORE_TAG: &str = "tfxla_bridge_tfdialect_to_executor_before";
const AFTER_TAG: &str = "tfxla_bridge_tfdialect_to_executor_after";

/// The module could not be lowered. Which pass failed, and why, is logged
/// but not carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Error)]
pub enum ExportError {
    #[display("Failed to export from TF Dialect to TF Executor Dialect.")]
    ConversionFailed,
}

/// Lower `module` from the TF dialect to the TF executor dialect in place.
pub fn export_tf_dialect_to_executor(
    ctx: &mut IrContext,
    module: Module,
    module_name: &str,
    config: &BridgeConfig,
) -> Result<(), ExportError> {
    let mut exec = ExecutionContext::new();
    export_tf_dialect_to_executor_with(ctx, module, module_name, config, &mut exec)
}

/// Like [`export_tf_dialect_to_executor`], running under `exec`. Per-pass
/// tracing disables multithreading on `exec` before the run.
pub fn export_tf_dialect_to_executor_with(
    ctx: &mut IrContext,
    module: Module,
    module_name: &str,
    config: &BridgeConfig,
    exec: &mut ExecutionContext,
) -> Result<(), ExportError> {
    let mut pm = PassManager::with_options(config.pass_manager.clone());
    add_graph_export_lowering_passes(&mut pm, config.flags.as_ref());
    let pipeline = pm.pipeline_description();

    let plan = InstrumentationPlan::decide(module_name, config.verbosity.as_ref(), config.dump_registry.as_ref());
    tracing::debug!(module = module_name, ?plan, "exporting TF dialect to executor dialect");
    if plan.dump_main {
        dump_main(ctx, module, module_name, BEFORE_TAG, &pipeline, config);
    }
    plan.apply(
        &mut pm,
        exec,
        module_name,
        config.dump_registry.clone(),
        config.snapshot_writer.clone(),
    );

    let result = pm.run(ctx, module, exec);

    if plan.dump_main {
        dump_main(ctx, module, module_name, AFTER_TAG, &pipeline, config);
    }
    result.map_err(|err| {
        tracing::error!(module = module_name, %err, "{}", ExportError::ConversionFailed);
        ExportError::ConversionFailed
    })
}

fn dump_main(ctx: &IrContext, module: Module, module_name: &str, tag: &str, pipeline: &str, config: &BridgeConfig) {
    let Some(path) = config.dump_registry.dump_filename(module_name, MAIN_GROUP, tag) else {
        tracing::warn!(tag, "not dumping IR: no dump location set through TF_DUMP_GRAPH_PREFIX");
        return;
    };
    if let Err(err) = config.snapshot_writer.write_snapshot(ctx, module, &path, pipeline) {
        tracing::warn!(tag, %err, "failed to dump IR");
    }
}

#[cfg(test)]
mod tests {
    use bridge_ir::builder::ModuleBuilder;
    use bridge_ir::dialect::tf;
    use bridge_ir::dialect::tf_executor::Graph;

    use super::*;
    use crate::dump::DebugDataDumper;

    #[test]
    fn error_message_is_fixed() {
        assert_eq!(
            ExportError::ConversionFailed.to_string(),
            "Failed to export from TF Dialect to TF Executor Dialect."
        );
    }

    #[test]
    fn converts_simple_function() {
        let mut ctx = IrContext::new();
        let mut mb = ModuleBuilder::new(&mut ctx, "simple");
        let tensor = tf::tensor_type(mb.ctx());
        let mut fb = mb.func("main", &[tensor], &[tensor]);
        let x = fb.arg(0);
        let neg = fb.tf_op("Neg", &[x], 1);
        let y = fb.result(neg, 0);
        fb.ret(&[y]);
        let func = fb.func();
        let module = mb.finish();

        export_tf_dialect_to_executor(&mut ctx, module, "simple", &BridgeConfig::default()).unwrap();

        let entry = func.entry_block(&ctx).unwrap();
        let first = ctx.block(entry).ops[0];
        assert!(Graph::from_op(&ctx, first).is_some());
    }

    #[test]
    fn dump_failures_do_not_fail_the_conversion() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "").unwrap();
        let config = BridgeConfig::default().with_dump_registry(DebugDataDumper::new(
            Some(blocker),
            Some("*".into()),
            Some("*"),
        ));

        let mut ctx = IrContext::new();
        let mut mb = ModuleBuilder::new(&mut ctx, "m");
        let tensor = tf::tensor_type(mb.ctx());
        let mut fb = mb.func("main", &[tensor], &[tensor]);
        let x = fb.arg(0);
        fb.ret(&[x]);
        let module = mb.finish();

        assert_eq!(export_tf_dialect_to_executor(&mut ctx, module, "m", &config), Ok(()));
    }
}
