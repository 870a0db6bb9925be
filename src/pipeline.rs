//! Assembly of the TF dialect to executor dialect lowering pipeline.

use bridge_passes::PassManager;
use bridge_passes::passes::*;

use crate::flags::{ENABLE_CONVERT_CONTROL_TO_DATA_OUTPUTS, FeatureFlags};

/// Append the graph export lowering passes to `pm`.
///
/// Each pass relies on the shape left by the ones before it: region control
/// flow is outlined before the executor conversion, every structural
/// expansion (steps 3 to 7) precedes the control dependency recomputation, and
/// the export check always runs last. Only the control-to-data-outputs
/// conversion depends on `flags`.
pub fn add_graph_export_lowering_passes(pm: &mut PassManager, flags: &dyn FeatureFlags) {
    pm.add_pass(create_region_control_flow_to_functional_pass());
    pm.add_nested_pass(create_functional_to_executor_conversion_pass());
    pm.add_nested_pass(create_split_into_island_per_op_pass());
    pm.add_nested_pass(create_replicate_to_island_pass());
    pm.add_nested_pass(create_replica_id_to_device_ordinal_pass());
    pm.add_nested_pass(create_parallel_execute_to_islands_pass());
    pm.add_nested_pass(create_launch_to_device_attribute_pass());
    pm.add_pass(create_update_control_dependencies_pass());
    pm.add_nested_pass(create_tpu_device_propagation_pass());
    pm.add_nested_pass(create_tpu_colocate_splits_pass());
    pm.add_pass(create_symbol_dce_pass());
    if flags.get_flag(ENABLE_CONVERT_CONTROL_TO_DATA_OUTPUTS) {
        pm.add_pass(create_convert_control_to_data_outputs_pass());
    }
    pm.add_pass(create_verify_suitable_for_graph_export_pass());
    tracing::debug!(pipeline = %pm.pipeline_description(), "assembled graph export pipeline");
}

#[cfg(test)]
mod tests {
    use bridge_passes::PassScope;

    use super::*;
    use crate::flags::MlirCommonFlags;

    fn build(enabled: bool) -> PassManager {
        let mut pm = PassManager::new();
        let flags = MlirCommonFlags {
            enable_convert_control_to_data_outputs_pass: enabled,
        };
        add_graph_export_lowering_passes(&mut pm, &flags);
        pm
    }

    #[test]
    fn default_pipeline_order_and_scopes() {
        use PassScope::{Function, Module};
        assert_eq!(
            build(false).pass_names(),
            vec![
                ("tf-region-control-flow-to-functional", Module),
                ("tf-functional-to-executor-conversion", Function),
                ("tf-executor-split-into-island-per-op", Function),
                ("tf-replicate-to-island", Function),
                ("tf-replica-id-to-device-ordinal", Function),
                ("tf-parallel-execute-to-islands", Function),
                ("tf-launch-to-device-attribute", Function),
                ("tf-executor-update-control-dependencies", Module),
                ("tf-tpu-device-propagation", Function),
                ("tf-tpu-colocate-splits", Function),
                ("symbol-dce", Module),
                ("tf-verify-suitable-for-graph-export", Module),
            ]
        );
    }

    #[test]
    fn flag_inserts_control_to_data_before_verification() {
        let names: Vec<&str> = build(true).pass_names().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names.len(), 13);
        assert_eq!(names[11], "tf-executor-convert-control-to-data-outputs");
        assert_eq!(names[12], "tf-verify-suitable-for-graph-export");
    }

    #[test]
    fn pipeline_description_groups_function_passes() {
        insta::assert_snapshot!(build(false).pipeline_description(), @"builtin.module(tf-region-control-flow-to-functional,func.func(tf-functional-to-executor-conversion,tf-executor-split-into-island-per-op,tf-replicate-to-island,tf-replica-id-to-device-ordinal,tf-parallel-execute-to-islands,tf-launch-to-device-attribute),tf-executor-update-control-dependencies,func.func(tf-tpu-device-propagation,tf-tpu-colocate-splits),symbol-dce,tf-verify-suitable-for-graph-export)");
    }
}
