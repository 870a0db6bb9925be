//! The rewrite passes of the TF dialect to executor dialect lowering.
//!
//! Listed in pipeline order. Each module exposes its pass type and a
//! `create_*_pass` constructor returning it boxed.

pub mod region_control_flow;
pub mod functional_to_executor;
pub mod split_into_island_per_op;
pub mod replicate_to_island;
pub mod replica_id_to_device_ordinal;
pub mod parallel_execute_to_islands;
pub mod launch_to_device_attribute;
pub mod update_control_dependencies;
pub mod tpu_device_propagation;
pub mod tpu_colocate_splits;
pub mod symbol_dce;
pub mod convert_control_to_data_outputs;
pub mod verify_suitable_for_export;

pub use convert_control_to_data_outputs::create_convert_control_to_data_outputs_pass;
pub use functional_to_executor::create_functional_to_executor_conversion_pass;
pub use launch_to_device_attribute::create_launch_to_device_attribute_pass;
pub use parallel_execute_to_islands::create_parallel_execute_to_islands_pass;
pub use region_control_flow::create_region_control_flow_to_functional_pass;
pub use replica_id_to_device_ordinal::create_replica_id_to_device_ordinal_pass;
pub use replicate_to_island::create_replicate_to_island_pass;
pub use split_into_island_per_op::create_split_into_island_per_op_pass;
pub use symbol_dce::create_symbol_dce_pass;
pub use tpu_colocate_splits::create_tpu_colocate_splits_pass;
pub use tpu_device_propagation::create_tpu_device_propagation_pass;
pub use update_control_dependencies::create_update_control_dependencies_pass;
pub use verify_suitable_for_export::create_verify_suitable_for_graph_export_pass;
