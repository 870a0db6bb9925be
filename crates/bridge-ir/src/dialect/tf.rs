//! The `tf` dialect: functional TensorFlow operations.
//!
//! Compute ops are generic: any `tf.<Name>` is accepted, and the attributes
//! below describe placement and side effects. Only the ops the lowering
//! passes rewrite or inspect get names here.

use crate::context::{IrContext, OperationDataBuilder};
use crate::refs::{OpRef, TypeRef};
use crate::symbol::Symbol;
use crate::symbols;
use crate::types::{Attribute, Location, TypeDataBuilder};

symbols! {
    DIALECT_NAME => "tf",

    // region control flow and its functional forms
    IF_REGION => "IfRegion",
    WHILE_REGION => "WhileRegion",
    YIELD => "Yield",
    IF => "If",
    WHILE => "While",

    CONST => "Const",
    NO_OP => "NoOp",
    IDENTITY => "Identity",
    IDENTITY_N => "IdentityN",
    SPLIT => "Split",
    SPLIT_V => "SplitV",
    DEVICE_ORDINAL_PLACEHOLDER => "_TPUDeviceOrdinalPlaceholder",

    TENSOR => "tensor",

    ATTR_DEVICE => "device",
    ATTR_NAME => "_name",
    ATTR_CLASS => "_class",
    ATTR_IS_STATELESS => "is_stateless",
    ATTR_RESOURCE => "resource",
    ATTR_DEVICE_ORDINAL => "device_ordinal",
    ATTR_XLA_REPLICA_ID => "_xla_replica_id",
    ATTR_VALUE => "value",
    ATTR_THEN_BRANCH => "then_branch",
    ATTR_ELSE_BRANCH => "else_branch",
    ATTR_COND => "cond",
    ATTR_BODY => "body",
}

/// Ops that always have side effects, regardless of attributes.
const STATEFUL_OPS: &[&str] = &[
    "AssignAddVariableOp",
    "AssignSubVariableOp",
    "AssignVariableOp",
    "Assert",
    "Print",
    "PrintV2",
    "RandomStandardNormal",
    "RandomUniform",
    "ReadVariableOp",
    "StatefulPartitionedCall",
    "TPUExecute",
    "TPUExecuteAndUpdateVariables",
    "VarHandleOp",
    "_Recv",
    "_Send",
];

/// The generic tensor type used by every `tf` value in this IR.
pub fn tensor_type(ctx: &mut IrContext) -> TypeRef {
    ctx.types
        .intern(TypeDataBuilder::new(DIALECT_NAME(), TENSOR()).build())
}

pub fn is_tf_op(ctx: &IrContext, op: OpRef) -> bool {
    ctx.op(op).dialect == DIALECT_NAME()
}

/// Whether an op must keep its order relative to other side-effecting ops.
pub fn is_side_effecting(ctx: &IrContext, op: OpRef) -> bool {
    if !is_tf_op(ctx, op) {
        return false;
    }
    if ctx.attr(op, ATTR_IS_STATELESS()).and_then(Attribute::as_bool) == Some(false) {
        return true;
    }
    ctx.op(op).name.with_str(|name| STATEFUL_OPS.contains(&name))
}

/// The resource an op touches, when it names one.
pub fn resource(ctx: &IrContext, op: OpRef) -> Option<&str> {
    ctx.attr(op, ATTR_RESOURCE()).and_then(Attribute::as_str)
}

/// The `device` attribute, treating an empty string as unset.
pub fn device(ctx: &IrContext, op: OpRef) -> Option<&str> {
    ctx.attr(op, ATTR_DEVICE())
        .and_then(Attribute::as_str)
        .filter(|d| !d.is_empty())
}

/// Whether a device string names a TPU core (`.../device:TPU:<n>`).
pub fn is_tpu_device(device: &str) -> bool {
    device.contains("device:TPU:")
}

/// Build an unattached `tf.Const` holding an integer value.
pub fn create_int_const(ctx: &mut IrContext, location: Location, value: i64) -> OpRef {
    let ty = tensor_type(ctx);
    OperationDataBuilder::new(location, DIALECT_NAME(), CONST())
        .attr(ATTR_VALUE(), value)
        .result(ty)
        .create(ctx)
}

/// Symbol names referenced by the branch attributes of `tf.If` / `tf.While`.
pub fn branch_symbols(ctx: &IrContext, op: OpRef) -> Vec<Symbol> {
    [ATTR_THEN_BRANCH(), ATTR_ELSE_BRANCH(), ATTR_COND(), ATTR_BODY()]
        .into_iter()
        .filter_map(|key| ctx.attr(op, key).and_then(Attribute::as_symbol))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Span;

    fn test_ctx() -> (IrContext, Location) {
        let mut ctx = IrContext::new();
        let path = ctx.paths.intern("tf.mlir".to_owned());
        (ctx, Location::new(path, Span::new(0, 0)))
    }

    #[test]
    fn side_effects_come_from_name_or_attribute() {
        let (mut ctx, loc) = test_ctx();
        let assign = OperationDataBuilder::new(loc, DIALECT_NAME(), Symbol::new("AssignVariableOp"))
            .create(&mut ctx);
        let add = OperationDataBuilder::new(loc, DIALECT_NAME(), Symbol::new("AddV2")).create(&mut ctx);
        let custom = OperationDataBuilder::new(loc, DIALECT_NAME(), Symbol::new("MyStatefulOp"))
            .attr(ATTR_IS_STATELESS(), false)
            .create(&mut ctx);

        assert!(is_side_effecting(&ctx, assign));
        assert!(!is_side_effecting(&ctx, add));
        assert!(is_side_effecting(&ctx, custom));
    }

    #[test]
    fn tpu_devices_are_recognised() {
        assert!(is_tpu_device("/job:worker/replica:0/task:0/device:TPU:1"));
        assert!(!is_tpu_device("/job:worker/replica:0/task:0/device:CPU:0"));
        assert!(!is_tpu_device("TPU_REPLICATED_CORE_0"));
    }

    #[test]
    fn empty_device_reads_as_unset() {
        let (mut ctx, loc) = test_ctx();
        let op = OperationDataBuilder::new(loc, DIALECT_NAME(), CONST())
            .attr(ATTR_DEVICE(), "")
            .create(&mut ctx);
        assert_eq!(device(&ctx, op), None);
    }
}
