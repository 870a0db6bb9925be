//! The `tf_device` dialect: replication, parallel execution and launches.

use crate::context::{IrContext, OperationDataBuilder};
use crate::refs::{BlockRef, OpRef, ValueRef};
use crate::symbols;
use crate::types::{Attribute, Location};

symbols! {
    DIALECT_NAME => "tf_device",
    REPLICATE => "replicate",
    PARALLEL_EXECUTE => "parallel_execute",
    LAUNCH => "launch",
    CLUSTER => "cluster",
    RETURN => "return",
    ATTR_N => "n",
    ATTR_DEVICES => "devices",
    ATTR_DEVICE => "device",
}

/// Prefix of the device aliases used inside a replicate body.
pub const REPLICATED_CORE_PREFIX: &str = "TPU_REPLICATED_CORE_";

/// Whether `op` belongs to the `tf_device` dialect.
pub fn is_device_op(ctx: &IrContext, op: OpRef) -> bool {
    ctx.op(op).dialect == DIALECT_NAME()
}

/// Parse `TPU_REPLICATED_CORE_<k>` into `k`.
pub fn parse_replicated_core_alias(device: &str) -> Option<usize> {
    device.strip_prefix(REPLICATED_CORE_PREFIX)?.parse().ok()
}

pub fn replicated_core_alias(index: usize) -> String {
    format!("{REPLICATED_CORE_PREFIX}{index}")
}

/// Thin wrapper around a `tf_device.replicate` operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Replicate(OpRef);

impl Replicate {
    pub fn from_op(ctx: &IrContext, op: OpRef) -> Option<Self> {
        ctx.is_op(op, DIALECT_NAME(), REPLICATE()).then_some(Replicate(op))
    }

    pub fn op(self) -> OpRef {
        self.0
    }

    /// Replica count.
    pub fn n(self, ctx: &IrContext) -> Option<u64> {
        ctx.attr(self.0, ATTR_N()).and_then(Attribute::as_int)
    }

    pub fn block(self, ctx: &IrContext) -> Option<BlockRef> {
        super::region_block(ctx, self.0, 0)
    }

    /// Per-alias device lists: `devices()[k][r]` is replica `r`'s device
    /// for `TPU_REPLICATED_CORE_k`.
    pub fn devices(self, ctx: &IrContext) -> Vec<Vec<String>> {
        let Some(aliases) = ctx.attr(self.0, ATTR_DEVICES()).and_then(Attribute::as_list) else {
            return Vec::new();
        };
        aliases
            .iter()
            .map(|alias| {
                alias
                    .as_list()
                    .unwrap_or_default()
                    .iter()
                    .filter_map(|d| d.as_str().map(str::to_owned))
                    .collect()
            })
            .collect()
    }

    /// Operands feeding block argument `arg` for replica `replica`.
    pub fn replica_operand(self, ctx: &IrContext, arg: usize, replica: usize, n: usize) -> ValueRef {
        ctx.op_operands(self.0)[arg * n + replica]
    }
}

/// Build an unattached `tf_device.return`.
pub fn create_return(ctx: &mut IrContext, location: Location, values: &[ValueRef]) -> OpRef {
    OperationDataBuilder::new(location, DIALECT_NAME(), RETURN())
        .operands(values.iter().copied())
        .create(ctx)
}
