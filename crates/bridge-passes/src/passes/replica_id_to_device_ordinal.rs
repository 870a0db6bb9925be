use std::collections::BTreeSet;

use bridge_ir::dialect::tf;
use bridge_ir::walk::collect_ops;
use bridge_ir::{Attribute, IrContext, OpRef};

use crate::pass::{Pass, PassResult};

/// Resolve `device_ordinal` from the `_xla_replica_id` left by replicate
/// expansion: `ordinal = replica_id mod D`, with `D` the number of distinct
/// replica ids in the function.
pub struct ReplicaIdToDeviceOrdinal;

pub fn create_replica_id_to_device_ordinal_pass() -> Box<dyn Pass> {
    Box::new(ReplicaIdToDeviceOrdinal)
}

impl Pass for ReplicaIdToDeviceOrdinal {
    fn name(&self) -> &'static str {
        "ReplicaIDToDeviceOrdinalPass"
    }

    fn argument(&self) -> &'static str {
        "tf-replica-id-to-device-ordinal"
    }

    fn run(&mut self, ctx: &mut IrContext, op: OpRef) -> PassResult {
        let tagged: Vec<(OpRef, u64)> = collect_ops(ctx, op, |o| ctx.attr(o, tf::ATTR_DEVICE_ORDINAL()).is_some())
            .into_iter()
            .filter_map(|o| {
                ctx.attr(o, tf::ATTR_XLA_REPLICA_ID())
                    .and_then(Attribute::as_int)
                    .map(|id| (o, id))
            })
            .collect();
        if tagged.is_empty() {
            return Ok(());
        }
        let distinct = tagged.iter().map(|&(_, id)| id).collect::<BTreeSet<_>>().len() as u64;
        for (o, id) in tagged {
            ctx.set_attr(o, tf::ATTR_DEVICE_ORDINAL(), Attribute::from(id % distinct));
        }
        tracing::trace!(devices = distinct, "assigned device ordinals");
        Ok(())
    }
}
