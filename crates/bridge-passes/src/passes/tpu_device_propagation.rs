use bridge_ir::dialect::tf;
use bridge_ir::{Attribute, IrContext, OpRef};

use crate::islands::{function_islands, producer_op};
use crate::pass::{Pass, PassResult};

/// Place unplaced pass-through ops (`tf.Identity`, `tf.IdentityN`) on the TPU
/// device their inputs come from. Islands are visited in order, so chains of
/// pass-through ops inherit the device one after another.
pub struct TpuDevicePropagation;

pub fn create_tpu_device_propagation_pass() -> Box<dyn Pass> {
    Box::new(TpuDevicePropagation)
}

impl Pass for TpuDevicePropagation {
    fn name(&self) -> &'static str {
        "TPUDevicePropagation"
    }

    fn argument(&self) -> &'static str {
        "tf-tpu-device-propagation"
    }

    fn run(&mut self, ctx: &mut IrContext, op: OpRef) -> PassResult {
        for island in function_islands(ctx, op) {
            let Some(wrapped) = island.single_op(ctx) else {
                continue;
            };
            if !is_pass_through(ctx, wrapped) || tf::device(ctx, wrapped).is_some() {
                continue;
            }
            if let Some(device) = shared_tpu_device(ctx, wrapped) {
                tracing::trace!(op = %wrapped, %device, "propagating TPU device");
                ctx.set_attr(wrapped, tf::ATTR_DEVICE(), Attribute::from(device));
            }
        }
        Ok(())
    }
}

fn is_pass_through(ctx: &IrContext, op: OpRef) -> bool {
    ctx.is_op(op, tf::DIALECT_NAME(), tf::IDENTITY()) || ctx.is_op(op, tf::DIALECT_NAME(), tf::IDENTITY_N())
}

/// The TPU device every data operand of `op` is produced on, if they agree.
fn shared_tpu_device(ctx: &IrContext, op: OpRef) -> Option<String> {
    let operands = ctx.op_operands(op);
    if operands.is_empty() {
        return None;
    }
    let mut shared: Option<&str> = None;
    for &operand in operands {
        let device = producer_op(ctx, operand).and_then(|p| tf::device(ctx, p))?;
        if !tf::is_tpu_device(device) {
            return None;
        }
        match shared {
            Some(existing) if existing != device => return None,
            _ => shared = Some(device),
        }
    }
    shared.map(str::to_owned)
}
