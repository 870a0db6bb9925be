use bridge_ir::dialect::tf;
use bridge_ir::{Attribute, IrContext, OpRef};

use crate::islands::{function_islands, producer_op};
use crate::pass::{Pass, PassResult};

/// Colocate `tf.Split` / `tf.SplitV` with the TPU op producing the value
/// they split.
///
/// The split takes the producer's `device` and a `_class` attribute of
/// `["loc:@<producer _name>"]` (omitted when the producer is unnamed). Splits
/// already placed on another device are left alone.
pub struct TpuColocateSplits;

pub fn create_tpu_colocate_splits_pass() -> Box<dyn Pass> {
    Box::new(TpuColocateSplits)
}

impl Pass for TpuColocateSplits {
    fn name(&self) -> &'static str {
        "TPUColocateSplits"
    }

    fn argument(&self) -> &'static str {
        "tf-tpu-colocate-splits"
    }

    fn run(&mut self, ctx: &mut IrContext, op: OpRef) -> PassResult {
        for island in function_islands(ctx, op) {
            let Some(split) = island.single_op(ctx) else {
                continue;
            };
            let Some(value_index) = split_value_operand(ctx, split) else {
                continue;
            };
            let Some(&value) = ctx.op_operands(split).get(value_index) else {
                continue;
            };
            let Some(producer) = producer_op(ctx, value) else {
                continue;
            };
            let Some(device) = tf::device(ctx, producer).filter(|d| tf::is_tpu_device(d)) else {
                continue;
            };
            if tf::device(ctx, split).is_some_and(|current| current != device) {
                continue;
            }
            let device = device.to_owned();
            let class = ctx
                .attr(producer, tf::ATTR_NAME())
                .and_then(Attribute::as_str)
                .map(|name| Attribute::List(vec![Attribute::from(format!("loc:@{name}"))]));

            tracing::trace!(split = %split, %device, "colocating split with its producer");
            ctx.set_attr(split, tf::ATTR_DEVICE(), Attribute::from(device));
            if let Some(class) = class {
                ctx.set_attr(split, tf::ATTR_CLASS(), class);
            }
        }
        Ok(())
    }
}

/// Index of the operand a split op divides.
fn split_value_operand(ctx: &IrContext, op: OpRef) -> Option<usize> {
    if ctx.is_op(op, tf::DIALECT_NAME(), tf::SPLIT()) {
        Some(1)
    } else if ctx.is_op(op, tf::DIALECT_NAME(), tf::SPLIT_V()) {
        Some(0)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use bridge_ir::builder::ModuleBuilder;

    use super::*;
    use crate::testing::into_islands;

    const TPU0: &str = "/job:worker/replica:0/task:0/device:TPU:0";
    const CPU0: &str = "/job:worker/replica:0/task:0/device:CPU:0";

    #[test]
    fn splits_join_their_tpu_producer() {
        let mut ctx = IrContext::new();
        let mut mb = ModuleBuilder::new(&mut ctx, "colocate");
        let tensor = tf::tensor_type(mb.ctx());
        let mut fb = mb.func("main", &[tensor], &[tensor, tensor, tensor]);
        let x = fb.arg(0);
        let execute = fb.tf_op_with(
            "TPUExecute",
            &[x],
            1,
            [
                ("device", Attribute::from(TPU0)),
                ("_name", Attribute::from("execute")),
            ],
        );
        let on_cpu = fb.tf_op_with("Neg", &[x], 1, [("device", Attribute::from(CPU0))]);
        let (e, c) = (fb.result(execute, 0), fb.result(on_cpu, 0));
        let split = fb.tf_op("Split", &[x, e], 2);
        let split_v = fb.tf_op("SplitV", &[e, x, x], 2);
        let cpu_split = fb.tf_op("Split", &[x, c], 2);
        let outs = [fb.result(split, 0), fb.result(split_v, 0), fb.result(cpu_split, 0)];
        fb.ret(&outs);
        let func = fb.func();
        let _module = mb.finish();
        into_islands(&mut ctx, func);

        TpuColocateSplits.run(&mut ctx, func.op()).expect("pass succeeds");

        let class = Attribute::List(vec![Attribute::from("loc:@execute")]);
        for op in [split, split_v] {
            assert_eq!(tf::device(&ctx, op), Some(TPU0));
            assert_eq!(ctx.attr(op, tf::ATTR_CLASS()), Some(&class));
        }
        assert_eq!(tf::device(&ctx, cpu_split), None);
        assert_eq!(ctx.attr(cpu_split, tf::ATTR_CLASS()), None);
    }

    #[test]
    fn split_on_another_device_is_kept() {
        let mut ctx = IrContext::new();
        let mut mb = ModuleBuilder::new(&mut ctx, "colocate");
        let tensor = tf::tensor_type(mb.ctx());
        let mut fb = mb.func("main", &[tensor], &[tensor]);
        let x = fb.arg(0);
        let execute = fb.tf_op_with("TPUExecute", &[x], 1, [("device", Attribute::from(TPU0))]);
        let e = fb.result(execute, 0);
        let split = fb.tf_op_with("Split", &[x, e], 2, [("device", Attribute::from(CPU0))]);
        let out = fb.result(split, 0);
        fb.ret(&[out]);
        let func = fb.func();
        let _module = mb.finish();
        into_islands(&mut ctx, func);

        TpuColocateSplits.run(&mut ctx, func.op()).expect("pass succeeds");
        assert_eq!(tf::device(&ctx, split), Some(CPU0));
    }
}
