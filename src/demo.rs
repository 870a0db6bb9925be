//! A small module exercising most of the lowering pipeline.

use bridge_ir::builder::ModuleBuilder;
use bridge_ir::dialect::{tf, tf_device};
use bridge_ir::{Attribute, IrContext, Module};

/// TPU device of core `index` on the first worker.
pub fn tpu_device(index: u64) -> String {
    format!("/job:worker/replica:0/task:0/device:TPU:{index}")
}

/// Build `@main(%pred, %x)` that branches on `%pred` with a `tf.IfRegion`
/// and feeds the result into a `tf_device.replicate` over `replicas` TPU
/// cores. Each replica squares its input on `TPU_REPLICATED_CORE_0` and adds
/// its device ordinal. `replicas` is clamped to at least 1.
pub fn sample_module(ctx: &mut IrContext, name: &str, replicas: u64) -> Module {
    let replicas = replicas.max(1);
    let mut mb = ModuleBuilder::new(ctx, name);
    let tensor = tf::tensor_type(mb.ctx());
    let mut fb = mb.func("main", &[tensor, tensor], &vec![tensor; replicas as usize]);
    let (pred, x) = (fb.arg(0), fb.arg(1));

    let branch = fb.if_region(
        pred,
        1,
        |b| {
            let neg = b.tf_op("Neg", &[x], 1);
            let v = b.result(neg, 0);
            b.tf_yield(&[v]);
        },
        |b| {
            let abs = b.tf_op("Abs", &[x], 1);
            let v = b.result(abs, 0);
            b.tf_yield(&[v]);
        },
    );
    let chosen = fb.result(branch, 0);

    let devices = vec![Attribute::List(
        (0..replicas).map(|i| Attribute::from(tpu_device(i))).collect(),
    )];
    let inputs = vec![chosen; replicas as usize];
    let replicate = fb.replicate(replicas, &inputs, devices, 1, |b| {
        let arg = b.arg(0);
        let square = b.tf_op_with(
            "Mul",
            &[arg, arg],
            1,
            [(
                "device",
                Attribute::from(tf_device::replicated_core_alias(0)),
            )],
        );
        let squared = b.result(square, 0);
        let ordinal = b.tf_op("_TPUDeviceOrdinalPlaceholder", &[], 1);
        let o = b.result(ordinal, 0);
        let shifted = b.tf_op("AddV2", &[squared, o], 1);
        let out = b.result(shifted, 0);
        b.device_return(&[out]);
    });

    let outputs: Vec<_> = (0..replicas as u32).map(|r| fb.result(replicate, r)).collect();
    fb.ret(&outputs);
    mb.finish()
}

#[cfg(test)]
mod tests {
    use bridge_ir::validate_module;

    use super::*;

    #[test]
    fn sample_is_valid_before_lowering() {
        let mut ctx = IrContext::new();
        let module = sample_module(&mut ctx, "demo", 2);
        assert!(validate_module(&ctx, module).is_ok());
        assert_eq!(module.functions(&ctx).len(), 1);
    }
}
