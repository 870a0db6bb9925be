//! Hoist `tf_device.launch` bodies into the enclosing block, recording the
//! launch device on each op.

use bridge_ir::dialect::{region_block, tf, tf_device};
use bridge_ir::helpers::{erase_op, move_op_before};
use bridge_ir::walk::collect_post_order;
use bridge_ir::{Attribute, IrContext, OpRef};

use crate::islands::split_function_islands;
use crate::pass::{Pass, PassFailure, PassResult};

pub struct LaunchToDeviceAttribute;

pub fn create_launch_to_device_attribute_pass() -> Box<dyn Pass> {
    Box::new(LaunchToDeviceAttribute)
}

impl Pass for LaunchToDeviceAttribute {
    fn name(&self) -> &'static str {
        "LaunchToDeviceAttributePass"
    }

    fn argument(&self) -> &'static str {
        "tf-launch-to-device-attribute"
    }

    fn run(&mut self, ctx: &mut IrContext, op: OpRef) -> PassResult {
        let launches: Vec<OpRef> = collect_post_order(ctx, op)
            .into_iter()
            .filter(|&o| ctx.is_op(o, tf_device::DIALECT_NAME(), tf_device::LAUNCH()))
            .collect();
        if launches.is_empty() {
            return Ok(());
        }
        for launch in &launches {
            hoist_launch(ctx, *launch)?;
        }
        tracing::debug!(launches = launches.len(), "hoisted device launches");
        split_function_islands(ctx, op);
        Ok(())
    }
}

fn hoist_launch(ctx: &mut IrContext, launch: OpRef) -> PassResult {
    let device = ctx
        .attr(launch, tf_device::ATTR_DEVICE())
        .and_then(Attribute::as_str)
        .filter(|d| !d.is_empty())
        .map(str::to_owned)
        .ok_or_else(|| PassFailure::new("tf_device.launch requires a non-empty `device` attribute"))?;
    let block = region_block(ctx, launch, 0).ok_or_else(|| PassFailure::new("tf_device.launch has no body"))?;
    let terminator = ctx
        .block_terminator(block)
        .filter(|&t| ctx.is_op(t, tf_device::DIALECT_NAME(), tf_device::RETURN()))
        .ok_or_else(|| PassFailure::new("tf_device.launch body is not terminated by tf_device.return"))?;

    let body: Vec<OpRef> = ctx
        .block(block)
        .ops
        .iter()
        .copied()
        .filter(|&o| o != terminator)
        .collect();
    for &op in &body {
        if let Some(existing) = tf::device(ctx, op) {
            if existing != device {
                return Err(PassFailure::new(format!(
                    "op {} inside tf_device.launch on `{device}` is already placed on `{existing}`",
                    ctx.full_name(op)
                )));
            }
        }
    }
    for op in body {
        ctx.set_attr(op, tf::ATTR_DEVICE(), Attribute::from(device.as_str()));
        move_op_before(ctx, op, launch);
    }

    let returned = ctx.op_operands(terminator).to_vec();
    let results = ctx.op_results(launch).to_vec();
    for (result, value) in results.into_iter().zip(returned) {
        ctx.replace_all_uses(result, value);
    }
    erase_op(ctx, launch);
    Ok(())
}

#[cfg(test)]
mod tests {
    use bridge_ir::builder::{FuncBuilder, ModuleBuilder};
    use bridge_ir::dialect::func::Func;
    use bridge_ir::{Module, validate_module};

    use super::*;
    use crate::testing::{device_op, into_islands, island_ops};

    const CPU0: &str = "/job:worker/replica:0/task:0/device:CPU:0";

    fn launch_module(ctx: &mut IrContext, inner_device: Option<&'static str>, launch_device: &'static str) -> (Module, Func) {
        let mut mb = ModuleBuilder::new(ctx, "launch");
        let tensor = tf::tensor_type(mb.ctx());
        let mut fb = mb.func("main", &[tensor], &[tensor]);
        let x = fb.arg(0);
        let launch = device_op(
            &mut fb,
            "launch",
            1,
            vec![("device", Attribute::from(launch_device))],
            vec![Box::new(move |b: &mut FuncBuilder<'_>| {
                let neg = match inner_device {
                    Some(d) => b.tf_op_with("Neg", &[x], 1, [("device", Attribute::from(d))]),
                    None => b.tf_op("Neg", &[x], 1),
                };
                let n = b.result(neg, 0);
                let abs = b.tf_op("Abs", &[n], 1);
                let v = b.result(abs, 0);
                b.device_return(&[v]);
            })],
        );
        let r = fb.result(launch, 0);
        fb.ret(&[r]);
        let func = fb.func();
        (mb.finish(), func)
    }

    #[test]
    fn launch_body_is_hoisted_with_device() {
        let mut ctx = IrContext::new();
        let (module, func) = launch_module(&mut ctx, Some(CPU0), CPU0);
        into_islands(&mut ctx, func);
        LaunchToDeviceAttribute.run(&mut ctx, func.op()).expect("hoisting succeeds");

        let ops = island_ops(&ctx, func);
        let names: Vec<String> = ops.iter().map(|&o| ctx.full_name(o)).collect();
        assert_eq!(names, ["tf.Neg", "tf.Abs"]);
        for op in ops {
            assert_eq!(tf::device(&ctx, op), Some(CPU0));
        }
        assert!(validate_module(&ctx, module).is_ok());
    }

    #[test]
    fn conflicting_device_fails() {
        let mut ctx = IrContext::new();
        let (_module, func) = launch_module(&mut ctx, Some("/device:GPU:0"), CPU0);
        into_islands(&mut ctx, func);
        let err = LaunchToDeviceAttribute
            .run(&mut ctx, func.op())
            .expect_err("device conflict");
        assert!(err.message.contains("already placed"), "{err}");
    }

    #[test]
    fn nested_region_ops_keep_their_placement() {
        let mut ctx = IrContext::new();
        let mut mb = ModuleBuilder::new(&mut ctx, "nested_launch");
        let tensor = tf::tensor_type(mb.ctx());
        let mut fb = mb.func("main", &[tensor, tensor], &[tensor]);
        let (pred, x) = (fb.arg(0), fb.arg(1));
        let launch = device_op(
            &mut fb,
            "launch",
            1,
            vec![("device", Attribute::from(CPU0))],
            vec![Box::new(move |b: &mut FuncBuilder<'_>| {
                let branch = b.if_region(
                    pred,
                    1,
                    |t| {
                        let neg = t.tf_op("Neg", &[x], 1);
                        let v = t.result(neg, 0);
                        t.tf_yield(&[v]);
                    },
                    |e| {
                        let abs = e.tf_op("Abs", &[x], 1);
                        let v = e.result(abs, 0);
                        e.tf_yield(&[v]);
                    },
                );
                let v = b.result(branch, 0);
                b.device_return(&[v]);
            })],
        );
        let r = fb.result(launch, 0);
        fb.ret(&[r]);
        let func = fb.func();
        let module = mb.finish();
        into_islands(&mut ctx, func);
        LaunchToDeviceAttribute.run(&mut ctx, func.op()).expect("hoisting succeeds");

        let placed = |name: &str| {
            let ops = bridge_ir::walk::collect_ops(&ctx, module.op(), |o| ctx.full_name(o) == name);
            assert_eq!(ops.len(), 1, "{name}");
            tf::device(&ctx, ops[0]).map(str::to_owned)
        };
        assert_eq!(placed("tf.IfRegion").as_deref(), Some(CPU0));
        assert_eq!(placed("tf.Neg"), None);
        assert_eq!(placed("tf.Abs"), None);
    }

    #[test]
    fn empty_launch_device_fails() {
        let mut ctx = IrContext::new();
        let (_module, func) = launch_module(&mut ctx, None, "");
        into_islands(&mut ctx, func);
        assert!(LaunchToDeviceAttribute.run(&mut ctx, func.op()).is_err());
    }
}
