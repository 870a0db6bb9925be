//! Fixtures shared by the pass tests.

use bridge_ir::builder::FuncBuilder;
use bridge_ir::dialect::func::Func;
use bridge_ir::dialect::{tf, tf_device};
use bridge_ir::{Attribute, IrContext, OpRef, OperationDataBuilder, Symbol, ValueRef};

use crate::islands::function_islands;
use crate::pass::Pass;
use crate::passes::functional_to_executor::FunctionalToExecutorConversion;
use crate::passes::split_into_island_per_op::SplitIntoIslandPerOp;

/// Bring a functional body into executor form with one island per op.
pub(crate) fn into_islands(ctx: &mut IrContext, func: Func) {
    FunctionalToExecutorConversion
        .run(ctx, func.op())
        .expect("functional to executor");
    SplitIntoIslandPerOp.run(ctx, func.op()).expect("split");
}

/// The op wrapped by each island of `func`, in island order.
pub(crate) fn island_ops(ctx: &IrContext, func: Func) -> Vec<OpRef> {
    function_islands(ctx, func.op())
        .into_iter()
        .map(|island| island.single_op(ctx).expect("one op per island"))
        .collect()
}

/// Append a `tf_device.replicate`; see [`FuncBuilder::replicate`].
pub(crate) fn replicate<'a>(
    fb: &mut FuncBuilder<'a>,
    n: u64,
    operands: &[ValueRef],
    devices: Vec<Attribute>,
    num_results: usize,
    body: impl FnOnce(&mut FuncBuilder<'a>),
) -> OpRef {
    fb.replicate(n, operands, devices, num_results, body)
}

/// Append a `tf_device.<name>` op with one single-block region per entry of
/// `regions`, each built by its closure.
pub(crate) fn device_op<'a>(
    fb: &mut FuncBuilder<'a>,
    name: &'static str,
    num_results: usize,
    attrs: Vec<(&'static str, Attribute)>,
    regions: Vec<Box<dyn FnOnce(&mut FuncBuilder<'a>) + '_>>,
) -> OpRef {
    let tensor = tf::tensor_type(fb.ctx());
    let func_op = fb.func().op();
    let location = fb.ctx().op(func_op).location;
    let mut builder = OperationDataBuilder::new(location, tf_device::DIALECT_NAME(), Symbol::new(name))
        .results(std::iter::repeat_n(tensor, num_results));
    for (key, value) in attrs {
        builder = builder.attr(Symbol::new(key), value);
    }
    for build in regions {
        let region = fb.region(&[], build);
        builder = builder.region(region);
    }
    fb.append(builder)
}

pub(crate) fn devices(table: &[&[&str]]) -> Vec<Attribute> {
    table
        .iter()
        .map(|row| Attribute::List(row.iter().map(|&d| Attribute::from(d)).collect()))
        .collect()
}
