//! Island restructuring shared by the executor passes.

use bridge_ir::dialect::tf_executor::{self, Graph, Island};
use bridge_ir::dialect::{func::Func, tf};
use bridge_ir::helpers::erase_op;
use bridge_ir::{IrContext, Location, OpRef, OperationDataBuilder, ValueRef};

/// Graphs at the top level of a function body.
pub fn function_graphs(ctx: &IrContext, func: OpRef) -> Vec<Graph> {
    let Some(entry) = Func::from_op(ctx, func).and_then(|f| f.entry_block(ctx)) else {
        return Vec::new();
    };
    ctx.block(entry)
        .ops
        .iter()
        .filter_map(|&op| Graph::from_op(ctx, op))
        .collect()
}

/// Islands of every top-level graph of a function, in block order.
pub fn function_islands(ctx: &IrContext, func: OpRef) -> Vec<Island> {
    function_graphs(ctx, func)
        .into_iter()
        .flat_map(|graph| graph.islands(ctx))
        .collect()
}

/// Create an island wrapping a `tf.NoOp` that waits on `controls`, inserted
/// before `before`.
pub fn create_sink_island(
    ctx: &mut IrContext,
    location: Location,
    controls: &[ValueRef],
    before: OpRef,
) -> Option<Island> {
    let block = ctx.op(before).parent_block?;
    let sink = Island::create(ctx, location, &[], controls);
    let body = sink.block(ctx)?;
    let no_op = OperationDataBuilder::new(location, tf::DIALECT_NAME(), tf::NO_OP()).create(ctx);
    ctx.push_op(body, no_op);
    let y = tf_executor::create_yield(ctx, location, &[]);
    ctx.push_op(body, y);
    ctx.insert_op_before(block, before, sink.op());
    Some(sink)
}

/// Remove `island` once its contents have been moved elsewhere.
///
/// Data output `i` is replaced by `replacements[i]`. If the control token is
/// still used, its users wait on a sink island joining `controls` instead.
pub fn retire_island(ctx: &mut IrContext, island: Island, replacements: &[ValueRef], controls: &[ValueRef]) {
    let location = ctx.op(island.op()).location;
    let outputs = island.outputs(ctx).to_vec();
    for (output, &replacement) in outputs.into_iter().zip(replacements) {
        ctx.replace_all_uses(output, replacement);
    }
    let control = island.control(ctx);
    if ctx.has_uses(control) {
        if let Some(sink) = create_sink_island(ctx, location, controls, island.op()) {
            let sink_control = sink.control(ctx);
            ctx.replace_all_uses(control, sink_control);
        }
    }
    erase_op(ctx, island.op());
}

/// Move `op` into a new island inserted before `before`, yielding all of its
/// results. Uses of the results outside the island are
/// rewired to the island's outputs.
pub fn wrap_in_island(
    ctx: &mut IrContext,
    op: OpRef,
    controls: &[ValueRef],
    before: OpRef,
) -> Option<Island> {
    let location = ctx.op(op).location;
    let graph_block = ctx.op(before).parent_block?;
    let types = ctx.op_result_types(op).to_vec();
    let island = Island::create(ctx, location, &types, controls);
    ctx.insert_op_before(graph_block, before, island.op());
    let body = island.block(ctx)?;
    ctx.detach_op(op);
    ctx.push_op(body, op);

    let results = ctx.op_results(op).to_vec();
    let y = tf_executor::create_yield(ctx, location, &results);
    ctx.push_op(body, y);
    let outputs = island.outputs(ctx).to_vec();
    for (result, output) in results.into_iter().zip(outputs) {
        ctx.replace_uses_where(result, output, |u| u.user != y);
    }
    Some(island)
}

/// Split `island` into one island per wrapped op.
///
/// Each new island inherits the original control inputs. Islands wrapping
/// nothing are removed. Returns the islands replacing the original (the
/// original itself when it already wraps exactly one op).
pub fn split_island(ctx: &mut IrContext, island: Island) -> Vec<Island> {
    let ops = island.wrapped_ops(ctx);
    if ops.len() == 1 {
        return vec![island];
    }
    let controls = island.control_inputs(ctx).to_vec();
    let mut created = Vec::with_capacity(ops.len());
    for op in ops {
        if let Some(new_island) = wrap_in_island(ctx, op, &controls, island.op()) {
            created.push(new_island);
        }
    }

    let yielded = match island.yield_op(ctx) {
        Some(y) => ctx.op_operands(y).to_vec(),
        None => Vec::new(),
    };
    let sink_controls: Vec<ValueRef> = if created.is_empty() {
        controls
    } else {
        created.iter().map(|i| i.control(ctx)).collect()
    };
    tracing::trace!(island = %island.op(), into = created.len(), "splitting island");
    retire_island(ctx, island, &yielded, &sink_controls);
    created
}

/// Split every island of every top-level graph in `func`.
pub fn split_function_islands(ctx: &mut IrContext, func: OpRef) {
    for island in function_islands(ctx, func) {
        split_island(ctx, island);
    }
}

/// The op computing `v`, looking through island outputs.
pub fn producer_op(ctx: &IrContext, v: ValueRef) -> Option<OpRef> {
    let def = ctx.defining_op(v)?;
    let Some(island) = Island::from_op(ctx, def) else {
        return Some(def);
    };
    let index = island.outputs(ctx).iter().position(|&o| o == v)?;
    let y = island.yield_op(ctx)?;
    let inner = *ctx.op_operands(y).get(index)?;
    producer_op(ctx, inner)
}

#[cfg(test)]
mod tests {
    use bridge_ir::builder::ModuleBuilder;
    use bridge_ir::dialect::tf_executor::Graph;
    use bridge_ir::{Module, Symbol, validate_module};

    use super::*;

    /// `main(%x)` whose body is a graph with one island wrapping
    /// `Neg(%x)` and `Abs(neg)`, yielding the `Abs` result, plus a second
    /// island depending on the first island's control token.
    fn coarse_island(ctx: &mut IrContext) -> (Module, OpRef, Island) {
        let mut mb = ModuleBuilder::new(ctx, "split");
        let location = mb.location();
        let tensor = tf::tensor_type(mb.ctx());
        let mut fb = mb.func("main", &[tensor], &[tensor]);
        let x = fb.arg(0);
        let func_op = fb.func().op();
        let entry = fb.current_block();
        let ctx = fb.ctx();

        let graph = Graph::create(ctx, location, &[tensor]);
        let graph_block = graph.block(ctx).expect("graph body");
        ctx.push_op(entry, graph.op());
        let island = Island::create(ctx, location, &[tensor], &[]);
        ctx.push_op(graph_block, island.op());
        let body = island.block(ctx).expect("island body");
        let neg = OperationDataBuilder::new(location, tf::DIALECT_NAME(), Symbol::new("Neg"))
            .operand(x)
            .result(tensor)
            .create(ctx);
        ctx.push_op(body, neg);
        let neg_v = ctx.op_result(neg, 0);
        let abs = OperationDataBuilder::new(location, tf::DIALECT_NAME(), Symbol::new("Abs"))
            .operand(neg_v)
            .result(tensor)
            .create(ctx);
        ctx.push_op(body, abs);
        let abs_v = ctx.op_result(abs, 0);
        let y = tf_executor::create_yield(ctx, location, &[abs_v]);
        ctx.push_op(body, y);

        let control = island.control(ctx);
        let waiter = create_sink_island(ctx, location, &[control], island.op()).expect("sink");
        ctx.detach_op(waiter.op());
        ctx.push_op(graph_block, waiter.op());

        let out = island.outputs(ctx)[0];
        let fetch = tf_executor::create_fetch(ctx, location, &[out]);
        ctx.push_op(graph_block, fetch);
        let graph_v = ctx.op_result(graph.op(), 0);
        fb.ret(&[graph_v]);
        (mb.finish(), func_op, island)
    }

    #[test]
    fn split_creates_one_island_per_op() {
        let mut ctx = IrContext::new();
        let (module, func_op, island) = coarse_island(&mut ctx);
        let created = split_island(&mut ctx, island);
        assert_eq!(created.len(), 2);

        let islands = function_islands(&ctx, func_op);
        // Two split islands, the control sink, and the waiting island.
        assert_eq!(islands.len(), 4);
        for island in &islands {
            assert!(island.single_op(&ctx).is_some());
        }

        let abs = created[1].single_op(&ctx).expect("abs");
        assert_eq!(ctx.op_operands(abs), &[created[0].outputs(&ctx)[0]]);

        let graph = function_graphs(&ctx, func_op)[0];
        let fetch = graph.fetch(&ctx).expect("fetch");
        assert_eq!(ctx.op_operands(fetch), &[created[1].outputs(&ctx)[0]]);

        // The waiter now depends on a sink joining both new islands.
        let waiter = islands[3];
        let sink_control = waiter.control_inputs(&ctx)[0];
        let sink = Island::from_op(&ctx, ctx.defining_op(sink_control).expect("sink op")).expect("island");
        assert_eq!(
            sink.control_inputs(&ctx),
            &[created[0].control(&ctx), created[1].control(&ctx)]
        );
        assert!(validate_module(&ctx, module).is_ok());
    }

    #[test]
    fn producer_lookup_sees_through_islands() {
        let mut ctx = IrContext::new();
        let (_module, _func_op, island) = coarse_island(&mut ctx);
        let created = split_island(&mut ctx, island);
        let out = created[1].outputs(&ctx)[0];
        let abs = created[1].single_op(&ctx).expect("abs");
        assert_eq!(producer_op(&ctx, out), Some(abs));
        assert_eq!(producer_op(&ctx, created[1].control(&ctx)), None);
    }
}
