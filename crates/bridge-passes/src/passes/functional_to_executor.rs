//! Wrap a functional body into a single-island executor graph.

use bridge_ir::dialect::func::Func;
use bridge_ir::dialect::tf_executor::{self, Graph, Island};
use bridge_ir::{IrContext, OpRef, TypeRef};

use crate::islands::function_graphs;
use crate::pass::{Pass, PassFailure, PassResult};

pub struct FunctionalToExecutorConversion;

pub fn create_functional_to_executor_conversion_pass() -> Box<dyn Pass> {
    Box::new(FunctionalToExecutorConversion)
}

impl Pass for FunctionalToExecutorConversion {
    fn name(&self) -> &'static str {
        "FunctionalToExecutorDialectConversion"
    }

    fn argument(&self) -> &'static str {
        "tf-functional-to-executor-conversion"
    }

    fn run(&mut self, ctx: &mut IrContext, op: OpRef) -> PassResult {
        let func = Func::from_op(ctx, op).ok_or_else(|| PassFailure::new("expected a func.func"))?;
        if !function_graphs(ctx, op).is_empty() {
            return Ok(());
        }
        let entry = func
            .entry_block(ctx)
            .ok_or_else(|| PassFailure::new("function has no body"))?;
        let ret = func
            .return_op(ctx)
            .ok_or_else(|| PassFailure::new("function body is not terminated by func.return"))?;
        let location = ctx.op(op).location;

        let returned = ctx.op_operands(ret).to_vec();
        let types: Vec<TypeRef> = returned.iter().map(|&v| ctx.value_ty(v)).collect();
        let body_ops: Vec<OpRef> = ctx
            .block(entry)
            .ops
            .iter()
            .copied()
            .filter(|&o| o != ret)
            .collect();

        let graph = Graph::create(ctx, location, &types);
        let graph_block = graph
            .block(ctx)
            .ok_or_else(|| PassFailure::new("graph has no body"))?;
        ctx.insert_op_before(entry, ret, graph.op());

        let island = Island::create(ctx, location, &types, &[]);
        let island_block = island
            .block(ctx)
            .ok_or_else(|| PassFailure::new("island has no body"))?;
        ctx.push_op(graph_block, island.op());
        for body_op in &body_ops {
            ctx.detach_op(*body_op);
            ctx.push_op(island_block, *body_op);
        }
        let y = tf_executor::create_yield(ctx, location, &returned);
        ctx.push_op(island_block, y);

        let outputs = island.outputs(ctx).to_vec();
        let fetch = tf_executor::create_fetch(ctx, location, &outputs);
        ctx.push_op(graph_block, fetch);

        let results = ctx.op_results(graph.op()).to_vec();
        ctx.set_operands(ret, &results);
        tracing::trace!(ops = body_ops.len(), "wrapped function body in a graph");
        Ok(())
    }
}
