//! Expand `tf_device.parallel_execute` into one island per branch.

use bridge_ir::dialect::tf_device;
use bridge_ir::dialect::tf_executor::{self, Island};
use bridge_ir::helpers::erase_op;
use bridge_ir::{IrContext, OpRef, TypeRef, ValueRef};

use crate::islands::{function_islands, retire_island, split_island};
use crate::pass::{Pass, PassFailure, PassResult};

pub struct ParallelExecuteToIslands;

pub fn create_parallel_execute_to_islands_pass() -> Box<dyn Pass> {
    Box::new(ParallelExecuteToIslands)
}

impl Pass for ParallelExecuteToIslands {
    fn name(&self) -> &'static str {
        "ParallelExecuteToIslandsPass"
    }

    fn argument(&self) -> &'static str {
        "tf-parallel-execute-to-islands"
    }

    fn run(&mut self, ctx: &mut IrContext, op: OpRef) -> PassResult {
        for island in function_islands(ctx, op) {
            let Some(parallel) = island.single_op(ctx).filter(|&o| {
                ctx.is_op(o, tf_device::DIALECT_NAME(), tf_device::PARALLEL_EXECUTE())
            }) else {
                continue;
            };
            expand_parallel_execute(ctx, island, parallel)?;
        }
        Ok(())
    }
}

fn expand_parallel_execute(ctx: &mut IrContext, island: Island, parallel: OpRef) -> PassResult {
    let location = ctx.op(island.op()).location;
    let graph_block = ctx
        .op(island.op())
        .parent_block
        .ok_or_else(|| PassFailure::new("parallel_execute island is detached"))?;
    let controls = island.control_inputs(ctx).to_vec();
    let regions = ctx.op(parallel).regions.to_vec();

    let mut branch_outputs: Vec<ValueRef> = Vec::new();
    let mut branches = Vec::with_capacity(regions.len());
    for (index, region) in regions.into_iter().enumerate() {
        let block = match ctx.region(region).blocks.as_slice() {
            [block] => *block,
            _ => {
                return Err(PassFailure::new(format!(
                    "branch {index} of tf_device.parallel_execute must have exactly one block"
                )));
            }
        };
        let terminator = ctx
            .block_terminator(block)
            .filter(|&t| ctx.is_op(t, tf_device::DIALECT_NAME(), tf_device::RETURN()))
            .ok_or_else(|| {
                PassFailure::new(format!(
                    "branch {index} of tf_device.parallel_execute is not terminated by tf_device.return"
                ))
            })?;
        let returned = ctx.op_operands(terminator).to_vec();
        let types: Vec<TypeRef> = returned.iter().map(|&v| ctx.value_ty(v)).collect();

        let branch = Island::create(ctx, location, &types, &controls);
        ctx.insert_op_before(graph_block, island.op(), branch.op());
        let branch_block = branch
            .block(ctx)
            .ok_or_else(|| PassFailure::new("branch island has no body"))?;
        for op in ctx.block(block).ops.to_vec() {
            if op == terminator {
                continue;
            }
            ctx.detach_op(op);
            ctx.push_op(branch_block, op);
        }
        erase_op(ctx, terminator);
        let y = tf_executor::create_yield(ctx, location, &returned);
        ctx.push_op(branch_block, y);

        branch_outputs.extend_from_slice(branch.outputs(ctx));
        branches.push(branch);
    }

    let results = ctx.op_results(parallel).to_vec();
    if results.len() != branch_outputs.len() {
        return Err(PassFailure::new(format!(
            "tf_device.parallel_execute has {} results but its branches return {} values",
            results.len(),
            branch_outputs.len()
        )));
    }
    for (result, output) in results.into_iter().zip(branch_outputs) {
        ctx.replace_all_uses(result, output);
    }

    let replacements = match island.yield_op(ctx) {
        Some(y) => ctx.op_operands(y).to_vec(),
        None => Vec::new(),
    };
    let branch_controls: Vec<ValueRef> = branches.iter().map(|b| b.control(ctx)).collect();
    retire_island(ctx, island, &replacements, &branch_controls);
    tracing::debug!(branches = branches.len(), "expanded tf_device.parallel_execute");

    for branch in branches {
        split_island(ctx, branch);
    }
    Ok(())
}
