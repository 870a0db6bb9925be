use bridge_ir::dialect::func::Func;
use bridge_ir::{IrContext, OpRef};

use crate::islands::split_function_islands;
use crate::pass::{Pass, PassFailure, PassResult};

/// Give every wrapped op its own island.
pub struct SplitIntoIslandPerOp;

pub fn create_split_into_island_per_op_pass() -> Box<dyn Pass> {
    Box::new(SplitIntoIslandPerOp)
}

impl Pass for SplitIntoIslandPerOp {
    fn name(&self) -> &'static str {
        "SplitIntoIslandPerOp"
    }

    fn argument(&self) -> &'static str {
        "tf-executor-split-into-island-per-op"
    }

    fn run(&mut self, ctx: &mut IrContext, op: OpRef) -> PassResult {
        Func::from_op(ctx, op).ok_or_else(|| PassFailure::new("expected a func.func"))?;
        split_function_islands(ctx, op);
        Ok(())
    }
}
