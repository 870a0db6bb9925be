//! The `tf_executor` dialect: a graph of islands.
//!
//! A `tf_executor.graph` holds a single block of islands terminated by a
//! `tf_executor.fetch`. Each `tf_executor.island` wraps a block terminated by
//! `tf_executor.yield`; its results are the yielded data values followed by
//! one `tf_executor.control` token. Island operands are control tokens only.

use crate::context::{BlockData, IrContext, OperationDataBuilder};
use crate::refs::{BlockRef, OpRef, TypeRef, ValueRef};
use crate::symbols;
use crate::types::{Location, TypeDataBuilder};

symbols! {
    DIALECT_NAME => "tf_executor",
    GRAPH => "graph",
    ISLAND => "island",
    YIELD => "yield",
    FETCH => "fetch",
    CONTROL => "control",
}

/// The `!tf_executor.control` token type.
pub fn control_type(ctx: &mut IrContext) -> TypeRef {
    ctx.types
        .intern(TypeDataBuilder::new(DIALECT_NAME(), CONTROL()).build())
}

/// Whether `v` is a control token.
pub fn is_control(ctx: &IrContext, v: ValueRef) -> bool {
    ctx.types
        .is_dialect(ctx.value_ty(v), DIALECT_NAME(), CONTROL())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Graph(OpRef);

impl Graph {
    /// Create an unattached graph with an empty body block.
    pub fn create(ctx: &mut IrContext, location: Location, result_types: &[TypeRef]) -> Self {
        let block = ctx.create_block(BlockData::new(location, []));
        let region = ctx.create_single_block_region(location, block);
        Graph(
            OperationDataBuilder::new(location, DIALECT_NAME(), GRAPH())
                .results(result_types.iter().copied())
                .region(region)
                .create(ctx),
        )
    }

    pub fn from_op(ctx: &IrContext, op: OpRef) -> Option<Self> {
        ctx.is_op(op, DIALECT_NAME(), GRAPH()).then_some(Graph(op))
    }

    pub fn op(self) -> OpRef {
        self.0
    }

    pub fn block(self, ctx: &IrContext) -> Option<BlockRef> {
        super::region_block(ctx, self.0, 0)
    }

    pub fn fetch(self, ctx: &IrContext) -> Option<OpRef> {
        let block = self.block(ctx)?;
        ctx.block_terminator(block)
            .filter(|&op| ctx.is_op(op, DIALECT_NAME(), FETCH()))
    }

    /// Islands in block order.
    pub fn islands(self, ctx: &IrContext) -> Vec<Island> {
        match self.block(ctx) {
            Some(block) => ctx
                .block(block)
                .ops
                .iter()
                .filter_map(|&op| Island::from_op(ctx, op))
                .collect(),
            None => Vec::new(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Island(OpRef);

impl Island {
    /// Create an unattached island yielding values of `data_types`.
    ///
    /// The body block starts empty; callers append the wrapped ops and
    /// finish with [`create_yield`].
    pub fn create(
        ctx: &mut IrContext,
        location: Location,
        data_types: &[TypeRef],
        control_inputs: &[ValueRef],
    ) -> Self {
        let control = control_type(ctx);
        let block = ctx.create_block(BlockData::new(location, []));
        let region = ctx.create_single_block_region(location, block);
        Island(
            OperationDataBuilder::new(location, DIALECT_NAME(), ISLAND())
                .operands(control_inputs.iter().copied())
                .results(data_types.iter().copied())
                .result(control)
                .region(region)
                .create(ctx),
        )
    }

    pub fn from_op(ctx: &IrContext, op: OpRef) -> Option<Self> {
        ctx.is_op(op, DIALECT_NAME(), ISLAND()).then_some(Island(op))
    }

    pub fn op(self) -> OpRef {
        self.0
    }

    pub fn block(self, ctx: &IrContext) -> Option<BlockRef> {
        super::region_block(ctx, self.0, 0)
    }

    pub fn yield_op(self, ctx: &IrContext) -> Option<OpRef> {
        let block = self.block(ctx)?;
        ctx.block_terminator(block)
            .filter(|&op| ctx.is_op(op, DIALECT_NAME(), YIELD()))
    }

    /// Ops inside the island, excluding the yield.
    pub fn wrapped_ops(self, ctx: &IrContext) -> Vec<OpRef> {
        let Some(block) = self.block(ctx) else {
            return Vec::new();
        };
        ctx.block(block)
            .ops
            .iter()
            .copied()
            .filter(|&op| !ctx.is_op(op, DIALECT_NAME(), YIELD()))
            .collect()
    }

    /// The single wrapped op, if the island wraps exactly one.
    pub fn single_op(self, ctx: &IrContext) -> Option<OpRef> {
        match self.wrapped_ops(ctx).as_slice() {
            [op] => Some(*op),
            _ => None,
        }
    }

    /// Data outputs (every result but the trailing control token).
    pub fn outputs(self, ctx: &IrContext) -> &[ValueRef] {
        let results = ctx.op_results(self.0);
        &results[..results.len().saturating_sub(1)]
    }

    /// The island's control token.
    pub fn control(self, ctx: &IrContext) -> ValueRef {
        let results = ctx.op_results(self.0);
        results[results.len() - 1]
    }

    pub fn control_inputs(self, ctx: &IrContext) -> &[ValueRef] {
        ctx.op_operands(self.0)
    }
}

/// Build an unattached `tf_executor.yield`.
pub fn create_yield(ctx: &mut IrContext, location: Location, values: &[ValueRef]) -> OpRef {
    OperationDataBuilder::new(location, DIALECT_NAME(), YIELD())
        .operands(values.iter().copied())
        .create(ctx)
}

/// Build an unattached `tf_executor.fetch`.
pub fn create_fetch(ctx: &mut IrContext, location: Location, values: &[ValueRef]) -> OpRef {
    OperationDataBuilder::new(location, DIALECT_NAME(), FETCH())
        .operands(values.iter().copied())
        .create(ctx)
}

/// The graph enclosing `op` at any depth, if any.
pub fn enclosing_graph(ctx: &IrContext, op: OpRef) -> Option<Graph> {
    let mut current = ctx.parent_op(op);
    while let Some(parent) = current {
        if let Some(graph) = Graph::from_op(ctx, parent) {
            return Some(graph);
        }
        current = ctx.parent_op(parent);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::tf;
    use crate::types::Span;

    #[test]
    fn island_results_end_with_control_token() {
        let mut ctx = IrContext::new();
        let path = ctx.paths.intern("executor.mlir".to_owned());
        let loc = Location::new(path, Span::new(0, 0));
        let tensor = tf::tensor_type(&mut ctx);

        let island = Island::create(&mut ctx, loc, &[tensor], &[]);
        let body = island.block(&ctx).expect("island body");
        let c = tf::create_int_const(&mut ctx, loc, 1);
        ctx.push_op(body, c);
        let value = ctx.op_result(c, 0);
        let y = create_yield(&mut ctx, loc, &[value]);
        ctx.push_op(body, y);

        assert_eq!(island.outputs(&ctx).len(), 1);
        assert!(is_control(&ctx, island.control(&ctx)));
        assert!(!is_control(&ctx, island.outputs(&ctx)[0]));
        assert_eq!(island.wrapped_ops(&ctx), vec![c]);
        assert_eq!(island.single_op(&ctx), Some(c));
        assert_eq!(island.yield_op(&ctx), Some(y));

        let control = island.control(&ctx);
        let follower = Island::create(&mut ctx, loc, &[], &[control]);
        assert_eq!(follower.control_inputs(&ctx), &[control]);
        assert!(follower.outputs(&ctx).is_empty());
    }
}
