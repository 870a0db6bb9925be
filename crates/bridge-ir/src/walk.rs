//! Recursive operation traversal utilities.

use std::ops::ControlFlow;

use crate::context::IrContext;
use crate::refs::{BlockRef, OpRef, RegionRef};

/// Controls whether to descend into children during a walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkAction {
    /// Continue walking and descend into nested regions.
    Advance,
    /// Skip the nested regions of the current operation.
    Skip,
}

/// Walk all operations in a region recursively (pre-order).
pub fn walk_region<B>(
    ctx: &IrContext,
    region: RegionRef,
    f: &mut dyn FnMut(OpRef) -> ControlFlow<B, WalkAction>,
) -> ControlFlow<B, ()> {
    for &block in &ctx.region(region).blocks {
        walk_block(ctx, block, f)?;
    }
    ControlFlow::Continue(())
}

/// Walk all operations in a block recursively (pre-order).
pub fn walk_block<B>(
    ctx: &IrContext,
    block: BlockRef,
    f: &mut dyn FnMut(OpRef) -> ControlFlow<B, WalkAction>,
) -> ControlFlow<B, ()> {
    for &op in &ctx.block(block).ops {
        walk_op(ctx, op, f)?;
    }
    ControlFlow::Continue(())
}

/// Walk an operation and its nested regions recursively (pre-order).
pub fn walk_op<B>(
    ctx: &IrContext,
    op: OpRef,
    f: &mut dyn FnMut(OpRef) -> ControlFlow<B, WalkAction>,
) -> ControlFlow<B, ()> {
    match f(op) {
        ControlFlow::Break(b) => return ControlFlow::Break(b),
        ControlFlow::Continue(WalkAction::Skip) => return ControlFlow::Continue(()),
        ControlFlow::Continue(WalkAction::Advance) => {}
    }
    for &region in &ctx.op(op).regions {
        walk_region(ctx, region, f)?;
    }
    ControlFlow::Continue(())
}

/// Collect every operation nested under `op` (excluding `op` itself) in
/// post-order, so that inner operations come before their parents.
///
/// Rewrites that replace ops with nested regions use this order to handle
/// the innermost constructs first.
pub fn collect_post_order(ctx: &IrContext, op: OpRef) -> Vec<OpRef> {
    fn visit(ctx: &IrContext, op: OpRef, out: &mut Vec<OpRef>) {
        for &region in &ctx.op(op).regions {
            for &block in &ctx.region(region).blocks {
                for &child in &ctx.block(block).ops {
                    visit(ctx, child, out);
                    out.push(child);
                }
            }
        }
    }
    let mut out = Vec::new();
    visit(ctx, op, &mut out);
    out
}

/// Collect the operations matching `pred` under `op` (excluding `op`), pre-order.
pub fn collect_ops(ctx: &IrContext, op: OpRef, mut pred: impl FnMut(OpRef) -> bool) -> Vec<OpRef> {
    let mut found = Vec::new();
    for &region in &ctx.op(op).regions {
        let _ = walk_region::<()>(ctx, region, &mut |child| {
            if pred(child) {
                found.push(child);
            }
            ControlFlow::Continue(WalkAction::Advance)
        });
    }
    found
}

/// Whether `op` is nested (at any depth) inside `ancestor`.
pub fn is_nested_in(ctx: &IrContext, op: OpRef, ancestor: OpRef) -> bool {
    let mut current = ctx.parent_op(op);
    while let Some(parent) = current {
        if parent == ancestor {
            return true;
        }
        current = ctx.parent_op(parent);
    }
    false
}
