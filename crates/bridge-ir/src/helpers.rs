//! Free helper functions for compound IR mutations.
//!
//! These operate on `&mut IrContext` and provide higher-level operations
//! built on top of the low-level context methods.

use std::collections::{HashMap, HashSet};
use std::ops::ControlFlow;

use smallvec::SmallVec;

use crate::context::{BlockData, IrContext, OperationDataBuilder, RegionData, Use};
use crate::refs::{BlockRef, OpRef, RegionRef, ValueDef, ValueRef};
use crate::walk::{self, WalkAction};

/// Mapping from original values to their replacements, used while cloning.
#[derive(Default)]
pub struct ValueMapping {
    map: HashMap<ValueRef, ValueRef>,
}

impl ValueMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn map(&mut self, from: ValueRef, to: ValueRef) {
        self.map.insert(from, to);
    }

    /// Look up a value, falling back to the value itself when unmapped.
    pub fn lookup(&self, v: ValueRef) -> ValueRef {
        self.map.get(&v).copied().unwrap_or(v)
    }

    pub fn contains(&self, v: ValueRef) -> bool {
        self.map.contains_key(&v)
    }
}

/// Erase an operation: detach it, erase everything nested in its regions,
/// and remove it.
///
/// All result values must have no remaining uses, otherwise this panics.
pub fn erase_op(ctx: &mut IrContext, op: OpRef) {
    ctx.detach_op(op);
    let regions: SmallVec<[RegionRef; 4]> = ctx.op(op).regions.clone();
    for region in regions {
        erase_region_contents(ctx, region);
    }
    ctx.remove_op(op);
}

/// Erase every operation in every block of a region, last op first.
pub fn erase_region_contents(ctx: &mut IrContext, region: RegionRef) {
    let blocks: SmallVec<[BlockRef; 4]> = ctx.region(region).blocks.clone();
    for block in blocks {
        let ops: SmallVec<[OpRef; 8]> = ctx.block(block).ops.iter().rev().copied().collect();
        for op in ops {
            erase_op(ctx, op);
        }
    }
}

/// Move `op` out of its current block and insert it before `before`.
pub fn move_op_before(ctx: &mut IrContext, op: OpRef, before: OpRef) {
    let block = ctx
        .op(before)
        .parent_block
        .expect("move_op_before: anchor op must belong to a block");
    ctx.detach_op(op);
    ctx.insert_op_before(block, before, op);
}

/// Replace the uses of `old` by operations nested (at any depth) in `ancestor`.
pub fn replace_uses_within(ctx: &mut IrContext, old: ValueRef, new: ValueRef, ancestor: OpRef) {
    let targets: SmallVec<[Use; 4]> = ctx
        .uses(old)
        .iter()
        .copied()
        .filter(|u| u.user == ancestor || walk::is_nested_in(ctx, u.user, ancestor))
        .collect();
    for u in targets {
        ctx.set_operand(u.user, u.operand_index, new);
    }
}

/// Values used inside `regions` but defined outside all of them, in order of
/// first use (pre-order).
pub fn collect_captures(ctx: &IrContext, regions: &[RegionRef]) -> Vec<ValueRef> {
    fn inner_blocks(ctx: &IrContext, region: RegionRef, out: &mut HashSet<BlockRef>) {
        for &block in &ctx.region(region).blocks {
            out.insert(block);
            for &op in &ctx.block(block).ops {
                for &nested in &ctx.op(op).regions {
                    inner_blocks(ctx, nested, out);
                }
            }
        }
    }

    let mut inside = HashSet::new();
    for &region in regions {
        inner_blocks(ctx, region, &mut inside);
    }

    let mut seen = HashSet::new();
    let mut captures = Vec::new();
    for &region in regions {
        let _ = walk::walk_region::<()>(ctx, region, &mut |op| {
            for &v in ctx.op_operands(op) {
                let defined_inside = match ctx.value_def(v) {
                    ValueDef::OpResult(def, _) => ctx.op(def).parent_block.is_some_and(|b| inside.contains(&b)),
                    ValueDef::BlockArg(block, _) => inside.contains(&block),
                };
                if !defined_inside && seen.insert(v) {
                    captures.push(v);
                }
            }
            ControlFlow::Continue(WalkAction::Advance)
        });
    }
    captures
}

/// Deep-clone an operation, including nested regions.
///
/// Operands are remapped through `mapping`; the clone's results (and any
/// nested block arguments / results) are recorded in `mapping` so later
/// clones see them. The clone is not attached to any block.
pub fn clone_op(ctx: &mut IrContext, op: OpRef, mapping: &mut ValueMapping) -> OpRef {
    let (location, dialect, name) = {
        let data = ctx.op(op);
        (data.location, data.dialect, data.name)
    };
    let attrs = ctx.op(op).attributes.clone();
    let operands: SmallVec<[ValueRef; 8]> = ctx
        .op_operands(op)
        .iter()
        .map(|&v| mapping.lookup(v))
        .collect();
    let result_types = ctx.op_result_types(op).to_vec();

    let src_regions: SmallVec<[RegionRef; 4]> = ctx.op(op).regions.clone();
    let mut regions: SmallVec<[RegionRef; 4]> = SmallVec::new();
    for region in src_regions {
        regions.push(clone_region(ctx, region, mapping));
    }

    let mut builder = OperationDataBuilder::new(location, dialect, name)
        .operands(operands)
        .results(result_types)
        .attrs(attrs);
    for region in regions {
        builder = builder.region(region);
    }
    let new_op = builder.create(ctx);

    let old_results: SmallVec<[ValueRef; 4]> = ctx.op_results(op).into();
    let new_results: SmallVec<[ValueRef; 4]> = ctx.op_results(new_op).into();
    for (old, new) in old_results.into_iter().zip(new_results) {
        mapping.map(old, new);
    }
    new_op
}

fn clone_region(ctx: &mut IrContext, region: RegionRef, mapping: &mut ValueMapping) -> RegionRef {
    let location = ctx.region(region).location;
    let src_blocks: SmallVec<[BlockRef; 4]> = ctx.region(region).blocks.clone();
    let mut blocks: SmallVec<[BlockRef; 4]> = SmallVec::new();
    for block in src_blocks {
        let data = BlockData::new(ctx.block(block).location, ctx.block(block).args.clone());
        let new_block = ctx.create_block(data);
        let old_args: SmallVec<[ValueRef; 4]> = ctx.block_args(block).into();
        let new_args: SmallVec<[ValueRef; 4]> = ctx.block_args(new_block).into();
        for (old, new) in old_args.into_iter().zip(new_args) {
            mapping.map(old, new);
        }
        let ops: SmallVec<[OpRef; 8]> = ctx.block(block).ops.clone().into_iter().collect();
        for op in ops {
            let cloned = clone_op(ctx, op, mapping);
            ctx.push_op(new_block, cloned);
        }
        blocks.push(new_block);
    }
    ctx.create_region(RegionData {
        location,
        blocks,
        parent_op: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::refs::TypeRef;
    use crate::symbol::Symbol;
    use crate::types::*;

    fn test_ctx() -> (IrContext, Location, TypeRef) {
        let mut ctx = IrContext::new();
        let path = ctx.paths.intern("test.mlir".to_owned());
        let loc = Location::new(path, Span::new(0, 0));
        let ty = ctx
            .types
            .intern(TypeDataBuilder::new(Symbol::new("tf"), Symbol::new("tensor")).build());
        (ctx, loc, ty)
    }

    #[test]
    fn clone_remaps_operands_and_nested_regions() {
        let (mut ctx, loc, ty) = test_ctx();
        let outer = OperationDataBuilder::new(loc, Symbol::new("tf"), Symbol::new("Const"))
            .result(ty)
            .create(&mut ctx);
        let outer_v = ctx.op_result(outer, 0);

        let body = ctx.create_block(BlockData::new(loc, [ty]));
        let arg = ctx.block_arg(body, 0);
        let add = OperationDataBuilder::new(loc, Symbol::new("tf"), Symbol::new("AddV2"))
            .operands([arg, outer_v])
            .result(ty)
            .create(&mut ctx);
        ctx.push_op(body, add);
        let region = ctx.create_single_block_region(loc, body);
        let launch = OperationDataBuilder::new(loc, Symbol::new("tf_device"), Symbol::new("launch"))
            .region(region)
            .attr("device", "/device:TPU:0")
            .create(&mut ctx);

        let replacement = OperationDataBuilder::new(loc, Symbol::new("tf"), Symbol::new("Const"))
            .result(ty)
            .create(&mut ctx);
        let mut mapping = ValueMapping::new();
        mapping.map(outer_v, ctx.op_result(replacement, 0));

        let cloned = clone_op(&mut ctx, launch, &mut mapping);
        let cloned_region = ctx.op(cloned).regions[0];
        let cloned_block = ctx.region(cloned_region).blocks[0];
        let cloned_add = ctx.block(cloned_block).ops[0];

        assert_ne!(cloned_add, add);
        assert_eq!(
            ctx.op_operands(cloned_add),
            &[ctx.block_arg(cloned_block, 0), ctx.op_result(replacement, 0)]
        );
        assert_eq!(ctx.attr(cloned, Symbol::new("device")), ctx.attr(launch, Symbol::new("device")));
        // The original still uses the original values.
        assert_eq!(ctx.op_operands(add), &[arg, outer_v]);
    }

    #[test]
    fn captures_exclude_values_defined_inside() {
        let (mut ctx, loc, ty) = test_ctx();
        let outer = OperationDataBuilder::new(loc, Symbol::new("tf"), Symbol::new("Const"))
            .result(ty)
            .create(&mut ctx);
        let outer_v = ctx.op_result(outer, 0);

        let body = ctx.create_block(BlockData::new(loc, [ty]));
        let arg = ctx.block_arg(body, 0);
        let inner = OperationDataBuilder::new(loc, Symbol::new("tf"), Symbol::new("AddV2"))
            .operands([arg, outer_v])
            .result(ty)
            .create(&mut ctx);
        ctx.push_op(body, inner);
        let inner_v = ctx.op_result(inner, 0);
        let twice = OperationDataBuilder::new(loc, Symbol::new("tf"), Symbol::new("Mul"))
            .operands([inner_v, outer_v])
            .result(ty)
            .create(&mut ctx);
        ctx.push_op(body, twice);
        let region = ctx.create_single_block_region(loc, body);
        let owner = OperationDataBuilder::new(loc, Symbol::new("tf"), Symbol::new("WhileRegion"))
            .region(region)
            .create(&mut ctx);

        assert_eq!(collect_captures(&ctx, &[region]), vec![outer_v]);

        let replacement = OperationDataBuilder::new(loc, Symbol::new("tf"), Symbol::new("Const"))
            .result(ty)
            .create(&mut ctx);
        let replacement_v = ctx.op_result(replacement, 0);
        let outside_user = OperationDataBuilder::new(loc, Symbol::new("tf"), Symbol::new("Neg"))
            .operand(outer_v)
            .create(&mut ctx);
        replace_uses_within(&mut ctx, outer_v, replacement_v, owner);

        assert_eq!(ctx.op_operands(inner), &[arg, replacement_v]);
        assert_eq!(ctx.op_operands(twice), &[inner_v, replacement_v]);
        assert_eq!(ctx.op_operands(outside_user), &[outer_v]);
    }

    #[test]
    fn erase_op_releases_nested_uses() {
        let (mut ctx, loc, ty) = test_ctx();
        let outer = OperationDataBuilder::new(loc, Symbol::new("tf"), Symbol::new("Const"))
            .result(ty)
            .create(&mut ctx);
        let outer_v = ctx.op_result(outer, 0);

        let body = ctx.create_block(BlockData::new(loc, []));
        let inner = OperationDataBuilder::new(loc, Symbol::new("tf"), Symbol::new("Identity"))
            .operand(outer_v)
            .result(ty)
            .create(&mut ctx);
        ctx.push_op(body, inner);
        let region = ctx.create_single_block_region(loc, body);
        let wrapper = OperationDataBuilder::new(loc, Symbol::new("tf_device"), Symbol::new("launch"))
            .region(region)
            .create(&mut ctx);

        assert!(ctx.has_uses(outer_v));
        erase_op(&mut ctx, wrapper);
        assert!(!ctx.has_uses(outer_v));
    }
}
