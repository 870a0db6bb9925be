//! Outline region-based control flow into functions.
//!
//! `tf.IfRegion` becomes `tf.If` and `tf.WhileRegion` becomes `tf.While`; each
//! region moves into a new private function named
//! `<parent>_<if|while>_<then|else|cond|body>`, with a numeric suffix when the
//! name is taken. Values the regions capture from the enclosing scope become
//! extra arguments. For loops the captures are appended to the carried values
//! so the body can pass them through unchanged.

use std::collections::HashSet;

use bridge_ir::dialect::func::{self, Func};
use bridge_ir::dialect::tf;
use bridge_ir::helpers::{collect_captures, erase_op, replace_uses_within};
use bridge_ir::walk::collect_post_order;
use bridge_ir::{
    BlockRef, IrContext, Location, Module, OpRef, OperationDataBuilder, RegionRef, Symbol, TypeRef,
    ValueRef,
};

use crate::pass::{Pass, PassFailure, PassResult};

pub struct RegionControlFlowToFunctional;

pub fn create_region_control_flow_to_functional_pass() -> Box<dyn Pass> {
    Box::new(RegionControlFlowToFunctional)
}

impl Pass for RegionControlFlowToFunctional {
    fn name(&self) -> &'static str {
        "RegionControlFlowToFunctional"
    }

    fn argument(&self) -> &'static str {
        "tf-region-control-flow-to-functional"
    }

    fn run(&mut self, ctx: &mut IrContext, op: OpRef) -> PassResult {
        let module = Module::from_op(ctx, op).ok_or_else(|| PassFailure::new("expected a core.module"))?;
        let module_block = module
            .first_block(ctx)
            .ok_or_else(|| PassFailure::new("module has no body"))?;
        let mut outliner = Outliner {
            module_block,
            taken: module
                .functions(ctx)
                .into_iter()
                .filter_map(|f| f.name(ctx).map(|s| s.to_string()))
                .collect(),
            outlined: 0,
        };

        for func in module.functions(ctx) {
            let parent = func
                .name(ctx)
                .map_or_else(|| "func".to_owned(), |s| s.to_string());
            let targets: Vec<OpRef> = collect_post_order(ctx, func.op())
                .into_iter()
                .filter(|&op| {
                    ctx.is_op(op, tf::DIALECT_NAME(), tf::IF_REGION())
                        || ctx.is_op(op, tf::DIALECT_NAME(), tf::WHILE_REGION())
                })
                .collect();
            for target in targets {
                if ctx.is_op(target, tf::DIALECT_NAME(), tf::IF_REGION()) {
                    outliner.outline_if(ctx, &parent, target)?;
                } else {
                    outliner.outline_while(ctx, &parent, target)?;
                }
            }
        }
        tracing::debug!(functions = outliner.outlined, "outlined region control flow");
        Ok(())
    }
}

struct Outliner {
    module_block: BlockRef,
    taken: HashSet<String>,
    outlined: usize,
}

impl Outliner {
    fn unique_name(&mut self, base: String) -> Symbol {
        let mut candidate = base.clone();
        let mut suffix = 0;
        while self.taken.contains(&candidate) {
            suffix += 1;
            candidate = format!("{base}_{suffix}");
        }
        let symbol = Symbol::from_dynamic(&candidate);
        self.taken.insert(candidate);
        symbol
    }

    fn outline_if(&mut self, ctx: &mut IrContext, parent: &str, op: OpRef) -> PassResult {
        let (then_region, else_region) = match ctx.op(op).regions.as_slice() {
            [then_region, else_region] => (*then_region, *else_region),
            _ => return Err(PassFailure::new("tf.IfRegion must have exactly two regions")),
        };
        let cond = *ctx
            .op_operands(op)
            .first()
            .ok_or_else(|| PassFailure::new("tf.IfRegion is missing its condition"))?;
        let location = ctx.op(op).location;
        let result_types = ctx.op_result_types(op).to_vec();
        let captures = collect_captures(ctx, &[then_region, else_region]);

        let then_name = self.unique_name(format!("{parent}_if_then"));
        let else_name = self.unique_name(format!("{parent}_if_else"));
        self.outline_region(ctx, location, then_name, then_region, &captures, &result_types, false)?;
        self.outline_region(ctx, location, else_name, else_region, &captures, &result_types, false)?;

        let attrs = ctx.op(op).attributes.clone();
        let functional = OperationDataBuilder::new(location, tf::DIALECT_NAME(), tf::IF())
            .operand(cond)
            .operands(captures.iter().copied())
            .results(result_types)
            .attrs(attrs)
            .attr(tf::ATTR_THEN_BRANCH(), then_name)
            .attr(tf::ATTR_ELSE_BRANCH(), else_name)
            .create(ctx);
        self.replace(ctx, op, functional, None)
    }

    fn outline_while(&mut self, ctx: &mut IrContext, parent: &str, op: OpRef) -> PassResult {
        let (cond_region, body_region) = match ctx.op(op).regions.as_slice() {
            [cond_region, body_region] => (*cond_region, *body_region),
            _ => return Err(PassFailure::new("tf.WhileRegion must have exactly two regions")),
        };
        let location = ctx.op(op).location;
        let inits = ctx.op_operands(op).to_vec();
        let init_types: Vec<TypeRef> = inits.iter().map(|&v| ctx.value_ty(v)).collect();
        let captures = collect_captures(ctx, &[cond_region, body_region]);
        let capture_types: Vec<TypeRef> = captures.iter().map(|&v| ctx.value_ty(v)).collect();

        let cond_terminator = region_terminator(ctx, cond_region)?;
        let cond_types: Vec<TypeRef> = ctx
            .op_operands(cond_terminator)
            .iter()
            .map(|&v| ctx.value_ty(v))
            .collect();

        let cond_name = self.unique_name(format!("{parent}_while_cond"));
        let body_name = self.unique_name(format!("{parent}_while_body"));
        self.outline_region(ctx, location, cond_name, cond_region, &captures, &cond_types, false)?;
        self.outline_region(ctx, location, body_name, body_region, &captures, &init_types, true)?;

        let attrs = ctx.op(op).attributes.clone();
        let functional = OperationDataBuilder::new(location, tf::DIALECT_NAME(), tf::WHILE())
            .operands(inits)
            .operands(captures)
            .results(init_types)
            .results(capture_types)
            .attrs(attrs)
            .attr(tf::ATTR_COND(), cond_name)
            .attr(tf::ATTR_BODY(), body_name)
            .create(ctx);
        let kept = ctx.op_results(op).len();
        self.replace(ctx, op, functional, Some(kept))
    }

    /// Swap `old` for `new` in place, forwarding the first `kept` results (all
    /// of them when `None`).
    fn replace(&mut self, ctx: &mut IrContext, old: OpRef, new: OpRef, kept: Option<usize>) -> PassResult {
        let block = ctx
            .op(old)
            .parent_block
            .ok_or_else(|| PassFailure::new("region control flow op is detached"))?;
        ctx.insert_op_before(block, old, new);
        let old_results = ctx.op_results(old).to_vec();
        let new_results = ctx.op_results(new).to_vec();
        let count = kept.unwrap_or(old_results.len());
        for (old_v, new_v) in old_results.into_iter().zip(new_results).take(count) {
            ctx.replace_all_uses(old_v, new_v);
        }
        erase_op(ctx, old);
        Ok(())
    }

    /// Move the single block of `region` into a new private function.
    ///
    /// The function takes the block's arguments followed by `captures`, and
    /// returns the operands of the region's `tf.Yield` (followed by the
    /// capture arguments when `return_captures` is set).
    #[allow(clippy::too_many_arguments)]
    fn outline_region(
        &mut self,
        ctx: &mut IrContext,
        location: Location,
        name: Symbol,
        region: RegionRef,
        captures: &[ValueRef],
        outputs: &[TypeRef],
        return_captures: bool,
    ) -> Result<Func, PassFailure> {
        let terminator = region_terminator(ctx, region)?;
        let block = ctx
            .op(terminator)
            .parent_block
            .ok_or_else(|| PassFailure::new("region terminator is detached"))?;

        let block_args = ctx.block_args(block).to_vec();
        let capture_types: Vec<TypeRef> = captures.iter().map(|&v| ctx.value_ty(v)).collect();
        let mut inputs: Vec<TypeRef> = ctx.block(block).args.clone();
        inputs.extend(&capture_types);
        let mut results = outputs.to_vec();
        if return_captures {
            results.extend(&capture_types);
        }

        let func = Func::create(ctx, location, name, &inputs, &results, true);
        let entry = func
            .entry_block(ctx)
            .ok_or_else(|| PassFailure::new("outlined function has no body"))?;
        ctx.push_op(self.module_block, func.op());

        for op in ctx.block(block).ops.to_vec() {
            ctx.detach_op(op);
            ctx.push_op(entry, op);
        }
        for (i, arg) in block_args.into_iter().enumerate() {
            let param = ctx.block_arg(entry, i as u32);
            ctx.replace_all_uses(arg, param);
        }
        let first_capture = ctx.block(block).args.len();
        for (j, &capture) in captures.iter().enumerate() {
            let param = ctx.block_arg(entry, (first_capture + j) as u32);
            replace_uses_within(ctx, capture, param, func.op());
        }

        let mut returned = ctx.op_operands(terminator).to_vec();
        if return_captures {
            returned.extend_from_slice(&ctx.block_args(entry)[first_capture..]);
        }
        erase_op(ctx, terminator);
        let ret = func::create_return(ctx, location, &returned);
        ctx.push_op(entry, ret);

        self.outlined += 1;
        tracing::trace!(function = %name, captures = captures.len(), "outlined region");
        Ok(func)
    }
}

fn region_terminator(ctx: &IrContext, region: RegionRef) -> Result<OpRef, PassFailure> {
    let block = match ctx.region(region).blocks.as_slice() {
        [block] => *block,
        _ => return Err(PassFailure::new("control flow regions must have exactly one block")),
    };
    ctx.block_terminator(block)
        .filter(|&op| ctx.is_op(op, tf::DIALECT_NAME(), tf::YIELD()))
        .ok_or_else(|| PassFailure::new("control flow region is not terminated by tf.Yield"))
}
