//! Final shape check before graph export.

use bridge_ir::dialect::func::{self, Func};
use bridge_ir::dialect::tf_executor::{self, Graph, Island};
use bridge_ir::dialect::{tf, tf_device};
use bridge_ir::walk::collect_ops;
use bridge_ir::{IrContext, Module, OpRef};

use crate::pass::{Pass, PassFailure, PassResult};

/// Checks that every function is in the shape graph export expects:
///
/// - the body is exactly one `tf_executor.graph` followed by `func.return`,
/// - the graph holds only islands and its fetch,
/// - every island wraps exactly one op,
/// - no region control flow or `tf_device` op remains,
/// - no `TPU_REPLICATED_CORE_*` device alias is left unresolved.
pub struct VerifySuitableForGraphExport;

pub fn create_verify_suitable_for_graph_export_pass() -> Box<dyn Pass> {
    Box::new(VerifySuitableForGraphExport)
}

impl Pass for VerifySuitableForGraphExport {
    fn name(&self) -> &'static str {
        "VerifySuitableForExportPass"
    }

    fn argument(&self) -> &'static str {
        "tf-verify-suitable-for-graph-export"
    }

    fn run(&mut self, ctx: &mut IrContext, op: OpRef) -> PassResult {
        let module = Module::from_op(ctx, op).ok_or_else(|| PassFailure::new("expected a core.module"))?;
        let mut problems = Vec::new();
        for func in module.functions(ctx) {
            check_function(ctx, func, &mut problems);
        }
        if problems.is_empty() {
            return Ok(());
        }
        for problem in &problems {
            tracing::error!("{problem}");
        }
        Err(PassFailure::new(problems.join("\n")))
    }
}

fn check_function(ctx: &IrContext, func: Func, problems: &mut Vec<String>) {
    let name = func
        .name(ctx)
        .map_or_else(|| "<unnamed>".to_owned(), |s| s.to_string());

    let body = func
        .entry_block(ctx)
        .map(|entry| ctx.block(entry).ops.to_vec())
        .unwrap_or_default();
    match body.as_slice() {
        [graph, ret]
            if Graph::from_op(ctx, *graph).is_some()
                && ctx.is_op(*ret, func::DIALECT_NAME(), func::RETURN()) =>
        {
            if let Some(graph) = Graph::from_op(ctx, *graph) {
                check_graph(ctx, &name, graph, problems);
            }
        }
        _ => problems.push(format!(
            "@{name}: body must be a single tf_executor.graph followed by func.return"
        )),
    }

    for op in collect_ops(ctx, func.op(), |_| true) {
        if ctx.is_op(op, tf::DIALECT_NAME(), tf::IF_REGION())
            || ctx.is_op(op, tf::DIALECT_NAME(), tf::WHILE_REGION())
            || tf_device::is_device_op(ctx, op)
        {
            problems.push(format!("@{name}: {} must be lowered before export", ctx.full_name(op)));
        }
        if let Some(device) = tf::device(ctx, op) {
            if tf_device::parse_replicated_core_alias(device).is_some() {
                problems.push(format!(
                    "@{name}: {} has unresolved device alias `{device}`",
                    ctx.full_name(op)
                ));
            }
        }
    }
}

fn check_graph(ctx: &IrContext, name: &str, graph: Graph, problems: &mut Vec<String>) {
    let Some(block) = graph.block(ctx) else {
        problems.push(format!("@{name}: tf_executor.graph has no body"));
        return;
    };
    if graph.fetch(ctx).is_none() {
        problems.push(format!("@{name}: tf_executor.graph is not terminated by tf_executor.fetch"));
    }
    for &op in &ctx.block(block).ops {
        if let Some(island) = Island::from_op(ctx, op) {
            let wrapped = island.wrapped_ops(ctx).len();
            if wrapped != 1 {
                problems.push(format!("@{name}: island {op} wraps {wrapped} ops, expected exactly one"));
            }
        } else if !ctx.is_op(op, tf_executor::DIALECT_NAME(), tf_executor::FETCH()) {
            problems.push(format!(
                "@{name}: {} is not allowed directly inside tf_executor.graph",
                ctx.full_name(op)
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use bridge_ir::builder::ModuleBuilder;
    use bridge_ir::{Attribute, validate_module};

    use super::*;
    use crate::islands::function_islands;
    use crate::passes::functional_to_executor::FunctionalToExecutorConversion;
    use crate::testing::into_islands;

    #[test]
    fn island_per_op_graph_passes() {
        let mut ctx = IrContext::new();
        let mut mb = ModuleBuilder::new(&mut ctx, "ok");
        let tensor = tf::tensor_type(mb.ctx());
        let mut fb = mb.func("main", &[tensor], &[tensor]);
        let x = fb.arg(0);
        let neg = fb.tf_op_with("Neg", &[x], 1, [("device", Attribute::from("/device:TPU:0"))]);
        let n = fb.result(neg, 0);
        fb.ret(&[n]);
        let func = fb.func();
        let module = mb.finish();
        into_islands(&mut ctx, func);

        VerifySuitableForGraphExport
            .run(&mut ctx, module.op())
            .expect("module is exportable");
        assert!(validate_module(&ctx, module).is_ok());
    }

    #[test]
    fn reports_every_problem() {
        let mut ctx = IrContext::new();
        let mut mb = ModuleBuilder::new(&mut ctx, "bad");
        let tensor = tf::tensor_type(mb.ctx());

        // Still functional.
        let mut fb = mb.func("functional", &[tensor], &[tensor]);
        let x = fb.arg(0);
        fb.ret(&[x]);

        // Coarse island with an unresolved alias.
        let mut fb = mb.func("coarse", &[tensor], &[tensor]);
        let x = fb.arg(0);
        let neg = fb.tf_op_with(
            "Neg",
            &[x],
            1,
            [("device", Attribute::from("TPU_REPLICATED_CORE_0"))],
        );
        let n = fb.result(neg, 0);
        let abs = fb.tf_op("Abs", &[n], 1);
        let a = fb.result(abs, 0);
        fb.ret(&[a]);
        let coarse = fb.func();
        let module = mb.finish();
        FunctionalToExecutorConversion
            .run(&mut ctx, coarse.op())
            .expect("convert");
        assert_eq!(function_islands(&ctx, coarse.op()).len(), 1);

        let err = VerifySuitableForGraphExport
            .run(&mut ctx, module.op())
            .expect_err("module is not exportable");
        let lines: Vec<&str> = err.message.lines().collect();
        assert_eq!(lines.len(), 3, "{err}");
        assert!(lines[0].starts_with("@functional: body must be"));
        assert!(lines[1].contains("wraps 2 ops"));
        assert!(lines[2].contains("unresolved device alias `TPU_REPLICATED_CORE_0`"));
    }
}
