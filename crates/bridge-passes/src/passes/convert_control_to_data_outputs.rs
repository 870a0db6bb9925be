//! Drop control edges already implied by data edges.
//!
//! An island that (transitively) consumes data produced by another island
//! cannot run before it, so a control edge between the two adds nothing. The
//! same holds for fetch control operands whose island feeds a fetched value.

use std::collections::{HashMap, HashSet};

use bridge_ir::dialect::tf_executor::{self, Graph, Island};
use bridge_ir::walk::collect_ops;
use bridge_ir::{IrContext, Module, OpRef, ValueRef};

use crate::islands::function_graphs;
use crate::pass::{Pass, PassFailure, PassResult};

pub struct ConvertControlToDataOutputs;

pub fn create_convert_control_to_data_outputs_pass() -> Box<dyn Pass> {
    Box::new(ConvertControlToDataOutputs)
}

impl Pass for ConvertControlToDataOutputs {
    fn name(&self) -> &'static str {
        "ConvertControlToDataOutputsPass"
    }

    fn argument(&self) -> &'static str {
        "tf-executor-convert-control-to-data-outputs"
    }

    fn run(&mut self, ctx: &mut IrContext, op: OpRef) -> PassResult {
        let module = Module::from_op(ctx, op).ok_or_else(|| PassFailure::new("expected a core.module"))?;
        let mut removed = 0;
        for func in module.functions(ctx) {
            for graph in function_graphs(ctx, func.op()) {
                removed += prune_graph(ctx, graph);
            }
        }
        tracing::debug!(removed, "dropped control edges implied by data");
        Ok(())
    }
}

/// The island of this graph defining `v`, if any.
fn defining_island(ctx: &IrContext, v: ValueRef, islands: &HashSet<Island>) -> Option<Island> {
    let def = ctx.defining_op(v)?;
    Island::from_op(ctx, def).filter(|island| islands.contains(island))
}

fn prune_graph(ctx: &mut IrContext, graph: Graph) -> usize {
    let islands = graph.islands(ctx);
    let members: HashSet<Island> = islands.iter().copied().collect();

    // Islands are in definition order, so every producer is visited first.
    let mut ancestors: HashMap<Island, HashSet<Island>> = HashMap::new();
    for &island in &islands {
        let mut reached = HashSet::new();
        for op in collect_ops(ctx, island.op(), |_| true) {
            for &v in ctx.op_operands(op) {
                let Some(producer) = defining_island(ctx, v, &members) else {
                    continue;
                };
                if producer == island || !reached.insert(producer) {
                    continue;
                }
                if let Some(upstream) = ancestors.get(&producer) {
                    reached.extend(upstream.iter().copied());
                }
            }
        }
        ancestors.insert(island, reached);
    }

    let mut removed = 0;
    for &island in &islands {
        let controls = island.control_inputs(ctx).to_vec();
        let kept: Vec<ValueRef> = controls
            .iter()
            .copied()
            .filter(|&c| {
                defining_island(ctx, c, &members)
                    .is_none_or(|source| !ancestors.get(&island).is_some_and(|a| a.contains(&source)))
            })
            .collect();
        if kept.len() != controls.len() {
            removed += controls.len() - kept.len();
            ctx.set_operands(island.op(), &kept);
        }
    }

    if let Some(fetch) = graph.fetch(ctx) {
        let operands = ctx.op_operands(fetch).to_vec();
        let mut fed: HashSet<Island> = HashSet::new();
        for &v in operands.iter().filter(|&&v| !tf_executor::is_control(ctx, v)) {
            if let Some(producer) = defining_island(ctx, v, &members) {
                fed.insert(producer);
                if let Some(upstream) = ancestors.get(&producer) {
                    fed.extend(upstream.iter().copied());
                }
            }
        }
        let kept: Vec<ValueRef> = operands
            .iter()
            .copied()
            .filter(|&v| {
                !tf_executor::is_control(ctx, v)
                    || defining_island(ctx, v, &members).is_none_or(|source| !fed.contains(&source))
            })
            .collect();
        if kept.len() != operands.len() {
            removed += operands.len() - kept.len();
            ctx.set_operands(fetch, &kept);
        }
    }
    removed
}
