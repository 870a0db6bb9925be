//! Rebuild island control dependencies from side effects.
//!
//! Existing control edges are discarded. Walking islands in order, a
//! side-effecting island waits on the earlier islands it conflicts with: ops
//! naming a `resource` conflict with the previous access to that resource (or
//! the previous unrestricted op), and ops without one conflict with
//! everything since the previous unrestricted op. The fetch then waits on
//! every side-effecting island nothing later depends on.
//!
//! Islands wrapping only `tf.NoOp` exist to join control edges; they are
//! removed along with the edges.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use bridge_ir::dialect::tf;
use bridge_ir::dialect::tf_executor::{self, Graph, Island};
use bridge_ir::helpers::erase_op;
use bridge_ir::walk::collect_ops;
use bridge_ir::{IrContext, Module, OpRef, ValueRef};

use crate::islands::function_graphs;
use crate::pass::{Pass, PassFailure, PassResult};

pub struct UpdateControlDependencies;

pub fn create_update_control_dependencies_pass() -> Box<dyn Pass> {
    Box::new(UpdateControlDependencies)
}

impl Pass for UpdateControlDependencies {
    fn name(&self) -> &'static str {
        "ExecutorUpdateControlDependenciesPass"
    }

    fn argument(&self) -> &'static str {
        "tf-executor-update-control-dependencies"
    }

    fn run(&mut self, ctx: &mut IrContext, op: OpRef) -> PassResult {
        let module = Module::from_op(ctx, op).ok_or_else(|| PassFailure::new("expected a core.module"))?;
        for func in module.functions(ctx) {
            for graph in function_graphs(ctx, func.op()) {
                update_graph(ctx, graph);
            }
        }
        Ok(())
    }
}

/// Side effects of one island.
enum Effect {
    None,
    /// Touches only the named resources.
    Resources(BTreeSet<String>),
    /// Conflicts with every other side effect.
    Unknown,
}

fn island_effect(ctx: &IrContext, island: Island) -> Effect {
    let mut resources = BTreeSet::new();
    let mut effectful = false;
    for root in island.wrapped_ops(ctx) {
        let mut ops = vec![root];
        ops.extend(collect_ops(ctx, root, |_| true));
        for op in ops {
            if !tf::is_side_effecting(ctx, op) {
                continue;
            }
            effectful = true;
            match tf::resource(ctx, op) {
                Some(resource) => {
                    resources.insert(resource.to_owned());
                }
                None => return Effect::Unknown,
            }
        }
    }
    if effectful {
        Effect::Resources(resources)
    } else {
        Effect::None
    }
}

fn is_control_sink(ctx: &IrContext, island: Island) -> bool {
    let ops = island.wrapped_ops(ctx);
    !ops.is_empty()
        && island.outputs(ctx).is_empty()
        && ops
            .iter()
            .all(|&op| ctx.is_op(op, tf::DIALECT_NAME(), tf::NO_OP()))
}

fn update_graph(ctx: &mut IrContext, graph: Graph) {
    let fetch = graph.fetch(ctx);
    for island in graph.islands(ctx) {
        ctx.set_operands(island.op(), &[]);
    }
    if let Some(fetch) = fetch {
        let data: Vec<ValueRef> = ctx
            .op_operands(fetch)
            .iter()
            .copied()
            .filter(|&v| !tf_executor::is_control(ctx, v))
            .collect();
        ctx.set_operands(fetch, &data);
    }

    let mut removed = 0;
    for island in graph.islands(ctx) {
        if is_control_sink(ctx, island) && !ctx.has_uses(island.control(ctx)) {
            erase_op(ctx, island.op());
            removed += 1;
        }
    }

    let islands = graph.islands(ctx);
    let position: HashMap<Island, usize> = islands.iter().enumerate().map(|(i, &island)| (island, i)).collect();
    let mut last_unknown: Option<Island> = None;
    let mut last_by_resource: BTreeMap<String, Island> = BTreeMap::new();
    let mut effectful: Vec<Island> = Vec::new();
    let mut depended: HashSet<Island> = HashSet::new();
    let mut edges = 0;

    for &island in &islands {
        let mut deps: BTreeSet<Island> = BTreeSet::new();
        match island_effect(ctx, island) {
            Effect::None => continue,
            Effect::Unknown => {
                deps.extend(last_by_resource.values().copied());
                deps.extend(last_unknown);
                last_by_resource.clear();
                last_unknown = Some(island);
            }
            Effect::Resources(resources) => {
                for resource in resources {
                    match last_by_resource.get(&resource) {
                        Some(&previous) => {
                            deps.insert(previous);
                        }
                        None => deps.extend(last_unknown),
                    }
                    last_by_resource.insert(resource, island);
                }
            }
        }

        let mut ordered: Vec<Island> = deps.into_iter().collect();
        ordered.sort_by_key(|d| position.get(d).copied().unwrap_or(usize::MAX));
        let controls: Vec<ValueRef> = ordered.iter().map(|d| d.control(ctx)).collect();
        edges += controls.len();
        ctx.set_operands(island.op(), &controls);
        depended.extend(ordered);
        effectful.push(island);
    }

    if let Some(fetch) = fetch {
        for island in effectful.into_iter().filter(|i| !depended.contains(i)) {
            let control = island.control(ctx);
            ctx.push_operand(fetch, control);
        }
    }
    tracing::debug!(edges, removed_sinks = removed, "recomputed control dependencies");
}
