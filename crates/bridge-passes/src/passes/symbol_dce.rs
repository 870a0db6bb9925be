use std::collections::{HashMap, HashSet, VecDeque};

use bridge_ir::dialect::func::{self, Func};
use bridge_ir::helpers::erase_op;
use bridge_ir::walk::collect_ops;
use bridge_ir::{IrContext, Module, OpRef, Symbol};

use crate::pass::{Pass, PassFailure, PassResult};

/// Erase private functions that no public function reaches through symbol
/// references.
pub struct SymbolDce;

pub fn create_symbol_dce_pass() -> Box<dyn Pass> {
    Box::new(SymbolDce)
}

impl Pass for SymbolDce {
    fn name(&self) -> &'static str {
        "SymbolDCE"
    }

    fn argument(&self) -> &'static str {
        "symbol-dce"
    }

    fn run(&mut self, ctx: &mut IrContext, op: OpRef) -> PassResult {
        let module = Module::from_op(ctx, op).ok_or_else(|| PassFailure::new("expected a core.module"))?;
        let functions: HashMap<Symbol, Func> = module
            .functions(ctx)
            .into_iter()
            .filter_map(|f| f.name(ctx).map(|name| (name, f)))
            .collect();

        let mut live: HashSet<Symbol> = HashSet::new();
        let mut queue: VecDeque<OpRef> = VecDeque::new();
        for top in module.ops(ctx) {
            match Func::from_op(ctx, top) {
                Some(f) if f.is_private(ctx) => {}
                Some(f) => {
                    if let Some(name) = f.name(ctx) {
                        live.insert(name);
                    }
                    queue.push_back(top);
                }
                None => queue.push_back(top),
            }
        }

        while let Some(root) = queue.pop_front() {
            for referenced in referenced_symbols(ctx, root) {
                if let Some(&callee) = functions.get(&referenced) {
                    if live.insert(referenced) {
                        queue.push_back(callee.op());
                    }
                }
            }
        }

        let mut erased = 0;
        for f in module.functions(ctx) {
            let keep = f.name(ctx).is_some_and(|name| live.contains(&name));
            if !keep && f.is_private(ctx) {
                erase_op(ctx, f.op());
                erased += 1;
            }
        }
        tracing::debug!(erased, "removed unreachable functions");
        Ok(())
    }
}

/// Symbols referenced by the attributes of `root` and everything nested in
/// it, ignoring symbol definitions.
fn referenced_symbols(ctx: &IrContext, root: OpRef) -> Vec<Symbol> {
    let mut ops = vec![root];
    ops.extend(collect_ops(ctx, root, |_| true));
    let mut found = Vec::new();
    for op in ops {
        for (key, value) in &ctx.op(op).attributes {
            if *key == func::ATTR_SYM_NAME() {
                continue;
            }
            value.for_each_symbol(&mut |symbol| found.push(symbol));
        }
    }
    found
}
