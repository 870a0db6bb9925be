//! Ordered pass execution.

use bridge_ir::{IrContext, Module, validate_module};
use derive_more::{Display, Error};

use crate::execution::ExecutionContext;
use crate::instrumentation::PassInstrumentation;
use crate::pass::{Pass, PassFailure, PassInfo, PassScope};

/// Options applied to every run of a [`PassManager`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassManagerOptions {
    /// Validate the module after every pass; a structural error fails the
    /// pass that produced it.
    pub verify_each: bool,
}

impl Default for PassManagerOptions {
    fn default() -> Self {
        Self { verify_each: true }
    }
}

/// The pipeline stopped at a failing pass.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
#[display("pass `{pass}` failed: {failure}")]
pub struct PipelineError {
    #[error(not(source))]
    pub pass: &'static str,
    #[error(source)]
    pub failure: PassFailure,
}

struct PassEntry {
    pass: Box<dyn Pass>,
    scope: PassScope,
}

/// An ordered list of passes, each tagged with its scope.
///
/// Passes are appended with [`add_pass`](Self::add_pass) (module scope) or
/// [`add_nested_pass`](Self::add_nested_pass) (once per function) and run in
/// insertion order. The first failure stops the run.
#[derive(Default)]
pub struct PassManager {
    entries: Vec<PassEntry>,
    instrumentations: Vec<Box<dyn PassInstrumentation>>,
    options: PassManagerOptions,
}

impl PassManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: PassManagerOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    pub fn options(&self) -> &PassManagerOptions {
        &self.options
    }

    pub fn set_options(&mut self, options: PassManagerOptions) {
        self.options = options;
    }

    /// Schedule `pass` on the module.
    pub fn add_pass(&mut self, pass: Box<dyn Pass>) {
        self.entries.push(PassEntry {
            pass,
            scope: PassScope::Module,
        });
    }

    /// Schedule `pass` on every function of the module.
    pub fn add_nested_pass(&mut self, pass: Box<dyn Pass>) {
        self.entries.push(PassEntry {
            pass,
            scope: PassScope::Function,
        });
    }

    pub fn add_instrumentation(&mut self, instrumentation: Box<dyn PassInstrumentation>) {
        self.instrumentations.push(instrumentation);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Scheduled passes, in order.
    pub fn passes(&self) -> Vec<PassInfo> {
        self.entries
            .iter()
            .enumerate()
            .map(|(index, entry)| PassInfo {
                name: entry.pass.name(),
                argument: entry.pass.argument(),
                scope: entry.scope,
                index,
            })
            .collect()
    }

    /// `(argument, scope)` of every scheduled pass, in order.
    pub fn pass_names(&self) -> Vec<(&'static str, PassScope)> {
        self.entries
            .iter()
            .map(|entry| (entry.pass.argument(), entry.scope))
            .collect()
    }

    /// Textual pipeline, e.g. `builtin.module(a,func.func(b,c),d)`.
    ///
    /// Consecutive function-scoped passes share one `func.func(...)` group.
    pub fn pipeline_description(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        let mut nested: Vec<&'static str> = Vec::new();
        for entry in &self.entries {
            match entry.scope {
                PassScope::Function => nested.push(entry.pass.argument()),
                PassScope::Module => {
                    if !nested.is_empty() {
                        parts.push(format!("{}({})", PassScope::Function, nested.join(",")));
                        nested.clear();
                    }
                    parts.push(entry.pass.argument().to_owned());
                }
            }
        }
        if !nested.is_empty() {
            parts.push(format!("{}({})", PassScope::Function, nested.join(",")));
        }
        format!("{}({})", PassScope::Module, parts.join(","))
    }

    /// Run every pass on `module`, in order.
    pub fn run(
        &mut self,
        ctx: &mut IrContext,
        module: Module,
        exec: &ExecutionContext,
    ) -> Result<(), PipelineError> {
        let multithreaded = exec.is_multithreading_enabled();
        let mut active: Vec<&mut Box<dyn PassInstrumentation>> = Vec::new();
        for instrumentation in &mut self.instrumentations {
            if multithreaded && instrumentation.requires_single_threaded() {
                tracing::warn!(
                    instrumentation = instrumentation.name(),
                    "skipping instrumentation that requires single-threaded execution"
                );
                continue;
            }
            active.push(instrumentation);
        }

        tracing::debug!(passes = self.entries.len(), multithreaded, "running pass pipeline");
        for inst in active.iter_mut() {
            inst.run_before_pipeline(ctx, module);
        }

        let mut outcome = Ok(());
        for (index, entry) in self.entries.iter_mut().enumerate() {
            let info = PassInfo {
                name: entry.pass.name(),
                argument: entry.pass.argument(),
                scope: entry.scope,
                index,
            };
            for inst in active.iter_mut() {
                inst.run_before_pass(&info, ctx, module);
            }

            let mut result = run_entry(entry, ctx, module);
            if result.is_ok() && self.options.verify_each {
                result = validate_module(ctx, module)
                    .into_result()
                    .map_err(|err| PassFailure::new(err.to_string()));
            }

            match result {
                Ok(()) => {
                    tracing::trace!(pass = info.argument, "pass succeeded");
                    for inst in active.iter_mut() {
                        inst.run_after_pass(&info, ctx, module);
                    }
                }
                Err(failure) => {
                    tracing::error!(pass = info.argument, %failure, "pass failed");
                    for inst in active.iter_mut() {
                        inst.run_after_pass_failed(&info, &failure, ctx, module);
                    }
                    outcome = Err(PipelineError {
                        pass: info.argument,
                        failure,
                    });
                    break;
                }
            }
        }

        for inst in active.iter_mut() {
            inst.run_after_pipeline(ctx, module, outcome.is_ok());
        }
        outcome
    }
}

fn run_entry(entry: &mut PassEntry, ctx: &mut IrContext, module: Module) -> Result<(), PassFailure> {
    match entry.scope {
        PassScope::Module => entry.pass.run(ctx, module.op()),
        PassScope::Function => {
            for func in module.functions(ctx) {
                entry.pass.run(ctx, func.op())?;
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use bridge_ir::builder::ModuleBuilder;
    use bridge_ir::{OpRef, Symbol};

    use super::*;
    use crate::instrumentation::{IrPrinting, SnapshotSink};
    use crate::pass::PassResult;

    /// Records each call as `argument@op` into a shared log.
    struct Recording {
        argument: &'static str,
        log: Rc<RefCell<Vec<String>>>,
        fail: bool,
    }

    impl Pass for Recording {
        fn name(&self) -> &'static str {
            "Recording"
        }

        fn argument(&self) -> &'static str {
            self.argument
        }

        fn run(&mut self, ctx: &mut IrContext, op: OpRef) -> PassResult {
            self.log.borrow_mut().push(format!("{}@{}", self.argument, ctx.full_name(op)));
            if self.fail {
                return Err(PassFailure::new("injected"));
            }
            Ok(())
        }
    }

    fn recording(argument: &'static str, log: &Rc<RefCell<Vec<String>>>, fail: bool) -> Box<dyn Pass> {
        Box::new(Recording {
            argument,
            log: Rc::clone(log),
            fail,
        })
    }

    fn two_function_module(ctx: &mut IrContext) -> Module {
        let mut mb = ModuleBuilder::new(ctx, "pm");
        mb.func("a", &[], &[]).ret(&[]);
        mb.func("b", &[], &[]).ret(&[]);
        mb.finish()
    }

    #[test]
    fn description_groups_nested_passes() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut pm = PassManager::new();
        pm.add_pass(recording("first", &log, false));
        pm.add_nested_pass(recording("second", &log, false));
        pm.add_nested_pass(recording("third", &log, false));
        pm.add_pass(recording("fourth", &log, false));
        insta::assert_snapshot!(
            pm.pipeline_description(),
            @"builtin.module(first,func.func(second,third),fourth)"
        );
        assert_eq!(pm.pass_names()[1], ("second", PassScope::Function));
    }

    #[test]
    fn nested_passes_run_per_function() {
        let mut ctx = IrContext::new();
        let module = two_function_module(&mut ctx);
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut pm = PassManager::new();
        pm.add_pass(recording("m", &log, false));
        pm.add_nested_pass(recording("f", &log, false));

        pm.run(&mut ctx, module, &ExecutionContext::new()).expect("pipeline");
        assert_eq!(*log.borrow(), ["m@core.module", "f@func.func", "f@func.func"]);
    }

    #[test]
    fn first_failure_stops_the_run() {
        let mut ctx = IrContext::new();
        let module = two_function_module(&mut ctx);
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut pm = PassManager::new();
        pm.add_pass(recording("ok", &log, false));
        pm.add_nested_pass(recording("boom", &log, true));
        pm.add_pass(recording("never", &log, false));

        let err = pm
            .run(&mut ctx, module, &ExecutionContext::new())
            .expect_err("should fail");
        assert_eq!(err.pass, "boom");
        assert_eq!(*log.borrow(), ["ok@core.module", "boom@func.func"]);
    }

    struct CountingSink(Rc<RefCell<Vec<&'static str>>>);

    impl SnapshotSink for CountingSink {
        fn after_pass(&mut self, pass: &PassInfo, _ctx: &IrContext, _module: Module) {
            self.0.borrow_mut().push(pass.argument);
        }
    }

    #[test]
    fn ir_printing_requires_single_threaded_execution() {
        let mut ctx = IrContext::new();
        let module = two_function_module(&mut ctx);
        let log = Rc::new(RefCell::new(Vec::new()));
        let printed = Rc::new(RefCell::new(Vec::new()));

        let mut pm = PassManager::new();
        pm.add_pass(recording("only", &log, false));
        pm.add_instrumentation(Box::new(IrPrinting::new(Box::new(CountingSink(Rc::clone(&printed))))));

        pm.run(&mut ctx, module, &ExecutionContext::new()).expect("pipeline");
        assert!(printed.borrow().is_empty());

        pm.run(&mut ctx, module, &ExecutionContext::single_threaded())
            .expect("pipeline");
        assert_eq!(*printed.borrow(), ["only"]);
    }

    /// Leaves a dangling use-chain entry behind.
    struct Corrupting;

    impl Pass for Corrupting {
        fn name(&self) -> &'static str {
            "Corrupting"
        }

        fn argument(&self) -> &'static str {
            "corrupt"
        }

        fn run(&mut self, ctx: &mut IrContext, op: OpRef) -> PassResult {
            let Some(module) = Module::from_op(ctx, op) else {
                return Err(PassFailure::new("expected a module"));
            };
            let func = module
                .lookup_function(ctx, Symbol::new("a"))
                .ok_or_else(|| PassFailure::new("missing @a"))?;
            let location = ctx.op(op).location;
            let c = bridge_ir::dialect::tf::create_int_const(ctx, location, 1);
            let v = ctx.op_result(c, 0);
            let ret = func.return_op(ctx).ok_or_else(|| PassFailure::new("no return"))?;
            // The constant is never attached, so the return reads an
            // out-of-scope value.
            ctx.set_operands(ret, &[v]);
            Ok(())
        }
    }

    #[test]
    fn verify_each_turns_invalid_ir_into_pass_failure() {
        let mut ctx = IrContext::new();
        let module = two_function_module(&mut ctx);
        let mut pm = PassManager::new();
        pm.add_pass(Box::new(Corrupting));
        let err = pm
            .run(&mut ctx, module, &ExecutionContext::new())
            .expect_err("should fail verification");
        assert_eq!(err.pass, "corrupt");
        assert!(err.failure.message.contains("not in scope"), "{err}");

        let mut ctx = IrContext::new();
        let module = two_function_module(&mut ctx);
        let mut pm = PassManager::with_options(PassManagerOptions { verify_each: false });
        pm.add_pass(Box::new(Corrupting));
        assert!(pm.run(&mut ctx, module, &ExecutionContext::new()).is_ok());
    }
}
