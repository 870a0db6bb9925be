//! Hooks observing a pipeline run.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bridge_ir::{IrContext, Module};
use parking_lot::Mutex;

use crate::pass::{PassFailure, PassInfo};

/// Observer of a pass manager run. Every hook defaults to doing nothing.
#[allow(unused_variables)]
pub trait PassInstrumentation {
    fn name(&self) -> &'static str;

    /// Whether the instrumentation only makes sense when passes run one at a
    /// time with deterministic output.
    fn requires_single_threaded(&self) -> bool {
        false
    }

    fn run_before_pipeline(&mut self, ctx: &IrContext, module: Module) {}

    fn run_before_pass(&mut self, pass: &PassInfo, ctx: &IrContext, module: Module) {}

    fn run_after_pass(&mut self, pass: &PassInfo, ctx: &IrContext, module: Module) {}

    fn run_after_pass_failed(
        &mut self,
        pass: &PassInfo,
        failure: &PassFailure,
        ctx: &IrContext,
        module: Module,
    ) {
    }

    fn run_after_pipeline(&mut self, ctx: &IrContext, module: Module, succeeded: bool) {}
}

// ============================================================================
// IR printing
// ============================================================================

/// Destination for per-pass module snapshots.
pub trait SnapshotSink {
    /// Record the module as it stands after `pass`.
    fn after_pass(&mut self, pass: &PassInfo, ctx: &IrContext, module: Module);
}

/// Snapshots the whole module after every pass.
pub struct IrPrinting {
    sink: Box<dyn SnapshotSink>,
}

impl IrPrinting {
    pub fn new(sink: Box<dyn SnapshotSink>) -> Self {
        Self { sink }
    }
}

impl PassInstrumentation for IrPrinting {
    fn name(&self) -> &'static str {
        "ir-printing"
    }

    fn requires_single_threaded(&self) -> bool {
        true
    }

    fn run_after_pass(&mut self, pass: &PassInfo, ctx: &IrContext, module: Module) {
        self.sink.after_pass(pass, ctx, module);
    }
}

// ============================================================================
// Timing
// ============================================================================

/// Wall time spent in each pass of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimingReport {
    pub passes: Vec<(&'static str, Duration)>,
    pub total: Duration,
}

impl fmt::Display for TimingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "===- Pass execution timing report -===")?;
        writeln!(f, "  Total wall time: {:.4}s", self.total.as_secs_f64())?;
        for (argument, elapsed) in &self.passes {
            writeln!(f, "  {:.4}s  {argument}", elapsed.as_secs_f64())?;
        }
        Ok(())
    }
}

/// Measures each pass and logs a [`TimingReport`] when the run finishes.
///
/// The report stays readable through [`PassTiming::report`] after the
/// instrumentation has been handed to a pass manager.
#[derive(Default)]
pub struct PassTiming {
    report: Arc<Mutex<TimingReport>>,
    pipeline_start: Option<Instant>,
    pass_start: Option<Instant>,
}

impl PassTiming {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared handle to the report filled in by the run.
    pub fn report(&self) -> Arc<Mutex<TimingReport>> {
        Arc::clone(&self.report)
    }

    fn finish_pass(&mut self, pass: &PassInfo) {
        if let Some(start) = self.pass_start.take() {
            self.report.lock().passes.push((pass.argument, start.elapsed()));
        }
    }
}

impl PassInstrumentation for PassTiming {
    fn name(&self) -> &'static str {
        "pass-timing"
    }

    fn run_before_pipeline(&mut self, _ctx: &IrContext, _module: Module) {
        *self.report.lock() = TimingReport::default();
        self.pipeline_start = Some(Instant::now());
    }

    fn run_before_pass(&mut self, _pass: &PassInfo, _ctx: &IrContext, _module: Module) {
        self.pass_start = Some(Instant::now());
    }

    fn run_after_pass(&mut self, pass: &PassInfo, _ctx: &IrContext, _module: Module) {
        self.finish_pass(pass);
    }

    fn run_after_pass_failed(
        &mut self,
        pass: &PassInfo,
        _failure: &PassFailure,
        _ctx: &IrContext,
        _module: Module,
    ) {
        self.finish_pass(pass);
    }

    fn run_after_pipeline(&mut self, _ctx: &IrContext, _module: Module, _succeeded: bool) {
        let mut report = self.report.lock();
        if let Some(start) = self.pipeline_start.take() {
            report.total = start.elapsed();
        }
        tracing::info!("{}", *report);
    }
}
