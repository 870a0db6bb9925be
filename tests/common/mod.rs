//! In-memory collaborators and module fixtures for the integration tests.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bridge_ir::builder::ModuleBuilder;
use bridge_ir::dialect::func::Func;
use bridge_ir::dialect::tf;
use bridge_ir::{IrContext, Module};
use bridge_passes::{PassInfo, PassInstrumentation};
use executor_bridge::snapshot::{DumpError, FileSnapshotWriter, SnapshotWriter};
use executor_bridge::{DumpRegistry, FeatureFlags, VerbosityLevel};
use parking_lot::Mutex;

/// Flags with a fixed answer for every name in `enabled`.
#[allow(dead_code)]
pub struct FakeFlags {
    pub enabled: Vec<&'static str>,
}

impl FeatureFlags for FakeFlags {
    fn get_flag(&self, name: &str) -> bool {
        self.enabled.contains(&name)
    }
}

/// A registry with a fixed set of active groups, naming files
/// `<dir>/<group>.<tag>.mlir`.
#[allow(dead_code)]
pub struct FakeRegistry {
    pub groups: Vec<&'static str>,
    pub dir: PathBuf,
}

impl DumpRegistry for FakeRegistry {
    fn should_dump(&self, _module_name: &str, group: &str) -> bool {
        self.groups.contains(&group)
    }

    fn dump_filename(&self, _module_name: &str, group: &str, tag: &str) -> Option<PathBuf> {
        Some(self.dir.join(format!("{group}.{tag}.mlir")))
    }
}

#[allow(dead_code)]
pub struct FakeVerbosity(pub i32);

impl VerbosityLevel for FakeVerbosity {
    fn current_verbosity_level(&self) -> i32 {
        self.0
    }
}

/// Records every snapshot path, optionally writing the file too.
#[allow(dead_code)]
#[derive(Clone, Default)]
pub struct RecordingWriter {
    pub paths: Arc<Mutex<Vec<PathBuf>>>,
    pub write_files: bool,
}

#[allow(dead_code)]
impl RecordingWriter {
    pub fn writing_files() -> Self {
        Self {
            write_files: true,
            ..Self::default()
        }
    }

    pub fn written(&self) -> Vec<PathBuf> {
        self.paths.lock().clone()
    }
}

impl SnapshotWriter for RecordingWriter {
    fn write_snapshot(&self, ctx: &IrContext, module: Module, path: &Path, context: &str) -> Result<(), DumpError> {
        self.paths.lock().push(path.to_path_buf());
        if self.write_files {
            FileSnapshotWriter.write_snapshot(ctx, module, path, context)?;
        }
        Ok(())
    }
}

/// Records the argument of every pass that starts.
#[allow(dead_code)]
#[derive(Clone, Default)]
pub struct PassRecorder {
    pub started: Arc<Mutex<Vec<&'static str>>>,
}

#[allow(dead_code)]
impl PassRecorder {
    pub fn started(&self) -> Vec<&'static str> {
        self.started.lock().clone()
    }
}

impl PassInstrumentation for PassRecorder {
    fn name(&self) -> &'static str {
        "pass-recorder"
    }

    fn run_before_pass(&mut self, pass: &PassInfo, _ctx: &IrContext, _module: Module) {
        self.started.lock().push(pass.argument);
    }
}

/// `@main(%x) -> %x` with a single `tf.Neg` in between.
#[allow(dead_code)]
pub fn neg_module(ctx: &mut IrContext, name: &str) -> (Module, Func) {
    let mut mb = ModuleBuilder::new(ctx, name);
    let tensor = tf::tensor_type(mb.ctx());
    let mut fb = mb.func("main", &[tensor], &[tensor]);
    let x = fb.arg(0);
    let neg = fb.tf_op("Neg", &[x], 1);
    let y = fb.result(neg, 0);
    fb.ret(&[y]);
    let func = fb.func();
    (mb.finish(), func)
}
