//! Writing IR snapshots to disk.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use bridge_ir::printer::print_module;
use bridge_ir::{IrContext, Module};
use derive_more::{Display, Error};

/// A snapshot could not be written.
#[derive(Debug, Display, Error)]
pub enum DumpError {
    #[display("failed to create dump directory {}: {source}", path.display())]
    CreateDir { path: PathBuf, source: io::Error },
    #[display("failed to write snapshot {}: {source}", path.display())]
    Write { path: PathBuf, source: io::Error },
}

/// Persists a textual snapshot of a module.
pub trait SnapshotWriter {
    /// Write `module` to `path`. `context` describes the pipeline that
    /// produced or will consume the snapshot.
    fn write_snapshot(&self, ctx: &IrContext, module: Module, path: &Path, context: &str) -> Result<(), DumpError>;
}

/// Writes the printed module to a file, creating parent directories.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileSnapshotWriter;

impl SnapshotWriter for FileSnapshotWriter {
    fn write_snapshot(&self, ctx: &IrContext, module: Module, path: &Path, context: &str) -> Result<(), DumpError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| DumpError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let text = format!("// pipeline: {context}\n{}", print_module(ctx, module.op()));
        fs::write(path, text).map_err(|source| DumpError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "wrote IR snapshot");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use bridge_ir::builder::ModuleBuilder;
    use bridge_ir::dialect::tf;

    use super::*;

    fn tiny_module(ctx: &mut IrContext) -> Module {
        let mut mb = ModuleBuilder::new(ctx, "tiny");
        let tensor = tf::tensor_type(mb.ctx());
        let mut fb = mb.func("main", &[tensor], &[tensor]);
        let x = fb.arg(0);
        fb.ret(&[x]);
        mb.finish()
    }

    #[test]
    fn writes_header_and_module_creating_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/tiny.0000.main.before.mlir");
        let mut ctx = IrContext::new();
        let module = tiny_module(&mut ctx);

        FileSnapshotWriter
            .write_snapshot(&ctx, module, &path, "builtin.module(symbol-dce)")
            .unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("// pipeline: builtin.module(symbol-dce)\n"));
        assert!(text.contains("@main"));
    }

    #[test]
    fn reports_unwritable_destination() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, "").unwrap();
        let mut ctx = IrContext::new();
        let module = tiny_module(&mut ctx);

        let err = FileSnapshotWriter
            .write_snapshot(&ctx, module, &blocker.join("x.mlir"), "")
            .unwrap_err();
        assert!(matches!(err, DumpError::CreateDir { .. }), "{err}");
    }
}
