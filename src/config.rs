//! Read-only configuration injected into a conversion.

use std::fmt;
use std::sync::Arc;

use bridge_passes::PassManagerOptions;

use crate::dump::{DebugDataDumper, DumpRegistry};
use crate::flags::{FeatureFlags, MlirCommonFlags};
use crate::snapshot::{FileSnapshotWriter, SnapshotWriter};
use crate::verbosity::{FixedVerbosity, VerbosityLevel};

/// Everything a conversion consults besides the module itself.
///
/// `Default` gives a quiet configuration: all flags off, no dumps, verbosity
/// 0. [`BridgeConfig::from_env`] reads the process environment instead.
#[derive(Clone)]
pub struct BridgeConfig {
    pub flags: Arc<dyn FeatureFlags>,
    pub dump_registry: Arc<dyn DumpRegistry>,
    pub verbosity: Arc<dyn VerbosityLevel>,
    pub snapshot_writer: Arc<dyn SnapshotWriter>,
    pub pass_manager: PassManagerOptions,
}

impl BridgeConfig {
    pub fn from_env() -> Self {
        Self {
            flags: Arc::new(MlirCommonFlags::from_env()),
            dump_registry: Arc::new(DebugDataDumper::from_env()),
            verbosity: Arc::new(FixedVerbosity::from_env()),
            snapshot_writer: Arc::new(FileSnapshotWriter),
            pass_manager: PassManagerOptions::default(),
        }
    }

    pub fn with_flags(mut self, flags: impl FeatureFlags + 'static) -> Self {
        self.flags = Arc::new(flags);
        self
    }

    pub fn with_dump_registry(mut self, registry: impl DumpRegistry + 'static) -> Self {
        self.dump_registry = Arc::new(registry);
        self
    }

    pub fn with_verbosity(mut self, verbosity: impl VerbosityLevel + 'static) -> Self {
        self.verbosity = Arc::new(verbosity);
        self
    }

    pub fn with_snapshot_writer(mut self, writer: impl SnapshotWriter + 'static) -> Self {
        self.snapshot_writer = Arc::new(writer);
        self
    }

    pub fn with_pass_manager_options(mut self, options: PassManagerOptions) -> Self {
        self.pass_manager = options;
        self
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            flags: Arc::new(MlirCommonFlags::default()),
            dump_registry: Arc::new(DebugDataDumper::disabled()),
            verbosity: Arc::new(FixedVerbosity::default()),
            snapshot_writer: Arc::new(FileSnapshotWriter),
            pass_manager: PassManagerOptions::default(),
        }
    }
}

impl fmt::Debug for BridgeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeConfig")
            .field("verbosity", &self.verbosity.current_verbosity_level())
            .field("pass_manager", &self.pass_manager)
            .finish_non_exhaustive()
    }
}
