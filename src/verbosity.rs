//! The process-wide trace level.

/// Current verbosity of the process, in the `VLOG` sense: 0 is quiet, higher
/// values ask for more detail.
pub trait VerbosityLevel {
    fn current_verbosity_level(&self) -> i32;
}

/// A verbosity level fixed at construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FixedVerbosity(pub i32);

impl FixedVerbosity {
    pub const ENV: &'static str = "TF_CPP_MAX_VLOG_LEVEL";

    /// Read `TF_CPP_MAX_VLOG_LEVEL`, defaulting to 0 when unset or invalid.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let level = lookup(Self::ENV)
            .and_then(|value| value.trim().parse().ok())
            .unwrap_or(0);
        Self(level)
    }
}

impl VerbosityLevel for FixedVerbosity {
    fn current_verbosity_level(&self) -> i32 {
        self.0
    }
}
