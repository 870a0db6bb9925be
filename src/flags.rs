//! Process-wide feature flags consulted while assembling the pipeline.

/// Flag gating `tf-executor-convert-control-to-data-outputs`.
pub const ENABLE_CONVERT_CONTROL_TO_DATA_OUTPUTS: &str = "enable_convert_control_to_data_outputs";

/// Read-only view of named boolean flags. Unknown names read as `false`.
pub trait FeatureFlags {
    fn get_flag(&self, name: &str) -> bool;
}

/// Flags shared by the MLIR-based bridges.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MlirCommonFlags {
    pub enable_convert_control_to_data_outputs_pass: bool,
}

impl MlirCommonFlags {
    pub const ENABLE_CONVERT_CONTROL_TO_DATA_OUTPUTS_ENV: &'static str =
        "TF_MLIR_ENABLE_CONVERT_CONTROL_TO_DATA_OUTPUTS_PASS";

    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load flags through `lookup`, which maps an environment variable name
    /// to its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            enable_convert_control_to_data_outputs_pass: lookup(Self::ENABLE_CONVERT_CONTROL_TO_DATA_OUTPUTS_ENV)
                .is_some_and(|value| parse_bool(&value)),
        }
    }
}

impl FeatureFlags for MlirCommonFlags {
    fn get_flag(&self, name: &str) -> bool {
        match name {
            ENABLE_CONVERT_CONTROL_TO_DATA_OUTPUTS => self.enable_convert_control_to_data_outputs_pass,
            _ => false,
        }
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
