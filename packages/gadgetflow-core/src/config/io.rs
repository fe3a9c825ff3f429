//! Configuration file schema
//!
//! Loading/exporting is implemented on `EngineConfig` (engine_config.rs).

use serde::{Deserialize, Serialize};

/// YAML Schema v1
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfigFile {
    /// Schema version (always 1 for v1); optional so a missing field can be reported
    #[serde(default)]
    pub version: Option<u32>,

    /// Base preset
    pub preset: String,

    /// Fine-grained overrides applied on top of the preset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overrides: Option<EngineConfigOverrides>,
}

/// Per-field overrides; absent fields keep the preset value
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfigOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sensitive_sink: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub virtual_calls_limit: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_static_fields: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_tainted_mode: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_methods: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_recursion_iterations: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary_cache_capacity: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_created_types: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope_to_entry_assembly: Option<bool>,
}
