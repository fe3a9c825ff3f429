//! Engine configuration
//!
//! Three tiers, as for the rest of the crate:
//! - `EngineConfig::preset(Preset::Fast)` for the common case
//! - builder calls on top of a preset for small adjustments
//! - `EngineConfig::from_yaml(path)` for complete control

use super::error::{check_range, ConfigError, ConfigResult};
use super::io::{EngineConfigFile, EngineConfigOverrides};
use super::preset::Preset;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Allocation primitive used by formatters to materialize deserialized objects
pub const DEFAULT_SENSITIVE_SINK: &str =
    "System.Object System.Runtime.Serialization.FormatterServices::GetUninitializedObject(System.Type)";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Base preset (informational once overrides are applied)
    pub preset: Preset,

    /// Signature whose outputs are tainted with a fresh source id
    pub sensitive_sink: String,

    /// Maximum implementations analyzed for one virtual call (1..=1000)
    pub virtual_calls_limit: u32,

    /// Track values flowing through static fields
    pub enable_static_fields: bool,

    /// Only taint sink outputs when a sink input is already attacker-controlled
    pub input_tainted_mode: bool,

    /// Regex allow-list of signatures treated as external even with a body
    pub external_methods: Vec<String>,

    /// Re-analysis passes for a recursion loop head (1..=32)
    pub max_recursion_iterations: u32,

    /// Summary LRU capacity (1..=1_000_000)
    pub summary_cache_capacity: usize,

    /// Restrict virtual dispatch to types constructed so far
    pub use_created_types: bool,

    /// Restrict virtual dispatch to the entry assembly's reference closure
    pub scope_to_entry_assembly: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::preset(Preset::Balanced)
    }
}

impl EngineConfig {
    pub fn preset(preset: Preset) -> Self {
        let base = Self {
            preset,
            sensitive_sink: DEFAULT_SENSITIVE_SINK.to_string(),
            virtual_calls_limit: 16,
            enable_static_fields: true,
            input_tainted_mode: false,
            external_methods: Vec::new(),
            max_recursion_iterations: 4,
            summary_cache_capacity: 65_536,
            use_created_types: true,
            scope_to_entry_assembly: true,
        };

        match preset {
            Preset::Fast => Self {
                virtual_calls_limit: 4,
                enable_static_fields: false,
                max_recursion_iterations: 1,
                summary_cache_capacity: 16_384,
                ..base
            },
            Preset::Balanced | Preset::Custom => base,
            Preset::Thorough => Self {
                virtual_calls_limit: 64,
                max_recursion_iterations: 8,
                summary_cache_capacity: 262_144,
                scope_to_entry_assembly: false,
                ..base
            },
        }
    }

    pub fn validate(&self) -> ConfigResult<()> {
        check_range(
            "virtual_calls_limit",
            u64::from(self.virtual_calls_limit),
            1..=1000,
            "at least one implementation must be analyzable; large fan-outs explode summaries",
        )?;
        check_range(
            "max_recursion_iterations",
            u64::from(self.max_recursion_iterations),
            1..=32,
            "recursion loops need at least one pass",
        )?;
        check_range(
            "summary_cache_capacity",
            self.summary_cache_capacity as u64,
            1..=1_000_000,
            "the summary cache must hold at least one entry",
        )?;

        self.compile_external_methods().map(|_| ())
    }

    /// Compile the external-method allow-list
    pub fn compile_external_methods(&self) -> ConfigResult<Vec<Regex>> {
        self.external_methods
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|source| ConfigError::InvalidPattern {
                    pattern: pattern.clone(),
                    source,
                })
            })
            .collect()
    }

    /// Builder: Set sensitive_sink
    pub fn sensitive_sink(mut self, v: impl Into<String>) -> Self {
        self.sensitive_sink = v.into();
        self
    }

    /// Builder: Set virtual_calls_limit
    pub fn virtual_calls_limit(mut self, v: u32) -> Self {
        self.virtual_calls_limit = v;
        self
    }

    /// Builder: Set enable_static_fields
    pub fn enable_static_fields(mut self, v: bool) -> Self {
        self.enable_static_fields = v;
        self
    }

    /// Builder: Set input_tainted_mode
    pub fn input_tainted_mode(mut self, v: bool) -> Self {
        self.input_tainted_mode = v;
        self
    }

    /// Builder: Add an external-method pattern
    pub fn external_method(mut self, pattern: impl Into<String>) -> Self {
        self.external_methods.push(pattern.into());
        self
    }

    /// Builder: Set max_recursion_iterations
    pub fn max_recursion_iterations(mut self, v: u32) -> Self {
        self.max_recursion_iterations = v;
        self
    }

    /// Builder: Set summary_cache_capacity
    pub fn summary_cache_capacity(mut self, v: usize) -> Self {
        self.summary_cache_capacity = v;
        self
    }

    /// Builder: Set use_created_types
    pub fn use_created_types(mut self, v: bool) -> Self {
        self.use_created_types = v;
        self
    }

    /// Builder: Set scope_to_entry_assembly
    pub fn scope_to_entry_assembly(mut self, v: bool) -> Self {
        self.scope_to_entry_assembly = v;
        self
    }

    /// Load and validate a v1 YAML file
    pub fn from_yaml(path: &str) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> ConfigResult<Self> {
        let file: EngineConfigFile = serde_yaml::from_str(content)?;

        match file.version {
            None => return Err(ConfigError::MissingVersion),
            Some(1) => {}
            Some(found) => {
                return Err(ConfigError::UnsupportedVersion {
                    found,
                    supported: vec![1],
                })
            }
        }

        let preset: Preset = file.preset.parse().map_err(ConfigError::UnknownPreset)?;

        let mut config = Self::preset(preset);
        if let Some(overrides) = file.overrides {
            config.apply_overrides(overrides);
        }

        config.validate()?;
        Ok(config)
    }

    fn apply_overrides(&mut self, o: EngineConfigOverrides) {
        if let Some(v) = o.sensitive_sink {
            self.sensitive_sink = v;
        }
        if let Some(v) = o.virtual_calls_limit {
            self.virtual_calls_limit = v;
        }
        if let Some(v) = o.enable_static_fields {
            self.enable_static_fields = v;
        }
        if let Some(v) = o.input_tainted_mode {
            self.input_tainted_mode = v;
        }
        if let Some(v) = o.external_methods {
            self.external_methods = v;
        }
        if let Some(v) = o.max_recursion_iterations {
            self.max_recursion_iterations = v;
        }
        if let Some(v) = o.summary_cache_capacity {
            self.summary_cache_capacity = v;
        }
        if let Some(v) = o.use_created_types {
            self.use_created_types = v;
        }
        if let Some(v) = o.scope_to_entry_assembly {
            self.scope_to_entry_assembly = v;
        }
    }

    /// Export as a v1 YAML document (every field written as an override)
    pub fn to_yaml(&self) -> ConfigResult<String> {
        let file = EngineConfigFile {
            version: Some(1),
            preset: self.preset.to_string(),
            overrides: Some(EngineConfigOverrides {
                sensitive_sink: Some(self.sensitive_sink.clone()),
                virtual_calls_limit: Some(self.virtual_calls_limit),
                enable_static_fields: Some(self.enable_static_fields),
                input_tainted_mode: Some(self.input_tainted_mode),
                external_methods: Some(self.external_methods.clone()),
                max_recursion_iterations: Some(self.max_recursion_iterations),
                summary_cache_capacity: Some(self.summary_cache_capacity),
                use_created_types: Some(self.use_created_types),
                scope_to_entry_assembly: Some(self.scope_to_entry_assembly),
            }),
        };

        serde_yaml::to_string(&file).map_err(ConfigError::Yaml)
    }
}
