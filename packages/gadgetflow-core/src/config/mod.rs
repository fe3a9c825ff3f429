//! Engine configuration
//!
//! - Level 1: `EngineConfig::preset(Preset::Fast)`
//! - Level 2: preset + builder overrides
//! - Level 3: `EngineConfig::from_yaml("scan.yaml")` (schema v1)
//!
//! ```rust,ignore
//! use gadgetflow_core::config::{EngineConfig, Preset};
//!
//! let config = EngineConfig::preset(Preset::Balanced)
//!     .virtual_calls_limit(32)
//!     .input_tainted_mode(true);
//! config.validate()?;
//! ```

pub mod engine_config;
pub mod error;
pub mod io;
pub mod preset;

pub use engine_config::{EngineConfig, DEFAULT_SENSITIVE_SINK};
pub use error::{ConfigError, ConfigResult};
pub use io::{EngineConfigFile, EngineConfigOverrides};
pub use preset::Preset;
