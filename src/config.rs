//! Configuration surface: the six PDG construction switches plus
//! driver-level settings, loadable from a TOML file or defaulted.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::errors::CoreError;

/// The six boolean switches that shape PDG construction (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PdgConfig {
    pub build_control_dependence: bool,
    pub build_data_dependence: bool,
    pub build_execution_dependence: bool,
    pub build_control_dependence_from_enter_to_all_nodes: bool,
    pub build_control_dependence_from_enter_to_parameter_nodes: bool,
    pub avoid_def_propagation_when_building_data_dependence: bool,
}

impl Default for PdgConfig {
    fn default() -> Self {
        Self {
            build_control_dependence: true,
            build_data_dependence: true,
            build_execution_dependence: true,
            build_control_dependence_from_enter_to_all_nodes: false,
            build_control_dependence_from_enter_to_parameter_nodes: false,
            avoid_def_propagation_when_building_data_dependence: true,
        }
    }
}

/// Output format for the graph emitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmitFormat {
    Edges,
    Dot,
}

impl Default for EmitFormat {
    fn default() -> Self {
        EmitFormat::Edges
    }
}

/// Top-level driver configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub pdg: PdgConfig,
    pub emit_format: EmitFormat,
    pub log_filter: String,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            pdg: PdgConfig::default(),
            emit_format: EmitFormat::default(),
            log_filter: "warn".to_string(),
        }
    }
}

impl CoreConfig {
    /// Load configuration from a TOML file, falling back to defaults for
    /// any field the file omits.
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let text = std::fs::read_to_string(path).map_err(|e| CoreError::io(path, e))?;
        toml::from_str(&text).map_err(|e| CoreError::config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = PdgConfig::default();
        assert!(cfg.build_control_dependence);
        assert!(cfg.build_data_dependence);
        assert!(cfg.build_execution_dependence);
        assert!(!cfg.build_control_dependence_from_enter_to_all_nodes);
        assert!(!cfg.build_control_dependence_from_enter_to_parameter_nodes);
        assert!(cfg.avoid_def_propagation_when_building_data_dependence);
    }

    #[test]
    fn partial_toml_fills_remaining_defaults() {
        let parsed: CoreConfig = toml::from_str("log_filter = \"debug\"\n").unwrap();
        assert_eq!(parsed.log_filter, "debug");
        assert!(parsed.pdg.build_control_dependence);
    }
}
