//! Configuration types for the evaluation engine
//!
//! Defines:
//! - `EngineSettings` - Top-level settings read from `.formwork/config.toml`
//! - `BehaviorSettings`, `DependencySettings`, `ListSettings`

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Global engine settings
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct EngineSettings {
    #[serde(default)]
    pub behavior: BehaviorSettings,

    #[serde(default)]
    pub dependencies: DependencySettings,

    #[serde(default)]
    pub lists: ListSettings,
}

/// Behavior settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BehaviorSettings {
    /// Clear a field's value when it becomes conditionally hidden
    #[serde(default = "default_true")]
    pub clear_hidden_data: bool,

    /// Re-validate a field after every committed change
    #[serde(default)]
    pub validate_on_change: bool,
}

impl Default for BehaviorSettings {
    fn default() -> Self {
        Self {
            clear_hidden_data: true,
            validate_on_change: false,
        }
    }
}

/// Dependency resolver settings
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct DependencySettings {
    /// Debounce applied when a dependency declares none (0 = resolve inline)
    #[serde(default)]
    pub default_debounce_ms: u64,
}

impl DependencySettings {
    pub fn default_debounce(&self) -> Option<Duration> {
        (self.default_debounce_ms > 0).then(|| Duration::from_millis(self.default_debounce_ms))
    }
}

/// List operation settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ListSettings {
    /// Reject removals that would drop a list below its minimum
    #[serde(default)]
    pub enforce_min_on_remove: bool,

    /// Ignore additions once a list holds its maximum
    #[serde(default = "default_true")]
    pub enforce_max_on_add: bool,
}

impl Default for ListSettings {
    fn default() -> Self {
        Self {
            enforce_min_on_remove: false,
            enforce_max_on_add: true,
        }
    }
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = EngineSettings::default();
        assert!(settings.behavior.clear_hidden_data);
        assert!(!settings.behavior.validate_on_change);
        assert_eq!(settings.dependencies.default_debounce(), None);
        assert!(!settings.lists.enforce_min_on_remove);
        assert!(settings.lists.enforce_max_on_add);
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let settings: EngineSettings = toml::from_str("[lists]\nenforce_min_on_remove = true\n").unwrap();
        assert!(settings.lists.enforce_min_on_remove);
        assert!(settings.lists.enforce_max_on_add);
        assert!(settings.behavior.clear_hidden_data);
    }

    #[test]
    fn test_default_debounce_duration() {
        let settings = DependencySettings {
            default_debounce_ms: 250,
        };
        assert_eq!(settings.default_debounce(), Some(Duration::from_millis(250)));
    }
}
