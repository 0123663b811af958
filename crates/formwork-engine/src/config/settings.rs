//! Settings parser for .formwork/config.toml

use std::path::Path;

use formwork_core::prelude::*;

use super::types::EngineSettings;

pub const CONFIG_FILENAME: &str = "config.toml";
pub const FORMWORK_DIR: &str = ".formwork";

const DEFAULT_CONFIG: &str = r#"# formwork engine configuration

[behavior]
clear_hidden_data = true     # Clear values when a field becomes conditionally hidden
validate_on_change = false   # Re-validate a field after each committed change

[dependencies]
default_debounce_ms = 0      # Used when a dependency declares no delay (0 = inline)

[lists]
enforce_min_on_remove = false  # false: removal below min is allowed, the list turns invalid
enforce_max_on_add = true      # Additions beyond max are ignored
"#;

/// Load settings from .formwork/config.toml
///
/// Returns default settings if the file doesn't exist or can't be parsed.
pub fn load_settings(project_path: &Path) -> EngineSettings {
    let config_path = project_path.join(FORMWORK_DIR).join(CONFIG_FILENAME);

    if !config_path.exists() {
        debug!("No config file at {:?}, using defaults", config_path);
        return EngineSettings::default();
    }

    match std::fs::read_to_string(&config_path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(settings) => {
                debug!("Loaded settings from {:?}", config_path);
                settings
            }
            Err(e) => {
                warn!("Failed to parse {:?}: {}", config_path, e);
                EngineSettings::default()
            }
        },
        Err(e) => {
            warn!("Failed to read {:?}: {}", config_path, e);
            EngineSettings::default()
        }
    }
}

/// Create a commented default config in .formwork/
///
/// An existing config file is left untouched.
pub fn init_config_dir(project_path: &Path) -> Result<()> {
    let formwork_dir = project_path.join(FORMWORK_DIR);

    if !formwork_dir.exists() {
        std::fs::create_dir_all(&formwork_dir)
            .map_err(|e| Error::config(format!("Failed to create .formwork dir: {}", e)))?;
    }

    let config_path = formwork_dir.join(CONFIG_FILENAME);
    if !config_path.exists() {
        std::fs::write(&config_path, DEFAULT_CONFIG)
            .map_err(|e| Error::config(format!("Failed to write config.toml: {}", e)))?;
        info!("Wrote default settings to {:?}", config_path);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_settings_defaults() {
        let temp = tempdir().unwrap();
        let settings = load_settings(temp.path());

        assert!(settings.behavior.clear_hidden_data);
        assert!(!settings.behavior.validate_on_change);
        assert_eq!(settings.dependencies.default_debounce_ms, 0);
        assert!(settings.lists.enforce_max_on_add);
    }

    #[test]
    fn test_load_settings_custom() {
        let temp = tempdir().unwrap();
        let dir = temp.path().join(".formwork");
        std::fs::create_dir_all(&dir).unwrap();

        let config = r#"
[behavior]
validate_on_change = true

[dependencies]
default_debounce_ms = 300

[lists]
enforce_min_on_remove = true
"#;
        std::fs::write(dir.join("config.toml"), config).unwrap();

        let settings = load_settings(temp.path());

        assert!(settings.behavior.validate_on_change);
        assert!(settings.behavior.clear_hidden_data);
        assert_eq!(settings.dependencies.default_debounce_ms, 300);
        assert!(settings.lists.enforce_min_on_remove);
    }

    #[test]
    fn test_load_settings_invalid_toml() {
        let temp = tempdir().unwrap();
        let dir = temp.path().join(".formwork");
        std::fs::create_dir_all(&dir).unwrap();

        std::fs::write(dir.join("config.toml"), "not valid toml {{{{").unwrap();

        let settings = load_settings(temp.path());
        assert_eq!(settings, EngineSettings::default());
    }

    #[test]
    fn test_init_config_dir() {
        let temp = tempdir().unwrap();

        init_config_dir(temp.path()).unwrap();

        let path = temp.path().join(".formwork/config.toml");
        assert!(path.exists());

        let content = std::fs::read_to_string(path).unwrap();
        let parsed: EngineSettings =
            toml::from_str(&content).expect("Default config should be valid TOML");
        assert_eq!(parsed, EngineSettings::default());
    }

    #[test]
    fn test_init_config_dir_idempotent() {
        let temp = tempdir().unwrap();

        init_config_dir(temp.path()).unwrap();

        let config_path = temp.path().join(".formwork/config.toml");
        std::fs::write(&config_path, "[lists]\nenforce_min_on_remove = true\n").unwrap();

        init_config_dir(temp.path()).unwrap();

        let content = std::fs::read_to_string(&config_path).unwrap();
        assert!(content.contains("enforce_min_on_remove = true"));
    }
}
