//! Engine settings
//!
//! Supports `.formwork/config.toml` - project-level evaluation behavior

pub mod settings;
pub mod types;

pub use settings::{init_config_dir, load_settings, CONFIG_FILENAME, FORMWORK_DIR};
pub use types::*;
