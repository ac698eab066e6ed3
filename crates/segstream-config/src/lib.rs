//! Configuration system for the segstream segmentation engine.
//!
//! Provides TOML-based configuration with:
//! - The `[parser]` section (enabled grammars, priority, JSON profile, sentinels)
//! - The `[logging]` section consumed by the CLI
//! - Config file layering (user config dir + project-local overrides)

pub mod discovery;
pub mod error;
pub mod types;

pub use discovery::{
    ConfigSource, LoadedConfig, load_config, load_config_file, load_config_with_options,
    user_config_dir, user_config_path,
};
pub use error::{ConfigError, Result};
pub use types::*;
