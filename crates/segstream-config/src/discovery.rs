//! Config file discovery and layered merging.
//!
//! Resolution order (later overrides earlier):
//! 1. `~/.config/segstream/config.toml` (user config)
//! 2. `./segstream.toml` (project-local)
//! 3. CLI arguments (handled externally)

use std::path::{Path, PathBuf};

use crate::{ConfigError, Result, SegstreamConfig};

/// Default config filename for project-local config.
const PROJECT_CONFIG_FILE: &str = "segstream.toml";

/// Default config filename within the user config directory.
const USER_CONFIG_FILE: &str = "config.toml";

/// Application name for config directory resolution.
const APP_NAME: &str = "segstream";

/// Environment variable to override the user config directory.
const CONFIG_DIR_ENV: &str = "SEGSTREAM_CONFIG_DIR";

/// Tracks where each config layer was loaded from.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    /// Path to the config file.
    pub path: PathBuf,
    /// Whether the file was found and loaded.
    pub loaded: bool,
}

/// Result of config discovery and loading.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// The merged configuration.
    pub config: SegstreamConfig,
    /// Sources that were checked, in order of precedence (lowest first).
    pub sources: Vec<ConfigSource>,
    /// Warnings generated during loading (unreadable layers, invalid sections).
    pub warnings: Vec<String>,
}

impl LoadedConfig {
    /// Get paths of sources that were actually loaded.
    pub fn loaded_from(&self) -> Vec<&Path> {
        self.sources
            .iter()
            .filter(|s| s.loaded)
            .map(|s| s.path.as_path())
            .collect()
    }
}

/// Load configuration by discovering and merging all config layers.
pub fn load_config(project_dir: Option<&Path>) -> Result<LoadedConfig> {
    load_config_with_options(project_dir, None)
}

/// Load configuration with explicit control over the user config directory.
///
/// `config_dir` overrides both `SEGSTREAM_CONFIG_DIR` and the platform default.
pub fn load_config_with_options(
    project_dir: Option<&Path>,
    config_dir: Option<&Path>,
) -> Result<LoadedConfig> {
    let mut config = SegstreamConfig::new();
    let mut sources = Vec::new();
    let mut warnings = Vec::new();

    // 1. User config: explicit override, then env var, then platform default
    let user_config_path = match config_dir {
        Some(dir) => Some(dir.join(USER_CONFIG_FILE)),
        None => user_config_path(),
    };
    if let Some(path) = user_config_path {
        sources.push(load_layer(&mut config, &path, &mut warnings));
    }

    // 2. Project-local config
    let project_path = project_dir
        .map(|d| d.join(PROJECT_CONFIG_FILE))
        .unwrap_or_else(|| PathBuf::from(PROJECT_CONFIG_FILE));
    sources.push(load_layer(&mut config, &project_path, &mut warnings));

    if let Some(ref parser) = config.parser
        && let Err(e) = parser.validate()
    {
        warnings.push(format!("Ignoring [parser] section: {}", e));
        config.parser = None;
    }

    Ok(LoadedConfig {
        config,
        sources,
        warnings,
    })
}

/// Load config from a specific file path (no discovery).
pub fn load_config_file(path: &Path) -> Result<SegstreamConfig> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.display().to_string(),
        source: e,
    })?;
    SegstreamConfig::from_toml(&contents)
}

/// Get the user config file path.
///
/// Checks `SEGSTREAM_CONFIG_DIR` first, then falls back to the platform default.
pub fn user_config_path() -> Option<PathBuf> {
    user_config_dir().map(|d| d.join(USER_CONFIG_FILE))
}

/// Get the user config directory for segstream.
pub fn user_config_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV)
        && !dir.is_empty()
    {
        return Some(PathBuf::from(dir));
    }
    dirs::config_dir().map(|d| d.join(APP_NAME))
}

/// Try to load a config file and merge it into the existing config.
fn load_layer(config: &mut SegstreamConfig, path: &Path, warnings: &mut Vec<String>) -> ConfigSource {
    if !path.is_file() {
        return ConfigSource {
            path: path.to_path_buf(),
            loaded: false,
        };
    }

    match load_config_file(path) {
        Ok(layer) => {
            config.merge(layer);
            ConfigSource {
                path: path.to_path_buf(),
                loaded: true,
            }
        }
        Err(e) => {
            warnings.push(format!("Failed to load {}: {}", path.display(), e));
            ConfigSource {
                path: path.to_path_buf(),
                loaded: false,
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    use crate::JsonProfileName;

    #[test]
    fn test_load_config_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[parser]\njson_profile = \"gemini\"\n").unwrap();

        let config = load_config_file(&path).unwrap();
        assert_eq!(
            config.parser.unwrap().json_profile,
            JsonProfileName::Gemini
        );
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config_file(Path::new("/nonexistent/segstream.toml"));
        assert!(matches!(result, Err(ConfigError::ReadFile { .. })));
    }

    #[test]
    fn test_project_overrides_user() {
        let user_dir = TempDir::new().unwrap();
        let project_dir = TempDir::new().unwrap();
        fs::write(
            user_dir.path().join("config.toml"),
            "[parser]\njson_profile = \"gemini\"\n\n[logging]\nlevel = \"debug\"\n",
        )
        .unwrap();
        fs::write(
            project_dir.path().join("segstream.toml"),
            "[parser]\njson_profile = \"openai\"\n",
        )
        .unwrap();

        let loaded =
            load_config_with_options(Some(project_dir.path()), Some(user_dir.path())).unwrap();
        assert_eq!(loaded.loaded_from().len(), 2);
        assert_eq!(
            loaded.config.parser_or_default().json_profile,
            JsonProfileName::Openai
        );
        assert_eq!(loaded.config.logging_or_default().level, "debug");
        assert!(loaded.warnings.is_empty());
    }

    #[test]
    fn test_missing_layers_yield_defaults() {
        let user_dir = TempDir::new().unwrap();
        let project_dir = TempDir::new().unwrap();
        let loaded =
            load_config_with_options(Some(project_dir.path()), Some(user_dir.path())).unwrap();
        assert!(loaded.loaded_from().is_empty());
        assert!(loaded.config.parser.is_none());
    }

    #[test]
    fn test_broken_layer_becomes_warning() {
        let user_dir = TempDir::new().unwrap();
        let project_dir = TempDir::new().unwrap();
        fs::write(project_dir.path().join("segstream.toml"), "[parser\n").unwrap();

        let loaded =
            load_config_with_options(Some(project_dir.path()), Some(user_dir.path())).unwrap();
        assert_eq!(loaded.warnings.len(), 1);
        assert!(loaded.warnings[0].contains("Failed to load"));
    }

    #[test]
    fn test_invalid_parser_section_dropped() {
        let user_dir = TempDir::new().unwrap();
        let project_dir = TempDir::new().unwrap();
        fs::write(
            project_dir.path().join("segstream.toml"),
            "[parser]\nstrategies = []\n",
        )
        .unwrap();

        let loaded =
            load_config_with_options(Some(project_dir.path()), Some(user_dir.path())).unwrap();
        assert!(loaded.config.parser.is_none());
        assert!(loaded.warnings[0].contains("Ignoring [parser]"));
    }
}
