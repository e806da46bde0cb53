//! Application configuration for RulesForge.
//!
//! User config lives at `~/.rulesforge/rulesforge.toml`. The file is
//! optional: when it is absent the built-in defaults apply. CLI flags
//! override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, RulesForgeError};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "rulesforge.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".rulesforge";

// ---------------------------------------------------------------------------
// Config structs (matching rulesforge.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Output settings.
    #[serde(default)]
    pub output: OutputConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Root directory of the rules corpus.
    #[serde(default = "default_rules_dir")]
    pub rules_dir: String,

    /// Directory the category JSON files are written to.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            rules_dir: default_rules_dir(),
            output_dir: default_output_dir(),
        }
    }
}

fn default_rules_dir() -> String {
    "Rules".into()
}
fn default_output_dir() -> String {
    "data".into()
}

/// `[output]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Whether to write `manifest.json` alongside the category files.
    #[serde(default = "default_true")]
    pub manifest: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            manifest: default_true(),
        }
    }
}

fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.rulesforge/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| RulesForgeError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.rulesforge/rulesforge.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| RulesForgeError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        RulesForgeError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| RulesForgeError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| RulesForgeError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| RulesForgeError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
