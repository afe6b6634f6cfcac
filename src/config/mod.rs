pub mod schema;

pub use schema::ReagentConfig;

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Config file name inside the home directory.
pub const CONFIG_FILE: &str = "reagent.toml";

/// Newest config layout this build understands.
pub const CONFIG_VERSION: u32 = 1;

/// Default reagent home directory (~/.reagent).
pub fn default_home_dir() -> PathBuf {
    directories::BaseDirs::new()
        .map(|d| d.home_dir().join(".reagent"))
        .unwrap_or_else(|| PathBuf::from(".reagent"))
}

/// Load and validate the config at `path`. A missing file yields defaults.
pub fn load_config(path: &Path) -> Result<ReagentConfig> {
    if !path.exists() {
        debug!("No config at {}, using defaults", path.display());
        return Ok(ReagentConfig::default());
    }

    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config: ReagentConfig = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config {} (TOML)", path.display()))?;

    if config.version > CONFIG_VERSION {
        bail!(
            "Config {} has version {}, newer than the supported {}",
            path.display(),
            config.version,
            CONFIG_VERSION
        );
    }
    config
        .validate()
        .with_context(|| format!("Invalid config {}", path.display()))?;

    debug!("Loaded config from {}", path.display());
    Ok(config)
}

/// Validate `config` and write it to `path` as TOML, creating parent
/// directories as needed.
pub fn save_config(config: &ReagentConfig, path: &Path) -> Result<()> {
    config.validate().context("Refusing to save an invalid config")?;
    let contents = toml::to_string_pretty(config).context("Failed to serialize config")?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(path, contents)
        .with_context(|| format!("Failed to write config file {}", path.display()))?;
    Ok(())
}
