//! Configuration file loading

use super::Config;
use anyhow::{Context, Result};
use std::path::Path;

/// Load, parse and validate config from path
pub fn load_from_path(path: &Path) -> Result<Config> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    super::validate(&config)?;

    Ok(config)
}
