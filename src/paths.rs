//! Config location for converge
//!
//! # Path Resolution Priority
//!
//! For config_dir():
//! 1. `CONVERGE_CONFIG_DIR` environment variable
//! 2. `XDG_CONFIG_HOME/converge` (if set)
//! 3. Platform config dir (`~/.config/converge` on Linux)

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Environment variable for config directory override
pub const ENV_CONFIG_DIR: &str = "CONVERGE_CONFIG_DIR";

/// Inventory file name inside the config directory
pub const INVENTORY_FILE: &str = "inventory.toml";

/// Get the converge config directory path
pub fn config_dir() -> Result<PathBuf> {
    resolve_config_dir(
        std::env::var(ENV_CONFIG_DIR).ok().as_deref(),
        std::env::var("XDG_CONFIG_HOME").ok().as_deref(),
        dirs::config_dir(),
    )
}

fn resolve_config_dir(
    override_dir: Option<&str>,
    xdg_config: Option<&str>,
    platform: Option<PathBuf>,
) -> Result<PathBuf> {
    if let Some(dir) = override_dir {
        let path = expand(dir);
        log::debug!("Using config dir from {}: {}", ENV_CONFIG_DIR, path.display());
        return Ok(path);
    }

    if let Some(xdg) = xdg_config {
        let path = PathBuf::from(xdg).join("converge");
        log::debug!("Using XDG_CONFIG_HOME: {}", path.display());
        return Ok(path);
    }

    let base = platform.context("Could not determine config directory")?;
    Ok(base.join("converge"))
}

/// Default inventory path
pub fn inventory_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(INVENTORY_FILE))
}

/// Expand `~` and environment variables in a path
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}
