//! Configuration and data directory paths
//!
//! Uses XDG directories via `dirs` crate.
//!
//! Platform-specific locations:
//! - Linux: `~/.config/gh-pr-rollout/`, `~/.local/share/gh-pr-rollout/`
//! - macOS: `~/Library/Application Support/gh-pr-rollout/`
//! - Windows: `%APPDATA%\gh-pr-rollout\`

use anyhow::{Context, Result};
use std::path::PathBuf;

use crate::APP_NAME;

/// Get the application config directory (not created)
pub fn config_dir() -> Result<PathBuf> {
    let base = dirs::config_dir().context("Could not determine config directory")?;
    Ok(base.join(APP_NAME))
}

/// Get the application data directory, creating it if needed
pub fn data_dir() -> Result<PathBuf> {
    let base = dirs::data_dir().context("Could not determine data directory")?;
    let dir = base.join(APP_NAME);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create data directory {:?}", dir))?;
    Ok(dir)
}

/// Get path to app config file
pub fn app_config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

/// Default directory for the local state backend
pub fn local_state_dir() -> Result<PathBuf> {
    Ok(data_dir()?.join("states"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_path() {
        let path = app_config_path().unwrap();
        assert!(path.ends_with("config.toml"));
        assert!(path.parent().unwrap().ends_with(APP_NAME));
    }

    #[test]
    fn test_local_state_dir() {
        let dir = local_state_dir().unwrap();
        assert!(dir.ends_with("states"));
        assert!(dir.parent().unwrap().exists());
    }
}
