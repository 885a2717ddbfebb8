//! Path resolution for offload
//!
//! # Environment Variables
//!
//! - `OFFLOAD_CONFIG` - Config file path (also settable with `--config`)
//! - `OFFLOAD_CONFIG_DIR` - Directory holding `config.toml`
//! - `OFFLOAD_STATE_DIR` - Directory holding the default ledger
//!
//! # Path Resolution Priority
//!
//! For config_dir():
//! 1. `OFFLOAD_CONFIG_DIR` environment variable
//! 2. `XDG_CONFIG_HOME/offload` (if set)
//! 3. `~/.config/offload`
//!
//! For state_dir():
//! 1. `OFFLOAD_STATE_DIR` environment variable
//! 2. `XDG_STATE_HOME/offload` (if set)
//! 3. `~/.local/state/offload`

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Environment variable for config directory override
pub const ENV_CONFIG_DIR: &str = "OFFLOAD_CONFIG_DIR";

/// Environment variable for state directory override
pub const ENV_STATE_DIR: &str = "OFFLOAD_STATE_DIR";

/// Config file name inside the config directory
pub const CONFIG_FILE: &str = "config.toml";

/// Default ledger file name inside the state directory
pub const LEDGER_FILE: &str = "wait_cleanup.json";

fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Get the offload config directory path
pub fn config_dir() -> Result<PathBuf> {
    resolve_dir(ENV_CONFIG_DIR, "XDG_CONFIG_HOME", &[".config"], env_lookup)
}

/// Get the offload state directory path
pub fn state_dir() -> Result<PathBuf> {
    resolve_dir(ENV_STATE_DIR, "XDG_STATE_HOME", &[".local", "state"], env_lookup)
}

/// Default config file: `<config dir>/config.toml`
pub fn default_config_file() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE))
}

/// Default ledger file: `<state dir>/wait_cleanup.json`
pub fn default_ledger_file() -> Result<PathBuf> {
    Ok(state_dir()?.join(LEDGER_FILE))
}

fn resolve_dir<F>(override_var: &str, xdg_var: &str, home_rel: &[&str], lookup: F) -> Result<PathBuf>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(dir) = lookup(override_var) {
        let path = expand(&dir);
        log::debug!("Using {}: {}", override_var, path.display());
        return Ok(path);
    }

    if let Some(xdg) = lookup(xdg_var) {
        let path = PathBuf::from(xdg).join("offload");
        log::debug!("Using {}: {}", xdg_var, path.display());
        return Ok(path);
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    let path = home_rel
        .iter()
        .fold(home, |acc, part| acc.join(part))
        .join("offload");
    log::debug!("Using default dir: {}", path.display());
    Ok(path)
}

/// Expand ~ and environment variables in a path string.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}

/// Whether `path` is under `root`, comparing whole components.
pub fn is_within(path: &Path, root: &Path) -> bool {
    path.starts_with(root)
}

// ============================================================================
// Tests
// ============================================================================
