//! Path resolution for hostfleet
//!
//! # Environment Variables
//!
//! - `HOSTFLEET_CONFIG_DIR` - Override config directory
//! - `HOSTFLEET_STATE_DIR` - Override state directory (local provider state)
//!
//! For config_dir():
//! 1. `HOSTFLEET_CONFIG_DIR` environment variable
//! 2. `XDG_CONFIG_HOME/hostfleet` (if set)
//! 3. `~/.config/hostfleet`
//!
//! For state_dir():
//! 1. `HOSTFLEET_STATE_DIR` environment variable
//! 2. `XDG_STATE_HOME/hostfleet` (if set)
//! 3. `~/.local/state/hostfleet`

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Environment variable for config directory override
pub const ENV_CONFIG_DIR: &str = "HOSTFLEET_CONFIG_DIR";

/// Environment variable for state directory override
pub const ENV_STATE_DIR: &str = "HOSTFLEET_STATE_DIR";

/// Get the hostfleet config directory path
pub fn config_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_CONFIG_DIR) {
        let path = expand(&dir);
        log::debug!(
            "Using config dir from {}: {}",
            ENV_CONFIG_DIR,
            path.display()
        );
        return Ok(path);
    }

    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        let path = PathBuf::from(xdg_config).join("hostfleet");
        log::debug!("Using XDG_CONFIG_HOME: {}", path.display());
        return Ok(path);
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".config").join("hostfleet"))
}

/// Get the hostfleet state directory path
pub fn state_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_STATE_DIR) {
        let path = expand(&dir);
        log::debug!("Using state dir from {}: {}", ENV_STATE_DIR, path.display());
        return Ok(path);
    }

    if let Ok(xdg_state) = std::env::var("XDG_STATE_HOME") {
        let path = PathBuf::from(xdg_state).join("hostfleet");
        log::debug!("Using XDG_STATE_HOME: {}", path.display());
        return Ok(path);
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".local").join("state").join("hostfleet"))
}

/// Expand ~ and environment variables in a path string.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}

/// Status snapshot written next to a topology file
///
/// `cluster.toml` maps to `cluster.status.json`.
pub fn status_file(topology: &Path) -> PathBuf {
    topology.with_extension("status.json")
}

/// Private key file written next to a topology file
pub fn key_file(topology: &Path) -> PathBuf {
    topology.with_extension("key")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    /// Run `f` with `key` set to `value`, restoring the previous value
    fn with_env_var<F, R>(key: &str, value: &str, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let original = env::var(key).ok();
        // SAFETY: Tests run in isolation and don't read env vars concurrently
        unsafe { env::set_var(key, value) };
        let result = f();
        match original {
            // SAFETY: Tests run in isolation
            Some(v) => unsafe { env::set_var(key, v) },
            None => unsafe { env::remove_var(key) },
        }
        result
    }

    #[test]
    fn test_config_dir_env_override() {
        with_env_var(ENV_CONFIG_DIR, "/custom/hostfleet/config", || {
            assert_eq!(
                config_dir().unwrap(),
                PathBuf::from("/custom/hostfleet/config")
            );
        });
    }

    #[test]
    fn test_state_dir_env_override_with_tilde() {
        let home = dirs::home_dir().unwrap();
        with_env_var(ENV_STATE_DIR, "~/hostfleet-state-test", || {
            assert_eq!(state_dir().unwrap(), home.join("hostfleet-state-test"));
        });
    }

    #[test]
    fn test_status_file_sits_next_to_topology() {
        assert_eq!(
            status_file(Path::new("/srv/fleet/cluster.toml")),
            PathBuf::from("/srv/fleet/cluster.status.json")
        );
        assert_eq!(
            key_file(Path::new("cluster.toml")),
            PathBuf::from("cluster.key")
        );
    }
}
