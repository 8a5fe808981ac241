//! Config file discovery and XDG directory resolution.
//!
//! Discovery order: explicit path, `./config.json`, then
//! `$XDG_CONFIG_HOME/dnsres/config.json` (created with defaults when
//! absent). When creation fails the caller falls back to built-in defaults.

use super::{Config, ConfigError};
use std::path::{Path, PathBuf};

/// XDG config home, falling back to `~/.config`.
pub fn config_home() -> Option<PathBuf> {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        if !xdg.is_empty() {
            return Some(PathBuf::from(xdg));
        }
    }
    home_dir().map(|home| home.join(".config"))
}

/// XDG state home, falling back to `~/.local/state`.
pub fn state_home() -> Option<PathBuf> {
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        if !xdg.is_empty() {
            return Some(PathBuf::from(xdg));
        }
    }
    home_dir().map(|home| home.join(".local").join("state"))
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().filter(|h| !h.is_empty()).map(PathBuf::from)
}

/// Resolve the config file to use.
///
/// Returns `Ok(Some((path, was_created)))` when a file exists or was just
/// created, and `Ok(None)` when no file could be found or created and the
/// built-in defaults should be used.
pub fn resolve_config_path(explicit: Option<&str>) -> Result<Option<(PathBuf, bool)>, ConfigError> {
    if let Some(path) = explicit {
        return Ok(Some((PathBuf::from(path), false)));
    }

    let local = Path::new("config.json");
    if local.is_file() {
        return Ok(Some((local.to_path_buf(), false)));
    }

    let Some(config_dir) = config_home().map(|home| home.join("dnsres")) else {
        return Ok(None);
    };
    let config_path = config_dir.join("config.json");
    if config_path.is_file() {
        return Ok(Some((config_path, false)));
    }

    if std::fs::create_dir_all(&config_dir).is_err() {
        return Ok(None);
    }
    match write_default_config(&config_path) {
        Ok(()) => Ok(Some((config_path, true))),
        Err(_) => Ok(None),
    }
}

fn write_default_config(path: &Path) -> Result<(), ConfigError> {
    let contents = serde_json::to_string_pretty(&Config::default())
        .map_err(|e| ConfigError::FileWrite(path.display().to_string(), e.to_string()))?;
    std::fs::write(path, contents)
        .map_err(|e| ConfigError::FileWrite(path.display().to_string(), e.to_string()))
}

/// Ensure the dnsres state directory exists, falling back to `$HOME/logs`.
///
/// Returns the directory and whether the fallback was taken.
pub fn ensure_state_dir() -> Result<(PathBuf, bool), ConfigError> {
    if let Some(state_dir) = state_home().map(|home| home.join("dnsres")) {
        if std::fs::create_dir_all(&state_dir).is_ok() {
            return Ok((state_dir, false));
        }
    }

    let home = home_dir().ok_or_else(|| {
        ConfigError::Validation("cannot resolve a log directory: HOME is not set".into())
    })?;
    let fallback = home.join("logs");
    std::fs::create_dir_all(&fallback).map_err(|e| {
        ConfigError::FileWrite(fallback.display().to_string(), e.to_string())
    })?;
    Ok((fallback, true))
}
