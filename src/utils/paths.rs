use crate::constants::env as env_keys;
use crate::utils::user_paths::{expand_home_path, home_dir};
use std::env;
use std::path::{Path, PathBuf};

fn normalize_env_path(value: Option<String>) -> Option<PathBuf> {
    let raw = value?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let lowered = trimmed.to_lowercase();
    if lowered == "undefined" || lowered == "null" {
        return None;
    }
    Some(expand_home_path(trimmed))
}

fn resolve_xdg_config_dir() -> Option<PathBuf> {
    if let Some(path) = normalize_env_path(env::var("XDG_CONFIG_HOME").ok()) {
        return Some(path);
    }
    home_dir().map(|home| home.join(".config"))
}

/// Explicit flag, then `TRANSFERLOG_ALIASES_PATH`, then `$XDG_CONFIG_HOME/transferlog/aliases.json`.
pub fn resolve_aliases_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(expand_home_path(path));
    }
    if let Some(path) = normalize_env_path(env::var(env_keys::ALIASES_PATH).ok()) {
        return Some(path);
    }
    resolve_xdg_config_dir().map(|dir| dir.join("transferlog").join("aliases.json"))
}

pub fn env_u64(key: &str) -> Option<u64> {
    env::var(key)
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
        .filter(|value| *value > 0)
}
