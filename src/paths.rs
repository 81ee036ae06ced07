//! Default file locations.
//!
//! The configuration lives in the platform config directory
//! (`$XDG_CONFIG_HOME/text-scaler/config.yaml` on Linux). When
//! `config.yaml` exists in the working directory of a debug build, that file
//! wins so `cargo run` picks up the project's config.

use std::path::{Path, PathBuf};

/// Directory name used under the platform config directory
pub const APP_DIR: &str = "text-scaler";

pub const CONFIG_FILE: &str = "config.yaml";

/// Config path inside `base`
pub fn config_path_in(base: &Path) -> PathBuf {
    base.join(APP_DIR).join(CONFIG_FILE)
}

/// Resolve the config path used when `--config` is not given
pub fn default_config_path() -> PathBuf {
    #[cfg(debug_assertions)]
    {
        let cwd_config = PathBuf::from(CONFIG_FILE);
        if cwd_config.exists() {
            return cwd_config;
        }
    }

    match dirs::config_dir() {
        Some(base) => config_path_in(&base),
        // No home directory (e.g. a bare service account)
        None => PathBuf::from(CONFIG_FILE),
    }
}
