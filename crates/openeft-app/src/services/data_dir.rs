// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Configuration directory resolution.

use std::path::{Path, PathBuf};

use openeft_core::EftConfig;
use openeft_core::error::Result;
use tracing::{debug, info};

const CONFIG_FILE: &str = "openeft.json";

/// Return the application config directory, creating it if needed.
pub fn config_dir() -> PathBuf {
    let dir = dirs_fallback().join("openeft");
    std::fs::create_dir_all(&dir).ok();
    dir
}

/// Where `openeft` looks for its settings when `--config` is not given.
pub fn default_config_path() -> PathBuf {
    config_dir().join(CONFIG_FILE)
}

/// Load `explicit` if given. Otherwise load the default file when it exists,
/// falling back to built-in defaults.
pub fn load_config(explicit: Option<&Path>) -> Result<EftConfig> {
    if let Some(path) = explicit {
        info!(path = %path.display(), "loading configuration");
        return EftConfig::load(path);
    }
    let path = default_config_path();
    if path.is_file() {
        info!(path = %path.display(), "loading configuration");
        return EftConfig::load(&path);
    }
    debug!("no configuration file, using defaults");
    Ok(EftConfig::default())
}

fn dirs_fallback() -> PathBuf {
    // Try XDG config dir, then fallback to home
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg);
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".config");
    }
    // Last resort
    PathBuf::from("/tmp")
}

#[cfg(test)]
mod tests {
    use super::*;
    use openeft_core::config::CodecChoice;

    #[test]
    fn explicit_path_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("site.json");
        EftConfig {
            codec: CodecChoice::Jpeg,
            ..Default::default()
        }
        .save(&path)
        .unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.codec, CodecChoice::Jpeg);
    }

    #[test]
    fn missing_explicit_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(Some(&dir.path().join("absent.json"))).is_err());
    }
}
