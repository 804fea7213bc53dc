//! Initialize the configuration directory: create ~/.edubot and a default config.json.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::config;

static DEFAULT_CONFIG: &str = include_str!("../config/config.json");

/// Create the config directory and write the default `config.json` if missing.
/// An existing config file is never overwritten. Returns the config directory.
pub fn init_config_dir(config_path: &Path) -> Result<PathBuf> {
    let config_dir = config::config_dir(config_path);
    std::fs::create_dir_all(config_dir)
        .with_context(|| format!("creating config directory {}", config_dir.display()))?;

    if !config_path.exists() {
        std::fs::write(config_path, DEFAULT_CONFIG)
            .with_context(|| format!("writing default config to {}", config_path.display()))?;
        log::info!("created default config at {}", config_path.display());
    } else {
        log::debug!("config already exists at {}, skipping", config_path.display());
    }

    Ok(config_dir.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_template_parses() {
        let config: config::Config = serde_json::from_str(DEFAULT_CONFIG).unwrap();
        assert_eq!(config.gateway.port, 5000);
        assert_eq!(config.whatsapp.api_version.as_deref(), Some("v18.0"));
    }

    #[test]
    fn init_writes_once() {
        let dir = std::env::temp_dir().join(format!("edubot-init-{}", uuid::Uuid::new_v4()));
        let path = dir.join("nested").join("config.json");
        let created = init_config_dir(&path).unwrap();
        assert_eq!(created, dir.join("nested"));
        assert!(path.exists());

        std::fs::write(&path, "{\"gateway\":{\"port\":6000}}").unwrap();
        init_config_dir(&path).unwrap();
        let kept = std::fs::read_to_string(&path).unwrap();
        assert!(kept.contains("6000"));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
