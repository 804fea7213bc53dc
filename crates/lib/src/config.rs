//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.edubot/config.json`) and environment.
//! Secrets and deployment values (tokens, database URL) are usually supplied through the
//! environment; the `resolve_*` helpers apply those overrides on top of the file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Placeholder shipped in sample `.env` files; treated as "no secret configured".
const APP_SECRET_PLACEHOLDER: &str = "your_app_secret_here";

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// HTTP server settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// WhatsApp Business API settings (webhook verification and outbound send).
    #[serde(default)]
    pub whatsapp: WhatsAppConfig,

    /// Generative fallback settings.
    #[serde(default)]
    pub fallback: FallbackConfig,

    /// Knowledge store settings.
    #[serde(default)]
    pub database: DatabaseConfig,
}

/// Gateway bind and port.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Port for HTTP (default 5000).
    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bind address (default "0.0.0.0"; the platform must be able to reach the webhook).
    #[serde(default = "default_gateway_bind")]
    pub bind: String,
}

fn default_gateway_port() -> u16 {
    5000
}

fn default_gateway_bind() -> String {
    "0.0.0.0".to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_gateway_port(),
            bind: default_gateway_bind(),
        }
    }
}

/// WhatsApp Business Cloud API config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhatsAppConfig {
    /// Graph API access token. Overridden by WHATSAPP_TOKEN env.
    pub access_token: Option<String>,
    /// Sender phone number id. Overridden by PHONE_NUMBER_ID env.
    pub phone_number_id: Option<String>,
    /// Token the platform echoes during the subscription handshake. Overridden by VERIFY_TOKEN env.
    pub verify_token: Option<String>,
    /// App secret for `X-Hub-Signature-256` verification. Overridden by APP_SECRET env.
    /// When absent, signature checks are skipped (development only).
    pub app_secret: Option<String>,
    /// Graph API version (default "v18.0"). Overridden by API_VERSION env.
    pub api_version: Option<String>,
    /// Graph API base URL (default "https://graph.facebook.com"); useful for tests.
    pub graph_api_base: Option<String>,
}

/// Which completion backend answers unmatched messages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FallbackBackend {
    /// Hosted OpenAI-compatible API (Groq by default). Requires an API key.
    #[default]
    Openai,
    /// Local Ollama instance.
    Ollama,
}

/// Generative fallback config.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FallbackConfig {
    #[serde(default)]
    pub backend: FallbackBackend,
    /// API key for the hosted backend. Overridden by GROQ_API_KEY env.
    pub api_key: Option<String>,
    /// Base URL override. Defaults depend on the backend.
    pub base_url: Option<String>,
    /// Model name (default "llama-3.1-8b-instant").
    #[serde(default = "default_fallback_model")]
    pub model: String,
    /// Upper bound for one completion call, in seconds (default 10).
    #[serde(default = "default_fallback_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_fallback_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_fallback_temperature")]
    pub temperature: f32,
}

fn default_fallback_model() -> String {
    "llama-3.1-8b-instant".to_string()
}

fn default_fallback_timeout_secs() -> u64 {
    10
}

fn default_fallback_max_tokens() -> u32 {
    200
}

fn default_fallback_temperature() -> f32 {
    0.7
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            backend: FallbackBackend::default(),
            api_key: None,
            base_url: None,
            model: default_fallback_model(),
            timeout_secs: default_fallback_timeout_secs(),
            max_tokens: default_fallback_max_tokens(),
            temperature: default_fallback_temperature(),
        }
    }
}

/// Knowledge store config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseConfig {
    /// sqlx connection string. Overridden by DATABASE_URL env.
    /// Default: `sqlite://<config dir>/edubot.db?mode=rwc`.
    pub url: Option<String>,
    /// Maximum pooled connections (default 5).
    pub max_connections: Option<u32>,
}

/// Read a non-empty, trimmed env var.
fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|s| {
        let t = s.trim();
        if t.is_empty() {
            None
        } else {
            Some(t.to_string())
        }
    })
}

/// Trimmed, non-empty config value.
fn config_value(value: &Option<String>) -> Option<String> {
    value
        .as_ref()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Resolve the Graph API access token: env WHATSAPP_TOKEN overrides config.
pub fn resolve_access_token(config: &Config) -> Option<String> {
    env_value("WHATSAPP_TOKEN").or_else(|| config_value(&config.whatsapp.access_token))
}

/// Resolve the sender phone number id: env PHONE_NUMBER_ID overrides config.
pub fn resolve_phone_number_id(config: &Config) -> Option<String> {
    env_value("PHONE_NUMBER_ID").or_else(|| config_value(&config.whatsapp.phone_number_id))
}

/// Resolve the webhook verify token: env VERIFY_TOKEN overrides config.
pub fn resolve_verify_token(config: &Config) -> Option<String> {
    env_value("VERIFY_TOKEN").or_else(|| config_value(&config.whatsapp.verify_token))
}

/// Resolve the app secret: env APP_SECRET overrides config. The sample placeholder counts as unset.
pub fn resolve_app_secret(config: &Config) -> Option<String> {
    env_value("APP_SECRET")
        .or_else(|| config_value(&config.whatsapp.app_secret))
        .filter(|s| s != APP_SECRET_PLACEHOLDER)
}

/// Resolve the Graph API version: env API_VERSION overrides config, default "v18.0".
pub fn resolve_api_version(config: &Config) -> String {
    env_value("API_VERSION")
        .or_else(|| config_value(&config.whatsapp.api_version))
        .unwrap_or_else(|| "v18.0".to_string())
}

/// Resolve the fallback API key: env GROQ_API_KEY overrides config.
pub fn resolve_fallback_api_key(config: &Config) -> Option<String> {
    env_value("GROQ_API_KEY").or_else(|| config_value(&config.fallback.api_key))
}

/// Resolve the database URL: env DATABASE_URL overrides config; default is a SQLite file next to the config.
pub fn resolve_database_url(config: &Config, config_path: &Path) -> String {
    env_value("DATABASE_URL")
        .or_else(|| config_value(&config.database.url))
        .unwrap_or_else(|| {
            format!(
                "sqlite://{}?mode=rwc",
                config_dir(config_path).join("edubot.db").display()
            )
        })
}

/// Resolve the HTTP port: env PORT overrides config.
pub fn resolve_port(config: &Config) -> u16 {
    env_value("PORT")
        .and_then(|p| match p.parse::<u16>() {
            Ok(port) => Some(port),
            Err(_) => {
                log::warn!("ignoring invalid PORT value: {}", p);
                None
            }
        })
        .unwrap_or(config.gateway.port)
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("EDUBOT_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(".edubot").join("config.json"))
                .unwrap_or_else(|| PathBuf::from("config.json"))
        })
}

/// Directory containing the config file.
pub fn config_dir(config_path: &Path) -> &Path {
    config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

/// Load config from the given path, the default path, or EDUBOT_CONFIG_PATH. Missing file => default config.
/// Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_gateway_port_and_bind() {
        let g = GatewayConfig::default();
        assert_eq!(g.port, 5000);
        assert_eq!(g.bind, "0.0.0.0");
    }

    #[test]
    fn parses_camel_case_config() {
        let config: Config = serde_json::from_str(
            r#"{
                "whatsapp": { "verifyToken": "vt", "phoneNumberId": "123" },
                "fallback": { "backend": "ollama", "timeoutSecs": 3 }
            }"#,
        )
        .unwrap();
        assert_eq!(config.whatsapp.verify_token.as_deref(), Some("vt"));
        assert_eq!(config.whatsapp.phone_number_id.as_deref(), Some("123"));
        assert_eq!(config.fallback.backend, FallbackBackend::Ollama);
        assert_eq!(config.fallback.timeout_secs, 3);
        assert_eq!(config.fallback.model, "llama-3.1-8b-instant");
        assert_eq!(config.gateway.port, 5000);
    }

    #[test]
    fn default_database_url_sits_next_to_config() {
        let mut config = Config::default();
        config.database.url = Some("sqlite::memory:".to_string());
        let path = Path::new("/srv/edubot/config.json");
        if std::env::var("DATABASE_URL").is_err() {
            assert_eq!(resolve_database_url(&config, path), "sqlite::memory:");
            config.database.url = None;
            assert_eq!(
                resolve_database_url(&config, path),
                "sqlite:///srv/edubot/edubot.db?mode=rwc"
            );
        }
    }

    #[test]
    fn placeholder_app_secret_means_open_mode() {
        if std::env::var("APP_SECRET").is_err() {
            let mut config = Config::default();
            config.whatsapp.app_secret = Some(APP_SECRET_PLACEHOLDER.to_string());
            assert_eq!(resolve_app_secret(&config), None);
            assert!(crate::webhook::verify_signature(b"{}", None, resolve_app_secret(&config).as_deref()));

            config.whatsapp.app_secret = Some(" real-secret ".to_string());
            assert_eq!(resolve_app_secret(&config).as_deref(), Some("real-secret"));
        }
    }

    #[test]
    fn blank_values_are_unset() {
        assert_eq!(config_value(&Some("   ".to_string())), None);
        assert_eq!(config_value(&Some(" x ".to_string())), Some("x".to_string()));
        assert_eq!(config_value(&None), None);
    }
}
