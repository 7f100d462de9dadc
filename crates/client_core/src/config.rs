use std::{collections::HashMap, fs, path::Path, time::Duration};

use serde::Deserialize;
use tracing::warn;
use url::Url;

use crate::error::ConfigError;

pub const DEFAULT_CONFIG_FILE: &str = "colorize.toml";
pub const DEFAULT_API_URL: &str = "http://localhost:8000";
pub const DEFAULT_UPLOAD_TITLE: &str = "Image from Web App";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Settings {
    pub api_url: String,
    pub upload_title: String,
    pub request_timeout_secs: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.into(),
            upload_title: DEFAULT_UPLOAD_TITLE.into(),
            request_timeout_secs: None,
        }
    }
}

impl Settings {
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

pub fn load_settings() -> Settings {
    load_settings_from(Path::new(DEFAULT_CONFIG_FILE), |key| std::env::var(key).ok())
}

pub fn load_settings_from(
    config_path: &Path,
    env_lookup: impl Fn(&str) -> Option<String>,
) -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(config_path) {
        apply_file_overrides(&mut settings, &raw);
    }
    apply_env_overrides(&mut settings, env_lookup);

    settings
}

fn apply_file_overrides(settings: &mut Settings, raw: &str) {
    let file_cfg = match toml::from_str::<HashMap<String, toml::Value>>(raw) {
        Ok(file_cfg) => file_cfg,
        Err(error) => {
            warn!(%error, "ignoring unreadable colorize config file");
            return;
        }
    };

    if let Some(v) = file_cfg.get("api_url").and_then(toml::Value::as_str) {
        settings.api_url = v.to_string();
    }
    if let Some(v) = file_cfg.get("upload_title").and_then(toml::Value::as_str) {
        settings.upload_title = v.to_string();
    }
    match file_cfg.get("request_timeout_secs") {
        Some(toml::Value::Integer(secs)) if *secs >= 0 => {
            settings.request_timeout_secs = Some(*secs as u64);
        }
        Some(toml::Value::String(secs)) => {
            if let Ok(parsed) = secs.trim().parse::<u64>() {
                settings.request_timeout_secs = Some(parsed);
            }
        }
        _ => {}
    }
}

fn apply_env_overrides(settings: &mut Settings, env_lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = env_lookup("COLORIZE_API_URL") {
        settings.api_url = v;
    }
    if let Some(v) = env_lookup("APP__API_URL") {
        settings.api_url = v;
    }

    if let Some(v) = env_lookup("APP__UPLOAD_TITLE") {
        settings.upload_title = v;
    }

    if let Some(v) = env_lookup("APP__REQUEST_TIMEOUT_SECS") {
        if let Ok(parsed) = v.trim().parse::<u64>() {
            settings.request_timeout_secs = Some(parsed);
        }
    }
}

/// Trims whitespace and trailing slashes so paths can be appended with `format!`.
/// An empty value falls back to the local default.
pub fn normalize_api_url(raw_api_url: &str) -> Result<String, ConfigError> {
    let trimmed = raw_api_url.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Ok(DEFAULT_API_URL.to_string());
    }

    let parsed = Url::parse(trimmed).map_err(|source| ConfigError::InvalidApiUrl {
        url: trimmed.to_string(),
        source,
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ConfigError::UnsupportedScheme(trimmed.to_string()));
    }

    Ok(trimmed.to_string())
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
