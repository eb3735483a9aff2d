use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::{Duration, Utc};
use muv_content_core::RestoreOptions;
use serde::Deserialize;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub restore: RestoreConfig,
    pub repair: RepairConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    pub listen: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct StorageConfig {
    pub root: Option<String>,
    pub retention_days: Option<i64>,
    pub database_url: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct RestoreConfig {
    pub exclude_slugs: Option<Vec<String>>,
    pub min_words: Option<usize>,
    pub cta_class: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct RepairConfig {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct SecurityConfig {
    pub api_token: Option<String>,
}

impl RestoreConfig {
    /// Defaults for a restore pass; request bodies may override them.
    pub fn options(&self) -> RestoreOptions {
        let defaults = RestoreOptions::default();
        RestoreOptions {
            exclude_slugs: self.exclude_slugs.clone().unwrap_or(defaults.exclude_slugs),
            min_words: self.min_words.unwrap_or(defaults.min_words),
            cta_class: self.cta_class.clone().unwrap_or(defaults.cta_class),
        }
    }
}

pub const DEFAULT_RETENTION_DAYS: i64 = 90;

/// Retention window from the environment value when set, the config file
/// otherwise. Negative or unparsable values are rejected.
pub fn resolve_retention_days(env_value: Option<&str>, storage: &StorageConfig) -> Result<i64> {
    let days = match env_value {
        Some(raw) => raw
            .trim()
            .parse::<i64>()
            .with_context(|| format!("invalid MUV_CONTENT_RETENTION_DAYS: {raw:?}"))?,
        None => storage.retention_days.unwrap_or(DEFAULT_RETENTION_DAYS),
    };
    if days < 0 {
        bail!("retention_days must not be negative, got {days}");
    }
    if Duration::try_days(days)
        .and_then(|window| Utc::now().checked_sub_signed(window))
        .is_none()
    {
        bail!("retention_days of {days} is out of range");
    }
    Ok(days)
}

pub fn load_config(path: &Path) -> Result<Config> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("reading config file {path:?}"))?;
    toml::from_str(&contents).with_context(|| format!("parsing config file {path:?}"))
}
