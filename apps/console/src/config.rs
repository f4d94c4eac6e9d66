use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, bail, Context};
use console_core::DEFAULT_BINDER_URL;
use shared::{domain::EventTopic, protocol::ApiName};
use url::Url;

pub const DEFAULT_CONFIG_FILE: &str = "radio-console.toml";

const SETTING_KEYS: [&str; 6] = ["binder_url", "api", "topics", "color", "log_filter", "script"];

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub binder_url: String,
    pub api: ApiName,
    pub topics: Vec<EventTopic>,
    pub color: bool,
    pub log_filter: String,
    pub script: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            binder_url: DEFAULT_BINDER_URL.into(),
            api: ApiName::default(),
            topics: EventTopic::DEFAULTS.to_vec(),
            color: true,
            log_filter: "info".into(),
            script: None,
        }
    }
}

/// Defaults, then the TOML file, then `RADIO_CONSOLE_*` / `APP__*` variables.
///
/// An explicitly named config file must exist; the default one is optional.
pub fn load_settings(config_path: Option<&Path>) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    match config_path {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("failed to read config file '{}'", path.display()))?;
            apply_file_overrides(&mut settings, &raw)
                .with_context(|| format!("invalid config file '{}'", path.display()))?;
        }
        None => {
            if let Ok(raw) = fs::read_to_string(DEFAULT_CONFIG_FILE) {
                apply_file_overrides(&mut settings, &raw)
                    .with_context(|| format!("invalid config file '{DEFAULT_CONFIG_FILE}'"))?;
            }
        }
    }

    apply_env_overrides(&mut settings, |name| std::env::var(name).ok())?;
    validate_binder_url(&settings.binder_url)?;
    Ok(settings)
}

pub fn apply_file_overrides(settings: &mut Settings, raw: &str) -> anyhow::Result<()> {
    let file_cfg = toml::from_str::<HashMap<String, toml::Value>>(raw)?;
    for key in SETTING_KEYS {
        if let Some(value) = file_cfg.get(key) {
            apply_setting(settings, key, &value_text(value))
                .with_context(|| format!("invalid value for '{key}'"))?;
        }
    }
    Ok(())
}

pub fn apply_env_overrides(
    settings: &mut Settings,
    lookup: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<()> {
    for key in SETTING_KEYS {
        let upper = key.to_ascii_uppercase();
        for name in [format!("RADIO_CONSOLE_{upper}"), format!("APP__{upper}")] {
            if let Some(value) = lookup(&name) {
                apply_setting(settings, key, &value)
                    .with_context(|| format!("invalid value in {name}"))?;
            }
        }
    }
    Ok(())
}

fn value_text(value: &toml::Value) -> String {
    match value {
        toml::Value::String(text) => text.clone(),
        toml::Value::Array(items) => items
            .iter()
            .map(value_text)
            .collect::<Vec<_>>()
            .join(","),
        other => other.to_string(),
    }
}

fn apply_setting(settings: &mut Settings, key: &str, value: &str) -> anyhow::Result<()> {
    match key {
        "binder_url" => settings.binder_url = value.trim().to_string(),
        "api" => settings.api = value.parse()?,
        "topics" => settings.topics = parse_topics(value)?,
        "color" => settings.color = parse_bool(value)?,
        "log_filter" => settings.log_filter = value.trim().to_string(),
        "script" => settings.script = Some(PathBuf::from(value.trim())),
        other => bail!("unknown setting '{other}'"),
    }
    Ok(())
}

fn parse_topics(raw: &str) -> anyhow::Result<Vec<EventTopic>> {
    raw.split(',')
        .map(str::trim)
        .filter(|topic| !topic.is_empty())
        .map(|topic| topic.parse::<EventTopic>().map_err(anyhow::Error::from))
        .collect()
}

fn parse_bool(raw: &str) -> anyhow::Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(anyhow!("expected a boolean, got '{other}'")),
    }
}

pub fn validate_binder_url(raw: &str) -> anyhow::Result<()> {
    let url = Url::parse(raw).with_context(|| format!("invalid binder url '{raw}'"))?;
    match url.scheme() {
        "ws" | "wss" | "http" | "https" => Ok(()),
        scheme => bail!("binder url '{raw}' has unsupported scheme '{scheme}'"),
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
