use std::{fs, io::ErrorKind, path::Path};

use anyhow::Context;
use serde::Deserialize;

pub const DEFAULT_CONFIG_FILE: &str = "console.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub server_url: String,
    pub decided_by: String,
    pub log_filter: String,
    pub request_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:8000".into(),
            decided_by: "analyst".into(),
            log_filter: "info".into(),
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileSettings {
    server_url: Option<String>,
    decided_by: Option<String>,
    log_filter: Option<String>,
    request_timeout_secs: Option<u64>,
}

/// Defaults, then `path` if it exists, then the environment.
pub fn load_settings(path: &Path) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    match fs::read_to_string(path) {
        Ok(raw) => apply_file(&mut settings, &raw)
            .with_context(|| format!("invalid config file {}", path.display()))?,
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => {
            return Err(err).with_context(|| format!("failed to read {}", path.display()));
        }
    }

    apply_env(&mut settings, |key| std::env::var(key).ok())?;
    settings.server_url = settings.server_url.trim().trim_end_matches('/').to_string();
    Ok(settings)
}

fn apply_file(settings: &mut Settings, raw: &str) -> anyhow::Result<()> {
    let file_cfg: FileSettings = toml::from_str(raw)?;
    if let Some(v) = file_cfg.server_url {
        settings.server_url = v;
    }
    if let Some(v) = file_cfg.decided_by {
        settings.decided_by = v;
    }
    if let Some(v) = file_cfg.log_filter {
        settings.log_filter = v;
    }
    if let Some(v) = file_cfg.request_timeout_secs {
        settings.request_timeout_secs = v;
    }
    Ok(())
}

fn apply_env(
    settings: &mut Settings,
    var: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<()> {
    if let Some(v) = var("FINDINGS_SERVER_URL") {
        settings.server_url = v;
    }
    if let Some(v) = var("APP__SERVER_URL") {
        settings.server_url = v;
    }

    if let Some(v) = var("APP__DECIDED_BY") {
        settings.decided_by = v;
    }

    if let Some(v) = var("APP__LOG_FILTER") {
        settings.log_filter = v;
    }

    if let Some(v) = var("APP__REQUEST_TIMEOUT_SECS") {
        settings.request_timeout_secs = v
            .trim()
            .parse()
            .with_context(|| format!("APP__REQUEST_TIMEOUT_SECS must be a number of seconds, got '{v}'"))?;
    }

    Ok(())
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
