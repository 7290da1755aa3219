use std::{fs, time::Duration};

use tracing::warn;

const SETTINGS_FILE: &str = "server.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub server_bind: String,
    pub database_url: String,
    pub rate_limit_max_requests: u32,
    pub rate_limit_window_seconds: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_bind: "127.0.0.1:8080".into(),
            database_url: "sqlite://./data/watchlist.db".into(),
            rate_limit_max_requests: 40,
            rate_limit_window_seconds: 10,
        }
    }
}

impl Settings {
    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_seconds.max(1))
    }
}

pub fn load_settings() -> Settings {
    let file_contents = fs::read_to_string(SETTINGS_FILE).ok();
    load_settings_from(file_contents.as_deref(), |key| std::env::var(key).ok())
}

/// Defaults, then `server.toml`, then environment variables.
pub(crate) fn load_settings_from(
    file_contents: Option<&str>,
    env: impl Fn(&str) -> Option<String>,
) -> Settings {
    let mut settings = Settings::default();

    if let Some(raw) = file_contents {
        match toml::from_str::<toml::Table>(raw) {
            Ok(file_cfg) => apply_file_settings(&mut settings, &file_cfg),
            Err(error) => warn!(%error, "ignoring unparsable {SETTINGS_FILE}"),
        }
    }

    if let Some(v) = env("SERVER_BIND") {
        settings.server_bind = v;
    }
    if let Some(v) = env("APP__BIND_ADDR") {
        settings.server_bind = v;
    }

    if let Some(v) = env("DATABASE_URL") {
        settings.database_url = v;
    }
    if let Some(v) = env("APP__DATABASE_URL") {
        settings.database_url = v;
    }

    if let Some(parsed) = env("APP__RATE_LIMIT_MAX_REQUESTS").and_then(|v| v.parse().ok()) {
        settings.rate_limit_max_requests = parsed;
    }
    if let Some(parsed) = env("APP__RATE_LIMIT_WINDOW_SECONDS").and_then(|v| v.parse().ok()) {
        settings.rate_limit_window_seconds = parsed;
    }

    settings
}

fn apply_file_settings(settings: &mut Settings, file_cfg: &toml::Table) {
    if let Some(v) = file_cfg.get("bind_addr").and_then(toml::Value::as_str) {
        settings.server_bind = v.to_string();
    }
    if let Some(v) = file_cfg.get("database_url").and_then(toml::Value::as_str) {
        settings.database_url = v.to_string();
    }
    if let Some(v) = file_cfg
        .get("rate_limit_max_requests")
        .and_then(toml_integer)
        .and_then(|v| u32::try_from(v).ok())
    {
        settings.rate_limit_max_requests = v;
    }
    if let Some(v) = file_cfg
        .get("rate_limit_window_seconds")
        .and_then(toml_integer)
        .and_then(|v| u64::try_from(v).ok())
    {
        settings.rate_limit_window_seconds = v;
    }
}

fn toml_integer(value: &toml::Value) -> Option<i64> {
    match value {
        toml::Value::Integer(v) => Some(*v),
        toml::Value::String(v) => v.trim().parse().ok(),
        _ => None,
    }
}

pub fn prepare_database_url(raw_database_url: &str) -> anyhow::Result<String> {
    let database_url = normalize_database_url(raw_database_url);
    storage::ensure_sqlite_parent_dir_exists(&database_url)?;
    Ok(database_url)
}

pub(crate) fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return Settings::default().database_url;
    }

    if raw_database_url.starts_with("sqlite::memory:") {
        return raw_database_url.to_string();
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite://") {
        if is_windows_drive_path(path) {
            return format!("sqlite:{path}");
        }
        return raw_database_url.to_string();
    }

    if raw_database_url.contains("://") {
        return raw_database_url.to_string();
    }

    let path = raw_database_url
        .strip_prefix("sqlite:")
        .unwrap_or(raw_database_url)
        .replace('\\', "/");
    if is_windows_drive_path(&path) {
        format!("sqlite:{path}")
    } else {
        format!("sqlite://{path}")
    }
}

fn is_windows_drive_path(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 3 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' && bytes[2] == b'/'
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
