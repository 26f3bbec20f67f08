use std::{fs, path::Path, str::FromStr, time::Duration};

use routing::DEFAULT_MIN_REAL;
use serde::Deserialize;
use tracing::warn;

use crate::session::SessionOptions;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkMode {
    #[serde(alias = "console")]
    Interactive,
    #[serde(alias = "uart", alias = "serial")]
    Hardware,
}

impl FromStr for SinkMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "interactive" | "console" => Ok(SinkMode::Interactive),
            "hardware" | "uart" | "serial" => Ok(SinkMode::Hardware),
            other => Err(format!("unknown sink '{other}'")),
        }
    }
}

#[derive(Debug)]
pub struct Settings {
    pub server_bind: String,
    pub sink: SinkMode,
    pub serial_device: String,
    pub min_real: usize,
    pub cancel_grace_ms: u64,
    pub confirmation_timeout_secs: Option<u64>,
    pub keepalive_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_bind: "0.0.0.0:8765".into(),
            sink: SinkMode::Interactive,
            serial_device: "/dev/ttyUSB0".into(),
            min_real: DEFAULT_MIN_REAL,
            cancel_grace_ms: 100,
            confirmation_timeout_secs: None,
            keepalive_secs: 20,
        }
    }
}

impl Settings {
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            min_real: self.min_real,
            cancel_grace: Duration::from_millis(self.cancel_grace_ms),
        }
    }

    pub fn confirmation_timeout(&self) -> Option<Duration> {
        self.confirmation_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    /// Ping period for the client socket; a peer silent for two periods is
    /// dropped. `0` turns pings off.
    pub fn keepalive(&self) -> Option<Duration> {
        Some(self.keepalive_secs)
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    bind_addr: Option<String>,
    sink: Option<SinkMode>,
    serial_device: Option<String>,
    min_real: Option<usize>,
    cancel_grace_ms: Option<u64>,
    confirmation_timeout_secs: Option<u64>,
    keepalive_secs: Option<u64>,
}

pub fn load_settings() -> Settings {
    load_settings_from(Path::new("server.toml"), |key| std::env::var(key).ok())
}

fn load_settings_from(path: &Path, env: impl Fn(&str) -> Option<String>) -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        apply_file(&mut settings, &raw);
    }
    apply_env(&mut settings, env);

    settings
}

fn apply_file(settings: &mut Settings, raw: &str) {
    let file_cfg = match toml::from_str::<FileSettings>(raw) {
        Ok(cfg) => cfg,
        Err(error) => {
            warn!(%error, "ignoring unreadable server.toml");
            return;
        }
    };

    if let Some(v) = file_cfg.bind_addr {
        settings.server_bind = v;
    }
    if let Some(v) = file_cfg.sink {
        settings.sink = v;
    }
    if let Some(v) = file_cfg.serial_device {
        settings.serial_device = v;
    }
    if let Some(v) = file_cfg.min_real {
        settings.min_real = v;
    }
    if let Some(v) = file_cfg.cancel_grace_ms {
        settings.cancel_grace_ms = v;
    }
    if file_cfg.confirmation_timeout_secs.is_some() {
        settings.confirmation_timeout_secs = file_cfg.confirmation_timeout_secs;
    }
    if let Some(v) = file_cfg.keepalive_secs {
        settings.keepalive_secs = v;
    }
}

fn apply_env(settings: &mut Settings, env: impl Fn(&str) -> Option<String>) {
    if let Some(v) = env("SERVER_BIND") {
        settings.server_bind = v;
    }
    if let Some(v) = env("APP__BIND_ADDR") {
        settings.server_bind = v;
    }

    if let Some(v) = parsed(&env, "APP__SINK") {
        settings.sink = v;
    }
    if let Some(v) = env("APP__SERIAL_DEVICE") {
        settings.serial_device = v;
    }
    if let Some(v) = parsed(&env, "APP__MIN_REAL") {
        settings.min_real = v;
    }
    if let Some(v) = parsed(&env, "APP__CANCEL_GRACE_MS") {
        settings.cancel_grace_ms = v;
    }
    if let Some(v) = parsed(&env, "APP__CONFIRMATION_TIMEOUT_SECS") {
        settings.confirmation_timeout_secs = Some(v);
    }
    if let Some(v) = parsed(&env, "APP__KEEPALIVE_SECS") {
        settings.keepalive_secs = v;
    }
}

fn parsed<T>(env: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = env(key)?;
    match raw.parse::<T>() {
        Ok(value) => Some(value),
        Err(error) => {
            warn!(key, value = %raw, %error, "ignoring invalid setting");
            None
        }
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
