use crate::errors::ExpiryError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default warning window: 7 days.
pub const DEFAULT_WARNING_WINDOW_HOURS: u64 = 168;
/// Shorter replies are treated as soft failures from the registry.
pub const DEFAULT_MIN_RESPONSE_LINES: usize = 5;

#[derive(Debug, Clone)]
pub struct Config {
    pub whois_binary: String,
    pub whois_timeout_seconds: u64,
    pub warning_window_hours: u64,
    pub min_response_lines: usize,
    pub max_response_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigData {
    pub whois_binary: String,
    pub whois_timeout_seconds: u64,
    pub warning_window_hours: u64,
    pub min_response_lines: usize,
    pub max_response_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            whois_binary: "whois".to_string(),
            whois_timeout_seconds: 30,
            warning_window_hours: DEFAULT_WARNING_WINDOW_HOURS,
            min_response_lines: DEFAULT_MIN_RESPONSE_LINES,
            max_response_size: 1024 * 1024,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let defaults = Config::default();

        let mut settings = config::Config::builder()
            .set_default("whois_binary", defaults.whois_binary)?
            .set_default("whois_timeout_seconds", defaults.whois_timeout_seconds)?
            .set_default("warning_window_hours", defaults.warning_window_hours)?
            .set_default("min_response_lines", defaults.min_response_lines as i64)?
            .set_default("max_response_size", defaults.max_response_size as i64)?;

        // Override with environment variables if present
        settings = Self::apply_env_overrides(settings)?;

        let config_data: ConfigData = settings.build()?.try_deserialize()?;

        Ok(Config {
            whois_binary: config_data.whois_binary,
            whois_timeout_seconds: config_data.whois_timeout_seconds,
            warning_window_hours: config_data.warning_window_hours,
            min_response_lines: config_data.min_response_lines,
            max_response_size: config_data.max_response_size,
        })
    }

    /// Subprocess timeout, `None` when disabled with 0.
    pub fn whois_timeout(&self) -> Option<Duration> {
        match self.whois_timeout_seconds {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    /// Warning window as a signed duration; rejects hours chrono cannot represent.
    pub fn warning_window(&self) -> Result<chrono::Duration, ExpiryError> {
        i64::try_from(self.warning_window_hours)
            .ok()
            .and_then(chrono::Duration::try_hours)
            .ok_or(ExpiryError::InvalidWindow(self.warning_window_hours))
    }

    fn apply_env_overrides(
        mut settings: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, config::ConfigError> {
        // Later entries win when several aliases are set
        let env_mappings = [
            ("WHOIS_BINARY", "whois_binary"),
            ("WHOIS_TIMEOUT", "whois_timeout_seconds"),
            ("WHOIS_TIMEOUT_SECONDS", "whois_timeout_seconds"),
            ("WARNING_WINDOW_HOURS", "warning_window_hours"),
            ("EXPIRY_WARNING_HOURS", "warning_window_hours"),
            ("WHOIS_MIN_LINES", "min_response_lines"),
            ("MAX_RESPONSE_SIZE", "max_response_size"),
        ];

        for (env_var, config_key) in env_mappings {
            if let Ok(value) = std::env::var(env_var) {
                settings = settings.set_override(config_key, value)?;
            }
        }

        Ok(settings)
    }
}
