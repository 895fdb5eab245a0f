//! Process-wide constants and environment-driven settings.
//!
//! Constants cover the wire contract with the remote transform service and
//! the preview cap. [`Settings`] reads the deployment knobs from the
//! environment (and an optional `.env` file).

use std::env;

use crate::error::ConfigError;

/// Maximum number of rows any [`crate::models::NormalizedTable`] materializes.
pub const PREVIEW_ROWS: usize = 20;

/// Number of rows sent to the pattern-inference service as a sample.
pub const PATTERN_SAMPLE_ROWS: usize = 10;

/// Filename used when the transport gives no usable hint.
pub const DEFAULT_PROCESSED_FILENAME: &str = "processed.csv";

/// Side-channel header describing the applied pattern per target column.
pub const REGEX_INFO_HEADER: &str = "X-Regex-Info";

/// Side-channel header with per-column match counts.
pub const MATCH_STATS_HEADER: &str = "X-Match-Stats";

/// Side-channel keys the envelope decoder always reports on.
pub const SIDE_CHANNEL_KEYS: [&str; 2] = [REGEX_INFO_HEADER, MATCH_STATS_HEADER];

/// Extensions routed to the workbook reader (compared lowercase).
pub const SPREADSHEET_EXTENSIONS: [&str; 3] = ["xlsx", "xls", "xlsm"];

const DEFAULT_API_BASE: &str = "http://localhost:8000";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_TIMEOUT_SECS: u64 = 60;

const ENV_API_BASE: &str = "REGEX_ASSIST_API_BASE";
const ENV_PORT: &str = "REGEX_ASSIST_PORT";
const ENV_TIMEOUT: &str = "REGEX_ASSIST_TIMEOUT_SECS";

/// Deployment settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Base URL of the remote transform service (no trailing slash).
    pub api_base: String,
    /// Port the HTTP API listens on.
    pub port: u16,
    /// Timeout applied around each remote call.
    pub request_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            port: DEFAULT_PORT,
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl Settings {
    /// Load settings from the environment, reading `.env` first if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let api_base = lookup(ENV_API_BASE)
            .map(|v| v.trim().trim_end_matches('/').to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.api_base);

        let port = match lookup(ENV_PORT) {
            Some(raw) => parse_number(ENV_PORT, &raw)?,
            None => defaults.port,
        };

        let request_timeout_secs = match lookup(ENV_TIMEOUT) {
            Some(raw) => parse_number(ENV_TIMEOUT, &raw)?,
            None => defaults.request_timeout_secs,
        };

        Ok(Self {
            api_base,
            port,
            request_timeout_secs,
        })
    }

    /// Replace the API base, normalizing the trailing slash.
    pub fn with_api_base(mut self, api_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: raw.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let settings = Settings::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.api_base, "http://localhost:8000");
    }

    #[test]
    fn test_overrides_and_trailing_slash() {
        let settings = Settings::from_lookup(lookup_from(&[
            ("REGEX_ASSIST_API_BASE", "https://transform.example.com/"),
            ("REGEX_ASSIST_PORT", "8080"),
            ("REGEX_ASSIST_TIMEOUT_SECS", " 5 "),
        ]))
        .unwrap();

        assert_eq!(settings.api_base, "https://transform.example.com");
        assert_eq!(settings.port, 8080);
        assert_eq!(settings.request_timeout_secs, 5);
    }

    #[test]
    fn test_invalid_port_is_rejected() {
        let err = Settings::from_lookup(lookup_from(&[("REGEX_ASSIST_PORT", "eighty")])).unwrap_err();
        assert!(err.to_string().contains("REGEX_ASSIST_PORT"));
    }
}
