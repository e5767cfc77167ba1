use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::models::Locale;

/// Application-level constants
pub const APP_NAME: &str = "medj-upload";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";
/// OCR and AI analysis can take minutes on large scans.
pub const DEFAULT_TIMEOUT_SECS: u64 = 180;

/// Filter used when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "medj_upload=info,warn"
}

/// Filter for `--verbose` runs.
pub fn verbose_log_filter() -> &'static str {
    "medj_upload=debug,info"
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value}")]
    InvalidValue { var: &'static str, value: String },
}

/// Endpoint paths relative to the base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub ocr: String,
    pub analyze: String,
    pub confirm: String,
    pub suggest_events: String,
    pub share_links: String,
    pub share_qr: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            ocr: "/api/upload/ocr/".into(),
            analyze: "/api/upload/analyze/".into(),
            confirm: "/api/upload/confirm/".into(),
            suggest_events: "/api/events/suggest/".into(),
            share_links: "/share/create-links/".into(),
            share_qr: "/share/qr/".into(),
        }
    }
}

/// How the Confirm request carries the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConfirmEncoding {
    #[default]
    Multipart,
    /// JSON body with the first file as `file_b64` / `file_name` / `file_mime`.
    Json,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub endpoints: Endpoints,
    pub timeout_secs: u64,
    pub locale: Locale,
    pub csrf_token: Option<String>,
    /// Raw `Cookie` header; also the fallback source of the CSRF token.
    pub cookie: Option<String>,
    pub confirm_encoding: ConfirmEncoding,
    pub indicator_dictionary: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            endpoints: Endpoints::default(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            locale: Locale::Bg,
            csrf_token: None,
            cookie: None,
            confirm_encoding: ConfirmEncoding::Multipart,
            indicator_dictionary: None,
        }
    }
}

impl ClientConfig {
    /// Read `MEDJ_*` environment variables on top of the defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = Self::default();

        if let Some(url) = get("MEDJ_BASE_URL") {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::InvalidValue { var: "MEDJ_BASE_URL", value: url });
            }
            config.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(raw) = get("MEDJ_TIMEOUT_SECS") {
            config.timeout_secs = match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => secs,
                _ => return Err(ConfigError::InvalidValue { var: "MEDJ_TIMEOUT_SECS", value: raw }),
            };
        }
        if let Some(raw) = get("MEDJ_LOCALE") {
            config.locale = raw
                .to_lowercase()
                .parse()
                .map_err(|_| ConfigError::InvalidValue { var: "MEDJ_LOCALE", value: raw })?;
        }
        if let Some(raw) = get("MEDJ_CONFIRM_ENCODING") {
            config.confirm_encoding = match raw.to_lowercase().as_str() {
                "multipart" => ConfirmEncoding::Multipart,
                "json" => ConfirmEncoding::Json,
                _ => return Err(ConfigError::InvalidValue { var: "MEDJ_CONFIRM_ENCODING", value: raw }),
            };
        }
        config.csrf_token = get("MEDJ_CSRF_TOKEN");
        config.cookie = get("MEDJ_COOKIE");
        config.indicator_dictionary = get("MEDJ_INDICATORS").map(PathBuf::from);
        Ok(config)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Absolute URL for an endpoint path.
    pub fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        format!("{}/{}", self.base_url.trim_end_matches('/'), path.trim_start_matches('/'))
    }
}
