use std::{env, path::PathBuf, time::Duration};

use reqwest::Url;
use thiserror::Error;

pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;
pub const DEFAULT_MAX_FIELD_BYTES: u64 = 64 * 1024;
pub const DEFAULT_MAX_REQUEST_BYTES: u64 = 32 * 1024 * 1024;
pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_EXCERPT_LIMIT: usize = 1000;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value {value:?} for {name}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// What to do with a file part larger than `max_upload_bytes`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OversizePolicy {
    #[default]
    Reject,
    Truncate,
}

/// Where file content lives between decoding and forwarding.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Staging {
    #[default]
    Memory,
    /// One uniquely named temporary file per request inside `dir`.
    Disk { dir: PathBuf },
}

/// An extra endpoint that receives a copy of every upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecondarySink {
    pub url: Url,
    pub wait_for_result: bool,
}

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub upstream_url: Url,
    pub file_field: String,
    pub max_upload_bytes: u64,
    pub oversize: OversizePolicy,
    pub max_field_bytes: u64,
    /// Ceiling on the whole inbound body, ignored parts included.
    pub max_request_bytes: u64,
    pub upstream_timeout: Duration,
    pub excerpt_limit: usize,
    pub default_filename: String,
    pub default_mime: mime::Mime,
    pub passthrough_upstream_status: bool,
    pub staging: Staging,
    pub secondary: Option<SecondarySink>,
}

impl RelayConfig {
    pub fn new(upstream_url: Url) -> Self {
        Self {
            upstream_url,
            file_field: "file".to_string(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            oversize: OversizePolicy::default(),
            max_field_bytes: DEFAULT_MAX_FIELD_BYTES,
            max_request_bytes: DEFAULT_MAX_REQUEST_BYTES,
            upstream_timeout: DEFAULT_UPSTREAM_TIMEOUT,
            excerpt_limit: DEFAULT_EXCERPT_LIMIT,
            default_filename: "document.pdf".to_string(),
            default_mime: mime::APPLICATION_PDF,
            passthrough_upstream_status: false,
            staging: Staging::default(),
            secondary: None,
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the config from any variable source, `from_env` being the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &'static str| lookup(name).filter(|v| !v.trim().is_empty());

        let upstream_url =
            get("RELAY_UPSTREAM_URL").ok_or(ConfigError::Missing("RELAY_UPSTREAM_URL"))?;
        let mut config = Self::new(parse_url("RELAY_UPSTREAM_URL", &upstream_url)?);

        if let Some(field) = get("RELAY_FILE_FIELD") {
            config.file_field = field;
        }
        if let Some(v) = get("RELAY_MAX_UPLOAD_BYTES") {
            config.max_upload_bytes = parse_with("RELAY_MAX_UPLOAD_BYTES", &v, str::parse::<u64>)?;
        }
        if let Some(v) = get("RELAY_OVERSIZE") {
            config.oversize = match v.to_ascii_lowercase().as_str() {
                "reject" => OversizePolicy::Reject,
                "truncate" => OversizePolicy::Truncate,
                _ => return Err(invalid("RELAY_OVERSIZE", &v, "expected `reject` or `truncate`")),
            };
        }
        if let Some(v) = get("RELAY_MAX_FIELD_BYTES") {
            config.max_field_bytes = parse_with("RELAY_MAX_FIELD_BYTES", &v, str::parse::<u64>)?;
        }
        if let Some(v) = get("RELAY_MAX_REQUEST_BYTES") {
            config.max_request_bytes =
                parse_with("RELAY_MAX_REQUEST_BYTES", &v, str::parse::<u64>)?;
        }
        if let Some(v) = get("RELAY_UPSTREAM_TIMEOUT") {
            config.upstream_timeout =
                parse_with("RELAY_UPSTREAM_TIMEOUT", &v, humantime::parse_duration)?;
        }
        if let Some(v) = get("RELAY_EXCERPT_LIMIT") {
            config.excerpt_limit = parse_with("RELAY_EXCERPT_LIMIT", &v, str::parse::<usize>)?;
        }
        if let Some(v) = get("RELAY_PASSTHROUGH_STATUS") {
            config.passthrough_upstream_status = parse_bool("RELAY_PASSTHROUGH_STATUS", &v)?;
        }
        if let Some(dir) = get("RELAY_STAGING_DIR") {
            config.staging = Staging::Disk { dir: dir.into() };
        }
        if let Some(url) = get("RELAY_SECONDARY_URL") {
            let wait_for_result = match get("RELAY_SECONDARY_WAIT") {
                Some(v) => parse_bool("RELAY_SECONDARY_WAIT", &v)?,
                None => false,
            };
            config.secondary = Some(SecondarySink {
                url: parse_url("RELAY_SECONDARY_URL", &url)?,
                wait_for_result,
            });
        }

        Ok(config)
    }
}

fn invalid(name: &'static str, value: &str, reason: impl ToString) -> ConfigError {
    ConfigError::Invalid {
        name,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_with<T, E: ToString>(
    name: &'static str,
    value: &str,
    parse: impl FnOnce(&str) -> Result<T, E>,
) -> Result<T, ConfigError> {
    parse(value.trim()).map_err(|e| invalid(name, value, e))
}

fn parse_url(name: &'static str, value: &str) -> Result<Url, ConfigError> {
    let url = parse_with(name, value, Url::parse)?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(invalid(name, value, format!("unsupported scheme `{scheme}`"))),
    }
}

fn parse_bool(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(name, value, "expected a boolean")),
    }
}
