//! Environment-driven configuration.
//!
//! Three secrets are required and the process refuses to start without
//! them; everything else has a default.

use std::fmt;
use std::path::PathBuf;

/// Errors that can occur when reading configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// A required variable is absent or empty.
    MissingVar(&'static str),
    /// A variable is present but unusable.
    InvalidVar { name: &'static str, reason: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingVar(name) => {
                write!(f, "missing required environment variable {name}")
            }
            Self::InvalidVar { name, reason } => {
                write!(f, "invalid environment variable {name}: {reason}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug)]
pub struct Config {
    /// Shared secret for webhook signature validation.
    pub app_secret: String,
    /// Token echoed back during the webhook verification handshake.
    pub verify_token: String,
    /// Bearer token for the Send API.
    pub page_access_token: String,
    pub port: u16,
    /// Sender id allowed to use `stop`/`start` and targeted by the message
    /// relay. Both features are inert when unset.
    pub admin_sender_id: Option<String>,
    /// Built-in content catalogue directory.
    pub content_dir: PathBuf,
    /// Where authored custom rules are persisted.
    pub custom_dir: PathBuf,
    /// Directory for state files (logs).
    pub data_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any name -> value lookup; lets tests avoid touching the
    /// process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |name: &'static str| -> Result<String, ConfigError> {
            match lookup(name) {
                Some(value) if !value.trim().is_empty() => Ok(value),
                _ => Err(ConfigError::MissingVar(name)),
            }
        };

        let app_secret = required("APP_SECRET")?;
        let verify_token = required("VERIFY_TOKEN")?;
        let page_access_token = required("PAGE_ACCESS_TOKEN")?;

        let port = match lookup("PORT") {
            Some(raw) => raw.parse::<u16>().map_err(|e| ConfigError::InvalidVar {
                name: "PORT",
                reason: e.to_string(),
            })?,
            None => 5000,
        };

        let admin_sender_id = lookup("ADMIN_SENDER_ID").filter(|v| !v.trim().is_empty());
        let content_dir = lookup("CONTENT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("content"));
        let custom_dir = lookup("CUSTOM_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("custom"));
        let data_dir = lookup("DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(Self {
            app_secret,
            verify_token,
            page_access_token,
            port,
            admin_sender_id,
            content_dir,
            custom_dir,
            data_dir,
        })
    }
}
