//! Client configuration
//!
//! API key, PIN and endpoint settings. Values come from the caller or from
//! the environment; nothing here is persisted.

use secrecy::SecretString;
use std::time::Duration;
use url::Url;

use crate::error::{SignerError, SignerResult};

pub const ENV_API_KEY: &str = "BLOCK_IO_API_KEY";
pub const ENV_PIN: &str = "BLOCK_IO_PIN";
pub const ENV_VERSION: &str = "BLOCK_IO_VERSION";
pub const ENV_BASE_URL: &str = "BLOCK_IO_BASE_URL";

pub const DEFAULT_BASE_URL: &str = "https://block.io";
pub const DEFAULT_API_VERSION: u8 = 2;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Settings for one API client instance
#[derive(Debug)]
pub struct ClientConfig {
    pub api_key: String,
    /// Only ever handed to the key-stretching step
    pub pin: Option<SecretString>,
    pub api_version: u8,
    pub base_url: String,
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            pin: None,
            api_version: DEFAULT_API_VERSION,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_pin(mut self, pin: impl Into<String>) -> Self {
        self.pin = Some(SecretString::from(pin.into()));
        self
    }

    pub fn with_api_version(mut self, version: u8) -> Self {
        self.api_version = version;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Build from `BLOCK_IO_*` environment variables
    pub fn from_env() -> SignerResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source; lets tests avoid touching the process env
    pub fn from_lookup<F>(lookup: F) -> SignerResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup(ENV_API_KEY)
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| SignerError::invalid_input(format!("{} is not set", ENV_API_KEY)))?;

        let mut config = ClientConfig::new(api_key);

        if let Some(pin) = lookup(ENV_PIN).filter(|p| !p.is_empty()) {
            config = config.with_pin(pin);
        }

        if let Some(version) = lookup(ENV_VERSION) {
            let parsed = version.trim().parse::<u8>().map_err(|_| {
                SignerError::invalid_input(format!("{} must be a small integer", ENV_VERSION))
            })?;
            config = config.with_api_version(parsed);
        }

        if let Some(base_url) = lookup(ENV_BASE_URL) {
            config = config.with_base_url(base_url);
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that could only fail later
    pub fn validate(&self) -> SignerResult<()> {
        if self.api_version == 0 {
            return Err(SignerError::invalid_input("API version must be at least 1"));
        }

        let url = Url::parse(&self.base_url)
            .map_err(|e| SignerError::invalid_input(format!("Invalid base URL: {}", e)))?;
        match url.scheme() {
            "https" => Ok(()),
            "http" if matches!(url.host_str(), Some("localhost") | Some("127.0.0.1")) => Ok(()),
            other => Err(SignerError::invalid_input(format!(
                "Base URL must use https, got {}",
                other
            ))),
        }
    }

    /// Full endpoint for an API method
    pub fn endpoint(&self, method: &str) -> String {
        endpoint_url(&self.base_url, self.api_version, method)
    }
}

/// `{base}/api/v{version}/{method}/`
pub fn endpoint_url(base_url: &str, api_version: u8, method: &str) -> String {
    format!(
        "{}/api/v{}/{}/",
        base_url.trim_end_matches('/'),
        api_version,
        method
    )
}
