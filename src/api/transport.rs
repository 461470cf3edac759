//! HTTP transport for the remote API
//!
//! `Transport` is the seam between the client and the network. It returns
//! the raw status and body; `parse_response` maps them onto the error
//! taxonomy. Nothing here retries.

use reqwest::blocking::Client as HttpClient;
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::error::{SignerError, SignerResult};
use crate::utils::config::{endpoint_url, ClientConfig};

/// Raw reply from the remote service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

pub trait Transport: Send + Sync {
    fn send(&self, method: &str, params: &Map<String, Value>) -> SignerResult<TransportResponse>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn send(&self, method: &str, params: &Map<String, Value>) -> SignerResult<TransportResponse> {
        (**self).send(method, params)
    }
}

/// Blocking `reqwest` transport posting JSON bodies
pub struct HttpTransport {
    client: HttpClient,
    base_url: String,
    api_version: u8,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> SignerResult<Self> {
        config.validate()?;

        let client = HttpClient::builder()
            .timeout(config.timeout)
            .user_agent(concat!("blockio-signer/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SignerError::network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            api_version: config.api_version,
        })
    }
}

impl Transport for HttpTransport {
    fn send(&self, method: &str, params: &Map<String, Value>) -> SignerResult<TransportResponse> {
        let url = endpoint_url(&self.base_url, self.api_version, method);

        let response = self
            .client
            .post(&url)
            .header("Accept", "application/json")
            .json(params)
            .send()
            .map_err(|e| SignerError::network(format!("{} request failed: {}", method, e)))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .map_err(|e| SignerError::network(format!("Failed to read {} response: {}", method, e)))?;

        Ok(TransportResponse { status, body })
    }
}

/// Decode a reply and surface service-side failures
pub fn parse_response(method: &str, response: TransportResponse) -> SignerResult<Value> {
    if response.status == 429 {
        return Err(SignerError::throttled(format!("{} was rate limited", method)));
    }

    let json: Value = match serde_json::from_str(&response.body) {
        Ok(v) => v,
        Err(_) if response.status >= 500 => {
            return Err(SignerError::internal(format!(
                "Remote service returned HTTP {} for {}",
                response.status, method
            )));
        }
        Err(e) => {
            return Err(SignerError::parse_error(format!(
                "Invalid JSON from {}: {}",
                method, e
            )));
        }
    };

    if let Some(message) = json
        .get("data")
        .and_then(|d| d.get("error_message"))
        .and_then(Value::as_str)
    {
        return Err(SignerError::remote_api(format!("Failed: {}", message))
            .with_details(format!("method={} http_status={}", method, response.status)));
    }

    let failed = json.get("status").and_then(Value::as_str) == Some("fail");
    if failed || !(200..300).contains(&response.status) {
        return Err(SignerError::remote_api(format!(
            "{} failed with HTTP {}",
            method, response.status
        )));
    }

    Ok(json)
}
