//! Unified error types for the signer
//!
//! All errors flow through this module so the CLI and API boundary
//! report failures the same way regardless of which component raised them.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::SigningState;

/// Main error type for all signing operations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignerError {
    pub code: ErrorCode,
    pub message: String,
    pub details: Option<String>,
    /// Terminal signing state when the failure ends the transaction's lifecycle
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<SigningState>,
}

impl SignerError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            state: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Mark the transaction as rejected: no further round can complete it
    pub fn rejected(mut self) -> Self {
        self.state = Some(SigningState::Rejected);
        self
    }

    pub fn is_rejected(&self) -> bool {
        self.state == Some(SigningState::Rejected)
    }

    // Convenience constructors
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, msg)
    }

    /// Wrong PIN. The message is fixed so callers cannot tell a padding
    /// failure from an authentication failure.
    pub fn invalid_pin() -> Self {
        Self::new(ErrorCode::InvalidPin, "Invalid Secret PIN provided.")
    }

    pub fn invalid_key(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidKey, msg)
    }

    pub fn invalid_key_encoding(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidKeyEncoding, msg)
    }

    pub fn invalid_address(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidAddress, msg)
    }

    pub fn invalid_transaction(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidTransaction, msg)
    }

    pub fn insufficient_signatures(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InsufficientSignatures, msg)
    }

    pub fn integrity_mismatch(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::IntegrityMismatch, msg)
    }

    pub fn unsupported_cipher(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::UnsupportedCipher, msg)
    }

    pub fn remote_api(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::RemoteApi, msg)
    }

    pub fn throttled(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::Throttled, msg)
    }

    pub fn network(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::NetworkError, msg)
    }

    pub fn parse_error(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ParseError, msg)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, msg)
    }

    /// Only transport-level hiccups are worth retrying. Integrity and PIN
    /// failures will fail the same way every time.
    pub fn is_retryable(&self) -> bool {
        matches!(self.code, ErrorCode::Throttled | ErrorCode::NetworkError)
    }
}

impl fmt::Display for SignerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)?;
        if let Some(ref details) = self.details {
            write!(f, " ({})", details)?;
        }
        Ok(())
    }
}

impl std::error::Error for SignerError {}

/// Error codes for categorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    // Input errors
    InvalidInput,
    InvalidAddress,
    InvalidKey,
    InvalidKeyEncoding,
    InvalidTransaction,

    // Secret recovery
    InvalidPin,
    UnsupportedCipher,

    // Signing outcome
    InsufficientSignatures,
    IntegrityMismatch,

    // Remote service
    RemoteApi,
    Throttled,
    NetworkError,

    // Parse errors
    ParseError,
    JsonError,
    HexError,

    // Internal
    Internal,
}

/// Result type alias for signer operations
pub type SignerResult<T> = Result<T, SignerError>;

// Conversions from common error types

impl From<serde_json::Error> for SignerError {
    fn from(e: serde_json::Error) -> Self {
        SignerError::new(ErrorCode::JsonError, e.to_string())
    }
}

impl From<hex::FromHexError> for SignerError {
    fn from(e: hex::FromHexError) -> Self {
        SignerError::new(ErrorCode::HexError, e.to_string())
    }
}

impl From<base64::DecodeError> for SignerError {
    fn from(e: base64::DecodeError) -> Self {
        SignerError::new(ErrorCode::ParseError, format!("Base64 error: {}", e))
    }
}

impl From<std::io::Error> for SignerError {
    fn from(e: std::io::Error) -> Self {
        SignerError::new(ErrorCode::Internal, e.to_string())
    }
}

impl From<reqwest::Error> for SignerError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SignerError::new(ErrorCode::NetworkError, "Request timed out")
        } else if e.is_connect() {
            SignerError::new(ErrorCode::NetworkError, "Connection failed")
        } else {
            SignerError::new(ErrorCode::NetworkError, e.to_string())
        }
    }
}

impl From<secp256k1::Error> for SignerError {
    fn from(e: secp256k1::Error) -> Self {
        SignerError::new(ErrorCode::InvalidKey, format!("Secp256k1 error: {}", e))
    }
}
