//! Unified error type for the signer boundary
//!
//! Library code reports [`Eip712Error`]; configuration, the CLI and anything
//! that needs a serialisable failure report converts into [`SignerError`].

use crate::eip712::Eip712Error;
use serde::{Deserialize, Serialize};
use std::error::Error as StdError;
use std::fmt;

/// Main error type at the crate boundary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignerError {
    pub code: ErrorCode,
    pub message: String,
    pub details: Option<String>,
}

impl SignerError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    // Convenience constructors
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, msg)
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigError, msg)
    }

    pub fn network(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::NetworkError, msg)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, msg)
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

impl StdError for SignerError {}

/// Error codes for categorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    // Input errors
    InvalidInput,
    InvalidAddress,
    InvalidPrivateKey,
    ConfigError,

    // Typed data errors
    EncodingError,
    UnsupportedType,
    CyclicType,

    // Network errors
    NetworkError,

    // Crypto errors
    SigningFailed,
    InvalidSignature,

    // Parse errors
    JsonError,

    // Internal
    Internal,
}

/// Result type alias for boundary operations
pub type SignerResult<T> = Result<T, SignerError>;

// Conversions from common error types

impl From<Eip712Error> for SignerError {
    fn from(e: Eip712Error) -> Self {
        let code = match &e {
            Eip712Error::UndefinedType(_) => ErrorCode::EncodingError,
            Eip712Error::UnsupportedType(_) => ErrorCode::UnsupportedType,
            Eip712Error::CyclicType(_) => ErrorCode::CyclicType,
            Eip712Error::InvalidJson(_) => ErrorCode::JsonError,
            Eip712Error::MissingField(_) | Eip712Error::InvalidValue { .. } => {
                ErrorCode::InvalidInput
            }
            Eip712Error::InvalidAddress(_) => ErrorCode::InvalidAddress,
            Eip712Error::InvalidSignature(_) => ErrorCode::InvalidSignature,
            Eip712Error::Signing(_) => ErrorCode::SigningFailed,
        };

        let err = SignerError::new(code, e.to_string());
        match e.source().and_then(|inner| inner.source()) {
            Some(cause) => err.with_details(cause.to_string()),
            None => err,
        }
    }
}

impl From<serde_json::Error> for SignerError {
    fn from(e: serde_json::Error) -> Self {
        SignerError::new(ErrorCode::JsonError, e.to_string())
    }
}
