//! Signer Configuration
//!
//! Selects and parameterises the signer capability:
//! - Local private key (kept in a [`SecretString`])
//! - Remote wallet reached over JSON-RPC
//! - RPC timeout and debug logging
//!
//! Values come from the environment and can be overridden builder-style.

use crate::error::{SignerError, SignerResult};
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use url::Url;

pub const ENV_PRIVATE_KEY: &str = "TYPED_SIGN_PRIVATE_KEY";
pub const ENV_RPC_URL: &str = "TYPED_SIGN_RPC_URL";
pub const ENV_ACCOUNT: &str = "TYPED_SIGN_ACCOUNT";
pub const ENV_RPC_TIMEOUT_SECS: &str = "TYPED_SIGN_RPC_TIMEOUT_SECS";
pub const ENV_DEBUG: &str = "TYPED_SIGN_DEBUG";

/// Wallet prompts wait on a human, so the default is generous
pub const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(120);

/// Which signer capability a configuration resolves to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignerMode {
    LocalKey,
    Wallet,
}

/// Signer settings
#[derive(Debug)]
pub struct SignerConfig {
    /// Hex-encoded secp256k1 private key
    pub private_key: Option<SecretString>,
    /// JSON-RPC endpoint of a wallet or node holding the account
    pub rpc_url: Option<String>,
    /// Account to sign with on the remote wallet
    pub account: Option<String>,
    /// Upper bound for one remote signing round trip
    pub rpc_timeout: Duration,
    /// Emit debug log lines
    pub debug: bool,
}

impl Default for SignerConfig {
    fn default() -> Self {
        Self {
            private_key: None,
            rpc_url: None,
            account: None,
            rpc_timeout: DEFAULT_RPC_TIMEOUT,
            debug: false,
        }
    }
}

impl SignerConfig {
    /// Load settings from the process environment
    pub fn from_env() -> SignerResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings from any key/value source
    pub fn from_lookup<F>(lookup: F) -> SignerResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let rpc_timeout = match non_empty(ENV_RPC_TIMEOUT_SECS) {
            Some(raw) => {
                let secs: u64 = raw.trim().parse().map_err(|_| {
                    let msg = format!(
                        "{} must be a whole number of seconds",
                        ENV_RPC_TIMEOUT_SECS
                    );
                    SignerError::config(msg).with_details(raw.clone())
                })?;
                Duration::from_secs(secs)
            }
            None => DEFAULT_RPC_TIMEOUT,
        };

        let debug = non_empty(ENV_DEBUG)
            .map(|v| v.trim().to_ascii_lowercase())
            .map_or(false, |v| matches!(v.as_str(), "1" | "true" | "yes" | "on"));

        Ok(Self {
            private_key: non_empty(ENV_PRIVATE_KEY).map(SecretString::from),
            rpc_url: non_empty(ENV_RPC_URL),
            account: non_empty(ENV_ACCOUNT),
            rpc_timeout,
            debug,
        })
    }

    pub fn with_private_key(mut self, key: impl Into<String>) -> Self {
        self.private_key = Some(SecretString::from(key.into()));
        self
    }

    pub fn with_rpc_url(mut self, url: impl Into<String>) -> Self {
        self.rpc_url = Some(url.into());
        self
    }

    pub fn with_account(mut self, account: impl Into<String>) -> Self {
        self.account = Some(account.into());
        self
    }

    pub fn with_rpc_timeout(mut self, timeout: Duration) -> Self {
        self.rpc_timeout = timeout;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Validate settings consistency
    pub fn validate(&self) -> SignerResult<()> {
        if let Some(key) = &self.private_key {
            let digits = strip_hex_prefix(key.expose_secret());
            if digits.len() != 64 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(SignerError::new(
                    crate::error::ErrorCode::InvalidPrivateKey,
                    "private key must be 32 bytes of hex",
                ));
            }
        }

        if let Some(rpc_url) = &self.rpc_url {
            let parsed = Url::parse(rpc_url)
                .map_err(|e| SignerError::config("invalid RPC URL").with_details(e.to_string()))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(SignerError::config(format!(
                    "unsupported RPC URL scheme `{}`",
                    parsed.scheme()
                )));
            }
        }

        if let Some(account) = &self.account {
            let digits = strip_hex_prefix(account);
            if digits.len() != 40 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(SignerError::new(
                    crate::error::ErrorCode::InvalidAddress,
                    format!("invalid account address `{}`", account),
                ));
            }
        }

        if self.rpc_timeout.is_zero() {
            return Err(SignerError::config("RPC timeout must be greater than zero"));
        }

        Ok(())
    }

    /// Pick the signer capability: a local key wins over a remote wallet
    pub fn signer_mode(&self) -> SignerResult<SignerMode> {
        if self.private_key.is_some() {
            Ok(SignerMode::LocalKey)
        } else if self.rpc_url.is_some() {
            Ok(SignerMode::Wallet)
        } else {
            Err(SignerError::config("no signer configured").with_details(format!(
                "set {} or {}",
                ENV_PRIVATE_KEY, ENV_RPC_URL
            )))
        }
    }

    /// Push logging settings into the global logger
    pub fn apply_logging(&self) {
        if self.debug {
            super::logging::enable_debug();
        }
    }
}

fn strip_hex_prefix(s: &str) -> &str {
    s.strip_prefix("0x").unwrap_or(s)
}
