//! Remote Wallet Signing
//!
//! Dispatches typed data to a wallet over JSON-RPC (`eth_signTypedData_v4`).
//! The wallet sees the full payload and hashes it itself; the returned
//! 65-byte signature is split into `(r, s, v)` and `v` normalized.

use super::hasher::digest_to_sign;
use super::signer::{recover_address, same_address, BoxError};
use super::types::*;
use crate::error::{SignerError, SignerResult};
use crate::utils::config::SignerConfig;
use crate::{log_debug, log_info, log_warn};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// JSON-RPC method used for typed data signing
pub const SIGN_TYPED_DATA_V4: &str = "eth_signTypedData_v4";

/// A wallet that holds the account and answers JSON-RPC requests
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Account the wallet signs with
    async fn address(&self) -> Result<String, BoxError>;

    /// Issue one JSON-RPC call and return its `result`
    async fn json_rpc(&self, method: &str, params: Vec<Value>) -> Result<Value, BoxError>;
}

/// Serialize the wallet payload: `{types, primaryType, domain, message}`
///
/// `types` always carries the `EIP712Domain` derived from the populated
/// domain members, replacing any caller-supplied definition.
pub fn typed_data_payload(
    domain: &Eip712Domain,
    primary_type: &str,
    message: &Value,
    types: &TypeDictionary,
) -> Result<String, Eip712Error> {
    let mut payload_types = types.clone();
    payload_types.insert(EIP712_DOMAIN_TYPE.to_string(), domain.type_fields());

    TypedData::new(domain.clone(), payload_types, primary_type, message.clone()).to_json()
}

/// Parse a wallet's `0x`-prefixed 65-byte `r || s || v` signature
pub fn parse_signature_hex(signature: &str) -> Result<Eip712Signature, Eip712Error> {
    let trimmed = signature.trim();
    let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    let bytes =
        hex::decode(digits).map_err(|e| Eip712Error::InvalidSignature(e.to_string()))?;

    let mut parsed = Eip712Signature::from_bytes(&bytes)?;
    parsed.v = match parsed.v {
        0 | 1 => parsed.v + 27,
        27 | 28 => parsed.v,
        other => {
            return Err(Eip712Error::InvalidSignature(format!(
                "unexpected v value {}",
                other
            )))
        }
    };
    Ok(parsed)
}

/// Remote branch of [`super::signer::sign`]
pub(crate) async fn sign_with_wallet(
    wallet: &dyn WalletProvider,
    domain: &Eip712Domain,
    primary_type: &str,
    message: &Value,
    types: &TypeDictionary,
) -> Result<Eip712Signature, Eip712Error> {
    // Encoding problems are reported before anything reaches the wallet
    let digest = digest_to_sign(domain, primary_type, message, types)?;
    let payload = typed_data_payload(domain, primary_type, message, types)?;

    let account = wallet
        .address()
        .await
        .map_err(|e| SigningError::new("failed to resolve wallet account", e))?;

    log_info!(
        "eip712",
        "requesting wallet signature",
        account = account,
        primary_type = primary_type
    );

    let response = wallet
        .json_rpc(
            SIGN_TYPED_DATA_V4,
            vec![Value::String(account.clone()), Value::String(payload)],
        )
        .await
        .map_err(|e| {
            log_warn!("eip712", "wallet signing failed", account = account);
            SigningError::new("wallet signing failed", e)
        })?;

    let signature_hex = response.as_str().ok_or_else(|| {
        SigningError::new(
            "unexpected wallet response",
            format!("expected a hex string, got {}", response),
        )
    })?;

    let signature = parse_signature_hex(signature_hex)
        .map_err(|e| SigningError::new("malformed wallet signature", e))?;

    // Contract wallets return signatures that do not ecrecover; only warn
    match recover_address(&digest, &signature) {
        Ok(recovered) if same_address(&recovered, &account) => {
            log_debug!("eip712", "wallet signature recovers to account", signer = recovered);
        }
        Ok(recovered) => {
            log_warn!(
                "eip712",
                "wallet signature does not recover to account",
                account = account,
                signer = recovered
            );
        }
        Err(e) => {
            log_warn!("eip712", "wallet signature is not recoverable", reason = e);
        }
    }

    Ok(signature)
}

#[derive(Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Vec<Value>,
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

/// Error object returned by the wallet, e.g. `4001` for a user rejection
#[derive(Debug, Clone, Deserialize, thiserror::Error)]
#[error("JSON-RPC error {code}: {message}")]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

/// Wallet reached over HTTP JSON-RPC
#[derive(Debug)]
pub struct HttpWalletProvider {
    client: reqwest::Client,
    url: String,
    account: Option<String>,
    next_id: AtomicU64,
}

impl HttpWalletProvider {
    pub fn new(url: impl Into<String>, timeout: Duration) -> SignerResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("typed-sign/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SignerError::network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self::with_client(url, client))
    }

    /// Use a preconfigured HTTP client (proxies, TLS roots, headers)
    pub fn with_client(url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            client,
            url: url.into(),
            account: None,
            next_id: AtomicU64::new(1),
        }
    }

    /// Sign with this account instead of asking the wallet via `eth_accounts`
    pub fn with_account(mut self, account: impl Into<String>) -> Self {
        self.account = Some(account.into());
        self
    }

    pub fn from_config(config: &SignerConfig) -> SignerResult<Self> {
        let url = config
            .rpc_url
            .as_deref()
            .ok_or_else(|| SignerError::config("no wallet RPC URL configured"))?;

        let provider = Self::new(url, config.rpc_timeout)?;
        Ok(match &config.account {
            Some(account) => provider.with_account(account.clone()),
            None => provider,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl WalletProvider for HttpWalletProvider {
    async fn address(&self) -> Result<String, BoxError> {
        if let Some(account) = &self.account {
            return Ok(account.clone());
        }

        let accounts = self.json_rpc("eth_accounts", Vec::new()).await?;
        accounts
            .as_array()
            .and_then(|list| list.first())
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| BoxError::from("wallet exposes no accounts"))
    }

    async fn json_rpc(&self, method: &str, params: Vec<Value>) -> Result<Value, BoxError> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        log_debug!("eip712", "json-rpc call", method = method, rpc_url = self.url);

        let response: JsonRpcResponse = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let Some(error) = response.error {
            return Err(Box::new(error));
        }

        Ok(response.result.unwrap_or(Value::Null))
    }
}
