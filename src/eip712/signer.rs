//! EIP-712 Signing
//!
//! The two signer capabilities and the signing entry point:
//! - [`TypedDataSigner::LocalKey`] signs the digest in process
//! - [`TypedDataSigner::Wallet`] hands the whole payload to a wallet
//!
//! Both return `(r, s, v)` with `v` in the Ethereum `{27, 28}` range.

use super::hasher::{digest_to_sign, hash_typed_data};
use super::types::*;
use super::wallet::{sign_with_wallet, WalletProvider};
use crate::utils::crypto::{public_key_to_address, to_checksum_address};
use crate::{log_debug, log_info, log_warn};
use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{Message, Secp256k1, SecretKey};
use serde_json::Value;
use std::error::Error as StdError;
use zeroize::Zeroizing;

/// Boxed error returned by signer capabilities
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// Recoverable ECDSA signature as produced by a key, before `v` is normalized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawSignature {
    pub r: [u8; 32],
    pub s: [u8; 32],
    /// 0 or 1 for raw secp256k1 output; some signers already add 27
    pub recovery_id: u8,
}

/// Anything that can produce a recoverable signature over a 32-byte digest
pub trait DigestSigner: Send + Sync {
    fn sign_digest(&self, digest: &[u8; 32]) -> Result<RawSignature, BoxError>;
}

/// The signer capability handed to [`sign`]
#[derive(Clone, Copy)]
pub enum TypedDataSigner<'a> {
    LocalKey(&'a dyn DigestSigner),
    Wallet(&'a dyn WalletProvider),
}

/// In-process secp256k1 key
pub struct LocalKeySigner {
    secret_key: SecretKey,
    address: [u8; 20],
}

impl LocalKeySigner {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, Eip712Error> {
        let secret_key = SecretKey::from_slice(bytes)
            .map_err(|e| SigningError::new("invalid private key", e))?;
        let secp = Secp256k1::signing_only();
        let address = public_key_to_address(&secret_key.public_key(&secp));

        Ok(Self {
            secret_key,
            address,
        })
    }

    /// Parse a hex private key, with or without `0x`
    pub fn from_hex(private_key: &str) -> Result<Self, Eip712Error> {
        let trimmed = private_key.trim();
        let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let bytes = Zeroizing::new(
            hex::decode(digits).map_err(|e| SigningError::new("invalid private key", e))?,
        );
        Self::from_slice(&bytes)
    }

    /// EIP-55 checksummed address of this key
    pub fn address(&self) -> String {
        to_checksum_address(&self.address)
    }
}

impl std::fmt::Debug for LocalKeySigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalKeySigner")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}

impl DigestSigner for LocalKeySigner {
    fn sign_digest(&self, digest: &[u8; 32]) -> Result<RawSignature, BoxError> {
        let secp = Secp256k1::signing_only();
        let message = Message::from_digest(*digest);

        let (recovery_id, compact) = secp
            .sign_ecdsa_recoverable(&message, &self.secret_key)
            .serialize_compact();

        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&compact[0..32]);
        s.copy_from_slice(&compact[32..64]);

        Ok(RawSignature {
            r,
            s,
            recovery_id: recovery_id.to_i32() as u8,
        })
    }
}

/// Map a recovery byte into the `{27, 28}` range
pub fn normalize_v(v: u8) -> Result<u8, Eip712Error> {
    match v {
        0 | 1 => Ok(v + 27),
        27 | 28 => Ok(v),
        other => Err(SigningError::new(
            "unexpected recovery id",
            format!("v = {} is outside {{0, 1, 27, 28}}", other),
        )
        .into()),
    }
}

/// Sign a typed message with the given capability
///
/// Encoding failures surface unwrapped; only failures of the signer itself
/// are reported as [`Eip712Error::Signing`].
pub async fn sign(
    domain: &Eip712Domain,
    primary_type: &str,
    message: &Value,
    types: &TypeDictionary,
    signer: TypedDataSigner<'_>,
) -> Result<Eip712Signature, Eip712Error> {
    match signer {
        TypedDataSigner::LocalKey(key) => {
            let digest = digest_to_sign(domain, primary_type, message, types)?;
            log_debug!(
                "eip712",
                "computed digest",
                primary_type = primary_type,
                digest = hex::encode(digest)
            );

            let raw = key.sign_digest(&digest).map_err(|e| {
                log_warn!("eip712", "local key refused to sign", primary_type = primary_type);
                SigningError::new("local key signing failed", e)
            })?;

            let signature = Eip712Signature::new(raw.r, raw.s, normalize_v(raw.recovery_id)?);
            log_info!(
                "eip712",
                "signed typed data",
                primary_type = primary_type,
                signature = signature.to_hex()
            );
            Ok(signature)
        }
        TypedDataSigner::Wallet(wallet) => {
            sign_with_wallet(wallet, domain, primary_type, message, types).await
        }
    }
}

/// Sign a complete wallet-format payload
pub async fn sign_typed_data(
    typed_data: &TypedData,
    signer: TypedDataSigner<'_>,
) -> Result<Eip712Signature, Eip712Error> {
    typed_data.validate()?;

    sign(
        &typed_data.domain,
        &typed_data.primary_type,
        &typed_data.message,
        &typed_data.types,
        signer,
    )
    .await
}

/// Recover the signer's checksummed address from a digest signature
pub fn recover_address(
    hash: &[u8; 32],
    signature: &Eip712Signature,
) -> Result<String, Eip712Error> {
    let v = match signature.v {
        27 | 28 => signature.v - 27,
        0 | 1 => signature.v,
        other => {
            return Err(Eip712Error::InvalidSignature(format!(
                "unexpected v value {}",
                other
            )))
        }
    };

    let recovery_id = RecoveryId::from_i32(i32::from(v))
        .map_err(|e| Eip712Error::InvalidSignature(e.to_string()))?;

    let mut compact = [0u8; 64];
    compact[0..32].copy_from_slice(&signature.r);
    compact[32..64].copy_from_slice(&signature.s);

    let recoverable = RecoverableSignature::from_compact(&compact, recovery_id)
        .map_err(|e| Eip712Error::InvalidSignature(e.to_string()))?;

    let secp = Secp256k1::verification_only();
    let public_key = secp
        .recover_ecdsa(&Message::from_digest(*hash), &recoverable)
        .map_err(|e| Eip712Error::InvalidSignature(e.to_string()))?;

    Ok(to_checksum_address(&public_key_to_address(&public_key)))
}

/// Check that `signature` over `hash` was made by `expected_address`
pub fn verify_signature(
    hash: &[u8; 32],
    signature: &Eip712Signature,
    expected_address: &str,
) -> Result<bool, Eip712Error> {
    let recovered = recover_address(hash, signature)?;
    Ok(same_address(&recovered, expected_address))
}

/// Verify a signature over a wallet-format payload
pub fn verify_typed_data(
    typed_data: &TypedData,
    signature: &Eip712Signature,
    expected_address: &str,
) -> Result<bool, Eip712Error> {
    let hash = hash_typed_data(typed_data)?;
    verify_signature(&hash, signature, expected_address)
}

/// Case-insensitive address comparison, `0x` optional
pub(crate) fn same_address(a: &str, b: &str) -> bool {
    let a = a.trim();
    let b = b.trim();
    a.strip_prefix("0x")
        .unwrap_or(a)
        .eq_ignore_ascii_case(b.strip_prefix("0x").unwrap_or(b))
}
