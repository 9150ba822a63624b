//! Typed Data Signer
//!
//! EIP-712 typed structured data hashing and signing for Ethereum.
//!
//! # Architecture
//!
//! This crate provides:
//! - **eip712**: Type encoding, struct hashing, domain separator, digest,
//!   and signing through a local key or a remote wallet
//! - **error**: Serialisable error report for the CLI and other callers
//! - **utils**: Keccak/address helpers, configuration, redacting logger
//!
//! # Security
//!
//! Private keys are held in `secrecy::SecretString` until parsed, decoded key
//! bytes are wiped with `zeroize`, and the logger redacts keys, accounts and
//! RPC credentials.
//!
//! # Example
//!
//! ```rust,ignore
//! use typed_data_signer::eip712::{hash_typed_data, TypedData};
//!
//! let typed_data = TypedData::from_json(json_string)?;
//! let digest = hash_typed_data(&typed_data)?;
//! println!("0x{}", hex::encode(digest));
//! ```

pub mod eip712;
pub mod error;
pub mod serde_bytes;
pub mod utils;

// Re-export key types for convenience
pub use eip712::{
    digest_to_sign, domain_separator, encode_data, encode_type, hash_struct, sign, type_hash,
    Eip712Domain, Eip712Error, Eip712Signature, LocalKeySigner, TypeDictionary, TypedData,
    TypedDataField, TypedDataSigner, WalletProvider,
};
pub use error::{ErrorCode, SignerError, SignerResult};
pub use utils::{keccak256, to_checksum_address};
