//! EIP-712 Typed Data Signing
//!
//! Hashing and signing of typed structured data: canonical type strings,
//! struct hashes, the domain separator and the final
//! `keccak256(0x1901 || domainSeparator || hashStruct(message))` digest,
//! signed either by a local key or by a remote wallet.
//!
//! Array-typed fields are rejected with [`Eip712Error::UnsupportedType`].
//!
//! # Reference
//! - <https://eips.ethereum.org/EIPS/eip-712>
//!
//! # Example
//! ```rust,ignore
//! use typed_data_signer::eip712::{sign, LocalKeySigner, TypedData, TypedDataSigner};
//!
//! let typed = TypedData::from_json(json_string)?;
//! let key = LocalKeySigner::from_hex(private_key_hex)?;
//! let signature = sign(
//!     &typed.domain,
//!     &typed.primary_type,
//!     &typed.message,
//!     &typed.types,
//!     TypedDataSigner::LocalKey(&key),
//! )
//! .await?;
//! ```

pub mod encoder;
pub mod hasher;
pub mod signer;
pub mod types;
pub mod wallet;

pub use encoder::*;
pub use hasher::*;
pub use signer::*;
pub use types::*;
pub use wallet::*;
