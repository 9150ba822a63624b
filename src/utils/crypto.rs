//! Crypto Utilities
//!
//! Keccak-256 and Ethereum address helpers shared by the hashing and
//! signing code.

use secp256k1::PublicKey;
use tiny_keccak::{Hasher, Keccak};

/// Keccak256 hash
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    hasher.update(data);
    let mut out = [0u8; 32];
    hasher.finalize(&mut out);
    out
}

/// Convert raw address bytes to checksummed Ethereum address (EIP-55)
pub fn to_checksum_address(address: &[u8]) -> String {
    let lower = hex::encode(address);
    let hash = keccak256(lower.as_bytes());

    let mut result = String::from("0x");
    for (i, ch) in lower.chars().enumerate() {
        let byte = hash[i / 2];
        let nibble = if i % 2 == 0 { byte >> 4 } else { byte & 0x0f };

        if ch.is_ascii_digit() {
            result.push(ch);
        } else if nibble >= 8 {
            result.push(ch.to_ascii_uppercase());
        } else {
            result.push(ch);
        }
    }

    result
}

/// Derive the 20-byte Ethereum address of a secp256k1 public key
pub fn public_key_to_address(public_key: &PublicKey) -> [u8; 20] {
    // Uncompressed key is 0x04 || x || y; the prefix is not hashed
    let pubkey_bytes = public_key.serialize_uncompressed();
    let hash = keccak256(&pubkey_bytes[1..]);

    let mut address = [0u8; 20];
    address.copy_from_slice(&hash[12..32]);
    address
}
