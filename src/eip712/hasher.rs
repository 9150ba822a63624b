//! EIP-712 Hashing
//!
//! Implements domain separator, struct hashing and the final signing digest.

use super::encoder::{encode_data, encode_type};
use super::types::*;
use crate::utils::crypto::keccak256;

/// Magic prefix for EIP-712 encoding
const EIP712_PREFIX: &[u8] = b"\x19\x01";

/// Dictionary holding only the `EIP712Domain` type derived from `domain`
pub fn domain_types(domain: &Eip712Domain) -> TypeDictionary {
    let mut types = TypeDictionary::new();
    types.insert(EIP712_DOMAIN_TYPE.to_string(), domain.type_fields());
    types
}

/// Canonical type string of the domain, e.g.
/// `EIP712Domain(string name,uint256 chainId,address verifyingContract)`
pub fn encode_domain_type(domain: &Eip712Domain) -> Result<String, Eip712Error> {
    encode_type(EIP712_DOMAIN_TYPE, &domain_types(domain))
}

/// Calculate the domain separator hash
///
/// domainSeparator = hashStruct(eip712Domain)
pub fn domain_separator(domain: &Eip712Domain) -> Result<[u8; 32], Eip712Error> {
    let domain_value =
        serde_json::to_value(domain).map_err(|e| Eip712Error::InvalidJson(e.to_string()))?;

    hash_struct(EIP712_DOMAIN_TYPE, &domain_value, &domain_types(domain))
}

/// Hash a struct according to EIP-712
///
/// hashStruct(s) = keccak256(typeHash || encodeData(s))
pub fn hash_struct(
    primary_type: &str,
    data: &serde_json::Value,
    types: &TypeDictionary,
) -> Result<[u8; 32], Eip712Error> {
    let encoded = encode_data(primary_type, data, types)?;
    Ok(keccak256(&encoded))
}

/// Calculate the final EIP-712 hash for signing
///
/// digest = keccak256("\x19\x01" || domainSeparator || hashStruct(message))
pub fn digest_to_sign(
    domain: &Eip712Domain,
    primary_type: &str,
    message: &serde_json::Value,
    types: &TypeDictionary,
) -> Result<[u8; 32], Eip712Error> {
    Ok(get_pre_image_parts(domain, primary_type, message, types)?.final_hash)
}

/// Digest of a complete wallet-format payload, after validating it
pub fn hash_typed_data(typed_data: &TypedData) -> Result<[u8; 32], Eip712Error> {
    Ok(get_pre_image(typed_data)?.final_hash)
}

/// Pre-image components (for external signing and inspection)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Eip712PreImage {
    pub domain_separator: [u8; 32],
    pub struct_hash: [u8; 32],
    pub final_hash: [u8; 32],
}

/// Calculate the pre-image components for a wallet-format payload
pub fn get_pre_image(typed_data: &TypedData) -> Result<Eip712PreImage, Eip712Error> {
    typed_data.validate()?;

    get_pre_image_parts(
        &typed_data.domain,
        &typed_data.primary_type,
        &typed_data.message,
        &typed_data.types,
    )
}

fn get_pre_image_parts(
    domain: &Eip712Domain,
    primary_type: &str,
    message: &serde_json::Value,
    types: &TypeDictionary,
) -> Result<Eip712PreImage, Eip712Error> {
    let domain_separator = domain_separator(domain)?;
    let struct_hash = hash_struct(primary_type, message, types)?;

    let mut data = Vec::with_capacity(EIP712_PREFIX.len() + 32 + 32);
    data.extend_from_slice(EIP712_PREFIX);
    data.extend_from_slice(&domain_separator);
    data.extend_from_slice(&struct_hash);
    debug_assert_eq!(data.len(), 66);

    Ok(Eip712PreImage {
        domain_separator,
        struct_hash,
        final_hash: keccak256(&data),
    })
}

#[cfg(test)]
mod hasher_tests {
    use super::*;
    use serde_json::json;

    fn ether_mail_domain() -> Eip712Domain {
        Eip712Domain::new()
            .with_name("Ether Mail")
            .with_version("1")
            .with_chain_id(1)
            .with_verifying_contract("0xCcCCccccCCCCcCCCCCCcCcCccCcCCCcCcccccccC")
    }

    #[test]
    fn test_domain_separator_mail() {
        let separator = domain_separator(&ether_mail_domain()).unwrap();
        assert_eq!(
            hex::encode(separator),
            "f2cee375fa42b42143804025fc449deafd50cc031ca257e0b194a650a912090f"
        );
    }

    #[test]
    fn test_domain_type_three_fields() {
        let domain = Eip712Domain::new()
            .with_name("Compound")
            .with_chain_id(1)
            .with_verifying_contract("0xc00e94Cb662C3520282E6f5717214004A7f26888");

        assert_eq!(
            encode_domain_type(&domain).unwrap(),
            "EIP712Domain(string name,uint256 chainId,address verifyingContract)"
        );
    }

    #[test]
    fn test_domain_type_with_salt() {
        let domain = Eip712Domain::new()
            .with_name("Salted")
            .with_salt(format!("0x{}", "ab".repeat(32)));

        assert_eq!(
            encode_domain_type(&domain).unwrap(),
            "EIP712Domain(string name,bytes32 salt)"
        );
        assert!(domain_separator(&domain).is_ok());
    }

    #[test]
    fn test_string_zero_chain_id_stays_in_domain_type() {
        let domain = Eip712Domain {
            name: Some("X".to_string()),
            chain_id: Some(json!("0")),
            ..Default::default()
        };

        assert_eq!(
            encode_domain_type(&domain).unwrap(),
            "EIP712Domain(string name,uint256 chainId)"
        );
        assert_ne!(
            domain_separator(&domain).unwrap(),
            domain_separator(&Eip712Domain::new().with_name("X")).unwrap()
        );
    }

    #[test]
    fn test_absent_member_changes_separator() {
        let with_version = ether_mail_domain();
        let without_version = Eip712Domain {
            version: None,
            ..ether_mail_domain()
        };

        assert_ne!(
            domain_separator(&with_version).unwrap(),
            domain_separator(&without_version).unwrap()
        );
    }

    #[test]
    fn test_hex_chain_id_matches_numeric() {
        let numeric = ether_mail_domain();
        let hex_id = Eip712Domain {
            chain_id: Some(json!("0x1")),
            ..ether_mail_domain()
        };

        assert_eq!(
            domain_separator(&numeric).unwrap(),
            domain_separator(&hex_id).unwrap()
        );
    }

    #[test]
    fn test_domain_bad_contract_address() {
        let domain = Eip712Domain::new().with_verifying_contract("0x1234");
        assert!(matches!(
            domain_separator(&domain),
            Err(Eip712Error::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_digest_prefix_layout() {
        let mut types = TypeDictionary::new();
        types.insert("Ping".to_string(), vec![TypedDataField::new("n", "uint256")]);
        let message = json!({"n": 7});
        let domain = Eip712Domain::new().with_name("Ping").with_chain_id(5);

        let mut preimage = vec![0x19, 0x01];
        preimage.extend_from_slice(&domain_separator(&domain).unwrap());
        preimage.extend_from_slice(&hash_struct("Ping", &message, &types).unwrap());

        assert_eq!(
            digest_to_sign(&domain, "Ping", &message, &types).unwrap(),
            keccak256(&preimage)
        );
    }
}
