//! EIP-712 Type Definitions
//!
//! Core data structures for EIP-712 typed data hashing and signing.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::fmt;
use zeroize::Zeroize;

/// Name of the implicit domain struct type
pub const EIP712_DOMAIN_TYPE: &str = "EIP712Domain";

/// A field in a struct type definition
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TypedDataField {
    /// The name of the field
    pub name: String,
    /// The type of the field (e.g., "address", "uint256", "Person")
    #[serde(rename = "type")]
    pub type_name: String,
}

impl TypedDataField {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }
}

/// Struct type name -> ordered field list
pub type TypeDictionary = BTreeMap<String, Vec<TypedDataField>>;

/// How a declared field type is encoded, resolved once per field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind<'a> {
    /// `string` or `bytes`, hashed before inclusion
    Dynamic(&'a str),
    /// Another struct in the dictionary, hashed recursively
    Struct(&'a str),
    /// Any `T[]` or `T[n]` type; carries the element type
    Array(&'a str),
    /// A fixed-size ABI type, or an unknown name that is validated at encoding time
    Atomic(&'a str),
}

impl<'a> FieldKind<'a> {
    /// Classify a declared field type against the dictionary
    pub fn classify(type_name: &'a str, types: &TypeDictionary) -> Self {
        if is_dynamic_type(type_name) {
            FieldKind::Dynamic(type_name)
        } else if types.contains_key(type_name) {
            FieldKind::Struct(type_name)
        } else if type_name.ends_with(']') {
            let element = type_name
                .rfind('[')
                .map(|pos| &type_name[..pos])
                .unwrap_or(type_name);
            FieldKind::Array(element)
        } else {
            FieldKind::Atomic(type_name)
        }
    }
}

/// The EIP-712 domain separator data
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Eip712Domain {
    /// The human-readable name of the signing domain
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// The current major version of the signing domain
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// The EIP-155 chain ID (number, decimal string or hex string)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<serde_json::Value>,

    /// The address of the contract that will verify the signature
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verifying_contract: Option<String>,

    /// An optional disambiguating salt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub salt: Option<String>,
}

impl Eip712Domain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = Some(serde_json::Value::from(chain_id));
        self
    }

    pub fn with_verifying_contract(mut self, address: impl Into<String>) -> Self {
        self.verifying_contract = Some(address.into());
        self
    }

    pub fn with_salt(mut self, salt: impl Into<String>) -> Self {
        self.salt = Some(salt.into());
        self
    }

    /// Get the chain ID as a u64
    pub fn chain_id_u64(&self) -> Option<u64> {
        self.chain_id.as_ref().and_then(|v| {
            if let Some(n) = v.as_u64() {
                Some(n)
            } else if let Some(s) = v.as_str() {
                if let Some(hex_digits) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
                    u64::from_str_radix(hex_digits, 16).ok()
                } else {
                    s.parse().ok()
                }
            } else {
                None
            }
        })
    }

    /// The `EIP712Domain` field list for the members that are set.
    ///
    /// Members follow JavaScript truthiness: `None`, empty strings and a
    /// numeric zero chain id are left out of both the type and the encoded
    /// data. String chain ids such as `"0"` are truthy and kept.
    pub fn type_fields(&self) -> Vec<TypedDataField> {
        let mut fields = Vec::new();

        if is_set(&self.name) {
            fields.push(TypedDataField::new("name", "string"));
        }
        if is_set(&self.version) {
            fields.push(TypedDataField::new("version", "string"));
        }
        if self.has_chain_id() {
            fields.push(TypedDataField::new("chainId", "uint256"));
        }
        if is_set(&self.verifying_contract) {
            fields.push(TypedDataField::new("verifyingContract", "address"));
        }
        if is_set(&self.salt) {
            fields.push(TypedDataField::new("salt", "bytes32"));
        }

        fields
    }

    fn has_chain_id(&self) -> bool {
        match &self.chain_id {
            None | Some(serde_json::Value::Null) => false,
            Some(serde_json::Value::Bool(b)) => *b,
            Some(serde_json::Value::String(s)) => !s.is_empty(),
            Some(serde_json::Value::Number(n)) => n.as_f64().map_or(true, |f| f != 0.0),
            Some(_) => true,
        }
    }
}

fn is_set(value: &Option<String>) -> bool {
    value.as_deref().map_or(false, |s| !s.is_empty())
}

/// Complete EIP-712 typed data structure, as consumed by `eth_signTypedData_v4`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypedData {
    /// Type definitions (struct name -> fields)
    pub types: TypeDictionary,

    /// The name of the primary type being signed
    pub primary_type: String,

    /// The EIP-712 domain
    pub domain: Eip712Domain,

    /// The actual message data to sign
    pub message: serde_json::Value,
}

impl TypedData {
    pub fn new(
        domain: Eip712Domain,
        types: TypeDictionary,
        primary_type: impl Into<String>,
        message: serde_json::Value,
    ) -> Self {
        Self {
            types,
            primary_type: primary_type.into(),
            domain,
            message,
        }
    }

    /// Parse typed data from a JSON string
    pub fn from_json(json: &str) -> Result<Self, Eip712Error> {
        serde_json::from_str(json).map_err(|e| Eip712Error::InvalidJson(e.to_string()))
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, Eip712Error> {
        serde_json::to_string(self).map_err(|e| Eip712Error::InvalidJson(e.to_string()))
    }

    /// Validate the typed data structure
    pub fn validate(&self) -> Result<(), Eip712Error> {
        if !self.types.contains_key(&self.primary_type) {
            return Err(Eip712Error::UndefinedType(self.primary_type.clone()));
        }

        for fields in self.types.values() {
            for field in fields {
                self.validate_type(&field.type_name)?;
            }
        }

        Ok(())
    }

    /// Check if a type is valid (either a built-in type or defined in types)
    fn validate_type(&self, type_name: &str) -> Result<(), Eip712Error> {
        let base_type = type_name.find('[').map_or(type_name, |pos| &type_name[..pos]);

        if is_atomic_type(base_type) || is_dynamic_type(base_type) {
            return Ok(());
        }

        if self.types.contains_key(base_type) {
            return Ok(());
        }

        Err(Eip712Error::UndefinedType(base_type.to_string()))
    }
}

/// EIP-712 signature components
#[derive(Debug, Clone, PartialEq, Eq, Zeroize, Serialize, Deserialize)]
#[zeroize(drop)]
pub struct Eip712Signature {
    /// r component (32 bytes)
    #[serde(with = "crate::serde_bytes::hex32")]
    pub r: [u8; 32],
    /// s component (32 bytes)
    #[serde(with = "crate::serde_bytes::hex32")]
    pub s: [u8; 32],
    /// v component (27 or 28)
    #[serde(with = "crate::serde_bytes::hex_u8")]
    pub v: u8,
}

impl Eip712Signature {
    /// Create from raw components
    pub fn new(r: [u8; 32], s: [u8; 32], v: u8) -> Self {
        Self { r, s, v }
    }

    /// Create from 65-byte signature (r || s || v)
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Eip712Error> {
        if bytes.len() != 65 {
            return Err(Eip712Error::InvalidSignature(format!(
                "expected 65 bytes, got {}",
                bytes.len()
            )));
        }

        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[0..32]);
        s.copy_from_slice(&bytes[32..64]);

        Ok(Self { r, s, v: bytes[64] })
    }

    /// Convert to 65-byte representation (r || s || v)
    pub fn to_bytes(&self) -> [u8; 65] {
        let mut bytes = [0u8; 65];
        bytes[0..32].copy_from_slice(&self.r);
        bytes[32..64].copy_from_slice(&self.s);
        bytes[64] = self.v;
        bytes
    }

    /// Convert to hex string
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.to_bytes()))
    }

    pub fn r_hex(&self) -> String {
        format!("0x{}", hex::encode(self.r))
    }

    pub fn s_hex(&self) -> String {
        format!("0x{}", hex::encode(self.s))
    }

    pub fn v_hex(&self) -> String {
        format!("0x{:02x}", self.v)
    }
}

/// Failure raised by a signer capability, with the cause preserved
#[derive(Debug)]
pub struct SigningError {
    context: String,
    source: Box<dyn StdError + Send + Sync>,
}

impl SigningError {
    pub fn new(
        context: impl Into<String>,
        source: impl Into<Box<dyn StdError + Send + Sync>>,
    ) -> Self {
        Self {
            context: context.into(),
            source: source.into(),
        }
    }

    pub fn context(&self) -> &str {
        &self.context
    }
}

impl fmt::Display for SigningError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.context, self.source)
    }
}

impl StdError for SigningError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(self.source.as_ref())
    }
}

/// Errors that can occur during EIP-712 operations
#[derive(Debug, thiserror::Error)]
pub enum Eip712Error {
    #[error("Encoding error: type `{0}` is not defined")]
    UndefinedType(String),

    #[error("Unsupported type: {0}")]
    UnsupportedType(String),

    #[error("Cyclic type reference through `{0}`")]
    CyclicType(String),

    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    #[error("Missing field: {0}")]
    MissingField(String),

    #[error("Invalid value for type {type_name}: {value}")]
    InvalidValue { type_name: String, value: String },

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Signing error: {0}")]
    Signing(#[from] SigningError),
}

impl Eip712Error {
    pub(crate) fn invalid_value(type_name: &str, value: impl fmt::Display) -> Self {
        Eip712Error::InvalidValue {
            type_name: type_name.to_string(),
            value: value.to_string(),
        }
    }
}

/// Check if a type is an atomic (fixed-size) type
pub fn is_atomic_type(type_name: &str) -> bool {
    if type_name == "address" || type_name == "bool" {
        return true;
    }

    // uintN and intN
    if let Some(bits) = type_name
        .strip_prefix("uint")
        .or_else(|| type_name.strip_prefix("int"))
    {
        return type_width(bits).map_or(false, |n| n <= 256 && n % 8 == 0);
    }

    // bytesN (fixed-size bytes)
    if let Some(size) = type_name.strip_prefix("bytes") {
        return type_width(size).map_or(false, |n| n <= 32);
    }

    false
}

/// Canonical decimal width: ASCII digits only, no sign, no leading zero
fn type_width(digits: &str) -> Option<u32> {
    if digits.is_empty()
        || digits.starts_with('0')
        || !digits.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }
    digits.parse().ok()
}

/// Check if a type is a dynamic type
pub fn is_dynamic_type(type_name: &str) -> bool {
    type_name == "bytes" || type_name == "string"
}

#[cfg(test)]
mod type_tests {
    use super::*;

    #[test]
    fn test_atomic_types() {
        assert!(is_atomic_type("address"));
        assert!(is_atomic_type("bool"));
        assert!(is_atomic_type("uint256"));
        assert!(is_atomic_type("uint8"));
        assert!(is_atomic_type("int256"));
        assert!(is_atomic_type("bytes32"));
        assert!(is_atomic_type("bytes1"));

        assert!(!is_atomic_type("string"));
        assert!(!is_atomic_type("bytes"));
        assert!(!is_atomic_type("uint"));
        assert!(!is_atomic_type("uint257"));
        assert!(!is_atomic_type("uint7"));
        assert!(!is_atomic_type("bytes33"));
        assert!(!is_atomic_type("Person"));
    }

    #[test]
    fn test_atomic_width_must_be_canonical() {
        assert!(!is_atomic_type("uint+8"));
        assert!(!is_atomic_type("int08"));
        assert!(!is_atomic_type("bytes04"));
        assert!(!is_atomic_type("uint0"));
        assert!(!is_atomic_type("bytes+1"));
        assert!(!is_atomic_type("int 8"));
    }

    #[test]
    fn test_field_kind_classification() {
        let mut types = TypeDictionary::new();
        types.insert("Person".to_string(), vec![TypedDataField::new("name", "string")]);

        assert_eq!(FieldKind::classify("string", &types), FieldKind::Dynamic("string"));
        assert_eq!(FieldKind::classify("bytes", &types), FieldKind::Dynamic("bytes"));
        assert_eq!(FieldKind::classify("Person", &types), FieldKind::Struct("Person"));
        assert_eq!(FieldKind::classify("uint256[]", &types), FieldKind::Array("uint256"));
        assert_eq!(FieldKind::classify("Person[2]", &types), FieldKind::Array("Person"));
        assert_eq!(FieldKind::classify("address", &types), FieldKind::Atomic("address"));
        assert_eq!(FieldKind::classify("Missing", &types), FieldKind::Atomic("Missing"));
    }

    #[test]
    fn test_domain_type_fields_follow_presence() {
        let domain = Eip712Domain::new()
            .with_name("Compound")
            .with_chain_id(1)
            .with_verifying_contract("0xc00e94Cb662C3520282E6f5717214004A7f26888");

        let names: Vec<_> = domain.type_fields().into_iter().map(|f| f.name).collect();
        assert_eq!(names, vec!["name", "chainId", "verifyingContract"]);
    }

    #[test]
    fn test_domain_falsy_members_are_absent() {
        let domain = Eip712Domain {
            name: Some(String::new()),
            version: Some("1".to_string()),
            chain_id: Some(serde_json::json!(0)),
            verifying_contract: None,
            salt: None,
        };

        let names: Vec<_> = domain.type_fields().into_iter().map(|f| f.name).collect();
        assert_eq!(names, vec!["version"]);
    }

    #[test]
    fn test_string_zero_chain_id_is_truthy() {
        for chain_id in ["0", "0x0"] {
            let domain = Eip712Domain {
                name: Some("X".to_string()),
                chain_id: Some(serde_json::json!(chain_id)),
                ..Default::default()
            };
            let names: Vec<_> = domain.type_fields().into_iter().map(|f| f.name).collect();
            assert_eq!(names, vec!["name", "chainId"]);
        }
    }

    #[test]
    fn test_chain_id_parsing() {
        let domain = Eip712Domain {
            chain_id: Some(serde_json::json!("0x89")),
            ..Default::default()
        };
        assert_eq!(domain.chain_id_u64(), Some(137));

        let domain = Eip712Domain {
            chain_id: Some(serde_json::json!("137")),
            ..Default::default()
        };
        assert_eq!(domain.chain_id_u64(), Some(137));
    }

    #[test]
    fn test_signature_conversion() {
        let sig = Eip712Signature::new([1u8; 32], [2u8; 32], 27);
        let bytes = sig.to_bytes();
        let recovered = Eip712Signature::from_bytes(&bytes).unwrap();

        assert_eq!(sig, recovered);
        assert_eq!(sig.v_hex(), "0x1b");
        assert_eq!(sig.to_hex().len(), 132);
    }

    #[test]
    fn test_signature_json_shape() {
        let sig = Eip712Signature::new([0xab; 32], [0xcd; 32], 28);
        let json = serde_json::to_value(&sig).unwrap();

        assert_eq!(json["r"], format!("0x{}", "ab".repeat(32)));
        assert_eq!(json["s"], format!("0x{}", "cd".repeat(32)));
        assert_eq!(json["v"], "0x1c");
    }

    #[test]
    fn test_signing_error_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "device unplugged");
        let err = Eip712Error::from(SigningError::new("key access failed", io));

        assert!(err.to_string().contains("key access failed"));
        let Eip712Error::Signing(inner) = &err else {
            panic!("expected signing error");
        };
        assert_eq!(inner.source().unwrap().to_string(), "device unplugged");
    }
}
