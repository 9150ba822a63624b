//! EIP-712 Type Encoding
//!
//! Implements the encoding rules for EIP-712 typed data: dependency
//! resolution, canonical type strings, type hashes and `encodeData`.

use super::types::*;
use crate::utils::crypto::keccak256;
use ethers_core::abi::{self, Token};
use ethers_core::types::{Address, U256};

/// Find all struct types reachable from `primary_type`, in first-seen
/// depth-first order.
///
/// The primary type comes first when it is a struct. Names that are not keys
/// of the dictionary (ABI primitives) are skipped. A type that is reached
/// again while it is still being expanded yields [`Eip712Error::CyclicType`].
pub fn find_type_dependencies(
    primary_type: &str,
    types: &TypeDictionary,
) -> Result<Vec<String>, Eip712Error> {
    let mut found = Vec::new();
    let mut in_progress = Vec::new();
    collect_dependencies(primary_type, types, &mut found, &mut in_progress)?;
    Ok(found)
}

fn collect_dependencies<'a>(
    type_name: &'a str,
    types: &'a TypeDictionary,
    found: &mut Vec<String>,
    in_progress: &mut Vec<&'a str>,
) -> Result<(), Eip712Error> {
    if in_progress.contains(&type_name) {
        return Err(Eip712Error::CyclicType(type_name.to_string()));
    }
    if found.iter().any(|name| name == type_name) {
        return Ok(());
    }
    let Some(fields) = types.get(type_name) else {
        return Ok(());
    };

    found.push(type_name.to_string());
    in_progress.push(type_name);
    for field in fields {
        let base = get_base_type(&field.type_name);
        // Array members are rejected at encoding time, not reported as cycles.
        if base.len() != field.type_name.len() && in_progress.contains(&base) {
            continue;
        }
        collect_dependencies(base, types, found, in_progress)?;
    }
    in_progress.pop();

    Ok(())
}

/// Get the base type from a potentially array type
/// e.g., "Person[]" -> "Person", "uint256[10]" -> "uint256"
pub fn get_base_type(type_name: &str) -> &str {
    type_name.find('[').map_or(type_name, |pos| &type_name[..pos])
}

/// Encode the canonical type string for a struct type.
///
/// Format: `Primary(type1 name1,...)` followed by every other referenced
/// struct type sorted by name. Field order is kept as declared.
pub fn encode_type(primary_type: &str, types: &TypeDictionary) -> Result<String, Eip712Error> {
    let mut dependencies = find_type_dependencies(primary_type, types)?;
    dependencies.retain(|dep| dep != primary_type);
    dependencies.sort();

    let mut result = String::new();
    for type_name in std::iter::once(primary_type).chain(dependencies.iter().map(String::as_str)) {
        let fields = types
            .get(type_name)
            .ok_or_else(|| Eip712Error::UndefinedType(type_name.to_string()))?;
        result.push_str(&format_type_string(type_name, fields));
    }

    Ok(result)
}

/// Format a single type string
fn format_type_string(type_name: &str, fields: &[TypedDataField]) -> String {
    let field_strs: Vec<String> = fields
        .iter()
        .map(|f| format!("{} {}", f.type_name, f.name))
        .collect();

    format!("{}({})", type_name, field_strs.join(","))
}

/// Calculate the type hash for a struct type
/// typeHash = keccak256(encodeType(typeOf(s)))
pub fn type_hash(primary_type: &str, types: &TypeDictionary) -> Result<[u8; 32], Eip712Error> {
    let encoded = encode_type(primary_type, types)?;
    Ok(keccak256(encoded.as_bytes()))
}

/// Encode a struct value as `typeHash || enc(field1) || ... || enc(fieldN)`.
///
/// Every member occupies exactly one 32-byte ABI word: strings, bytes and
/// nested structs are hashed before inclusion.
pub fn encode_data(
    primary_type: &str,
    data: &serde_json::Value,
    types: &TypeDictionary,
) -> Result<Vec<u8>, Eip712Error> {
    let fields = types
        .get(primary_type)
        .ok_or_else(|| Eip712Error::UndefinedType(primary_type.to_string()))?;

    let obj = data
        .as_object()
        .ok_or_else(|| Eip712Error::invalid_value(primary_type, data))?;

    let mut tokens = Vec::with_capacity(fields.len() + 1);
    tokens.push(Token::FixedBytes(type_hash(primary_type, types)?.to_vec()));

    for field in fields {
        let field_value = obj.get(&field.name).ok_or_else(|| {
            Eip712Error::MissingField(format!("{}.{}", primary_type, field.name))
        })?;
        tokens.push(encode_field(&field.type_name, field_value, types)?);
    }

    Ok(abi::encode(&tokens))
}

/// Encode one member into its ABI token
fn encode_field(
    type_name: &str,
    value: &serde_json::Value,
    types: &TypeDictionary,
) -> Result<Token, Eip712Error> {
    match FieldKind::classify(type_name, types) {
        FieldKind::Dynamic("string") => {
            let s = value
                .as_str()
                .ok_or_else(|| Eip712Error::invalid_value(type_name, value))?;
            Ok(Token::FixedBytes(keccak256(s.as_bytes()).to_vec()))
        }
        FieldKind::Dynamic(_) => {
            let bytes = parse_hex(type_name, value)?;
            Ok(Token::FixedBytes(keccak256(&bytes).to_vec()))
        }
        FieldKind::Struct(name) => {
            let encoded = encode_data(name, value, types)?;
            Ok(Token::FixedBytes(keccak256(&encoded).to_vec()))
        }
        FieldKind::Array(_) => Err(Eip712Error::UnsupportedType(format!(
            "array type `{}` is not supported",
            type_name
        ))),
        FieldKind::Atomic(name) => encode_atomic(name, value),
    }
}

/// Encode an atomic (fixed-size) value
fn encode_atomic(type_name: &str, value: &serde_json::Value) -> Result<Token, Eip712Error> {
    // Anything that is neither an ABI primitive nor in the dictionary is a
    // struct reference whose definition is missing.
    if !is_atomic_type(type_name) {
        return Err(Eip712Error::UndefinedType(type_name.to_string()));
    }

    if type_name == "address" {
        let addr = value
            .as_str()
            .ok_or_else(|| Eip712Error::invalid_value(type_name, value))?;
        return Ok(Token::Address(parse_address(addr)?));
    }

    if type_name == "bool" {
        let b = value
            .as_bool()
            .ok_or_else(|| Eip712Error::invalid_value(type_name, value))?;
        return Ok(Token::Bool(b));
    }

    if let Some(bits) = type_name.strip_prefix("uint") {
        let bits = parse_width(type_name, bits)?;
        let n = parse_uint(type_name, value)?;
        if n.bits() > bits {
            return Err(Eip712Error::invalid_value(
                type_name,
                format!("{} does not fit in {} bits", value, bits),
            ));
        }
        return Ok(Token::Uint(n));
    }

    if let Some(bits) = type_name.strip_prefix("int") {
        let bits = parse_width(type_name, bits)?;
        return Ok(Token::Int(parse_int(type_name, value, bits)?));
    }

    if let Some(size) = type_name.strip_prefix("bytes") {
        let size = parse_width(type_name, size)?;
        let bytes = parse_hex(type_name, value)?;
        if bytes.len() != size {
            return Err(Eip712Error::invalid_value(
                type_name,
                format!("expected {} bytes, got {}", size, bytes.len()),
            ));
        }
        return Ok(Token::FixedBytes(bytes));
    }

    Err(Eip712Error::UndefinedType(type_name.to_string()))
}

fn parse_width(type_name: &str, digits: &str) -> Result<usize, Eip712Error> {
    digits
        .parse()
        .map_err(|_| Eip712Error::UndefinedType(type_name.to_string()))
}

/// Parse an Ethereum address
pub(crate) fn parse_address(addr: &str) -> Result<Address, Eip712Error> {
    let digits = strip_hex_prefix(addr);

    if digits.len() != 40 {
        return Err(Eip712Error::InvalidAddress(format!(
            "invalid length: expected 40 hex chars, got {}",
            digits.len()
        )));
    }

    let bytes = hex::decode(digits)
        .map_err(|e| Eip712Error::InvalidAddress(format!("invalid hex: {}", e)))?;

    Ok(Address::from_slice(&bytes))
}

/// Parse a uint value (supports decimal string, hex string, or number)
fn parse_uint(type_name: &str, value: &serde_json::Value) -> Result<U256, Eip712Error> {
    match value {
        serde_json::Value::Number(n) => n
            .as_u64()
            .map(U256::from)
            .ok_or_else(|| Eip712Error::invalid_value(type_name, n)),
        serde_json::Value::String(s) => parse_uint_str(type_name, s),
        _ => Err(Eip712Error::invalid_value(type_name, value)),
    }
}

fn parse_uint_str(type_name: &str, s: &str) -> Result<U256, Eip712Error> {
    if s.starts_with("0x") || s.starts_with("0X") {
        let mut digits = strip_hex_prefix(s).to_string();
        if digits.is_empty() {
            return Err(Eip712Error::invalid_value(type_name, s));
        }
        if digits.len() % 2 == 1 {
            digits.insert(0, '0');
        }
        let bytes = hex::decode(&digits).map_err(|_| Eip712Error::invalid_value(type_name, s))?;
        if bytes.len() > 32 {
            return Err(Eip712Error::invalid_value(type_name, s));
        }
        Ok(U256::from_big_endian(&bytes))
    } else if s.is_empty() {
        Err(Eip712Error::invalid_value(type_name, s))
    } else {
        U256::from_dec_str(s).map_err(|_| Eip712Error::invalid_value(type_name, s))
    }
}

/// Parse a signed int value into its two's complement word
fn parse_int(
    type_name: &str,
    value: &serde_json::Value,
    bits: usize,
) -> Result<U256, Eip712Error> {
    let (negative, magnitude) = match value {
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                (i < 0, U256::from(i.unsigned_abs()))
            } else if let Some(u) = n.as_u64() {
                (false, U256::from(u))
            } else {
                return Err(Eip712Error::invalid_value(type_name, n));
            }
        }
        serde_json::Value::String(s) => match s.strip_prefix('-') {
            Some(rest) => (true, parse_uint_str(type_name, rest)?),
            None => (false, parse_uint_str(type_name, s)?),
        },
        _ => return Err(Eip712Error::invalid_value(type_name, value)),
    };

    let limit = U256::one() << (bits - 1);
    let in_range = if negative { magnitude <= limit } else { magnitude < limit };
    if !in_range {
        return Err(Eip712Error::invalid_value(
            type_name,
            format!("{} does not fit in {} bits", value, bits),
        ));
    }

    if negative && !magnitude.is_zero() {
        Ok((!magnitude).overflowing_add(U256::one()).0)
    } else {
        Ok(magnitude)
    }
}

/// Parse a hex string (with or without 0x prefix)
fn parse_hex(type_name: &str, value: &serde_json::Value) -> Result<Vec<u8>, Eip712Error> {
    let s = value
        .as_str()
        .ok_or_else(|| Eip712Error::invalid_value(type_name, value))?;

    hex::decode(strip_hex_prefix(s))
        .map_err(|e| Eip712Error::invalid_value(type_name, format!("invalid hex: {}", e)))
}

fn strip_hex_prefix(s: &str) -> &str {
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
}

#[cfg(test)]
mod encoder_tests {
    use super::*;
    use serde_json::json;

    fn fields(pairs: &[(&str, &str)]) -> Vec<TypedDataField> {
        pairs
            .iter()
            .map(|(name, ty)| TypedDataField::new(*name, *ty))
            .collect()
    }

    fn mail_types() -> TypeDictionary {
        let mut types = TypeDictionary::new();
        types.insert(
            "Mail".to_string(),
            fields(&[("from", "Person"), ("to", "Person"), ("contents", "string")]),
        );
        types.insert(
            "Person".to_string(),
            fields(&[("name", "string"), ("wallet", "address")]),
        );
        types
    }

    #[test]
    fn test_encode_type_simple() {
        let encoded = encode_type("Person", &mail_types()).unwrap();
        assert_eq!(encoded, "Person(string name,address wallet)");
    }

    #[test]
    fn test_encode_type_with_dependencies() {
        let encoded = encode_type("Mail", &mail_types()).unwrap();
        assert_eq!(
            encoded,
            "Mail(Person from,Person to,string contents)Person(string name,address wallet)"
        );
    }

    #[test]
    fn test_type_hash_mail() {
        let hash = type_hash("Mail", &mail_types()).unwrap();
        assert_eq!(
            hex::encode(hash),
            "a0cedeb2dc280ba39b857546d74f5549c3a1d7bdc2dd96bf881f76108e23dac2"
        );
    }

    #[test]
    fn test_dependencies_first_seen_order() {
        let mut types = TypeDictionary::new();
        types.insert("A".to_string(), fields(&[("b", "B"), ("c", "C"), ("n", "uint256")]));
        types.insert("B".to_string(), fields(&[("d", "D")]));
        types.insert("C".to_string(), fields(&[("d", "D")]));
        types.insert("D".to_string(), fields(&[("x", "bool")]));

        let deps = find_type_dependencies("A", &types).unwrap();
        assert_eq!(deps, vec!["A", "B", "D", "C"]);
    }

    #[test]
    fn test_dependencies_of_primitive_is_empty() {
        let deps = find_type_dependencies("uint256", &mail_types()).unwrap();
        assert!(deps.is_empty());
    }

    #[test]
    fn test_unrelated_types_do_not_leak_into_type_string() {
        let mut types = mail_types();
        types.insert("Aardvark".to_string(), fields(&[("x", "uint8")]));

        let encoded = encode_type("Mail", &types).unwrap();
        assert!(!encoded.contains("Aardvark"));
    }

    #[test]
    fn test_canonical_ordering_primary_first_then_alphabetical() {
        let mut types = TypeDictionary::new();
        types.insert("A".to_string(), fields(&[("b", "B"), ("c", "C")]));
        types.insert("B".to_string(), fields(&[("value", "uint256")]));
        types.insert("C".to_string(), fields(&[("flag", "bool")]));

        assert_eq!(
            encode_type("A", &types).unwrap(),
            "A(B b,C c)B(uint256 value)C(bool flag)"
        );

        // Zeta sorts after Beta even though it is referenced first
        let mut types = TypeDictionary::new();
        types.insert("Order".to_string(), fields(&[("z", "Zeta"), ("b", "Beta")]));
        types.insert("Zeta".to_string(), fields(&[("value", "uint256")]));
        types.insert("Beta".to_string(), fields(&[("flag", "bool")]));

        assert_eq!(
            encode_type("Order", &types).unwrap(),
            "Order(Zeta z,Beta b)Beta(bool flag)Zeta(uint256 value)"
        );
    }

    #[test]
    fn test_self_reference_is_cyclic() {
        let mut types = TypeDictionary::new();
        types.insert("Node".to_string(), fields(&[("next", "Node")]));

        let err = find_type_dependencies("Node", &types).unwrap_err();
        assert!(matches!(err, Eip712Error::CyclicType(ref name) if name == "Node"));
    }

    #[test]
    fn test_self_array_member_is_unsupported() {
        let mut types = TypeDictionary::new();
        types.insert("Node".to_string(), fields(&[("kids", "Node[]")]));

        assert_eq!(
            find_type_dependencies("Node", &types).unwrap(),
            vec!["Node".to_string()]
        );
        let err = encode_data("Node", &json!({"kids": []}), &types).unwrap_err();
        assert!(matches!(err, Eip712Error::UnsupportedType(_)));
    }

    #[test]
    fn test_indirect_cycle_is_cyclic() {
        let mut types = TypeDictionary::new();
        types.insert("A".to_string(), fields(&[("b", "B")]));
        types.insert("B".to_string(), fields(&[("c", "C")]));
        types.insert("C".to_string(), fields(&[("a", "A")]));

        assert!(matches!(
            encode_type("A", &types),
            Err(Eip712Error::CyclicType(_))
        ));
    }

    #[test]
    fn test_encode_type_missing_primary() {
        let err = encode_type("Ghost", &mail_types()).unwrap_err();
        assert!(matches!(err, Eip712Error::UndefinedType(ref name) if name == "Ghost"));
    }

    #[test]
    fn test_encode_data_person_words() {
        let types = mail_types();
        let person = json!({
            "name": "Cow",
            "wallet": "0xCD2a3d9F938E13CD947Ec05AbC7FE734Df8DD826"
        });

        let encoded = encode_data("Person", &person, &types).unwrap();
        assert_eq!(encoded.len(), 3 * 32);
        assert_eq!(&encoded[..32], &type_hash("Person", &types).unwrap());
        assert_eq!(&encoded[32..64], &keccak256(b"Cow"));
        assert_eq!(&encoded[64..76], &[0u8; 12]);
        assert_eq!(
            hex::encode(&encoded[76..96]),
            "cd2a3d9f938e13cd947ec05abc7fe734df8dd826"
        );
    }

    #[test]
    fn test_encode_data_nested_struct_is_hashed() {
        let types = mail_types();
        let mail = json!({
            "from": {"name": "Cow", "wallet": "0xCD2a3d9F938E13CD947Ec05AbC7FE734Df8DD826"},
            "to": {"name": "Bob", "wallet": "0xbBbBBBBbbBBBbbbBbbBbbbbBBbBbbbbBbBbbBBbB"},
            "contents": "Hello, Bob!"
        });

        let encoded = encode_data("Mail", &mail, &types).unwrap();
        assert_eq!(encoded.len(), 4 * 32);

        let from = encode_data("Person", &mail["from"], &types).unwrap();
        assert_eq!(&encoded[32..64], &keccak256(&from));
    }

    #[test]
    fn test_encode_data_missing_nested_type() {
        let mut types = mail_types();
        types.remove("Person");

        let mail = json!({
            "from": {"name": "Cow", "wallet": "0xCD2a3d9F938E13CD947Ec05AbC7FE734Df8DD826"},
            "to": {"name": "Bob", "wallet": "0xbBbBBBBbbBBBbbbBbbBbbbbBBbBbbbbBbBbbBBbB"},
            "contents": "Hello, Bob!"
        });

        let err = encode_data("Mail", &mail, &types).unwrap_err();
        assert!(matches!(err, Eip712Error::UndefinedType(ref name) if name == "Person"));
    }

    #[test]
    fn test_encode_data_rejects_arrays() {
        let mut types = TypeDictionary::new();
        types.insert("Batch".to_string(), fields(&[("amounts", "uint256[]")]));

        let err = encode_data("Batch", &json!({"amounts": [1, 2, 3]}), &types).unwrap_err();
        assert!(matches!(err, Eip712Error::UnsupportedType(_)));
    }

    #[test]
    fn test_encode_data_missing_field() {
        let err = encode_data("Person", &json!({"name": "Cow"}), &mail_types()).unwrap_err();
        assert!(matches!(err, Eip712Error::MissingField(ref f) if f == "Person.wallet"));
    }

    #[test]
    fn test_encode_atomic_uint_forms_agree() {
        let decimal = encode_atomic("uint256", &json!("1000000000000000000")).unwrap();
        let hex = encode_atomic("uint256", &json!("0xde0b6b3a7640000")).unwrap();
        assert_eq!(decimal, hex);

        let number = encode_atomic("uint64", &json!(42)).unwrap();
        assert_eq!(number, Token::Uint(U256::from(42u64)));
    }

    #[test]
    fn test_encode_atomic_uint_overflow() {
        assert!(encode_atomic("uint8", &json!(255)).is_ok());
        assert!(matches!(
            encode_atomic("uint8", &json!(256)),
            Err(Eip712Error::InvalidValue { .. })
        ));
        assert!(encode_atomic("uint256", &json!(-1)).is_err());
    }

    #[test]
    fn test_encode_atomic_uint_rejects_empty() {
        for value in ["", "0x", "0X"] {
            assert!(
                matches!(
                    encode_atomic("uint256", &json!(value)),
                    Err(Eip712Error::InvalidValue { .. })
                ),
                "accepted {:?}",
                value
            );
        }
        for value in ["", "-", "0x"] {
            assert!(matches!(
                encode_atomic("int256", &json!(value)),
                Err(Eip712Error::InvalidValue { .. })
            ));
        }
    }

    #[test]
    fn test_encode_atomic_negative_int() {
        let token = encode_atomic("int256", &json!(-1)).unwrap();
        assert_eq!(token, Token::Int(U256::MAX));

        let token = encode_atomic("int8", &json!("-128")).unwrap();
        assert_eq!(abi::encode(&[token])[31], 0x80);
        assert!(encode_atomic("int8", &json!(128)).is_err());
        assert!(encode_atomic("int8", &json!(-129)).is_err());
    }

    #[test]
    fn test_encode_atomic_fixed_bytes() {
        let salt = format!("0x{}", "11".repeat(32));
        assert_eq!(
            encode_atomic("bytes32", &json!(salt)).unwrap(),
            Token::FixedBytes(vec![0x11; 32])
        );

        let short = encode_atomic("bytes4", &json!("0x01020304")).unwrap();
        let word = abi::encode(&[short]);
        assert_eq!(&word[..4], &[1, 2, 3, 4]);
        assert_eq!(&word[4..], &[0u8; 28]);

        assert!(encode_atomic("bytes32", &json!("0x1234")).is_err());
    }

    #[test]
    fn test_encode_atomic_bool_word() {
        let word = abi::encode(&[encode_atomic("bool", &json!(true)).unwrap()]);
        assert_eq!(word[31], 1);
        assert!(encode_atomic("bool", &json!("yes")).is_err());
    }

    #[test]
    fn test_parse_address() {
        let addr = parse_address("0xCD2a3d9F938E13CD947Ec05AbC7FE734Df8DD826").unwrap();
        assert_eq!(addr.as_bytes()[0], 0xCD);

        assert!(matches!(
            parse_address("0x1234"),
            Err(Eip712Error::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_get_base_type() {
        assert_eq!(get_base_type("Person[]"), "Person");
        assert_eq!(get_base_type("uint256[10]"), "uint256");
        assert_eq!(get_base_type("address"), "address");
    }
}
