//! Conversion between JSON request/response values and [`AbiValue`]s.

use ethereum_types::{Address, U256};
use serde_json::Value;
use sha3::{Digest, Keccak256};

use crate::codec::AbiValue;
use crate::error::InteractError;
use crate::sol_type::SolType;

/// Parses one user supplied argument for a parameter of type `ty`.
///
/// Scalars are usually strings; arrays and tuples are JSON arrays, either
/// inline or as a string holding the JSON text.
pub fn parse_arg(ty: &SolType, raw: &Value, param: &str) -> Result<AbiValue, InteractError> {
    let invalid = |reason: String| {
        InteractError::Validation(format!("invalid value for parameter '{param}' ({ty}): {reason}"))
    };

    match ty {
        SolType::Uint(bits) => {
            let n = match raw {
                Value::Number(number) => number
                    .as_u64()
                    .map(U256::from)
                    .ok_or_else(|| invalid("expected a non-negative integer".to_owned()))?,
                Value::String(text) => parse_uint_text(text).map_err(invalid)?,
                _ => return Err(invalid("expected an integer".to_owned())),
            };
            if n.bits() > *bits {
                return Err(invalid(format!("does not fit in {bits} bits")));
            }
            Ok(AbiValue::Uint(n))
        }
        SolType::Int(bits) => {
            let (negative, magnitude) = match raw {
                Value::Number(number) => {
                    let n = number
                        .as_i64()
                        .ok_or_else(|| invalid("expected an integer".to_owned()))?;
                    (n < 0, U256::from(n.unsigned_abs()))
                }
                Value::String(text) => {
                    let text = text.trim();
                    match text.strip_prefix('-') {
                        Some(rest) => (true, parse_uint_text(rest).map_err(invalid)?),
                        None => (false, parse_uint_text(text).map_err(invalid)?),
                    }
                }
                _ => return Err(invalid("expected an integer".to_owned())),
            };
            let limit = U256::one() << (bits - 1);
            if (negative && magnitude > limit) || (!negative && magnitude >= limit) {
                return Err(invalid(format!("does not fit in int{bits}")));
            }
            Ok(AbiValue::Int(twos_complement(negative, magnitude)))
        }
        SolType::Address => {
            let text = expect_str(raw).ok_or_else(|| invalid("expected a hex address".to_owned()))?;
            let bytes = parse_hex(text).map_err(invalid)?;
            if bytes.len() != 20 {
                return Err(invalid("expected 20 bytes".to_owned()));
            }
            Ok(AbiValue::Address(Address::from_slice(&bytes)))
        }
        SolType::Bool => match raw {
            Value::Bool(flag) => Ok(AbiValue::Bool(*flag)),
            Value::String(text) => match text.as_str() {
                "true" => Ok(AbiValue::Bool(true)),
                "false" => Ok(AbiValue::Bool(false)),
                _ => Err(invalid("expected true or false".to_owned())),
            },
            _ => Err(invalid("expected true or false".to_owned())),
        },
        SolType::FixedBytes(size) => {
            let text = expect_str(raw).ok_or_else(|| invalid("expected hex bytes".to_owned()))?;
            let bytes = parse_hex(text).map_err(invalid)?;
            if bytes.len() != *size {
                return Err(invalid(format!("expected exactly {size} bytes, got {}", bytes.len())));
            }
            Ok(AbiValue::FixedBytes(bytes))
        }
        SolType::Bytes => {
            let text = expect_str(raw).ok_or_else(|| invalid("expected hex bytes".to_owned()))?;
            parse_hex(text).map(AbiValue::Bytes).map_err(invalid)
        }
        SolType::String => match raw {
            Value::String(text) => Ok(AbiValue::String(text.clone())),
            _ => Err(invalid("expected a string".to_owned())),
        },
        SolType::Array(inner) => {
            let items = json_array(raw).map_err(invalid)?;
            parse_items(inner, &items, param).map(AbiValue::Array)
        }
        SolType::FixedArray(inner, length) => {
            let items = json_array(raw).map_err(invalid)?;
            if items.len() != *length {
                return Err(invalid(format!("expected {length} elements, got {}", items.len())));
            }
            parse_items(inner, &items, param).map(AbiValue::Array)
        }
        SolType::Tuple(members) => {
            let items = json_array(raw).map_err(invalid)?;
            if items.len() != members.len() {
                return Err(invalid(format!(
                    "expected {} components, got {}",
                    members.len(),
                    items.len()
                )));
            }
            members
                .iter()
                .zip(&items)
                .enumerate()
                .map(|(index, (member, item))| parse_arg(member, item, &format!("{param}.{index}")))
                .collect::<Result<Vec<_>, _>>()
                .map(AbiValue::Tuple)
        }
    }
}

fn parse_items(inner: &SolType, items: &[Value], param: &str) -> Result<Vec<AbiValue>, InteractError> {
    items
        .iter()
        .enumerate()
        .map(|(index, item)| parse_arg(inner, item, &format!("{param}[{index}]")))
        .collect()
}

fn expect_str(raw: &Value) -> Option<&str> {
    raw.as_str().map(str::trim)
}

fn json_array(raw: &Value) -> Result<Vec<Value>, String> {
    match raw {
        Value::Array(items) => Ok(items.clone()),
        Value::String(text) => match serde_json::from_str(text.trim()) {
            Ok(Value::Array(items)) => Ok(items),
            _ => Err("expected a JSON array".to_owned()),
        },
        _ => Err("expected a JSON array".to_owned()),
    }
}

/// Parses a decimal or `0x`-prefixed hex unsigned integer.
pub fn parse_uint_text(text: &str) -> Result<U256, String> {
    let text = text.trim();
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        if hex.is_empty() {
            return Err("empty hex number".to_owned());
        }
        return U256::from_str_radix(hex, 16).map_err(|_| format!("invalid hex number '{text}'"));
    }
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("invalid number '{text}'"));
    }
    U256::from_dec_str(text).map_err(|_| format!("number '{text}' is out of range"))
}

/// Decodes hex with an optional `0x` prefix.
pub fn parse_hex(text: &str) -> Result<Vec<u8>, String> {
    let text = text.trim();
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    hex::decode(digits).map_err(|error| format!("invalid hex '{text}': {error}"))
}

fn twos_complement(negative: bool, magnitude: U256) -> U256 {
    if negative {
        (!magnitude).overflowing_add(U256::one()).0
    } else {
        magnitude
    }
}

/// Renders a decoded value for the JSON response. Integers become decimal
/// strings so that 256-bit values survive JavaScript clients.
pub fn render(value: &AbiValue) -> Value {
    match value {
        AbiValue::Uint(n) => Value::String(n.to_string()),
        AbiValue::Int(n) => {
            if n.bit(255) {
                Value::String(format!("-{}", twos_complement(true, *n)))
            } else {
                Value::String(n.to_string())
            }
        }
        AbiValue::Address(address) => Value::String(to_checksum_address(address)),
        AbiValue::Bool(flag) => Value::Bool(*flag),
        AbiValue::FixedBytes(bytes) | AbiValue::Bytes(bytes) => {
            Value::String(format!("0x{}", hex::encode(bytes)))
        }
        AbiValue::String(text) => Value::String(text.clone()),
        AbiValue::Array(items) | AbiValue::Tuple(items) => {
            Value::Array(items.iter().map(render).collect())
        }
    }
}

/// EIP-55 mixed-case checksum encoding.
pub fn to_checksum_address(address: &Address) -> String {
    let lower = hex::encode(address.as_bytes());
    let hash = Keccak256::digest(lower.as_bytes());
    let mut checksummed = String::with_capacity(42);
    checksummed.push_str("0x");
    for (index, c) in lower.chars().enumerate() {
        let nibble = (hash[index / 2] >> (if index % 2 == 0 { 4 } else { 0 })) & 0x0f;
        if c.is_ascii_alphabetic() && nibble >= 8 {
            checksummed.push(c.to_ascii_uppercase());
        } else {
            checksummed.push(c);
        }
    }
    checksummed
}
