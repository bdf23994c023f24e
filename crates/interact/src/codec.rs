//! Contract ABI encoding and decoding (head/tail layout).

use ethereum_types::{Address, U256};

use crate::abi::AbiFunction;
use crate::error::InteractError;
use crate::sol_type::SolType;

const WORD: usize = 32;

/// A decoded or user supplied ABI value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbiValue {
    Uint(U256),
    /// Two's complement over 256 bits.
    Int(U256),
    Address(Address),
    Bool(bool),
    FixedBytes(Vec<u8>),
    Bytes(Vec<u8>),
    String(String),
    Array(Vec<AbiValue>),
    Tuple(Vec<AbiValue>),
}

/// Selector followed by the encoded arguments.
pub fn encode_calldata(function: &AbiFunction, values: &[AbiValue]) -> Result<Vec<u8>, InteractError> {
    let types = function.input_types()?;
    let mut calldata = function.selector()?.to_vec();
    calldata.extend(encode(&types, values)?);
    Ok(calldata)
}

/// Encodes `values` as the tuple `types`.
pub fn encode(types: &[SolType], values: &[AbiValue]) -> Result<Vec<u8>, InteractError> {
    if types.len() != values.len() {
        return Err(InteractError::Validation(format!(
            "expected {} values, got {}",
            types.len(),
            values.len()
        )));
    }
    let head_size = tuple_head_size(types)
        .ok_or_else(|| InteractError::validation("encoded arguments are too large"))?;
    let mut head = Vec::new();
    let mut tail = Vec::new();
    for (ty, value) in types.iter().zip(values) {
        if ty.is_dynamic() {
            head.extend_from_slice(&word_from_usize(head_size + tail.len()));
            tail.extend(encode_single(ty, value)?);
        } else {
            head.extend(encode_single(ty, value)?);
        }
    }
    head.extend(tail);
    Ok(head)
}

fn encode_single(ty: &SolType, value: &AbiValue) -> Result<Vec<u8>, InteractError> {
    match (ty, value) {
        (SolType::Uint(_), AbiValue::Uint(n)) | (SolType::Int(_), AbiValue::Int(n)) => {
            Ok(n.to_big_endian().to_vec())
        }
        (SolType::Address, AbiValue::Address(address)) => {
            let mut word = [0u8; WORD];
            word[12..].copy_from_slice(address.as_bytes());
            Ok(word.to_vec())
        }
        (SolType::Bool, AbiValue::Bool(flag)) => Ok(word_from_usize(usize::from(*flag)).to_vec()),
        (SolType::FixedBytes(size), AbiValue::FixedBytes(bytes)) if bytes.len() == *size => {
            let mut word = [0u8; WORD];
            word[..bytes.len()].copy_from_slice(bytes);
            Ok(word.to_vec())
        }
        (SolType::Bytes, AbiValue::Bytes(bytes)) => Ok(encode_packed_bytes(bytes)),
        (SolType::String, AbiValue::String(text)) => Ok(encode_packed_bytes(text.as_bytes())),
        (SolType::Array(inner), AbiValue::Array(items)) => {
            let types = vec![inner.as_ref().clone(); items.len()];
            let mut encoded = word_from_usize(items.len()).to_vec();
            encoded.extend(encode(&types, items)?);
            Ok(encoded)
        }
        (SolType::FixedArray(inner, length), AbiValue::Array(items)) if items.len() == *length => {
            encode(&vec![inner.as_ref().clone(); *length], items)
        }
        (SolType::Tuple(members), AbiValue::Tuple(items)) => encode(members, items),
        _ => Err(InteractError::Validation(format!(
            "value {value:?} does not match type {ty}"
        ))),
    }
}

fn encode_packed_bytes(bytes: &[u8]) -> Vec<u8> {
    let padded = bytes.len().div_ceil(WORD) * WORD;
    let mut encoded = Vec::with_capacity(WORD + padded);
    encoded.extend_from_slice(&word_from_usize(bytes.len()));
    encoded.extend_from_slice(bytes);
    encoded.resize(WORD + padded, 0);
    encoded
}

fn word_from_usize(n: usize) -> [u8; WORD] {
    U256::from(n).to_big_endian()
}

/// Decodes `data` as the tuple `types`.
pub fn decode(types: &[SolType], data: &[u8]) -> Result<Vec<AbiValue>, InteractError> {
    decode_tuple(types, data, 0)
}

fn decode_tuple(types: &[SolType], data: &[u8], base: usize) -> Result<Vec<AbiValue>, InteractError> {
    let mut values = Vec::with_capacity(types.len());
    let mut offset = base;
    for ty in types {
        let value = if ty.is_dynamic() {
            let pointer = read_usize(data, offset)?;
            let start = base
                .checked_add(pointer)
                .ok_or_else(|| malformed("offset overflow"))?;
            decode_single(ty, data, start)?
        } else {
            decode_single(ty, data, offset)?
        };
        values.push(value);
        offset = ty
            .head_size()
            .and_then(|size| offset.checked_add(size))
            .ok_or_else(|| malformed("offset overflow"))?;
    }
    Ok(values)
}

fn decode_single(ty: &SolType, data: &[u8], at: usize) -> Result<AbiValue, InteractError> {
    match ty {
        SolType::Uint(_) => Ok(AbiValue::Uint(U256::from_big_endian(read_word(data, at)?))),
        SolType::Int(_) => Ok(AbiValue::Int(U256::from_big_endian(read_word(data, at)?))),
        SolType::Address => Ok(AbiValue::Address(Address::from_slice(
            &read_word(data, at)?[12..],
        ))),
        SolType::Bool => Ok(AbiValue::Bool(read_word(data, at)?.iter().any(|b| *b != 0))),
        SolType::FixedBytes(size) => Ok(AbiValue::FixedBytes(read_word(data, at)?[..*size].to_vec())),
        SolType::Bytes => Ok(AbiValue::Bytes(read_packed_bytes(data, at)?.to_vec())),
        SolType::String => {
            let bytes = read_packed_bytes(data, at)?;
            Ok(AbiValue::String(String::from_utf8_lossy(bytes).into_owned()))
        }
        SolType::Array(inner) => {
            let length = read_usize(data, at)?;
            // Every element needs at least one word, which bounds the allocation.
            if length > data.len() / WORD {
                return Err(malformed("array length exceeds data"));
            }
            let types = vec![inner.as_ref().clone(); length];
            decode_tuple(&types, data, at + WORD).map(AbiValue::Array)
        }
        SolType::FixedArray(inner, length) => {
            // Each element takes at least its head slot, so a length the data
            // cannot hold is rejected before allocating.
            let needed = inner
                .head_size()
                .and_then(|size| size.checked_mul(*length));
            if needed.is_none_or(|needed| needed > data.len().saturating_sub(at)) {
                return Err(malformed("fixed array length exceeds data"));
            }
            let types = vec![inner.as_ref().clone(); *length];
            decode_tuple(&types, data, at).map(AbiValue::Array)
        }
        SolType::Tuple(members) => decode_tuple(members, data, at).map(AbiValue::Tuple),
    }
}

fn tuple_head_size(types: &[SolType]) -> Option<usize> {
    types
        .iter()
        .try_fold(0usize, |total, ty| total.checked_add(ty.head_size()?))
}

fn read_word(data: &[u8], at: usize) -> Result<&[u8], InteractError> {
    at.checked_add(WORD)
        .and_then(|end| data.get(at..end))
        .ok_or_else(|| malformed("data too short"))
}

fn read_usize(data: &[u8], at: usize) -> Result<usize, InteractError> {
    let value = U256::from_big_endian(read_word(data, at)?);
    if value > U256::from(usize::MAX) {
        return Err(malformed("length or offset out of range"));
    }
    Ok(value.as_usize())
}

fn read_packed_bytes(data: &[u8], at: usize) -> Result<&[u8], InteractError> {
    let length = read_usize(data, at)?;
    let start = at + WORD;
    start
        .checked_add(length)
        .and_then(|end| data.get(start..end))
        .ok_or_else(|| malformed("bytes length exceeds data"))
}

fn malformed(reason: &str) -> InteractError {
    InteractError::Transaction(format!("malformed return data: {reason}"))
}
