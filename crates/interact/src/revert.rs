//! Human readable revert reasons from EVM revert payloads.

use ethereum_types::U256;

use crate::codec::{AbiValue, decode};
use crate::sol_type::SolType;

/// `Error(string)`
const ERROR_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];
/// `Panic(uint256)`
const PANIC_SELECTOR: [u8; 4] = [0x4e, 0x48, 0x7b, 0x71];

/// Decodes the revert payload returned by a failed call.
///
/// Returns `None` for an empty payload. Payloads that are neither
/// `Error(string)` nor `Panic(uint256)` are returned as hex.
pub fn decode_revert_reason(data: &[u8]) -> Option<String> {
    if data.is_empty() {
        return None;
    }
    let (selector, payload) = data.split_at(data.len().min(4));
    if selector == ERROR_SELECTOR {
        if let Ok(values) = decode(&[SolType::String], payload) {
            if let Some(AbiValue::String(reason)) = values.into_iter().next() {
                return Some(reason);
            }
        }
    } else if selector == PANIC_SELECTOR {
        if let Ok(values) = decode(&[SolType::Uint(256)], payload) {
            if let Some(AbiValue::Uint(code)) = values.into_iter().next() {
                return Some(format!("panic: {} ({code:#x})", panic_description(code)));
            }
        }
    }
    Some(format!("0x{}", hex::encode(data)))
}

fn panic_description(code: U256) -> &'static str {
    if code > U256::from(u8::MAX) {
        return "unknown panic";
    }
    match code.low_u64() {
        0x00 => "generic compiler panic",
        0x01 => "assertion failed",
        0x11 => "arithmetic overflow or underflow",
        0x12 => "division or modulo by zero",
        0x21 => "invalid enum value",
        0x22 => "invalid storage byte array encoding",
        0x31 => "pop on empty array",
        0x32 => "array index out of bounds",
        0x41 => "out of memory",
        0x51 => "call to uninitialized function",
        _ => "unknown panic",
    }
}

/// Final message for a reverted call or transaction.
pub fn revert_message(data: Option<&[u8]>) -> String {
    match data.and_then(decode_revert_reason) {
        Some(reason) => format!("execution reverted: {reason}"),
        None => "execution reverted".to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn decodes_error_string() {
        let data = hex!(
            "08c379a0"
            "0000000000000000000000000000000000000000000000000000000000000020"
            "000000000000000000000000000000000000000000000000000000000000001a"
            "4e6f7420656e6f7567682045746865722070726f76696465642e000000000000"
        );
        assert_eq!(
            decode_revert_reason(&data).as_deref(),
            Some("Not enough Ether provided.")
        );
        assert_eq!(
            revert_message(Some(&data)),
            "execution reverted: Not enough Ether provided."
        );
    }

    #[test]
    fn decodes_panic_codes() {
        let data = hex!(
            "4e487b71"
            "0000000000000000000000000000000000000000000000000000000000000011"
        );
        assert_eq!(
            decode_revert_reason(&data).as_deref(),
            Some("panic: arithmetic overflow or underflow (0x11)")
        );
    }

    #[test]
    fn custom_errors_fall_back_to_hex() {
        assert_eq!(
            decode_revert_reason(&hex!("deadbeef")).as_deref(),
            Some("0xdeadbeef")
        );
        assert_eq!(decode_revert_reason(&[]), None);
        assert_eq!(revert_message(None), "execution reverted");
    }
}
