//! Solidity type model used by the ABI codec.

use std::fmt;

use crate::abi::AbiParam;
use crate::error::InteractError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SolType {
    /// `uintN`, width in bits.
    Uint(usize),
    /// `intN`, width in bits.
    Int(usize),
    Address,
    Bool,
    /// `bytesN`, width in bytes.
    FixedBytes(usize),
    Bytes,
    String,
    Array(Box<SolType>),
    FixedArray(Box<SolType>, usize),
    Tuple(Vec<SolType>),
}

impl SolType {
    /// Parses an ABI parameter, using its `components` for tuple types.
    pub fn from_param(param: &AbiParam) -> Result<Self, InteractError> {
        Self::parse(&param.kind, &param.components)
    }

    pub fn parse(kind: &str, components: &[AbiParam]) -> Result<Self, InteractError> {
        let kind = kind.trim();
        if let Some(stripped) = kind.strip_suffix(']') {
            let open = stripped
                .rfind('[')
                .ok_or_else(|| unsupported(kind))?;
            let inner = Self::parse(&stripped[..open], components)?;
            let length = &stripped[open + 1..];
            if length.is_empty() {
                return Ok(Self::Array(Box::new(inner)));
            }
            let fixed = match length.parse::<usize>() {
                Ok(length) if length > 0 => Self::FixedArray(Box::new(inner), length),
                _ => return Err(unsupported(kind)),
            };
            if fixed.head_size().is_none() {
                return Err(InteractError::Validation(format!("type '{kind}' is too large")));
            }
            return Ok(fixed);
        }

        match kind {
            "address" => Ok(Self::Address),
            "bool" => Ok(Self::Bool),
            "string" => Ok(Self::String),
            "bytes" => Ok(Self::Bytes),
            "uint" => Ok(Self::Uint(256)),
            "int" => Ok(Self::Int(256)),
            "tuple" => {
                if components.is_empty() {
                    return Err(InteractError::validation(
                        "tuple type without components",
                    ));
                }
                let tuple = components
                    .iter()
                    .map(Self::from_param)
                    .collect::<Result<Vec<_>, _>>()
                    .map(Self::Tuple)?;
                if tuple.head_size().is_none() {
                    return Err(InteractError::validation("tuple type is too large"));
                }
                Ok(tuple)
            }
            _ => {
                if let Some(bits) = kind.strip_prefix("uint") {
                    parse_int_width(bits).map(Self::Uint).ok_or_else(|| unsupported(kind))
                } else if let Some(bits) = kind.strip_prefix("int") {
                    parse_int_width(bits).map(Self::Int).ok_or_else(|| unsupported(kind))
                } else if let Some(size) = kind.strip_prefix("bytes") {
                    parse_decimal(size)
                        .filter(|size| (1..=32).contains(size))
                        .map(Self::FixedBytes)
                        .ok_or_else(|| unsupported(kind))
                } else {
                    Err(unsupported(kind))
                }
            }
        }
    }

    /// Dynamic types are encoded out of line behind an offset.
    pub fn is_dynamic(&self) -> bool {
        match self {
            Self::Bytes | Self::String | Self::Array(_) => true,
            Self::FixedArray(inner, _) => inner.is_dynamic(),
            Self::Tuple(members) => members.iter().any(Self::is_dynamic),
            _ => false,
        }
    }

    /// Size in bytes this type occupies in the head of an encoding, `None`
    /// when it does not fit in a `usize`.
    pub fn head_size(&self) -> Option<usize> {
        if self.is_dynamic() {
            return Some(32);
        }
        match self {
            Self::FixedArray(inner, length) => inner.head_size()?.checked_mul(*length),
            Self::Tuple(members) => members
                .iter()
                .try_fold(0usize, |total, member| total.checked_add(member.head_size()?)),
            _ => Some(32),
        }
    }
}

impl fmt::Display for SolType {
    /// Canonical form used in function signatures.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uint(bits) => write!(f, "uint{bits}"),
            Self::Int(bits) => write!(f, "int{bits}"),
            Self::Address => f.write_str("address"),
            Self::Bool => f.write_str("bool"),
            Self::FixedBytes(size) => write!(f, "bytes{size}"),
            Self::Bytes => f.write_str("bytes"),
            Self::String => f.write_str("string"),
            Self::Array(inner) => write!(f, "{inner}[]"),
            Self::FixedArray(inner, length) => write!(f, "{inner}[{length}]"),
            Self::Tuple(members) => {
                f.write_str("(")?;
                for (index, member) in members.iter().enumerate() {
                    if index > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{member}")?;
                }
                f.write_str(")")
            }
        }
    }
}

/// Plain decimal without sign or leading zeros.
fn parse_decimal(digits: &str) -> Option<usize> {
    if digits.starts_with('0') || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

fn parse_int_width(bits: &str) -> Option<usize> {
    parse_decimal(bits).filter(|bits| bits % 8 == 0 && (8..=256).contains(bits))
}

fn unsupported(kind: &str) -> InteractError {
    InteractError::Validation(format!("unsupported type '{kind}'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn param(kind: &str, components: Vec<AbiParam>) -> AbiParam {
        AbiParam {
            name: String::new(),
            kind: kind.to_owned(),
            components,
        }
    }

    #[test]
    fn parses_elementary_types() {
        assert_eq!(SolType::parse("uint", &[]).unwrap(), SolType::Uint(256));
        assert_eq!(SolType::parse("int8", &[]).unwrap(), SolType::Int(8));
        assert_eq!(SolType::parse("bytes32", &[]).unwrap(), SolType::FixedBytes(32));
        assert_eq!(SolType::parse("bytes", &[]).unwrap(), SolType::Bytes);
        assert_eq!(SolType::parse("address", &[]).unwrap(), SolType::Address);
    }

    #[test]
    fn rejects_malformed_types() {
        for kind in [
            "uint7", "uint264", "uint0", "int+8", "uint08", "bytes0", "bytes33", "bytes+1",
            "function", "mapping", "uint256[", "uint256[0]", "uint256[x]", "tuple",
        ] {
            assert!(
                matches!(SolType::parse(kind, &[]), Err(InteractError::Validation(_))),
                "{kind} should be rejected"
            );
        }
    }

    #[test]
    fn parses_nested_arrays_and_tuples() {
        let ty = SolType::from_param(&param(
            "tuple[2][]",
            vec![param("address", vec![]), param("uint256[]", vec![])],
        ))
        .unwrap();
        assert_eq!(ty.to_string(), "(address,uint256[])[2][]");
        assert!(ty.is_dynamic());

        let fixed = SolType::parse("uint8[3]", &[]).unwrap();
        assert!(!fixed.is_dynamic());
        assert_eq!(fixed.head_size(), Some(96));
    }

    #[test]
    fn static_tuple_head_size_covers_all_members() {
        let ty = SolType::from_param(&param(
            "tuple",
            vec![param("address", vec![]), param("bytes4[2]", vec![])],
        ))
        .unwrap();
        assert!(!ty.is_dynamic());
        assert_eq!(ty.head_size(), Some(96));
    }

    #[test]
    fn fixed_array_head_size_must_fit() {
        let err = SolType::parse(&format!("uint256[{}]", usize::MAX / 16), &[]).unwrap_err();
        assert!(matches!(err, InteractError::Validation(message) if message.contains("too large")));

        let nested = format!("uint8[{}][4]", usize::MAX / 64);
        assert!(matches!(SolType::parse(&nested, &[]), Err(InteractError::Validation(_))));
    }
}
