//! Function descriptors extracted from a contract ABI document.

use serde::Deserialize;
use serde_json::Value;
use sha3::{Digest, Keccak256};

use crate::error::InteractError;
use crate::sol_type::SolType;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AbiParam {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub components: Vec<AbiParam>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateMutability {
    Pure,
    View,
    NonPayable,
    Payable,
}

impl StateMutability {
    pub fn is_read_only(self) -> bool {
        matches!(self, Self::Pure | Self::View)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbiFunction {
    pub name: String,
    pub inputs: Vec<AbiParam>,
    pub outputs: Vec<AbiParam>,
    pub state_mutability: StateMutability,
}

/// Raw descriptor as found in the JSON document, including legacy flags.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDescriptor {
    #[serde(rename = "type")]
    kind: Option<String>,
    name: Option<String>,
    #[serde(default)]
    inputs: Vec<AbiParam>,
    #[serde(default)]
    outputs: Vec<AbiParam>,
    state_mutability: Option<String>,
    constant: Option<bool>,
    payable: Option<bool>,
}

impl RawDescriptor {
    fn state_mutability(&self) -> Result<StateMutability, InteractError> {
        match self.state_mutability.as_deref() {
            Some("pure") => Ok(StateMutability::Pure),
            Some("view") => Ok(StateMutability::View),
            Some("nonpayable") => Ok(StateMutability::NonPayable),
            Some("payable") => Ok(StateMutability::Payable),
            Some(other) => Err(InteractError::Validation(format!(
                "unknown stateMutability '{other}'"
            ))),
            // Pre-0.5 ABIs only carry `constant`/`payable`.
            None if self.constant == Some(true) => Ok(StateMutability::View),
            None if self.payable == Some(true) => Ok(StateMutability::Payable),
            None => Ok(StateMutability::NonPayable),
        }
    }
}

impl AbiFunction {
    pub fn input_types(&self) -> Result<Vec<SolType>, InteractError> {
        self.inputs.iter().map(SolType::from_param).collect()
    }

    pub fn output_types(&self) -> Result<Vec<SolType>, InteractError> {
        self.outputs.iter().map(SolType::from_param).collect()
    }

    /// Canonical signature, e.g. `transfer(address,uint256)`.
    pub fn signature(&self) -> Result<String, InteractError> {
        let types = self
            .input_types()?
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        Ok(format!("{}({types})", self.name))
    }

    pub fn selector(&self) -> Result<[u8; 4], InteractError> {
        Ok(selector(&self.signature()?))
    }

    pub fn is_read_only(&self) -> bool {
        self.state_mutability.is_read_only()
    }
}

/// First four bytes of the Keccak-256 hash of `signature`.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = Keccak256::digest(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Collects the function descriptors of `abi`: entries typed `function` or
/// carrying no type at all.
pub fn functions(abi: &Value) -> Result<Vec<AbiFunction>, InteractError> {
    let entries = abi
        .as_array()
        .ok_or_else(|| InteractError::validation("ABI must be a JSON array of descriptors"))?;

    let mut functions = Vec::new();
    for (index, entry) in entries.iter().enumerate() {
        let raw = RawDescriptor::deserialize(entry).map_err(|error| {
            InteractError::Validation(format!("ABI entry {index} is malformed: {error}"))
        })?;
        if raw.kind.as_deref().is_some_and(|kind| kind != "function") {
            continue;
        }
        let Some(name) = raw.name.clone().filter(|name| !name.is_empty()) else {
            continue;
        };
        functions.push(AbiFunction {
            name,
            state_mutability: raw.state_mutability()?,
            inputs: raw.inputs,
            outputs: raw.outputs,
        });
    }
    Ok(functions)
}

/// Picks the function called `function`, which is either a bare name or a
/// full signature such as `transfer(address,uint256)`.
///
/// A bare name matching several overloads is rejected; the caller has to
/// disambiguate with the signature.
pub fn resolve_function(abi: &Value, function: &str) -> Result<AbiFunction, InteractError> {
    let requested: String = function.chars().filter(|c| !c.is_whitespace()).collect();
    let candidates = functions(abi)?;

    if requested.contains('(') {
        for candidate in candidates {
            // Descriptors with unsupported types cannot match a signature.
            if candidate.signature().ok().as_deref() == Some(requested.as_str()) {
                return Ok(candidate);
            }
        }
        return Err(no_such_function(function));
    }

    let mut matches: Vec<AbiFunction> = candidates
        .into_iter()
        .filter(|candidate| candidate.name == requested)
        .collect();
    match matches.len() {
        0 => Err(no_such_function(function)),
        1 => Ok(matches.remove(0)),
        _ => {
            let signatures: Vec<String> = matches
                .iter()
                .map(|candidate| {
                    candidate
                        .signature()
                        .unwrap_or_else(|_| candidate.name.clone())
                })
                .collect();
            Err(InteractError::Validation(format!(
                "function '{function}' is overloaded, use one of: {}",
                signatures.join(", ")
            )))
        }
    }
}

fn no_such_function(function: &str) -> InteractError {
    InteractError::NotFound(format!("no such function '{function}' in ABI"))
}
