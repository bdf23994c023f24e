//! Local key signing of EIP-155 legacy transactions.

use std::fmt;

use ethereum_types::{Address, H256, U256};
use secp256k1::{Message, SECP256K1, SecretKey};
use sha3::{Digest, Keccak256};

use crate::error::InteractError;
use crate::rlp::Encoder;

pub fn keccak(data: &[u8]) -> H256 {
    H256::from_slice(&Keccak256::digest(data))
}

pub struct Signer {
    secret_key: SecretKey,
    address: Address,
}

impl fmt::Debug for Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signer")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

impl Signer {
    /// Parses a 32-byte hex private key, with or without `0x`.
    pub fn from_hex(private_key: &str) -> Result<Self, InteractError> {
        let private_key = private_key.trim();
        let digits = private_key.strip_prefix("0x").unwrap_or(private_key);
        let bytes = hex::decode(digits)
            .map_err(|_| InteractError::validation("private key is not valid hex"))?;
        let bytes = <[u8; 32]>::try_from(bytes.as_slice())
            .map_err(|_| InteractError::validation("private key must be 32 bytes"))?;
        let secret_key = SecretKey::from_byte_array(&bytes)
            .map_err(|_| InteractError::validation("private key is not a valid secp256k1 key"))?;
        Ok(Self::new(secret_key))
    }

    pub fn new(secret_key: SecretKey) -> Self {
        let public_key = secret_key.public_key(SECP256K1);
        let hash = keccak(&public_key.serialize_uncompressed()[1..]);
        Self {
            secret_key,
            address: Address::from_slice(&hash[12..]),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Returns the recovery id and the compact `r || s` signature.
    fn sign_hash(&self, hash: H256) -> (u8, [u8; 64]) {
        let (recovery_id, signature) = SECP256K1
            .sign_ecdsa_recoverable(&Message::from_digest(hash.0), &self.secret_key)
            .serialize_compact();
        let recovery_id = u8::from(i32::from(recovery_id) != 0);
        (recovery_id, signature)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyTransaction {
    pub nonce: u64,
    pub gas_price: U256,
    pub gas: u64,
    pub to: Address,
    pub value: U256,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub raw: Vec<u8>,
    pub hash: H256,
}

impl LegacyTransaction {
    /// Keccak of `rlp([nonce, gasPrice, gas, to, value, data, chainId, 0, 0])`.
    pub fn signing_hash(&self, chain_id: u64) -> H256 {
        let mut buf = Vec::new();
        Encoder::new(&mut buf)
            .encode_field(&self.nonce)
            .encode_field(&self.gas_price)
            .encode_field(&self.gas)
            .encode_field(&self.to)
            .encode_field(&self.value)
            .encode_field(&self.data)
            .encode_field(&chain_id)
            .encode_field(&0u64)
            .encode_field(&0u64)
            .finish();
        keccak(&buf)
    }

    pub fn sign(&self, signer: &Signer, chain_id: u64) -> SignedTransaction {
        let (recovery_id, signature) = signer.sign_hash(self.signing_hash(chain_id));
        let v = U256::from(chain_id) * U256::from(2) + U256::from(35 + recovery_id);
        let r = U256::from_big_endian(&signature[..32]);
        let s = U256::from_big_endian(&signature[32..]);

        let mut raw = Vec::new();
        Encoder::new(&mut raw)
            .encode_field(&self.nonce)
            .encode_field(&self.gas_price)
            .encode_field(&self.gas)
            .encode_field(&self.to)
            .encode_field(&self.value)
            .encode_field(&self.data)
            .encode_field(&v)
            .encode_field(&r)
            .encode_field(&s)
            .finish();
        let hash = keccak(&raw);
        SignedTransaction { raw, hash }
    }
}
