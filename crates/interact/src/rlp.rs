//! Minimal RLP encoder, enough for legacy transactions.

use bytes::BufMut;
use ethereum_types::{Address, U256};

const RLP_NULL: u8 = 0x80;
const RLP_EMPTY_LIST: u8 = 0xc0;

pub trait RLPEncode {
    fn encode(&self, buf: &mut dyn BufMut);

    fn encode_to_vec(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.encode(&mut buf);
        buf
    }
}

impl RLPEncode for [u8] {
    fn encode(&self, buf: &mut dyn BufMut) {
        if let [byte] = self {
            if *byte < RLP_NULL {
                buf.put_u8(*byte);
                return;
            }
        }
        encode_length(self.len(), RLP_NULL, buf);
        buf.put_slice(self);
    }
}

impl RLPEncode for Vec<u8> {
    fn encode(&self, buf: &mut dyn BufMut) {
        self.as_slice().encode(buf)
    }
}

impl RLPEncode for u64 {
    fn encode(&self, buf: &mut dyn BufMut) {
        let bytes = self.to_be_bytes();
        trim_leading_zeros(&bytes).encode(buf)
    }
}

impl RLPEncode for U256 {
    fn encode(&self, buf: &mut dyn BufMut) {
        let bytes = self.to_big_endian();
        trim_leading_zeros(&bytes).encode(buf)
    }
}

impl RLPEncode for Address {
    fn encode(&self, buf: &mut dyn BufMut) {
        self.as_bytes().encode(buf)
    }
}

fn trim_leading_zeros(bytes: &[u8]) -> &[u8] {
    let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    &bytes[first..]
}

/// Writes a string or list header for a payload of `len` bytes.
fn encode_length(len: usize, offset: u8, buf: &mut dyn BufMut) {
    if len <= 55 {
        // len <= 55 always fits in the header byte
        buf.put_u8(offset + len as u8);
    } else {
        let len_bytes = len.to_be_bytes();
        let len_bytes = trim_leading_zeros(&len_bytes);
        buf.put_u8(offset + 55 + len_bytes.len() as u8);
        buf.put_slice(len_bytes);
    }
}

/// Builds an RLP list field by field.
pub struct Encoder<'a> {
    buf: &'a mut dyn BufMut,
    payload: Vec<u8>,
}

impl<'a> Encoder<'a> {
    pub fn new(buf: &'a mut dyn BufMut) -> Self {
        Self {
            buf,
            payload: Vec::new(),
        }
    }

    pub fn encode_field<T: RLPEncode + ?Sized>(mut self, value: &T) -> Self {
        value.encode(&mut self.payload);
        self
    }

    pub fn finish(self) {
        encode_length(self.payload.len(), RLP_EMPTY_LIST, self.buf);
        self.buf.put_slice(&self.payload);
    }
}
