//! Bit-level serialization codec.
//!
//! Everything on the wire and on disk is a bit stream, packed into bytes
//! most-significant bit first and zero-padded to a byte boundary. Fixed
//! width integers are written big-endian. A slice is a 16-bit length
//! followed by its raw bits; a list writes a `1` continue bit before each
//! element and a single `0` to terminate.

use bitvec::prelude::{BitSlice, BitVec, Msb0};
use bitvec::view::BitView;
use primitive_types::U256;
use thiserror::Error;

use crate::core::{Block, Body, Slice};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("unexpected end of input")]
    UnexpectedEnd,
    #[error("unknown message tag {0}")]
    UnknownTag(u8),
}

pub struct BitWriter {
    bits: BitVec<u8, Msb0>,
}

impl BitWriter {
    pub fn new() -> Self {
        Self { bits: BitVec::new() }
    }

    pub fn push(&mut self, bit: bool) {
        self.bits.push(bit);
    }

    /// Write the low `width` bits of `value`, most significant first.
    pub fn uint(&mut self, value: u64, width: usize) {
        for i in (0..width).rev() {
            self.bits.push(value >> i & 1 == 1);
        }
    }

    pub fn u256(&mut self, value: U256) {
        let mut buf = [0u8; 32];
        value.to_big_endian(&mut buf);
        for byte in buf {
            self.uint(byte as u64, 8);
        }
    }

    pub fn slice(&mut self, s: &Slice) {
        self.uint(s.len() as u64, 16);
        self.bits.extend_from_bitslice(s.as_bitslice());
    }

    pub fn body(&mut self, body: &Body) {
        for s in body {
            self.push(true);
            self.slice(s);
        }
        self.push(false);
    }

    pub fn block(&mut self, b: &Block) {
        self.u256(b.prev);
        self.u256(b.time);
        self.body(&b.body);
    }

    pub fn into_bytes(mut self) -> Vec<u8> {
        self.bits.set_uninitialized(false);
        self.bits.into_vec()
    }
}

impl Default for BitWriter {
    fn default() -> Self {
        Self::new()
    }
}

pub struct BitReader<'a> {
    bits: &'a BitSlice<u8, Msb0>,
    pos: usize,
}

impl<'a> BitReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bits: bytes.view_bits::<Msb0>(), pos: 0 }
    }

    pub fn bit(&mut self) -> Result<bool, CodecError> {
        let bit = self
            .bits
            .get(self.pos)
            .map(|b| *b)
            .ok_or(CodecError::UnexpectedEnd)?;
        self.pos += 1;
        Ok(bit)
    }

    pub fn uint(&mut self, width: usize) -> Result<u64, CodecError> {
        let mut value = 0u64;
        for _ in 0..width {
            value = value << 1 | self.bit()? as u64;
        }
        Ok(value)
    }

    pub fn u256(&mut self) -> Result<U256, CodecError> {
        let mut buf = [0u8; 32];
        for byte in &mut buf {
            *byte = self.uint(8)? as u8;
        }
        Ok(U256::from_big_endian(&buf))
    }

    pub fn slice(&mut self) -> Result<Slice, CodecError> {
        let len = self.uint(16)? as usize;
        let mut s = Slice::with_capacity(len);
        for _ in 0..len {
            s.push(self.bit()?);
        }
        Ok(s)
    }

    pub fn body(&mut self) -> Result<Body, CodecError> {
        let mut body = Body::new();
        while self.bit()? {
            body.push(self.slice()?);
        }
        Ok(body)
    }

    pub fn block(&mut self) -> Result<Block, CodecError> {
        let prev = self.u256()?;
        let time = self.u256()?;
        let body = self.body()?;
        Ok(Block { prev, time, body })
    }
}

/// Byte form of one slice, as hashed for scoring.
pub fn slice_bytes(s: &Slice) -> Vec<u8> {
    let mut w = BitWriter::new();
    w.slice(s);
    w.into_bytes()
}

/// Byte form of a block body, as hashed inside `hash_block`.
pub fn body_bytes(body: &Body) -> Vec<u8> {
    let mut w = BitWriter::new();
    w.body(body);
    w.into_bytes()
}

/// Byte form of a whole block, as stored in chain files.
pub fn block_bytes(b: &Block) -> Vec<u8> {
    let mut w = BitWriter::new();
    w.block(b);
    w.into_bytes()
}

pub fn block_from_bytes(bytes: &[u8]) -> Result<Block, CodecError> {
    BitReader::new(bytes).block()
}
