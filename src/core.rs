#![forbid(unsafe_code)]

//! Core blockchain primitives (hashes, slices, blocks, timestamps)

use bitvec::prelude::{BitVec, Msb0};
use primitive_types::U256;
use sha3::{Digest, Keccak256};

/// A 256-bit block or slice hash, compared numerically.
pub type Hash = U256;

/// The distinguished "no predecessor" hash. Also the defined hash of the
/// genesis block.
pub const ZERO_HASH: Hash = U256([0; 4]);

/// A user-submitted payload fragment: an opaque bit-string.
pub type Slice = BitVec<u8, Msb0>;

/// An ordered list of slices carried by a block.
pub type Body = Vec<Slice>;

/// A block proposal. `time` packs the miner's wall-clock timestamp
/// (milliseconds since epoch) into the high 64 bits and the proof-of-work
/// nonce residue into the low 192 bits.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    pub prev: Hash,
    pub time: U256,
    pub body: Body,
}

/// The unique block with no predecessor. Its hash is `ZERO_HASH` by
/// protocol definition, not by computation.
pub fn genesis() -> Block {
    Block {
        prev: ZERO_HASH,
        time: U256::zero(),
        body: Vec::new(),
    }
}

/// Keccak-256 of raw bytes, as a numeric hash.
pub fn keccak(data: &[u8]) -> Hash {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    U256::from_big_endian(&hasher.finalize())
}

/// The wall-clock part of a block's `time` field: its high 64 bits.
pub fn time_ms(time: U256) -> u64 {
    (time >> 192).low_u64()
}

/// Current wall clock in milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before Unix epoch")
        .as_millis() as u64
}
