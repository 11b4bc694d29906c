//! Difficulty and target arithmetic over 256-bit hashes.
//!
//! A target is the numeric threshold a block hash must meet or exceed;
//! difficulty is the approximate expected number of hashes per valid block,
//! `2^256 / (2^256 - target)`. The two conversions need `2^256` itself,
//! which does not fit in a `U256`, so the kernels widen to `U512`.

use primitive_types::{U256, U512};

use crate::bits;
use crate::constants::{INITIAL_DIFFICULTY, TIME_PER_PERIOD};
use crate::core::{keccak, Block, Hash, Slice, ZERO_HASH};

fn widen(x: U256) -> U512 {
    let mut buf = [0u8; 32];
    x.to_big_endian(&mut buf);
    U512::from_big_endian(&buf)
}

fn narrow(x: U512) -> U256 {
    let mut buf = [0u8; 64];
    x.to_big_endian(&mut buf);
    U256::from_big_endian(&buf[32..])
}

fn two_pow_256() -> U512 {
    U512::one() << 256
}

fn saturating_u64(x: U512) -> u64 {
    if x > U512::from(u64::MAX) {
        u64::MAX
    } else {
        x.low_u64()
    }
}

/// Expected hashes per block for a given target: `2^256 / (2^256 - target)`.
pub fn difficulty(target: U256) -> u64 {
    let two256 = two_pow_256();
    saturating_u64(two256 / (two256 - widen(target)))
}

/// The work a block hash contributes: its difficulty, except that the zero
/// hash (genesis) contributes nothing.
pub fn hash_work(hash: Hash) -> u64 {
    if hash.is_zero() {
        0
    } else {
        difficulty(hash)
    }
}

/// Inverse of `difficulty`: the target whose difficulty is `diff`.
/// `diff` must be nonzero.
pub fn compute_target(diff: u128) -> U256 {
    let two256 = two_pow_256();
    narrow(two256 - two256 / U512::from(diff))
}

/// The target seeded at genesis.
pub fn initial_target() -> U256 {
    compute_target(INITIAL_DIFFICULTY as u128)
}

/// Retarget step. `scale` is the ratio of intended to observed period time
/// in 32.32 fixed point; the next difficulty is
/// `1 + (difficulty(prev) * scale - 1) / 2^32`.
pub fn next_target(prev_target: U256, scale: u64) -> U256 {
    let d = difficulty(prev_target) as u128;
    let next_diff = 1 + (d * scale as u128).saturating_sub(1) / (1u128 << 32);
    compute_target(next_diff)
}

/// `floor(2^32 * TIME_PER_PERIOD / observed)`, the `scale` fed to
/// `next_target` after a period observed to take `observed` milliseconds.
pub fn retarget_scale(observed: u64) -> u64 {
    let scale = ((TIME_PER_PERIOD as u128) << 32) / observed.max(1) as u128;
    scale.min(u64::MAX as u128) as u64
}

/// Hash of a block from its parts. The genesis form (`prev = ZERO_HASH`,
/// `time = 0`) hashes to `ZERO_HASH` by definition; everything else is
/// Keccak-256 over the 32-byte big-endian `prev` and `time` followed by the
/// serialized body.
pub fn hash_block_parts(prev: Hash, time: U256, body_bytes: &[u8]) -> Hash {
    if prev == ZERO_HASH && time.is_zero() {
        return ZERO_HASH;
    }
    let mut data = Vec::with_capacity(64 + body_bytes.len());
    let mut buf = [0u8; 32];
    prev.to_big_endian(&mut buf);
    data.extend_from_slice(&buf);
    time.to_big_endian(&mut buf);
    data.extend_from_slice(&buf);
    data.extend_from_slice(body_bytes);
    keccak(&data)
}

pub fn hash_block(b: &Block) -> Hash {
    hash_block_parts(b.prev, b.time, &bits::body_bytes(&b.body))
}

/// Hash of a serialized slice; its difficulty is the slice's mempool score.
pub fn hash_slice(s: &Slice) -> Hash {
    keccak(&bits::slice_bytes(s))
}
