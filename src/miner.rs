#![forbid(unsafe_code)]

//! Proof-of-work search over a candidate block.
//!
//! Each batch draws up to a fixed number of random nonces; the scheduler
//! re-invokes the miner immediately after an unsuccessful batch, so the
//! batch size only bounds how long other tasks wait for their turn.

use primitive_types::U256;
use rand::rngs::OsRng;
use rand::RngCore;

use crate::algebra::hash_block_parts;
use crate::bits;
use crate::core::{keccak, now_ms, Block, Body, Hash};

/// A freshly mined block together with the 64-bit draw that produced it.
pub struct MinedBlock {
    pub block: Block,
    pub rand: u64,
}

/// Run one attempt batch for a block extending `tip_hash` with `body`.
///
/// The nonce is `(secret_key << 64) | rand` with `rand` drawn from the OS
/// RNG; its keccak image fills the low 192 bits of the candidate's `time`
/// field next to the wall-clock millisecond stamp. A candidate wins when
/// its hash exceeds the tip target.
pub fn mine(
    tip_hash: Hash,
    tip_target: U256,
    body: &Body,
    secret_key: U256,
    attempts: u32,
) -> Option<MinedBlock> {
    let body_bytes = bits::body_bytes(body);
    let low_mask = (U256::one() << 192) - U256::one();
    for _ in 0..attempts {
        let rand = OsRng.next_u64();
        let nonce = (secret_key << 64) | U256::from(rand);
        let mut nonce_be = [0u8; 32];
        nonce.to_big_endian(&mut nonce_be);
        let low192 = keccak(&nonce_be) & low_mask;
        let time = (U256::from(now_ms()) << 192) | low192;
        if hash_block_parts(tip_hash, time, &body_bytes) > tip_target {
            return Some(MinedBlock {
                block: Block { prev: tip_hash, time, body: body.clone() },
                rand,
            });
        }
    }
    None
}
