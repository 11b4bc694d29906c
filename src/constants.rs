//! Protocol constants. These must agree across all peers.

use std::time::Duration;

/// Maximum serialized size of a block body, in bytes.
pub const BODY_SIZE: usize = 1280;

/// Number of blocks between difficulty retargets.
pub const BLOCKS_PER_PERIOD: u64 = 20;

/// Intended block interval, in milliseconds.
pub const TIME_PER_BLOCK: u64 = 1_000;

/// Intended duration of one retarget period, in milliseconds.
pub const TIME_PER_PERIOD: u64 = BLOCKS_PER_PERIOD * TIME_PER_BLOCK;

/// Blocks dated this far past the local clock are dropped outright.
pub const DELAY_TOLERANCE: u64 = 60_000;

/// Difficulty assigned to the genesis target.
pub const INITIAL_DIFFICULTY: u64 = 256;

/// Default UDP port.
pub const DEFAULT_PORT: u16 = 16936;

/// Nonce draws per miner batch before yielding back to the scheduler.
pub const MINE_ATTEMPTS: u32 = 512;

/// How often the current tip is broadcast to every known peer.
pub const GOSSIP_PERIOD: Duration = Duration::from_secs(1);

/// How often missing parents are requested from peers.
pub const REQUEST_PERIOD: Duration = Duration::from_micros(31_250);

/// How often the longest chain is rewritten to disk.
pub const SAVE_PERIOD: Duration = Duration::from_secs(30);

/// How often the status line is printed, and its startup delay.
pub const DISPLAY_PERIOD: Duration = Duration::from_secs(1);
pub const DISPLAY_WARMUP: Duration = Duration::from_millis(900);
