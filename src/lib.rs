#![forbid(unsafe_code)]

//! Ubilog: a peer-to-peer proof-of-work blockchain node.
//!
//! Blocks gossip over UDP, the block tree lives in memory with
//! heaviest-work tip selection, user-submitted slices queue in a scored
//! mempool and get packed into mined block bodies, and the canonical chain
//! is persisted to flat files.
//!
//! Modules:
//! - core: primitive types (hashes, slices, blocks) and hashing
//! - algebra: difficulty/target arithmetic and block hashing
//! - bits: bit-level wire and storage codec
//! - chain: block tree, orphan handling, heaviest-tip selection
//! - mempool: scored slice heap and body packing
//! - miner: proof-of-work search
//! - network: wire messages and the peer table
//! - node: the single-worker runtime tying everything together
//! - storage: canonical-chain and mined-draw persistence
//! - config, constants, display: configuration, protocol parameters,
//!   status output

pub mod algebra;
pub mod bits;
pub mod chain;
pub mod config;
pub mod constants;
pub mod core;
pub mod display;
pub mod mempool;
pub mod miner;
pub mod network;
pub mod node;
pub mod storage;

// Re-export the types most callers need.
pub use crate::chain::ChainStore;
pub use crate::config::NodeConfig;
pub use crate::core::{Block, Body, Hash, Slice, ZERO_HASH};
pub use crate::mempool::Mempool;
pub use crate::network::{Message, PeerAddress, PeerTable};
pub use crate::node::Node;
pub use crate::storage::Storage;
