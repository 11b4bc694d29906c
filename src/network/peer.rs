//! Known-peer table.
//!
//! Peers are learned from configuration and from `PutPeers` gossip; the
//! table only grows. UDP is connectionless, so an entry is just an address
//! and the last time someone vouched for it.

use std::collections::HashMap;
use std::net::SocketAddr;

#[derive(Debug, Clone, Copy)]
pub struct Peer {
    pub addr: SocketAddr,
    pub seen_at: u64,
}

#[derive(Default)]
pub struct PeerTable {
    peers: HashMap<SocketAddr, Peer>,
}

impl PeerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or refresh a peer.
    pub fn upsert(&mut self, addr: SocketAddr, now_ms: u64) {
        self.peers.insert(addr, Peer { addr, seen_at: now_ms });
    }

    pub fn addrs(&self) -> impl Iterator<Item = SocketAddr> + '_ {
        self.peers.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}
