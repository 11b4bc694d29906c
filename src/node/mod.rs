//! The node runtime.
//!
//! One worker owns every piece of mutable state (chain, mempool, peer
//! table, pending body) and everything that mutates it runs on that
//! worker: inbound messages drained from the receiver channel, the
//! periodic gossip/request/save/display ticks, and the miner's attempt
//! batches. The receiver task only moves datagrams onto the channel, so
//! transport arrival order is processing order.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::time::{interval, interval_at, Instant};
use tracing::{debug, info, warn};

use crate::algebra::{hash_block, hash_slice, hash_work};
use crate::chain::ChainStore;
use crate::config::NodeConfig;
use crate::constants::{
    DISPLAY_PERIOD, DISPLAY_WARMUP, GOSSIP_PERIOD, MINE_ATTEMPTS, REQUEST_PERIOD, SAVE_PERIOD,
};
use crate::core::{now_ms, Block, Body, Hash};
use crate::display;
use crate::mempool::Mempool;
use crate::miner;
use crate::network::{Message, PeerTable};
use crate::storage::Storage;

pub struct Node {
    config: NodeConfig,
    chain: ChainStore,
    mempool: Mempool,
    peers: PeerTable,
    /// Body the miner is currently working on; rebuilt when the tip moves.
    next_body: Body,
    storage: Storage,
    socket: Arc<UdpSocket>,
    local_addr: SocketAddr,
    mined_count: u64,
}

impl Node {
    /// Bind the socket, reload the saved chain, and seed the peer table.
    /// A saved chain that fails to load is fatal here; once running, the
    /// node never dies on bad input.
    pub async fn new(config: NodeConfig) -> Result<Self> {
        let storage = Storage::open(config.data_dir())?;
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, config.port))
            .await
            .with_context(|| format!("binding udp port {}", config.port))?;
        let local_addr = socket.local_addr().context("reading local address")?;

        let mut node = Self {
            config,
            chain: ChainStore::new(),
            mempool: Mempool::new(),
            peers: PeerTable::new(),
            next_body: Body::new(),
            storage,
            socket: Arc::new(socket),
            local_addr,
            mined_count: 0,
        };

        let saved = node.storage.load_blocks()?;
        if !saved.is_empty() {
            let count = saved.len();
            let now = now_ms();
            for block in saved {
                node.chain.handle_block(block, now);
            }
            let (work, tip) = node.chain.tip();
            info!(
                blocks = count,
                height = node.chain.height_of(&tip).unwrap_or(0),
                work,
                "reloaded chain"
            );
        }

        let now = now_ms();
        for addr in &node.config.peers {
            node.peers.upsert(*addr, now);
        }
        node.rebuild_body();
        Ok(node)
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn chain(&self) -> &ChainStore {
        &self.chain
    }

    pub fn mempool(&self) -> &Mempool {
        &self.mempool
    }

    pub fn peers(&self) -> &PeerTable {
        &self.peers
    }

    pub fn next_body(&self) -> &Body {
        &self.next_body
    }

    pub fn mined_count(&self) -> u64 {
        self.mined_count
    }

    /// Run until ctrl-c. All state mutation happens inside this loop; the
    /// `biased` order makes inbound messages win over timers, and the
    /// always-ready miner branch only runs when nothing else is due.
    pub async fn run(&mut self) -> Result<()> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let socket = self.socket.clone();
        tokio::spawn(async move {
            let mut buf = vec![0u8; 65536];
            loop {
                match socket.recv_from(&mut buf).await {
                    Ok((len, from)) => {
                        if tx.send((from, buf[..len].to_vec())).is_err() {
                            break;
                        }
                    }
                    Err(err) => debug!(%err, "udp receive error"),
                }
            }
        });

        let mut gossip = interval(GOSSIP_PERIOD);
        let mut request = interval(REQUEST_PERIOD);
        let mut save = interval(SAVE_PERIOD);
        let mut status = interval_at(Instant::now() + DISPLAY_WARMUP, DISPLAY_PERIOD);

        info!(
            port = self.local_addr.port(),
            mine = self.config.mine,
            peers = self.peers.len(),
            "node running"
        );

        loop {
            tokio::select! {
                biased;
                _ = tokio::signal::ctrl_c() => {
                    info!("shutting down");
                    break;
                }
                Some((from, bytes)) = rx.recv() => self.dispatch(from, &bytes).await,
                _ = gossip.tick() => self.gossip_tip().await,
                _ = request.tick() => self.request_missing().await,
                _ = save.tick() => self.save_chain(),
                _ = status.tick(), if self.config.display => self.print_status(),
                _ = std::future::ready(()), if self.config.mine => self.mine_round().await,
            }
        }

        self.save_chain();
        Ok(())
    }

    /// Route one inbound datagram. Undecodable input is dropped silently,
    /// without touching any state.
    pub async fn dispatch(&mut self, from: SocketAddr, bytes: &[u8]) {
        let msg = match Message::decode(bytes) {
            Ok(msg) => msg,
            Err(err) => {
                debug!(%from, %err, "dropping undecodable datagram");
                return;
            }
        };
        match msg {
            Message::PutPeers(addrs) => {
                let now = now_ms();
                for addr in addrs {
                    self.peers.upsert(addr.socket_addr(), now);
                }
            }
            Message::PutBlock(block) => self.ingest_block(block),
            Message::AskBlock(hash) => {
                if let Some(block) = self.chain.get_block(&hash) {
                    let reply = Message::PutBlock(block.clone()).encode();
                    self.send(&reply, from).await;
                }
            }
            Message::PutSlice(slice) => {
                let score = hash_work(hash_slice(&slice));
                self.mempool.insert(score, slice);
            }
        }
    }

    fn ingest_block(&mut self, block: Block) {
        if self.chain.handle_block(block, now_ms()) {
            let (work, tip) = self.chain.tip();
            info!(
                height = self.chain.height_of(&tip).unwrap_or(0),
                work,
                "tip advanced"
            );
            if self.config.mine {
                self.rebuild_body();
            }
        }
    }

    /// One miner attempt batch against the current tip, then yield so the
    /// receiver task and timers get the thread.
    async fn mine_round(&mut self) {
        let mined = miner::mine(
            self.chain.tip_hash(),
            self.chain.tip_target(),
            &self.next_body,
            self.config.secret_key,
            MINE_ATTEMPTS,
        );
        if let Some(mined) = mined {
            let hash = hash_block(&mined.block);
            if self.chain.handle_block(mined.block, now_ms()) {
                self.rebuild_body();
            }
            info!(
                height = self.chain.height_of(&hash).unwrap_or(0),
                slices = self.chain.get_block(&hash).map(|b| b.body.len()).unwrap_or(0),
                "mined block"
            );
            if let Err(err) = self.storage.save_mined(hash, mined.rand) {
                warn!(%err, "failed to record mined draw");
            }
            self.mined_count += 1;
        }
        tokio::task::yield_now().await;
    }

    /// Broadcast the tip block to every known peer.
    async fn gossip_tip(&self) {
        if self.peers.is_empty() {
            return;
        }
        let tip = self.chain.tip_hash();
        let block = self.chain.get_block(&tip).expect("tip admitted").clone();
        let bytes = Message::PutBlock(block).encode();
        for addr in self.peers.addrs() {
            self.send(&bytes, addr).await;
        }
    }

    /// Ask every peer for parents that orphans are waiting on and that are
    /// still unadmitted. (Filtering on the seen flag instead would never
    /// fire: parking an orphan marks it seen.)
    async fn request_missing(&self) {
        if self.peers.is_empty() {
            return;
        }
        let wanted: Vec<Hash> = self.chain.missing_parents().collect();
        for hash in wanted {
            let bytes = Message::AskBlock(hash).encode();
            for addr in self.peers.addrs() {
                self.send(&bytes, addr).await;
            }
        }
    }

    fn save_chain(&self) {
        // A failed save is retried by the next cycle.
        if let Err(err) = self.storage.save_chain(&self.chain) {
            warn!(%err, "chain save failed");
        }
    }

    fn print_status(&self) {
        println!(
            "{}",
            display::status_line(&self.chain, &self.peers, &self.mempool, self.mined_count)
        );
    }

    fn rebuild_body(&mut self) {
        let tip = self.chain.tip_hash();
        let mined = self.chain.mined_slices(&tip).expect("tip row seeded");
        self.next_body = self.mempool.build_body(mined);
    }

    async fn send(&self, bytes: &[u8], addr: SocketAddr) {
        if let Err(err) = self.socket.send_to(bytes, addr).await {
            debug!(%addr, %err, "udp send failed");
        }
    }
}
