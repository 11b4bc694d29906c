//! Terminal status line.

use crate::algebra::difficulty;
use crate::chain::ChainStore;
use crate::mempool::Mempool;
use crate::network::PeerTable;

/// One-line summary of the node's view, printed on each display tick.
pub fn status_line(
    chain: &ChainStore,
    peers: &PeerTable,
    mempool: &Mempool,
    mined_count: u64,
) -> String {
    let (work, tip) = chain.tip();
    let height = chain.height_of(&tip).unwrap_or(0);
    let diff = chain.get_target(&tip).map(difficulty).unwrap_or(0);
    format!(
        "tip {:016x} | height {} work {} difficulty {} | blocks {} pending {} | peers {} mempool {} mined {}",
        (tip >> 192).low_u64(),
        height,
        work,
        diff,
        chain.block_count(),
        chain.pending_count(),
        peers.len(),
        mempool.len(),
        mined_count,
    )
}
