//! End-to-end chain behavior over block sequences: extension, reordering,
//! forks, and slice deduplication.

use bitvec::prelude::{bitvec, Msb0};
use primitive_types::U256;

use ubilog::algebra::{hash_block, hash_slice, hash_work};
use ubilog::chain::ChainStore;
use ubilog::constants::DELAY_TOLERANCE;
use ubilog::core::{Block, Body, Hash, Slice, ZERO_HASH};
use ubilog::mempool::Mempool;

const NOW: u64 = 1_000_000;

fn zero_store() -> ChainStore {
    ChainStore::with_initial_target(U256::zero())
}

/// A child of `prev` meeting the store's target for it.
fn forge(store: &ChainStore, prev: Hash, ts: u64, body: Body) -> Block {
    let target = store.get_target(&prev).expect("parent target");
    let mut nonce = 0u64;
    loop {
        let time = (U256::from(ts) << 192) | U256::from(nonce);
        let b = Block { prev, time, body: body.clone() };
        if hash_block(&b) >= target {
            return b;
        }
        nonce += 1;
    }
}

/* ===== LINEAR EXTENSION ===== */

#[test]
fn linear_extension_builds_the_expected_chain() {
    let mut store = zero_store();
    let mut hashes = vec![ZERO_HASH];
    for ts in 1..=3u64 {
        let b = forge(&store, *hashes.last().expect("nonempty"), ts, Vec::new());
        hashes.push(hash_block(&b));
        assert!(store.handle_block(b, NOW), "tip should advance");
    }

    assert_eq!(store.height_of(&hashes[3]), Some(3));
    assert_eq!(store.longest_chain(), hashes);

    // Work is monotone along the chain and the tip carries the maximum.
    let works: Vec<u64> = hashes
        .iter()
        .map(|h| store.work_of(h).expect("admitted"))
        .collect();
    assert!(works.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(store.tip(), (works[3], hashes[3]));
}

/* ===== ARRIVAL ORDER INDEPENDENCE ===== */

#[test]
fn arrival_order_does_not_change_the_final_state() {
    // Forge a linear chain against an oracle store, then replay it into
    // fresh stores in scrambled orders.
    let mut oracle = zero_store();
    let mut blocks = Vec::new();
    let mut prev = ZERO_HASH;
    for ts in 1..=5u64 {
        let b = forge(&oracle, prev, ts, Vec::new());
        prev = hash_block(&b);
        oracle.handle_block(b.clone(), NOW);
        blocks.push(b);
    }

    for order in [
        vec![0usize, 1, 2, 3, 4],
        vec![4, 3, 2, 1, 0],
        vec![2, 0, 4, 1, 3],
        vec![1, 3, 0, 4, 2],
    ] {
        let mut store = zero_store();
        for &i in &order {
            store.handle_block(blocks[i].clone(), NOW);
        }
        assert_eq!(store.tip(), oracle.tip(), "order {order:?}");
        assert_eq!(store.longest_chain(), oracle.longest_chain(), "order {order:?}");
        for b in &blocks {
            let h = hash_block(b);
            assert_eq!(store.work_of(&h), oracle.work_of(&h), "order {order:?}");
            assert_eq!(store.height_of(&h), oracle.height_of(&h), "order {order:?}");
        }
        assert_eq!(store.missing_parents().count(), 0, "order {order:?}");
    }
}

/* ===== FORK CHOICE ===== */

#[test]
fn heavier_fork_takes_the_tip() {
    let mut store = zero_store();
    let marker: Slice = bitvec![u8, Msb0; 1, 1, 1];

    let b1 = forge(&store, ZERO_HASH, 1, Vec::new());
    let h1 = hash_block(&b1);
    store.handle_block(b1, NOW);
    let b2 = forge(&store, h1, 2, Vec::new());
    let h2 = hash_block(&b2);
    store.handle_block(b2, NOW);
    let main_work = store.work_of(&h2).expect("admitted");
    assert_eq!(store.tip_hash(), h2);

    // Grow a sibling branch until it outweighs the main chain; the tip
    // must not move before that point.
    let mut prev = ZERO_HASH;
    let mut ts = 100;
    loop {
        let c = forge(&store, prev, ts, vec![marker.clone()]);
        prev = hash_block(&c);
        ts += 1;
        store.handle_block(c, NOW);
        let fork_work = store.work_of(&prev).expect("admitted");
        if fork_work > main_work {
            break;
        }
        assert_eq!(store.tip_hash(), h2, "lighter fork must not take the tip");
    }
    assert_eq!(store.tip_hash(), prev);
}

/* ===== TIME GATE ===== */

#[test]
fn future_dated_blocks_leave_no_trace() {
    let mut store = zero_store();
    let b = forge(&store, ZERO_HASH, NOW + DELAY_TOLERANCE, Vec::new());
    let h = hash_block(&b);
    assert!(!store.handle_block(b, NOW));
    assert!(!store.contains(&h));
    assert_eq!(store.block_count(), 1);
    assert_eq!(store.pending_count(), 0);
}

#[test]
fn insufficient_work_is_recorded_but_worthless() {
    // Default initial difficulty: find a block under the target.
    let mut store = ChainStore::new();
    let target = store.get_target(&ZERO_HASH).expect("target");
    let mut nonce = 0u64;
    let weak = loop {
        let time = (U256::from(1u64) << 192) | U256::from(nonce);
        let b = Block { prev: ZERO_HASH, time, body: Vec::new() };
        if hash_block(&b) < target {
            break b;
        }
        nonce += 1;
    };
    let h = hash_block(&weak);
    assert!(!store.handle_block(weak, NOW));
    assert!(store.contains(&h), "rejected blocks are still recorded");
    assert_eq!(store.work_of(&h), Some(0));
    assert_eq!(store.tip(), (0, ZERO_HASH));
}

/* ===== SLICE DEDUPLICATION ===== */

#[test]
fn slices_mined_upstream_are_excluded_from_the_next_body() {
    let mut store = zero_store();
    let mut pool = Mempool::new();
    let s: Slice = bitvec![u8, Msb0; 1, 0, 1, 0];
    let score = hash_work(hash_slice(&s));

    pool.insert(score, s.clone());
    let body = pool.build_body(store.mined_slices(&ZERO_HASH).expect("genesis row"));
    assert_eq!(body, vec![s.clone()]);

    let b1 = forge(&store, ZERO_HASH, 1, body);
    let h1 = hash_block(&b1);
    assert!(store.handle_block(b1, NOW));
    assert!(store.mined_slices(&h1).expect("admitted").contains(&s));

    // The same slice resubmitted after being mined: dropped at packing.
    pool.insert(score, s);
    let next = pool.build_body(store.mined_slices(&h1).expect("admitted"));
    assert!(next.is_empty());
    assert!(pool.is_empty());
}

/* ===== MINED SLICE SETS ACCUMULATE ALONG THE CHAIN ===== */

#[test]
fn mined_slice_sets_union_parent_and_body() {
    let mut store = zero_store();
    let a: Slice = bitvec![u8, Msb0; 0, 0, 1];
    let b: Slice = bitvec![u8, Msb0; 0, 1, 0];

    let b1 = forge(&store, ZERO_HASH, 1, vec![a.clone()]);
    let h1 = hash_block(&b1);
    store.handle_block(b1, NOW);
    let b2 = forge(&store, h1, 2, vec![b.clone()]);
    let h2 = hash_block(&b2);
    store.handle_block(b2, NOW);

    let at_h1 = store.mined_slices(&h1).expect("admitted");
    let at_h2 = store.mined_slices(&h2).expect("admitted");
    assert!(at_h1.contains(&a) && !at_h1.contains(&b));
    assert!(at_h2.contains(&a) && at_h2.contains(&b));
}
