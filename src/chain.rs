#![forbid(unsafe_code)]

//! Block tree with orphan handling and heaviest-tip selection.
//!
//! All per-block metadata lives in hash-keyed maps; parents are referenced
//! by hash, never by pointer. Every map is seeded with a genesis row at
//! `ZERO_HASH`, so metadata lookups along admitted paths cannot miss; a
//! miss there is a programming error and aborts.

use std::collections::{HashMap, HashSet};

use primitive_types::U256;

use crate::algebra::{hash_block, hash_work, initial_target, next_target, retarget_scale};
use crate::constants::{BLOCKS_PER_PERIOD, DELAY_TOLERANCE};
use crate::core::{genesis, time_ms, Block, Hash, Slice, ZERO_HASH};

pub struct ChainStore {
    blocks: HashMap<Hash, Block>,
    children: HashMap<Hash, Vec<Hash>>,
    /// Orphans waiting for the keyed hash to be admitted as their parent.
    pending: HashMap<Hash, Vec<Block>>,
    /// Accumulated work from genesis.
    work: HashMap<Hash, u64>,
    height: HashMap<Hash, u64>,
    /// The target in force for the keyed block's children.
    target: HashMap<Hash, U256>,
    /// All slice contents on the path from genesis to the keyed block.
    /// Structurally shared with the parent's set.
    mined_slices: HashMap<Hash, im::HashSet<Slice>>,
    /// Hashes ever observed; set once, never cleared.
    seen: HashSet<Hash>,
    tip: (u64, Hash),
}

impl ChainStore {
    pub fn new() -> Self {
        Self::with_initial_target(initial_target())
    }

    /// A store whose genesis row carries the given target instead of the
    /// protocol default.
    pub fn with_initial_target(target: U256) -> Self {
        let mut store = Self {
            blocks: HashMap::new(),
            children: HashMap::new(),
            pending: HashMap::new(),
            work: HashMap::new(),
            height: HashMap::new(),
            target: HashMap::new(),
            mined_slices: HashMap::new(),
            seen: HashSet::new(),
            tip: (0, ZERO_HASH),
        };
        store.blocks.insert(ZERO_HASH, genesis());
        store.children.insert(ZERO_HASH, Vec::new());
        store.work.insert(ZERO_HASH, 0);
        store.height.insert(ZERO_HASH, 0);
        store.target.insert(ZERO_HASH, target);
        store.mined_slices.insert(ZERO_HASH, im::HashSet::new());
        store.seen.insert(ZERO_HASH);
        store
    }

    /// `(work, hash)` of the heaviest admitted block.
    pub fn tip(&self) -> (u64, Hash) {
        self.tip
    }

    pub fn tip_hash(&self) -> Hash {
        self.tip.1
    }

    /// The target the next block on the heaviest chain must meet.
    pub fn tip_target(&self) -> U256 {
        *self.target.get(&self.tip.1).expect("tip row seeded")
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.blocks.contains_key(hash)
    }

    pub fn get_block(&self, hash: &Hash) -> Option<&Block> {
        self.blocks.get(hash)
    }

    pub fn get_target(&self, hash: &Hash) -> Option<U256> {
        self.target.get(hash).copied()
    }

    pub fn work_of(&self, hash: &Hash) -> Option<u64> {
        self.work.get(hash).copied()
    }

    pub fn height_of(&self, hash: &Hash) -> Option<u64> {
        self.height.get(hash).copied()
    }

    pub fn children_of(&self, hash: &Hash) -> &[Hash] {
        self.children.get(hash).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Slices already incorporated on the path from genesis to `hash`.
    pub fn mined_slices(&self, hash: &Hash) -> Option<&im::HashSet<Slice>> {
        self.mined_slices.get(hash)
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.values().map(Vec::len).sum()
    }

    /// Hashes that orphans are waiting on and that are still unadmitted:
    /// the set worth asking peers for. (The parked orphans themselves are
    /// always marked seen, so a seen-based filter would never fire.)
    pub fn missing_parents(&self) -> impl Iterator<Item = Hash> + '_ {
        self.pending
            .keys()
            .filter(|parent| !self.blocks.contains_key(*parent))
            .copied()
    }

    /// The heaviest chain from genesis to the tip, in chain order.
    pub fn longest_chain(&self) -> Vec<Hash> {
        let mut chain = Vec::new();
        let mut hash = self.tip.1;
        loop {
            chain.push(hash);
            if hash == ZERO_HASH {
                break;
            }
            hash = self.blocks.get(&hash).expect("tip path admitted").prev;
        }
        chain.reverse();
        chain
    }

    /// Ingest a block received at wall-clock `now_ms`, cascading any
    /// orphans that were waiting on it. Returns whether the tip advanced.
    ///
    /// Never fails on adversarial input: future-dated blocks are dropped
    /// without a trace, invalid blocks are recorded but carry no work, and
    /// blocks with unknown parents are parked until the parent arrives.
    pub fn handle_block(&mut self, block: Block, now_ms: u64) -> bool {
        let mut tip_updated = false;
        let mut worklist = vec![block];
        while let Some(b) = worklist.pop() {
            if time_ms(b.time) >= now_ms.saturating_add(DELAY_TOLERANCE) {
                continue;
            }
            tip_updated |= self.add_block(b, &mut worklist);
        }
        tip_updated
    }

    fn add_block(&mut self, b: Block, worklist: &mut Vec<Block>) -> bool {
        let hash = hash_block(&b);
        if self.blocks.contains_key(&hash) {
            return false;
        }
        let prev = b.prev;
        if !self.blocks.contains_key(&prev) {
            // Unknown parent: park once, keyed by the missing hash.
            if self.seen.insert(hash) {
                self.pending.entry(prev).or_default().push(b);
            }
            return false;
        }

        let prev_time = time_ms(self.blocks.get(&prev).expect("parent admitted").time);
        let prev_target = *self.target.get(&prev).expect("parent row complete");
        let prev_work = *self.work.get(&prev).expect("parent row complete");
        let prev_height = *self.height.get(&prev).expect("parent row complete");

        let mut mined = self
            .mined_slices
            .get(&prev)
            .expect("parent row complete")
            .clone();
        for slice in &b.body {
            mined.insert(slice.clone());
        }

        let b_time = time_ms(b.time);
        let valid = hash >= prev_target && b_time > prev_time;

        self.children.insert(hash, Vec::new());
        self.work.insert(hash, 0);
        self.height.insert(hash, 0);
        self.target.insert(hash, U256::zero());
        self.mined_slices.insert(hash, mined);
        self.blocks.insert(hash, b);

        let mut tip_updated = false;
        if valid {
            let work = prev_work.saturating_add(hash_work(hash));
            let height = prev_height + 1;
            self.work.insert(hash, work);
            self.height.insert(hash, height);
            let target = if height % BLOCKS_PER_PERIOD == 0 {
                self.retargeted(prev, prev_target, b_time)
            } else {
                prev_target
            };
            self.target.insert(hash, target);
            // First to cross a work level keeps the tip on ties.
            if work > self.tip.0 {
                self.tip = (work, hash);
                tip_updated = true;
            }
        }

        self.children
            .get_mut(&prev)
            .expect("parent row complete")
            .push(hash);
        if let Some(waiters) = self.pending.remove(&hash) {
            worklist.extend(waiters);
        }
        self.seen.insert(hash);
        tip_updated
    }

    /// Target for a block closing a retarget period: scale the previous
    /// difficulty by intended over observed period time. The checkpoint is
    /// `BLOCKS_PER_PERIOD - 1` parents above `prev`.
    fn retargeted(&self, prev: Hash, prev_target: U256, b_time: u64) -> U256 {
        let mut checkpoint = prev;
        for _ in 0..BLOCKS_PER_PERIOD - 1 {
            checkpoint = self
                .blocks
                .get(&checkpoint)
                .expect("ancestor path admitted")
                .prev;
        }
        let checkpoint_time = time_ms(self.blocks.get(&checkpoint).expect("ancestor path admitted").time);
        // Timestamps are not monotone through invalid ancestors.
        let observed = b_time.saturating_sub(checkpoint_time).max(1);
        next_target(prev_target, retarget_scale(observed))
    }
}

impl Default for ChainStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use primitive_types::U256;

    // A valid child of `prev` under the store's current rules, found by
    // walking nonces.
    fn make_block(store: &ChainStore, prev: Hash, ts: u64) -> Block {
        let target = store.get_target(&prev).expect("parent target");
        let mut nonce = 0u64;
        loop {
            let time = (U256::from(ts) << 192) | U256::from(nonce);
            let b = Block { prev, time, body: Vec::new() };
            if hash_block(&b) >= target {
                return b;
            }
            nonce += 1;
        }
    }

    #[test]
    fn fresh_store_is_genesis_only() {
        let store = ChainStore::new();
        assert_eq!(store.tip(), (0, ZERO_HASH));
        assert_eq!(store.longest_chain(), vec![ZERO_HASH]);
        assert_eq!(store.block_count(), 1);
        assert_eq!(store.height_of(&ZERO_HASH), Some(0));
    }

    #[test]
    fn linear_extension_counts_heights() {
        let mut store = ChainStore::with_initial_target(U256::zero());
        let b1 = make_block(&store, ZERO_HASH, 1);
        let h1 = hash_block(&b1);
        assert!(store.handle_block(b1, 10));
        let b2 = make_block(&store, h1, 2);
        let h2 = hash_block(&b2);
        assert!(store.handle_block(b2, 10));

        assert_eq!(store.height_of(&h1), Some(1));
        assert_eq!(store.height_of(&h2), Some(2));
        assert_eq!(store.tip_hash(), h2);
        assert_eq!(store.longest_chain(), vec![ZERO_HASH, h1, h2]);
    }

    #[test]
    fn non_advancing_time_is_invalid() {
        let mut store = ChainStore::with_initial_target(U256::zero());
        let b1 = make_block(&store, ZERO_HASH, 5);
        let h1 = hash_block(&b1);
        store.handle_block(b1, 100);

        // Same timestamp as the parent: admitted but worthless.
        let stale = make_block(&store, h1, 5);
        let h = hash_block(&stale);
        assert!(!store.handle_block(stale, 100));
        assert!(store.contains(&h));
        assert_eq!(store.work_of(&h), Some(0));
        assert_eq!(store.tip_hash(), h1);
    }

    #[test]
    fn future_dated_block_leaves_no_trace() {
        let mut store = ChainStore::with_initial_target(U256::zero());
        let b = make_block(&store, ZERO_HASH, DELAY_TOLERANCE + 50);
        let h = hash_block(&b);
        assert!(!store.handle_block(b, 50));
        assert!(!store.contains(&h));
        assert_eq!(store.pending_count(), 0);
        assert_eq!(store.missing_parents().count(), 0);
    }

    #[test]
    fn just_inside_the_tolerance_is_admitted() {
        let mut store = ChainStore::with_initial_target(U256::zero());
        let b = make_block(&store, ZERO_HASH, DELAY_TOLERANCE + 49);
        let h = hash_block(&b);
        assert!(store.handle_block(b, 50));
        assert!(store.contains(&h));
    }

    #[test]
    fn orphan_is_parked_once_and_requested() {
        let mut store = ChainStore::with_initial_target(U256::zero());
        let b1 = make_block(&store, ZERO_HASH, 1);
        let h1 = hash_block(&b1);
        let b2 = make_block(&store, h1, 2);

        assert!(!store.handle_block(b2.clone(), 10));
        assert_eq!(store.pending_count(), 1);
        assert_eq!(store.missing_parents().collect::<Vec<_>>(), vec![h1]);

        // Re-delivery of a parked orphan does not queue it twice.
        assert!(!store.handle_block(b2, 10));
        assert_eq!(store.pending_count(), 1);
    }

    #[test]
    fn cascade_admits_waiting_subtree() {
        let mut store = ChainStore::with_initial_target(U256::zero());
        let b1 = make_block(&store, ZERO_HASH, 1);
        let h1 = hash_block(&b1);
        let b2 = make_block(&store, h1, 2);
        let h2 = hash_block(&b2);

        store.handle_block(b2, 10);
        assert!(store.handle_block(b1, 10));
        assert_eq!(store.tip_hash(), h2);
        assert_eq!(store.missing_parents().count(), 0);
        assert_eq!(store.children_of(&h1), &[h2]);
    }

    #[test]
    fn reingesting_an_admitted_block_is_a_noop() {
        let mut store = ChainStore::with_initial_target(U256::zero());
        let b1 = make_block(&store, ZERO_HASH, 1);
        store.handle_block(b1.clone(), 10);
        let count = store.block_count();
        let tip = store.tip();
        assert!(!store.handle_block(b1, 10));
        assert_eq!(store.block_count(), count);
        assert_eq!(store.tip(), tip);
    }

    #[test]
    fn retarget_fires_at_period_boundary() {
        let mut store = ChainStore::with_initial_target(U256::zero());
        let mut prev = ZERO_HASH;
        for i in 1..=BLOCKS_PER_PERIOD {
            let b = make_block(&store, prev, i);
            prev = hash_block(&b);
            assert!(store.handle_block(b, 1_000_000));
        }
        // Twenty blocks in 20 ms against an intended 20_000 ms period:
        // difficulty scales from 1 to TIME_PER_PERIOD / observed.
        use crate::algebra::difficulty;
        use crate::constants::TIME_PER_PERIOD;
        let observed = BLOCKS_PER_PERIOD;
        assert_eq!(difficulty(store.tip_target()), TIME_PER_PERIOD / observed);
    }
}
