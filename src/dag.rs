//! Block DAG and PHANTOM ordering.
//!
//! Grounded on `original_source/.../consensus/dag.py`'s `PHANTOMOrdering`
//! class: concurrent node map keyed by hash, an explicit children index, an
//! orphan pool keyed by missing parent, iterative (non-recursive) ancestor/
//! descendant/anticone walks, and the same blue-set growth rule. Reworked
//! from the original's single in-process lock to the teacher's `DashMap` +
//! `parking_lot::RwLock` concurrency style (`src/masternode_registry.rs`).
//!
//! Orphaned insertion and refused reorgs are not errors: `add_block` and
//! `compute_reorg` return an `InsertOutcome`/`ReorgPlan` describing what
//! happened, per `error.rs`'s documented convention.

#![allow(dead_code)]

use crate::block::BlockHeader;
use crate::constants::dag::{MAX_ORPHAN_POOL_SIZE, MAX_PARENTS, MAX_REORG_DEPTH, PHANTOM_K};
use crate::types::Hash256;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::{HashSet, VecDeque};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DagError {
    #[error("block {0:?} already known")]
    Duplicate(Hash256),
    #[error("genesis already registered")]
    GenesisExists,
    #[error("non-genesis block must have 1..={MAX_PARENTS} parents, got {0}")]
    BadParentCount(usize),
    #[error("duplicate parent reference in header")]
    DuplicateParent,
}

/// A DAG node: the header plus PHANTOM bookkeeping the orderer derives.
#[derive(Clone, Debug)]
pub struct DagNode {
    pub header: BlockHeader,
    pub hash: Hash256,
    pub is_blue: bool,
    pub blue_score: u64,
    /// `max(vdf_weight(parent)) + vdf_iterations(self)`: the heaviest
    /// ancestor path's accumulated VDF work plus this block's own.
    pub vdf_weight: u64,
    pub checkpoint_count: u64,
}

/// Outcome of `add_block`. Orphaned insertion is expected, recoverable
/// behavior under network asynchrony, not a failure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InsertOutcome {
    /// Accepted and linked into the DAG immediately.
    Accepted { hash: Hash256, blue: bool },
    /// Parent(s) not yet known; queued until they arrive.
    Orphaned { hash: Hash256, missing_parents: Vec<Hash256> },
    /// Previously orphaned blocks that became linkable as a result of this
    /// insertion, processed transitively.
    AcceptedWithOrphans { hash: Hash256, blue: bool, released: Vec<Hash256> },
}

/// A proposed chain reorganization, or the reason one was refused.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReorgPlan {
    /// No reorg needed: `tip` already extends the current main chain.
    NoOp,
    /// Switching to `new_tip` would disconnect `disconnected` and attach
    /// `connected`; within bounds and safe to apply.
    Reorg {
        common_ancestor: Hash256,
        disconnected: Vec<Hash256>,
        connected: Vec<Hash256>,
    },
    /// Refused because it would disconnect an irreversible block.
    RefusedIrreversible { offending_block: Hash256 },
    /// Refused because the disconnection depth exceeds `MAX_REORG_DEPTH`.
    RefusedTooDeep { depth: u64 },
}

struct OrphanEntry {
    header: BlockHeader,
    received_at: i64,
}

/// Concurrent PHANTOM DAG store. Each node's mutable derived fields
/// (`is_blue`, `blue_score`) live behind the outer `DashMap`'s per-shard
/// locking; the tip set and blue set are small enough to hold under a
/// single `RwLock` each, mirroring the teacher's registry split between
/// a sharded node map and a few coarser aggregate locks.
pub struct PhantomDag {
    nodes: DashMap<Hash256, DagNode>,
    children: DashMap<Hash256, HashSet<Hash256>>,
    tips: RwLock<HashSet<Hash256>>,
    blue_set: RwLock<HashSet<Hash256>>,
    orphans: DashMap<Hash256, OrphanEntry>,
    orphans_by_parent: DashMap<Hash256, HashSet<Hash256>>,
    irreversible: RwLock<HashSet<Hash256>>,
    genesis: RwLock<Option<Hash256>>,
    k: usize,
}

impl Default for PhantomDag {
    fn default() -> Self {
        Self::new(PHANTOM_K)
    }
}

impl PhantomDag {
    pub fn new(k: usize) -> Self {
        Self {
            nodes: DashMap::new(),
            children: DashMap::new(),
            tips: RwLock::new(HashSet::new()),
            blue_set: RwLock::new(HashSet::new()),
            orphans: DashMap::new(),
            orphans_by_parent: DashMap::new(),
            irreversible: RwLock::new(HashSet::new()),
            genesis: RwLock::new(None),
            k,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, hash: &Hash256) -> bool {
        self.nodes.contains_key(hash)
    }

    pub fn get(&self, hash: &Hash256) -> Option<DagNode> {
        self.nodes.get(hash).map(|n| n.clone())
    }

    pub fn tips(&self) -> Vec<Hash256> {
        self.tips.read().iter().copied().collect()
    }

    /// Insert a block. Validates parent-count shape, queues the block as an
    /// orphan if any parent is unknown, otherwise links it and releases any
    /// orphans that were waiting on it (transitively).
    pub fn add_block(&self, header: BlockHeader, now_ms: i64) -> Result<InsertOutcome, DagError> {
        let hash = header.hash();
        if self.nodes.contains_key(&hash) {
            return Err(DagError::Duplicate(hash));
        }

        if header.is_genesis() {
            let mut genesis = self.genesis.write();
            if genesis.is_some() {
                return Err(DagError::GenesisExists);
            }
            *genesis = Some(hash);
            let vdf_weight = header.vdf_iterations;
            self.insert_linked(header, hash, vdf_weight);
            self.tips.write().insert(hash);
            self.blue_set.write().insert(hash);
            return Ok(InsertOutcome::Accepted { hash, blue: true });
        }

        let parent_count = header.parent_hashes.len();
        if parent_count == 0 || parent_count > MAX_PARENTS {
            return Err(DagError::BadParentCount(parent_count));
        }
        let unique: HashSet<Hash256> = header.parent_hashes.iter().copied().collect();
        if unique.len() != parent_count {
            return Err(DagError::DuplicateParent);
        }

        let missing: Vec<Hash256> = header
            .parent_hashes
            .iter()
            .filter(|p| !self.nodes.contains_key(*p))
            .copied()
            .collect();

        if !missing.is_empty() {
            self.stash_orphan(hash, header, &missing, now_ms);
            return Ok(InsertOutcome::Orphaned { hash, missing_parents: missing });
        }

        let blue = self.link_and_classify(header, hash);
        let released = self.process_orphans(hash);
        if released.is_empty() {
            Ok(InsertOutcome::Accepted { hash, blue })
        } else {
            Ok(InsertOutcome::AcceptedWithOrphans { hash, blue, released })
        }
    }

    fn stash_orphan(&self, hash: Hash256, header: BlockHeader, missing: &[Hash256], now_ms: i64) {
        if self.orphans.len() >= MAX_ORPHAN_POOL_SIZE {
            warn!("orphan pool at capacity, dropping oldest entries is the caller's job via evict_expired_orphans");
        }
        for parent in missing {
            self.orphans_by_parent.entry(*parent).or_default().insert(hash);
        }
        self.orphans.insert(hash, OrphanEntry { header, received_at: now_ms });
    }

    /// Walk the orphan pool transitively from a newly linked block, linking
    /// every orphan whose parents are now all present. Iterative via a work
    /// queue, matching the original's `_process_orphans`.
    fn process_orphans(&self, newly_linked: Hash256) -> Vec<Hash256> {
        let mut released = Vec::new();
        let mut queue: VecDeque<Hash256> = VecDeque::new();
        queue.push_back(newly_linked);

        while let Some(parent) = queue.pop_front() {
            let Some((_, waiting)) = self.orphans_by_parent.remove(&parent) else {
                continue;
            };
            for orphan_hash in waiting {
                let Some(entry) = self.orphans.get(&orphan_hash) else {
                    continue;
                };
                let still_missing = entry
                    .header
                    .parent_hashes
                    .iter()
                    .any(|p| !self.nodes.contains_key(p));
                if still_missing {
                    continue;
                }
                let (_, entry) = self.orphans.remove(&orphan_hash).expect("checked present above");
                self.link_and_classify(entry.header, orphan_hash);
                released.push(orphan_hash);
                queue.push_back(orphan_hash);
            }
        }
        released
    }

    fn insert_linked(&self, header: BlockHeader, hash: Hash256, vdf_weight: u64) {
        self.nodes.insert(
            hash,
            DagNode {
                header,
                hash,
                is_blue: false,
                blue_score: 0,
                vdf_weight,
                checkpoint_count: 0,
            },
        );
    }

    fn link_and_classify(&self, header: BlockHeader, hash: Hash256) -> bool {
        let max_parent_vdf_weight = header
            .parent_hashes
            .iter()
            .filter_map(|p| self.nodes.get(p).map(|n| n.vdf_weight))
            .max()
            .unwrap_or(0);
        let vdf_weight = max_parent_vdf_weight + header.vdf_iterations;

        for parent in &header.parent_hashes {
            self.children.entry(*parent).or_default().insert(hash);
            self.tips.write().remove(parent);
        }
        self.insert_linked(header, hash, vdf_weight);
        self.tips.write().insert(hash);
        self.update_blue_classification(hash)
    }

    /// Apply the PHANTOM blue-set growth rule: a block is blue iff its
    /// anticone intersected with the current blue set has size <= k. Its
    /// blue_score is one more than the maximum blue_score among its parents.
    fn update_blue_classification(&self, hash: Hash256) -> bool {
        let anticone = self.anticone(&hash);
        let blue_set = self.blue_set.read();
        let intersection = anticone.iter().filter(|h| blue_set.contains(*h)).count();
        drop(blue_set);

        let is_blue = intersection <= self.k;

        let parent_hashes = self.nodes.get(&hash).map(|n| n.header.parent_hashes.clone()).unwrap_or_default();
        let max_parent_score = parent_hashes
            .iter()
            .filter_map(|p| self.nodes.get(p).map(|n| n.blue_score))
            .max()
            .unwrap_or(0);

        if let Some(mut node) = self.nodes.get_mut(&hash) {
            node.is_blue = is_blue;
            node.blue_score = max_parent_score + 1;
        }
        if is_blue {
            self.blue_set.write().insert(hash);
        }
        is_blue
    }

    /// Ancestors of `hash`, walking parent edges iteratively.
    pub fn ancestors(&self, hash: &Hash256) -> HashSet<Hash256> {
        let mut seen = HashSet::new();
        let mut queue = VecDeque::new();
        if let Some(node) = self.nodes.get(hash) {
            queue.extend(node.header.parent_hashes.iter().copied());
        }
        while let Some(h) = queue.pop_front() {
            if !seen.insert(h) {
                continue;
            }
            if let Some(node) = self.nodes.get(&h) {
                queue.extend(node.header.parent_hashes.iter().copied());
            }
        }
        seen
    }

    /// Descendants of `hash`, walking the children index iteratively.
    pub fn descendants(&self, hash: &Hash256) -> HashSet<Hash256> {
        let mut seen = HashSet::new();
        let mut queue = VecDeque::new();
        if let Some(children) = self.children.get(hash) {
            queue.extend(children.iter().copied());
        }
        while let Some(h) = queue.pop_front() {
            if !seen.insert(h) {
                continue;
            }
            if let Some(children) = self.children.get(&h) {
                queue.extend(children.iter().copied());
            }
        }
        seen
    }

    /// The anticone of `hash`: every known block that is neither an
    /// ancestor nor a descendant of it, and isn't `hash` itself.
    pub fn anticone(&self, hash: &Hash256) -> HashSet<Hash256> {
        let ancestors = self.ancestors(hash);
        let descendants = self.descendants(hash);
        self.nodes
            .iter()
            .map(|entry| *entry.key())
            .filter(|h| h != hash && !ancestors.contains(h) && !descendants.contains(h))
            .collect()
    }

    /// Blue blocks ordered by descending cumulative `vdf_weight` (ties
    /// broken by `blue_score` then hash for determinism), with each red
    /// block inserted immediately after its highest-ranked blue parent,
    /// matching the original's two-pass merge.
    pub fn ordered_blocks(&self) -> Vec<Hash256> {
        let mut blues: Vec<Hash256> = self
            .nodes
            .iter()
            .filter(|n| n.is_blue)
            .map(|n| *n.key())
            .collect();
        blues.sort_by(|a, b| {
            let na = self.nodes.get(a);
            let nb = self.nodes.get(b);
            let wa = na.as_ref().map(|n| n.vdf_weight).unwrap_or(0);
            let wb = nb.as_ref().map(|n| n.vdf_weight).unwrap_or(0);
            let sa = na.as_ref().map(|n| n.blue_score).unwrap_or(0);
            let sb = nb.as_ref().map(|n| n.blue_score).unwrap_or(0);
            wb.cmp(&wa).then_with(|| sb.cmp(&sa)).then_with(|| a.cmp(b))
        });

        let mut position: std::collections::HashMap<Hash256, usize> = std::collections::HashMap::new();
        for (idx, h) in blues.iter().enumerate() {
            position.insert(*h, idx);
        }

        let mut reds: Vec<Hash256> = self
            .nodes
            .iter()
            .filter(|n| !n.is_blue)
            .map(|n| *n.key())
            .collect();
        reds.sort();

        let mut result = blues.clone();
        for red in reds {
            let node = match self.nodes.get(&red) {
                Some(n) => n,
                None => continue,
            };
            let insert_after = node
                .header
                .parent_hashes
                .iter()
                .filter_map(|p| position.get(p).copied())
                .max();
            match insert_after {
                Some(idx) => result.insert(idx + 1, red),
                None => result.push(red),
            }
            for (i, h) in result.iter().enumerate() {
                position.insert(*h, i);
            }
        }
        result
    }

    /// Extract the main chain by descending from genesis, following at each
    /// step the blue child with the highest stored `vdf_weight` (ties broken
    /// by `blue_score` then lexicographically-smallest hash), falling back
    /// to the same ranking over children of any color if no blue child
    /// exists (matching the original's fallback). Deterministic regardless
    /// of the children set's internal iteration order.
    pub fn main_chain(&self) -> Vec<Hash256> {
        let genesis = match *self.genesis.read() {
            Some(g) => g,
            None => return Vec::new(),
        };
        let mut chain = vec![genesis];
        let mut current = genesis;
        loop {
            let children = self.children.get(&current).map(|c| c.clone()).unwrap_or_default();
            if children.is_empty() {
                break;
            }
            let blue_children: Vec<Hash256> =
                children.iter().copied().filter(|c| self.nodes.get(c).map(|n| n.is_blue).unwrap_or(false)).collect();
            let mut pool = if !blue_children.is_empty() { blue_children } else { children.iter().copied().collect::<Vec<_>>() };
            pool.sort_by(|a, b| self.rank_child(b).cmp(&self.rank_child(a)).then_with(|| a.cmp(b)));
            let next = pool[0];
            chain.push(next);
            current = next;
        }
        chain
    }

    /// `(vdf_weight, blue_score)` ranking key for a child during main-chain
    /// descent, highest wins, with the caller breaking remaining ties by
    /// lexicographically-smallest hash.
    fn rank_child(&self, hash: &Hash256) -> (u64, u64) {
        self.nodes.get(hash).map(|n| (n.vdf_weight, n.blue_score)).unwrap_or((0, 0))
    }

    /// Resolve which of several competing tips should be preferred: most
    /// blue ancestors first, then highest stored `vdf_weight`, then the
    /// lexicographically smallest hash.
    pub fn resolve_fork(&self, candidates: &[Hash256]) -> Option<Hash256> {
        if candidates.is_empty() {
            return None;
        }
        candidates
            .iter()
            .copied()
            .max_by(|a, b| {
                let blue_a = self.ancestors(a).iter().filter(|h| self.nodes.get(*h).map(|n| n.is_blue).unwrap_or(false)).count();
                let blue_b = self.ancestors(b).iter().filter(|h| self.nodes.get(*h).map(|n| n.is_blue).unwrap_or(false)).count();
                blue_a
                    .cmp(&blue_b)
                    .then_with(|| self.vdf_weight(a).cmp(&self.vdf_weight(b)))
                    .then_with(|| b.cmp(a))
            })
    }

    /// The stored `vdf_weight` for a known block (0 for an unknown hash).
    fn vdf_weight(&self, hash: &Hash256) -> u64 {
        self.nodes.get(hash).map(|n| n.vdf_weight).unwrap_or(0)
    }

    /// Depth of `hash` below the current main-chain tip, used by the
    /// finality accumulator to reason about confirmation depth.
    pub fn confirmation_depth(&self, hash: &Hash256) -> Option<u64> {
        let chain = self.main_chain();
        let position = chain.iter().position(|h| h == hash)?;
        Some((chain.len() - 1 - position) as u64)
    }

    pub fn mark_irreversible(&self, hash: Hash256) {
        self.irreversible.write().insert(hash);
    }

    pub fn is_irreversible(&self, hash: &Hash256) -> bool {
        self.irreversible.read().contains(hash)
    }

    /// Whether switching the active tip from `current_tip` to `candidate`
    /// is permitted at all (no irreversible block would be disconnected).
    pub fn can_reorg(&self, current_tip: &Hash256, candidate: &Hash256) -> bool {
        matches!(self.compute_reorg(current_tip, candidate), ReorgPlan::Reorg { .. } | ReorgPlan::NoOp)
    }

    /// Compute the reorg plan needed to move the active tip from
    /// `current_tip` to `candidate`. Walks back from `current_tip` along the
    /// chain of selected parents to find the common ancestor with
    /// `candidate`, matching the original's reversed-main-chain scan.
    pub fn compute_reorg(&self, current_tip: &Hash256, candidate: &Hash256) -> ReorgPlan {
        let current_ancestry = self.selected_parent_chain(*current_tip);
        let candidate_ancestry = self.selected_parent_chain(*candidate);

        if current_ancestry.contains(candidate) {
            return ReorgPlan::NoOp;
        }

        let candidate_set: HashSet<Hash256> = candidate_ancestry.iter().copied().collect();
        let common_ancestor = match current_ancestry.iter().find(|h| candidate_set.contains(h)) {
            Some(h) => *h,
            None => return ReorgPlan::RefusedTooDeep { depth: u64::MAX },
        };

        let disconnected: Vec<Hash256> = current_ancestry
            .iter()
            .take_while(|h| **h != common_ancestor)
            .copied()
            .collect();

        for block in &disconnected {
            if self.is_irreversible(block) {
                return ReorgPlan::RefusedIrreversible { offending_block: *block };
            }
        }

        if disconnected.len() as u64 > MAX_REORG_DEPTH {
            return ReorgPlan::RefusedTooDeep { depth: disconnected.len() as u64 };
        }

        let connected: Vec<Hash256> = candidate_ancestry
            .iter()
            .take_while(|h| **h != common_ancestor)
            .copied()
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();

        debug!(
            common = hex::encode(common_ancestor),
            disconnected = disconnected.len(),
            connected = connected.len(),
            "computed reorg plan"
        );

        ReorgPlan::Reorg { common_ancestor, disconnected, connected }
    }

    /// `hash` and its selected-parent ancestry, nearest first.
    fn selected_parent_chain(&self, hash: Hash256) -> Vec<Hash256> {
        let mut chain = vec![hash];
        let mut current = hash;
        while let Some(node) = self.nodes.get(&current) {
            match node.header.selected_parent() {
                Some(parent) => {
                    chain.push(parent);
                    current = parent;
                }
                None => break,
            }
        }
        chain
    }

    pub fn stats(&self) -> DagStats {
        DagStats {
            total_blocks: self.nodes.len(),
            blue_blocks: self.blue_set.read().len(),
            tips: self.tips.read().len(),
            orphans: self.orphans.len(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DagStats {
    pub total_blocks: usize,
    pub blue_blocks: usize,
    pub tips: usize,
    pub orphans: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(parents: Vec<Hash256>, nonce: u64) -> BlockHeader {
        BlockHeader {
            version: 1,
            timestamp_ms: 0,
            height: parents.len() as u64,
            parent_hashes: parents,
            vdf_output: [0u8; 32],
            vdf_iterations: 1,
            heartbeat_root: [0u8; 32],
            tx_root: [0u8; 32],
            state_root: [0u8; 32],
            producer_id: [0u8; 32],
            nonce,
        }
    }

    #[test]
    fn genesis_insert_is_blue_and_tip() {
        let dag = PhantomDag::new(8);
        let genesis = header(vec![], 0);
        let ghash = genesis.hash();
        let outcome = dag.add_block(genesis, 0).unwrap();
        assert_eq!(outcome, InsertOutcome::Accepted { hash: ghash, blue: true });
        assert_eq!(dag.tips(), vec![ghash]);
    }

    #[test]
    fn linear_chain_stays_fully_blue() {
        let dag = PhantomDag::new(8);
        let genesis = header(vec![], 0);
        let ghash = genesis.hash();
        dag.add_block(genesis, 0).unwrap();

        let mut parent = ghash;
        for i in 1..10 {
            let h = header(vec![parent], i);
            let hash = h.hash();
            let outcome = dag.add_block(h, i as i64).unwrap();
            assert_eq!(outcome, InsertOutcome::Accepted { hash, blue: true });
            parent = hash;
        }
        assert_eq!(dag.main_chain().len(), 10);
    }

    #[test]
    fn orphan_is_released_once_parent_arrives() {
        let dag = PhantomDag::new(8);
        let genesis = header(vec![], 0);
        let ghash = genesis.hash();
        dag.add_block(genesis, 0).unwrap();

        let child = header(vec![ghash], 1);
        let grandchild_header = header(vec![child.hash()], 2);
        let grandchild_hash = grandchild_header.hash();

        let outcome = dag.add_block(grandchild_header, 0).unwrap();
        assert!(matches!(outcome, InsertOutcome::Orphaned { .. }));
        assert!(!dag.contains(&grandchild_hash));

        let outcome = dag.add_block(child, 1).unwrap();
        match outcome {
            InsertOutcome::AcceptedWithOrphans { released, .. } => {
                assert_eq!(released, vec![grandchild_hash]);
            }
            other => panic!("expected AcceptedWithOrphans, got {other:?}"),
        }
        assert!(dag.contains(&grandchild_hash));
    }

    #[test]
    fn bad_parent_count_rejected() {
        let dag = PhantomDag::new(8);
        let genesis = header(vec![], 0);
        dag.add_block(genesis, 0).unwrap();
        let too_many: Vec<Hash256> = (0..9).map(|i| [i as u8; 32]).collect();
        let h = header(too_many, 1);
        assert_eq!(dag.add_block(h, 0), Err(DagError::BadParentCount(9)));
    }

    #[test]
    fn reorg_within_depth_is_planned() {
        let dag = PhantomDag::new(8);
        let genesis = header(vec![], 0);
        let ghash = genesis.hash();
        dag.add_block(genesis, 0).unwrap();

        let a1 = header(vec![ghash], 1);
        let a1_hash = a1.hash();
        dag.add_block(a1, 1).unwrap();
        let a2 = header(vec![a1_hash], 2);
        let a2_hash = a2.hash();
        dag.add_block(a2, 2).unwrap();

        let b1 = header(vec![ghash], 3);
        let b1_hash = b1.hash();
        dag.add_block(b1, 3).unwrap();

        let plan = dag.compute_reorg(&a2_hash, &b1_hash);
        match plan {
            ReorgPlan::Reorg { common_ancestor, disconnected, connected } => {
                assert_eq!(common_ancestor, ghash);
                assert_eq!(disconnected, vec![a2_hash, a1_hash]);
                assert_eq!(connected, vec![b1_hash]);
            }
            other => panic!("expected Reorg, got {other:?}"),
        }
    }

    #[test]
    fn reorg_disconnecting_irreversible_block_is_refused() {
        let dag = PhantomDag::new(8);
        let genesis = header(vec![], 0);
        let ghash = genesis.hash();
        dag.add_block(genesis, 0).unwrap();

        let a1 = header(vec![ghash], 1);
        let a1_hash = a1.hash();
        dag.add_block(a1, 1).unwrap();
        dag.mark_irreversible(a1_hash);

        let b1 = header(vec![ghash], 2);
        let b1_hash = b1.hash();
        dag.add_block(b1, 2).unwrap();

        let plan = dag.compute_reorg(&a1_hash, &b1_hash);
        assert_eq!(plan, ReorgPlan::RefusedIrreversible { offending_block: a1_hash });
    }
}
