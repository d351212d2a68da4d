//! Block header and body types for the DAG consensus kernel.
//!
//! Supersedes the teacher's single-parent `BlockHeader` (`previous_hash:
//! Hash256`) with the genuine multi-parent header the DAG/PHANTOM orderer
//! requires. The merkle-root helper is carried over unchanged from the
//! teacher's `calculate_merkle_root` (`src/block/types.rs` before this
//! rewrite), generalized from `&[Transaction]` to any pre-hashed byte blob
//! since transaction semantics are out of scope here.

use crate::types::{Hash256, ParticipationTier, Signature};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Build a binary merkle tree over already-hashed 32-byte leaves, duplicating
/// the last leaf on odd levels. Returns the zero hash for an empty input.
pub fn merkle_root(mut hashes: Vec<Hash256>) -> Hash256 {
    if hashes.is_empty() {
        return [0u8; 32];
    }
    while hashes.len() > 1 {
        if hashes.len() % 2 == 1 {
            hashes.push(*hashes.last().unwrap());
        }
        hashes = hashes
            .chunks(2)
            .map(|pair| {
                let mut hasher = Sha256::new();
                hasher.update(pair[0]);
                hasher.update(pair[1]);
                hasher.finalize().into()
            })
            .collect();
    }
    hashes[0]
}

/// Merkle root over the opaque, pre-serialized transaction collection.
/// Transaction *content* is an external collaborator's concern; only the
/// root over the raw bytes is consensus-critical here.
pub fn tx_root(transactions: &[Vec<u8>]) -> Hash256 {
    merkle_root(transactions.iter().map(|tx| Sha256::digest(tx).into()).collect())
}

/// A single heartbeat record. Modeled as a tagged variant per the
/// "dynamic dispatch over heartbeat variants" redesign flag, rather than a
/// trait object: a `Full` heartbeat carries a witness count and signature,
/// a `Light` heartbeat is the minimal liveness ping. Both project onto the
/// same `HeartbeatView`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum HeartbeatRecord {
    Full {
        node_id: Hash256,
        source_tier: ParticipationTier,
        timestamp_ms: i64,
        prev_hash: Hash256,
        witness_count: u32,
        signature: Signature,
    },
    Light {
        node_id: Hash256,
        source_tier: ParticipationTier,
        timestamp_ms: i64,
        prev_hash: Hash256,
    },
}

/// The common view every heartbeat variant exposes, regardless of kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeartbeatView {
    pub node_id: Hash256,
    pub source_tier: ParticipationTier,
    pub timestamp_ms: i64,
    pub prev_hash: Hash256,
}

impl HeartbeatRecord {
    pub fn view(&self) -> HeartbeatView {
        match self {
            HeartbeatRecord::Full { node_id, source_tier, timestamp_ms, prev_hash, .. } => {
                HeartbeatView { node_id: *node_id, source_tier: *source_tier, timestamp_ms: *timestamp_ms, prev_hash: *prev_hash }
            }
            HeartbeatRecord::Light { node_id, source_tier, timestamp_ms, prev_hash } => {
                HeartbeatView { node_id: *node_id, source_tier: *source_tier, timestamp_ms: *timestamp_ms, prev_hash: *prev_hash }
            }
        }
    }

    /// One-byte discriminator used by the wire encoder, per the tagged-
    /// variant redesign flag.
    pub fn discriminant(&self) -> u8 {
        match self {
            HeartbeatRecord::Full { .. } => 0x00,
            HeartbeatRecord::Light { .. } => 0x01,
        }
    }

    fn digest(&self) -> Hash256 {
        let encoded = bincode::serialize(self).expect("heartbeat record always serializes");
        Sha256::digest(encoded).into()
    }
}

pub fn heartbeat_root(heartbeats: &[HeartbeatRecord]) -> Hash256 {
    merkle_root(heartbeats.iter().map(HeartbeatRecord::digest).collect())
}

/// Fixed-shape, consensus-critical block header. Every field participates in
/// the canonical block hash and the wire encoding in `super::wire`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlockHeader {
    pub version: u8,
    pub timestamp_ms: i64,
    pub height: u64,
    /// 1..=8 parents; only the unique genesis carries zero. First entry is
    /// the *selected* parent used for VDF chaining and main-chain extraction.
    pub parent_hashes: Vec<Hash256>,
    /// The VDF checkpoint produced on top of the selected parent's output.
    pub vdf_output: Hash256,
    /// Iterations executed between the selected parent and this block.
    pub vdf_iterations: u64,
    pub heartbeat_root: Hash256,
    pub tx_root: Hash256,
    /// Post-application state commitment, opaque to this crate.
    pub state_root: Hash256,
    pub producer_id: Hash256,
    pub nonce: u64,
}

impl BlockHeader {
    /// Genesis has no parents and no VDF chaining requirement; its
    /// `vdf_output` is the network's fixed genesis seed.
    pub fn is_genesis(&self) -> bool {
        self.parent_hashes.is_empty()
    }

    /// The block's selected parent (chain-extension parent), if any.
    pub fn selected_parent(&self) -> Option<Hash256> {
        self.parent_hashes.first().copied()
    }

    /// Canonical block hash: SHA-256 over the exact wire encoding so hash
    /// identity and wire identity never diverge.
    pub fn hash(&self) -> Hash256 {
        Sha256::digest(super::wire::encode_header(self)).into()
    }
}

/// Header + body + producer signature. The canonical block hash is the
/// header hash; the body's roots are checked against it during validation.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Block {
    pub header: BlockHeader,
    pub heartbeats: Vec<HeartbeatRecord>,
    /// Opaque, pre-serialized transaction bytes. Transaction execution is an
    /// external collaborator's concern; this crate only commits to their
    /// merkle root.
    pub transactions: Vec<Vec<u8>>,
    pub signature: Signature,
}

impl Block {
    pub fn hash(&self) -> Hash256 {
        self.header.hash()
    }

    /// Check that the header's `heartbeat_root`/`tx_root` match the body.
    /// A *structural* check per §7 — signature and VDF validity are
    /// handled by their respective subsystems.
    pub fn roots_match(&self) -> bool {
        self.header.heartbeat_root == heartbeat_root(&self.heartbeats)
            && self.header.tx_root == tx_root(&self.transactions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header() -> BlockHeader {
        BlockHeader {
            version: 1,
            timestamp_ms: 1_700_000_000_000,
            height: 1,
            parent_hashes: vec![[1u8; 32]],
            vdf_output: [2u8; 32],
            vdf_iterations: 1 << 24,
            heartbeat_root: [0u8; 32],
            tx_root: [0u8; 32],
            state_root: [3u8; 32],
            producer_id: [4u8; 32],
            nonce: 7,
        }
    }

    #[test]
    fn genesis_has_no_parents() {
        let mut h = sample_header();
        h.parent_hashes.clear();
        assert!(h.is_genesis());
        assert_eq!(h.selected_parent(), None);
    }

    #[test]
    fn hash_changes_with_nonce() {
        let a = sample_header();
        let mut b = sample_header();
        b.nonce = 8;
        assert_ne!(a.hash(), b.hash());
    }

    #[test]
    fn heartbeat_variants_share_a_view() {
        let full = HeartbeatRecord::Full {
            node_id: [9u8; 32],
            source_tier: ParticipationTier::Tier1,
            timestamp_ms: 10,
            prev_hash: [0u8; 32],
            witness_count: 3,
            signature: [0u8; 64],
        };
        let light = HeartbeatRecord::Light {
            node_id: [9u8; 32],
            source_tier: ParticipationTier::Tier1,
            timestamp_ms: 10,
            prev_hash: [0u8; 32],
        };
        assert_eq!(full.view(), light.view());
        assert_ne!(full.discriminant(), light.discriminant());
    }

    #[test]
    fn empty_merkle_root_is_zero() {
        assert_eq!(merkle_root(vec![]), [0u8; 32]);
    }

    #[test]
    fn single_leaf_merkle_root_is_itself() {
        assert_eq!(merkle_root(vec![[5u8; 32]]), [5u8; 32]);
    }
}
