//! Progressive finality accumulator.
//!
//! Grounded on `original_source/.../core/vdf_accumulator.py`'s
//! `VDFAccumulator`: a per-block accumulated-checkpoint state, proof
//! chaining verified against either the block's own VDF output or the last
//! accepted checkpoint, and a `compare_finality`/`select_chain_tip` fork
//! choice. The original's four levels (NONE/SOFT/MEDIUM/HARD) are widened to
//! the kernel's five-state machine (`types::FinalityState`, adding an
//! IRREVERSIBLE terminal state the original has no analogue for — the DAG's
//! `PhantomDag::mark_irreversible` is the collaborator that promotes into
//! it). Concurrency style matches `reputation.rs`'s `DashMap` registry.

#![allow(dead_code)]

use crate::constants::finality::{CONFIRMED_THRESHOLD, FINALIZED_THRESHOLD, TENTATIVE_THRESHOLD};
use crate::types::{FinalityState, Hash256};
use crate::vdf::{self, VdfProof};
use dashmap::DashMap;
use tracing::{debug, info, warn};

/// Per-block accumulated finality state.
#[derive(Clone, Debug)]
pub struct AccumulatedState {
    pub block_hash: Hash256,
    pub initial_vdf_output: Hash256,
    pub accumulated_checkpoints: u64,
    pub last_checkpoint_output: Hash256,
    pub last_checkpoint_time_ms: i64,
    /// Set once the DAG orderer has promoted this block past FINALIZED.
    /// Terminal: once true, `finality_state()` always returns `Irreversible`
    /// regardless of checkpoint count.
    pub irreversible: bool,
}

impl AccumulatedState {
    pub fn finality_state(&self) -> FinalityState {
        if self.irreversible {
            return FinalityState::Irreversible;
        }
        FinalityState::from_checkpoint_count(self.accumulated_checkpoints)
    }

    /// Seconds of checkpoint accumulation remaining until FINALIZED, assuming
    /// one checkpoint per `seconds_per_checkpoint`.
    pub fn estimated_seconds_to_finalized(&self, seconds_per_checkpoint: f64) -> f64 {
        let remaining = FINALIZED_THRESHOLD.saturating_sub(self.accumulated_checkpoints);
        remaining as f64 * seconds_per_checkpoint
    }
}

/// Outcome of `add_checkpoint`: either the new state, or the specific reason
/// the checkpoint was rejected. Rejection is an expected, recoverable result
/// under network asynchrony and adversarial input, not an error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CheckpointOutcome {
    Accepted { new_state: FinalityState, promoted: bool },
    UnknownBlock,
    ChainMismatch,
    InvalidProof,
}

/// Tracks accumulated VDF checkpoints per block and derives each block's
/// progressive finality state.
pub struct FinalityAccumulator {
    states: DashMap<Hash256, AccumulatedState>,
    sample_count: usize,
}

impl FinalityAccumulator {
    pub fn new(sample_count: usize) -> Self {
        Self {
            states: DashMap::new(),
            sample_count,
        }
    }

    /// Register a newly linked block for finality tracking. Idempotent:
    /// re-registering an already-known block is a no-op returning its
    /// existing state.
    pub fn register_block(&self, block_hash: Hash256, initial_vdf_output: Hash256, now_ms: i64) -> AccumulatedState {
        if let Some(existing) = self.states.get(&block_hash) {
            return existing.clone();
        }
        let state = AccumulatedState {
            block_hash,
            initial_vdf_output,
            accumulated_checkpoints: 0,
            last_checkpoint_output: initial_vdf_output,
            last_checkpoint_time_ms: now_ms,
            irreversible: false,
        };
        self.states.insert(block_hash, state.clone());
        debug!(block = hex::encode(block_hash), "registered block for finality tracking");
        state
    }

    /// Verify and apply a VDF checkpoint proof to a registered block. The
    /// proof must chain from the block's initial VDF output (first
    /// checkpoint) or from the last accepted checkpoint's output
    /// (subsequent ones), and must itself verify.
    pub fn add_checkpoint(&self, block_hash: Hash256, proof: &VdfProof, now_ms: i64) -> CheckpointOutcome {
        let Some(mut entry) = self.states.get_mut(&block_hash) else {
            return CheckpointOutcome::UnknownBlock;
        };

        let expected_input = entry.last_checkpoint_output;
        if proof.input != expected_input {
            warn!(
                block = hex::encode(block_hash),
                "VDF checkpoint does not chain from the expected prior output"
            );
            return CheckpointOutcome::ChainMismatch;
        }

        match vdf::verify_proof(proof, self.sample_count) {
            Ok(true) => {}
            _ => {
                warn!(block = hex::encode(block_hash), "VDF checkpoint proof failed verification");
                return CheckpointOutcome::InvalidProof;
            }
        }

        let old_state = entry.finality_state();
        entry.accumulated_checkpoints += 1;
        entry.last_checkpoint_output = proof.output;
        entry.last_checkpoint_time_ms = now_ms;
        let new_state = entry.finality_state();
        let promoted = new_state != old_state;

        if promoted {
            info!(
                block = hex::encode(block_hash),
                checkpoints = entry.accumulated_checkpoints,
                state = ?new_state,
                "block advanced finality state"
            );
        }

        CheckpointOutcome::Accepted { new_state, promoted }
    }

    pub fn finality_of(&self, block_hash: &Hash256) -> FinalityState {
        self.states
            .get(block_hash)
            .map(|s| s.finality_state())
            .unwrap_or(FinalityState::Pending)
    }

    pub fn state_of(&self, block_hash: &Hash256) -> Option<AccumulatedState> {
        self.states.get(block_hash).map(|s| s.clone())
    }

    /// Externally promote a block to IRREVERSIBLE. Only the DAG orderer
    /// decides when a FINALIZED block has accumulated enough blue
    /// descendants to cross into this terminal state; this accumulator only
    /// records the fact once told.
    pub fn mark_irreversible(&self, block_hash: Hash256) {
        if let Some(mut entry) = self.states.get_mut(&block_hash) {
            entry.accumulated_checkpoints = entry.accumulated_checkpoints.max(FINALIZED_THRESHOLD);
            entry.irreversible = true;
        }
    }

    /// Compare two blocks' finality progress: positive if `a` is ahead,
    /// negative if `b` is ahead, zero if tied.
    pub fn compare_finality(&self, a: &Hash256, b: &Hash256) -> i32 {
        let state_a = self.finality_of(a);
        let state_b = self.finality_of(b);
        if state_a != state_b {
            return if state_a > state_b { 1 } else { -1 };
        }
        let count_a = self.states.get(a).map(|s| s.accumulated_checkpoints).unwrap_or(0);
        let count_b = self.states.get(b).map(|s| s.accumulated_checkpoints).unwrap_or(0);
        count_a.cmp(&count_b) as i32
    }

    /// Select the candidate with the most accumulated finality, per
    /// "the chain with the most accumulated VDF work is canonical".
    pub fn select_tip(&self, candidates: &[Hash256]) -> Option<Hash256> {
        candidates
            .iter()
            .copied()
            .reduce(|best, candidate| if self.compare_finality(&candidate, &best) > 0 { candidate } else { best })
    }

    /// Drop tracked state for blocks no longer worth tracking (e.g.
    /// disconnected by a reorg, or pruned after finalization depth).
    pub fn prune_except(&self, keep: &std::collections::HashSet<Hash256>) -> usize {
        let to_remove: Vec<Hash256> = self
            .states
            .iter()
            .map(|e| *e.key())
            .filter(|h| !keep.contains(h))
            .collect();
        for hash in &to_remove {
            self.states.remove(hash);
        }
        to_remove.len()
    }

    pub fn stats(&self) -> FinalityStats {
        let mut stats = FinalityStats::default();
        for entry in self.states.iter() {
            match entry.finality_state() {
                FinalityState::Pending => stats.pending += 1,
                FinalityState::Tentative => stats.tentative += 1,
                FinalityState::Confirmed => stats.confirmed += 1,
                FinalityState::Finalized => stats.finalized += 1,
                FinalityState::Irreversible => stats.irreversible += 1,
            }
        }
        stats
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FinalityStats {
    pub pending: usize,
    pub tentative: usize,
    pub confirmed: usize,
    pub finalized: usize,
    pub irreversible: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vdf;

    fn checkpoint_proof(input: Hash256) -> VdfProof {
        let out = vdf::compute(input, crate::constants::vdf::CHECKPOINT_INTERVAL).unwrap();
        vdf::create_proof(&out)
    }

    #[test]
    fn fresh_block_is_pending() {
        let acc = FinalityAccumulator::new(3);
        let hash = [1u8; 32];
        acc.register_block(hash, [0u8; 32], 0);
        assert_eq!(acc.finality_of(&hash), FinalityState::Pending);
    }

    #[test]
    fn sequential_checkpoints_advance_state_monotonically() {
        let acc = FinalityAccumulator::new(3);
        let hash = [2u8; 32];
        let genesis_output = [9u8; 32];
        acc.register_block(hash, genesis_output, 0);

        let proof1 = checkpoint_proof(genesis_output);
        let outcome = acc.add_checkpoint(hash, &proof1, 1);
        assert_eq!(outcome, CheckpointOutcome::Accepted { new_state: FinalityState::Tentative, promoted: true });

        let proof2 = checkpoint_proof(proof1.output);
        let outcome = acc.add_checkpoint(hash, &proof2, 2);
        assert_eq!(outcome, CheckpointOutcome::Accepted { new_state: FinalityState::Tentative, promoted: false });

        assert_eq!(acc.state_of(&hash).unwrap().accumulated_checkpoints, 2);
    }

    #[test]
    fn non_chaining_proof_is_rejected() {
        let acc = FinalityAccumulator::new(3);
        let hash = [3u8; 32];
        acc.register_block(hash, [9u8; 32], 0);

        let unrelated = checkpoint_proof([1u8; 32]);
        assert_eq!(acc.add_checkpoint(hash, &unrelated, 1), CheckpointOutcome::ChainMismatch);
    }

    #[test]
    fn checkpoint_on_unknown_block_is_rejected() {
        let acc = FinalityAccumulator::new(3);
        let proof = checkpoint_proof([0u8; 32]);
        assert_eq!(acc.add_checkpoint([5u8; 32], &proof, 0), CheckpointOutcome::UnknownBlock);
    }

    #[test]
    fn reaching_confirmed_threshold_promotes() {
        let acc = FinalityAccumulator::new(3);
        let hash = [4u8; 32];
        let mut output = [9u8; 32];
        acc.register_block(hash, output, 0);

        for i in 0..CONFIRMED_THRESHOLD {
            let proof = checkpoint_proof(output);
            output = proof.output;
            let outcome = acc.add_checkpoint(hash, &proof, i as i64);
            if i + 1 == TENTATIVE_THRESHOLD {
                assert_eq!(outcome, CheckpointOutcome::Accepted { new_state: FinalityState::Tentative, promoted: true });
            }
        }
        assert_eq!(acc.finality_of(&hash), FinalityState::Confirmed);
    }

    #[test]
    fn mark_irreversible_is_terminal_and_overrides_checkpoint_count() {
        let acc = FinalityAccumulator::new(3);
        let hash = [6u8; 32];
        acc.register_block(hash, [9u8; 32], 0);
        assert_eq!(acc.finality_of(&hash), FinalityState::Pending);

        acc.mark_irreversible(hash);
        assert_eq!(acc.finality_of(&hash), FinalityState::Irreversible);
        assert_eq!(acc.state_of(&hash).unwrap().accumulated_checkpoints, FINALIZED_THRESHOLD);
    }

    #[test]
    fn select_tip_prefers_more_finality() {
        let acc = FinalityAccumulator::new(3);
        let a = [10u8; 32];
        let b = [11u8; 32];
        acc.register_block(a, [1u8; 32], 0);
        acc.register_block(b, [2u8; 32], 0);

        let proof = checkpoint_proof([1u8; 32]);
        acc.add_checkpoint(a, &proof, 1);

        assert_eq!(acc.select_tip(&[a, b]), Some(a));
    }
}
