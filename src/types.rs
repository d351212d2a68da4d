//! Core data types shared across the consensus kernel.

use serde::{Deserialize, Serialize};

pub type Hash256 = [u8; 32];
pub type Signature = [u8; 64];

/// Fixed-weight participation class used by the lottery and reward routing.
/// Replaces the teacher's collateral-denominated `MasternodeTier` — there is
/// no collateral or governance voting in this kernel, only a fixed sortition
/// weight per tier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParticipationTier {
    Tier1,
    Tier2,
    Tier3,
}

impl ParticipationTier {
    /// Fixed sortition weight; the three tiers sum to 1.0.
    pub fn weight(&self) -> f64 {
        use crate::constants::lottery::{TIER1_WEIGHT, TIER2_WEIGHT, TIER3_WEIGHT};
        match self {
            ParticipationTier::Tier1 => TIER1_WEIGHT,
            ParticipationTier::Tier2 => TIER2_WEIGHT,
            ParticipationTier::Tier3 => TIER3_WEIGHT,
        }
    }
}

/// Progressive finality state of a block, driven by accumulated VDF
/// checkpoints. Transitions are one-way: PENDING -> TENTATIVE -> CONFIRMED
/// -> FINALIZED -> IRREVERSIBLE.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FinalityState {
    Pending,
    Tentative,
    Confirmed,
    Finalized,
    Irreversible,
}

impl FinalityState {
    /// Derive the finality state implied by an accumulated checkpoint count.
    pub fn from_checkpoint_count(count: u64) -> Self {
        use crate::constants::finality::{
            CONFIRMED_THRESHOLD, FINALIZED_THRESHOLD, TENTATIVE_THRESHOLD,
        };
        if count >= FINALIZED_THRESHOLD {
            FinalityState::Finalized
        } else if count >= CONFIRMED_THRESHOLD {
            FinalityState::Confirmed
        } else if count >= TENTATIVE_THRESHOLD {
            FinalityState::Tentative
        } else {
            FinalityState::Pending
        }
    }

    /// Whether a block in this state can ever be disconnected by a reorg.
    pub fn is_irreversible(&self) -> bool {
        matches!(self, FinalityState::Irreversible)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_weights_sum_to_one() {
        let sum = ParticipationTier::Tier1.weight()
            + ParticipationTier::Tier2.weight()
            + ParticipationTier::Tier3.weight();
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn finality_thresholds_are_monotone() {
        assert_eq!(FinalityState::from_checkpoint_count(0), FinalityState::Pending);
        assert_eq!(FinalityState::from_checkpoint_count(1), FinalityState::Tentative);
        assert_eq!(FinalityState::from_checkpoint_count(99), FinalityState::Tentative);
        assert_eq!(FinalityState::from_checkpoint_count(100), FinalityState::Confirmed);
        assert_eq!(FinalityState::from_checkpoint_count(999), FinalityState::Confirmed);
        assert_eq!(FinalityState::from_checkpoint_count(1000), FinalityState::Finalized);
    }
}
