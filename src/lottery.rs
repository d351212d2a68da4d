//! Block-producer lottery / eligibility, grounded on the teacher's
//! `crypto::ecvrf` + `block::vrf` wiring (VRF evaluation feeding a sortition
//! check) and cross-checked against the original implementation's
//! `consensus/eligibility.py`, which uses the identical threshold algorithm.

use crate::crypto::vrf::{self, VrfOutput, VrfProof};
use crate::types::{Hash256, ParticipationTier};
use ed25519_dalek::{SigningKey, VerifyingKey};
use sha2::{Digest, Sha256};

/// A publicly verifiable proof that a node won the block-producer lottery
/// for a given slot.
#[derive(Clone, Debug)]
pub struct EligibilityProof {
    pub slot: u64,
    pub output: VrfOutput,
    pub proof: VrfProof,
    pub tier: ParticipationTier,
    pub score: f64,
}

/// `α = H(prev_vdf_output ‖ slot ‖ node_id ‖ "LOTTERY")`.
fn lottery_input(prev_vdf_output: &Hash256, slot: u64, node_id: &Hash256) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(prev_vdf_output);
    hasher.update(slot.to_le_bytes());
    hasher.update(node_id);
    hasher.update(crate::constants::lottery::LOTTERY_DOMAIN_TAG);
    hasher.finalize().to_vec()
}

/// `threshold = floor(2^256 * tier_weight * score / total_score)`, returned
/// as a big-endian 256-bit integer so it can be compared byte-for-byte
/// against a VRF output.
///
/// Expands the ratio digit-by-digit in base 256 rather than pulling in a
/// bignum dependency the teacher's stack doesn't carry; `f64` precision is
/// more than adequate for a threshold compared only against hash outputs.
fn threshold_bytes(tier: ParticipationTier, score: f64, total_score: f64) -> [u8; 32] {
    let mut frac = if total_score <= 0.0 {
        0.0
    } else {
        (tier.weight() * (score / total_score)).clamp(0.0, 1.0)
    };

    let mut bytes = [0u8; 32];
    for b in bytes.iter_mut() {
        frac *= 256.0;
        let digit = frac.floor();
        *b = digit as u8;
        frac -= digit;
    }
    bytes
}

/// Evaluate the lottery for one node/slot. Returns `None` if the node is not
/// a winner for this slot.
pub fn check(
    signing_key: &SigningKey,
    node_id: &Hash256,
    prev_vdf_output: &Hash256,
    slot: u64,
    tier: ParticipationTier,
    score: f64,
    total_score: f64,
) -> Option<EligibilityProof> {
    let alpha = lottery_input(prev_vdf_output, slot, node_id);
    let (output, proof) = vrf::prove(signing_key, &alpha);

    let threshold = threshold_bytes(tier, score, total_score);
    if output.as_uint256() < threshold {
        Some(EligibilityProof {
            slot,
            output,
            proof,
            tier,
            score,
        })
    } else {
        None
    }
}

/// Verify a claimed eligibility proof against the producer's public key and
/// the public chain state (previous VDF output, total network score).
pub fn verify(
    eligibility: &EligibilityProof,
    verifying_key: &VerifyingKey,
    node_id: &Hash256,
    prev_vdf_output: &Hash256,
    total_score: f64,
) -> bool {
    let alpha = lottery_input(prev_vdf_output, eligibility.slot, node_id);
    if vrf::verify(verifying_key, &alpha, &eligibility.output, &eligibility.proof).is_err() {
        return false;
    }

    let threshold = threshold_bytes(eligibility.tier, eligibility.score, total_score);
    eligibility.output.as_uint256() < threshold
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::RngCore;

    fn test_key() -> SigningKey {
        let mut seed = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut seed);
        SigningKey::from_bytes(&seed)
    }

    #[test]
    fn check_then_verify_roundtrip() {
        let sk = test_key();
        let pk = sk.verifying_key();
        let node_id = [9u8; 32];
        let prev = [1u8; 32];

        // A high score relative to total guarantees a win with overwhelming
        // probability; loop a few slots to find one deterministically.
        let mut won = None;
        for slot in 0..64 {
            if let Some(e) = check(&sk, &node_id, &prev, slot, ParticipationTier::Tier1, 999.0, 1000.0) {
                won = Some(e);
                break;
            }
        }
        let eligibility = won.expect("expected at least one winning slot out of 64 with score 999/1000");
        assert!(verify(&eligibility, &pk, &node_id, &prev, 1000.0));
    }

    #[test]
    fn zero_score_never_wins() {
        let sk = test_key();
        let node_id = [9u8; 32];
        let prev = [1u8; 32];
        for slot in 0..32 {
            assert!(check(&sk, &node_id, &prev, slot, ParticipationTier::Tier3, 0.0, 1000.0).is_none());
        }
    }

    #[test]
    fn different_slots_give_different_alpha() {
        assert_ne!(
            lottery_input(&[0u8; 32], 42, &[1u8; 32]),
            lottery_input(&[0u8; 32], 43, &[1u8; 32]),
        );
    }
}
