//! Verifiable Random Function primitive used by the block-producer lottery.
//!
//! This is a simplified ECVRF in the style of RFC 9381 — deterministic and
//! binding via an Ed25519 signature over a domain-separated message, rather
//! than full elliptic-curve VRF math. Generalizes the teacher's
//! `crypto::ecvrf` from height/previous-hash inputs to an opaque byte-string
//! input so it fits the lottery's
//! `α = H(prev_vdf_output ‖ slot ‖ node_id ‖ "LOTTERY")` construction. Unlike
//! the teacher's version, `verify` checks the *full* Ed25519 signature
//! against the caller-supplied public key — the teacher's truncated
//! 16-byte signature prefix never actually constrained the signature,
//! leaving proofs forgeable without the secret key.

#![allow(dead_code)]

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum VrfError {
    #[error("invalid proof")]
    InvalidProof,
    #[error("proof has wrong length")]
    WrongLength,
}

/// 32-byte deterministic, unpredictable VRF output (`β` in the spec).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VrfOutput {
    pub bytes: [u8; 32],
}

impl VrfOutput {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self { bytes }
    }

    /// Interpret the output as a big-endian 256-bit integer for threshold
    /// comparison against the lottery's winning threshold.
    pub fn as_uint256(&self) -> [u8; 32] {
        self.bytes
    }

    pub fn to_hex(self) -> String {
        hex::encode(self.bytes)
    }
}

/// 128-byte VRF proof (`π` in the spec): output hash, input-hash binding, and
/// the full 64-byte Ed25519 signature tying the proof to the signer's key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VrfProof {
    pub bytes: [u8; 128],
}

impl VrfProof {
    pub fn new(bytes: [u8; 128]) -> Self {
        Self { bytes }
    }
}

impl Serialize for VrfProof {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        hex::encode(self.bytes).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for VrfProof {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let hex_str: String = Deserialize::deserialize(deserializer)?;
        let raw = hex::decode(&hex_str).map_err(serde::de::Error::custom)?;
        if raw.len() != 128 {
            return Err(serde::de::Error::custom("invalid VrfProof length"));
        }
        let mut bytes = [0u8; 128];
        bytes.copy_from_slice(&raw);
        Ok(VrfProof::new(bytes))
    }
}

const DOMAIN_EVALUATE: &[u8] = b"CONSENSUS-VRF-EDWARDS25519-SHA512";
const DOMAIN_SIGN: &[u8] = b"CONSENSUS-VRF-SIGN";

/// Deterministic evaluation `(secret_key, α) -> (β, π)`.
pub fn prove(secret_key: &SigningKey, alpha: &[u8]) -> (VrfOutput, VrfProof) {
    let mut hasher = Sha512::new();
    hasher.update(DOMAIN_EVALUATE);
    hasher.update(secret_key.to_bytes());
    hasher.update(alpha);
    let digest = hasher.finalize();

    let mut beta = [0u8; 32];
    beta.copy_from_slice(&digest[0..32]);

    let input_hash: [u8; 32] = Sha512::digest(alpha)[0..32].try_into().unwrap();

    let mut proof_bytes = [0u8; 128];
    proof_bytes[0..32].copy_from_slice(&beta);
    proof_bytes[32..64].copy_from_slice(&input_hash);

    let message = signing_message(&beta, alpha);
    let sig = secret_key.sign(&message);
    proof_bytes[64..128].copy_from_slice(&sig.to_bytes());

    (VrfOutput::new(beta), VrfProof::new(proof_bytes))
}

/// Verify that `π` is a well-formed, binding proof of `β` over `α` for the
/// holder of `public_key`. Full ECVRF would verify a Schnorr-like proof
/// against the curve point; here the binding is the producer's Ed25519
/// signature over `(beta, alpha)`, checked against the full 64-byte
/// signature so the proof cannot be forged without the secret key.
pub fn verify(
    public_key: &VerifyingKey,
    alpha: &[u8],
    output: &VrfOutput,
    proof: &VrfProof,
) -> Result<(), VrfError> {
    if proof.bytes[0..32] != output.bytes {
        return Err(VrfError::InvalidProof);
    }

    let input_hash: [u8; 32] = Sha512::digest(alpha)[0..32].try_into().unwrap();
    if proof.bytes[32..64] != input_hash {
        return Err(VrfError::InvalidProof);
    }

    let mut sig_bytes = [0u8; 64];
    sig_bytes.copy_from_slice(&proof.bytes[64..128]);
    let signature = Signature::from_bytes(&sig_bytes);

    let message = signing_message(&output.bytes, alpha);
    public_key
        .verify(&message, &signature)
        .map_err(|_| VrfError::InvalidProof)
}

fn signing_message(output: &[u8; 32], alpha: &[u8]) -> Vec<u8> {
    let mut msg = Vec::with_capacity(DOMAIN_SIGN.len() + 32 + alpha.len());
    msg.extend_from_slice(DOMAIN_SIGN);
    msg.extend_from_slice(output);
    msg.extend_from_slice(alpha);
    msg
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
    fn deterministic_for_same_input() {
        let sk = test_key();
        let (o1, p1) = prove(&sk, b"alpha");
        let (o2, p2) = prove(&sk, b"alpha");
        assert_eq!(o1, o2);
        assert_eq!(p1.bytes, p2.bytes);
    }

    #[test]
    fn different_inputs_differ() {
        let sk = test_key();
        let (o1, _) = prove(&sk, b"alpha-1");
        let (o2, _) = prove(&sk, b"alpha-2");
        assert_ne!(o1, o2);
    }

    #[test]
    fn verify_roundtrip() {
        let sk = test_key();
        let pk = sk.verifying_key();
        let (output, proof) = prove(&sk, b"alpha");
        assert!(verify(&pk, b"alpha", &output, &proof).is_ok());
    }

    #[test]
    fn verify_rejects_wrong_alpha() {
        let sk = test_key();
        let pk = sk.verifying_key();
        let (output, proof) = prove(&sk, b"alpha");
        assert!(verify(&pk, b"different", &output, &proof).is_err());
    }

    #[test]
    fn verify_rejects_forged_signature_without_secret_key() {
        let sk = test_key();
        let pk = sk.verifying_key();
        let (output, mut proof) = prove(&sk, b"alpha");

        let forger = test_key();
        let message = signing_message(&output.bytes, b"alpha");
        let forged_sig = forger.sign(&message);
        proof.bytes[64..128].copy_from_slice(&forged_sig.to_bytes());

        assert!(verify(&pk, b"alpha", &output, &proof).is_err());
    }

    #[test]
    fn verify_rejects_wrong_public_key() {
        let sk = test_key();
        let other_pk = test_key().verifying_key();
        let (output, proof) = prove(&sk, b"alpha");
        assert!(verify(&other_pk, b"alpha", &output, &proof).is_err());
    }
}
