//! Global protocol constants for the consensus kernel.
//!
//! Centralizes the magic numbers every node must agree on bit-for-bit.
//! Grouped into nested modules by subsystem, mirroring the teacher's
//! `constants::blockchain` namespacing convention.

/// VDF engine constants.
pub mod vdf {
    /// Iterations per checkpoint "unit" used by the finality accumulator.
    pub const VDF_BASE_ITERATIONS: u64 = 1 << 24;

    /// Iterations between recorded checkpoints inside a single VDF run.
    pub const CHECKPOINT_INTERVAL: u64 = 1_000;

    /// Minimum iterations accepted for a single `compute` call.
    pub const T_MIN: u64 = CHECKPOINT_INTERVAL;

    /// Maximum iterations accepted for a single `compute` call.
    pub const T_MAX: u64 = VDF_BASE_ITERATIONS * 16;

    /// Default number of segments sampled by `verify_sampled`.
    pub const DEFAULT_SAMPLE_COUNT: usize = 5;

    /// 4-byte magic prefix for the serialized VDF proof format.
    pub const PROOF_MAGIC: [u8; 4] = *b"VDFP";

    /// Discriminator byte: sampled-checkpoint proof (the only implemented kind).
    pub const PROOF_KIND_SAMPLED: u8 = 0x00;

    /// Discriminator byte reserved for a future STARK proof. Not implemented;
    /// `verify_proof` rejects it outright rather than silently falling back.
    pub const PROOF_KIND_STARK_RESERVED: u8 = 0x01;
}

/// Block DAG and PHANTOM ordering constants.
pub mod dag {
    /// Maximum number of parent references a non-genesis block may carry.
    pub const MAX_PARENTS: usize = 8;

    /// PHANTOM anticone-size threshold k.
    pub const PHANTOM_K: usize = 8;

    /// Reorgs disconnecting more than this many main-chain blocks are refused.
    pub const MAX_REORG_DEPTH: u64 = 100;

    /// Bound on the number of blocks held in the orphan pool at once.
    pub const MAX_ORPHAN_POOL_SIZE: usize = 10_000;

    /// Orphans older than this are evicted even if their parent never arrives.
    pub const ORPHAN_EXPIRY_SECS: i64 = 3_600;
}

/// Finality accumulator constants.
pub mod finality {
    /// Checkpoint counts at which a block's finality state advances.
    pub const TENTATIVE_THRESHOLD: u64 = 1;
    pub const CONFIRMED_THRESHOLD: u64 = 100;
    pub const FINALIZED_THRESHOLD: u64 = 1_000;
}

/// Lottery / eligibility constants.
pub mod lottery {
    /// Fixed participation-tier weights; must sum to 1.0.
    pub const TIER1_WEIGHT: f64 = 0.70;
    pub const TIER2_WEIGHT: f64 = 0.20;
    pub const TIER3_WEIGHT: f64 = 0.10;

    /// Domain-separation tag mixed into the lottery VRF input.
    pub const LOTTERY_DOMAIN_TAG: &[u8] = b"LOTTERY";
}

/// Five Fingers reputation constants.
pub mod reputation {
    pub const WEIGHT_TIME: f64 = 0.50;
    pub const WEIGHT_INTEGRITY: f64 = 0.20;
    pub const WEIGHT_STORAGE: f64 = 0.15;
    pub const WEIGHT_GEOGRAPHY: f64 = 0.10;
    pub const WEIGHT_HANDSHAKE: f64 = 0.05;

    /// Seconds of continuous uptime needed to saturate the TIME dimension.
    pub const K_TIME_SECONDS: u64 = 180 * 24 * 3600;

    /// Handshakes needed to saturate the HANDSHAKE dimension.
    pub const K_HANDSHAKES: u64 = 10;

    /// Integrity EMA half-life, in seconds (~1 week).
    pub const INTEGRITY_HALF_LIFE_SECS: f64 = 7.0 * 24.0 * 3600.0;

    /// Reputation multiplier bounds exposed to the lottery.
    pub const MULTIPLIER_MIN: f64 = 0.1;
    pub const MULTIPLIER_MAX: f64 = 2.0;

    /// Score multiplier applied while a profile is under penalty.
    pub const PENALTY_SCORE_FACTOR: f64 = 0.1;

    /// Penalty durations per offending event kind.
    pub const PENALTY_EQUIVOCATION_SECS: i64 = 180 * 24 * 3600;
    pub const PENALTY_VDF_INVALID_SECS: i64 = 30 * 24 * 3600;
    pub const PENALTY_VRF_INVALID_SECS: i64 = 14 * 24 * 3600;
    pub const PENALTY_SPAM_SECS: i64 = 7 * 24 * 3600;

    /// Profiles with no recorded event for this long are garbage collected,
    /// unless currently penalized.
    pub const PROFILE_EXPIRY_SECS: i64 = 365 * 24 * 3600;

    /// Event validation bounds.
    pub const MAX_EVENT_FUTURE_DRIFT_SECS: i64 = 2 * 3600;
    pub const MAX_EVENT_AGE_SECS: i64 = 24 * 3600;
    pub const MAX_HEIGHT_LOOKAHEAD: u64 = 10;
    pub const MAX_VOUCHES_PER_DAY: u32 = 20;

    /// Samples after which a dimension's confidence saturates to 1.0.
    pub const CONFIDENCE_SATURATION_SAMPLES: u64 = 20;

    /// Number of (country, city) diversity data points assumed network-wide
    /// for the geography rarity formula's diversity term.
    pub const GEOGRAPHY_DIVERSITY_CAP: f64 = 50.0;

    /// Handshake eligibility gates.
    pub const HANDSHAKE_MIN_TIME: f64 = 0.9;
    pub const HANDSHAKE_MIN_INTEGRITY: f64 = 0.8;
    pub const HANDSHAKE_MIN_STORAGE: f64 = 0.9;
    pub const HANDSHAKE_MIN_GEOGRAPHY: f64 = 0.1;
}

/// Atomic-Time Oracle constants.
pub mod time_oracle {
    use std::time::Duration;

    /// Minimum number of successful responses required before clustering.
    pub const Q_MIN: usize = 3;

    /// Minimum number of distinct regions represented in the winning cluster.
    pub const R_MIN: usize = 2;

    /// Offsets within this many milliseconds of each other cluster together.
    pub const MAX_DRIFT_MS: i64 = 50;

    /// Blocks whose timestamp deviates from corrected UTC by more than this
    /// are rejected outright.
    pub const MAX_TIME_DRIFT: Duration = Duration::from_secs(2 * 3600);

    /// Per-source query timeout.
    pub const QUERY_TIMEOUT: Duration = Duration::from_secs(5);

    /// A consensus reading older than this is considered stale.
    pub const CONSENSUS_STALE_AFTER: Duration = Duration::from_secs(15 * 60);
}
