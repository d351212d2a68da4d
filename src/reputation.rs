//! Five Fingers reputation engine.
//!
//! Grounded structurally on `src/masternode_registry.rs` (concurrent
//! `DashMap`-keyed registry, sled-backed persistence, bounded per-node
//! history) with its collateral/UTXO validation dropped entirely — there is
//! no collateral here, only a five-dimension trust score. The dimension
//! model itself has no direct analogue in the teacher; it is taken from
//! this kernel's own fixed-weight decomposition, with the bounded decaying
//! history ring borrowed from the original implementation's `score.py`.

#![allow(dead_code)]

use crate::constants::reputation::*;
use crate::types::{Hash256, Signature};
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ReputationError {
    #[error("event timestamp {0} is in the future beyond allowed drift")]
    FutureTimestamp(i64),
    #[error("event timestamp {0} is stale")]
    StaleTimestamp(i64),
    #[error("event height {event_height} is too far beyond known height {known_height}")]
    HeightTooFarAhead { event_height: u64, known_height: u64 },
    #[error("self-vouch is not permitted")]
    SelfVouch,
    #[error("vouch rate limit exceeded for this node today")]
    VouchRateLimited,
    #[error("node {0:?} is not eligible for a handshake")]
    HandshakeIneligible(Hash256),
    #[error("storage error: {0}")]
    Storage(String),
}

/// A single dimension's running estimate: value in `[0,1]`, a confidence
/// that saturates with sample count, and bookkeeping for staleness checks.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct DimensionScore {
    pub value: f64,
    pub confidence: f64,
    pub samples: u64,
    pub last_update: i64,
}

impl DimensionScore {
    fn new(now: i64) -> Self {
        Self {
            value: 0.0,
            confidence: 0.0,
            samples: 0,
            last_update: now,
        }
    }

    fn observe(&mut self, value: f64, now: i64) {
        self.value = value.clamp(0.0, 1.0);
        self.samples = self.samples.saturating_add(1);
        self.confidence = (self.samples as f64 / CONFIDENCE_SATURATION_SAMPLES as f64).min(1.0);
        self.last_update = now;
    }
}

/// A validated reputation-affecting event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventKind {
    BlockProduced,
    BlockInvalid,
    UptimeTick,
    Downtime,
    StorageUpdate,
    NewCountry,
    NewCity,
    HandshakeFormed,
    HandshakeBroken,
    Equivocation,
    VdfInvalid,
    VrfInvalid,
    Spam,
}

impl EventKind {
    /// Fixed impact on the dimension this event kind belongs to, applied as
    /// an EMA update to INTEGRITY (the only dimension driven purely by
    /// discrete events; the others have dedicated update calls).
    fn integrity_impact(&self) -> Option<f64> {
        match self {
            EventKind::BlockProduced => Some(1.0),
            EventKind::BlockInvalid => Some(0.0),
            EventKind::Equivocation => Some(0.0),
            EventKind::VdfInvalid => Some(0.0),
            EventKind::VrfInvalid => Some(0.0),
            EventKind::Spam => Some(0.0),
            _ => None,
        }
    }

    fn penalty_secs(&self) -> Option<i64> {
        match self {
            EventKind::Equivocation => Some(PENALTY_EQUIVOCATION_SECS),
            EventKind::VdfInvalid => Some(PENALTY_VDF_INVALID_SECS),
            EventKind::VrfInvalid => Some(PENALTY_VRF_INVALID_SECS),
            EventKind::Spam => Some(PENALTY_SPAM_SECS),
            _ => None,
        }
    }
}

/// Context carried with every recorded event, used for validation.
#[derive(Clone, Debug)]
pub struct EventContext {
    pub height: u64,
    pub timestamp: i64,
    pub source: Hash256,
    pub evidence: Vec<u8>,
}

#[derive(Clone, Copy, Debug)]
struct HistoryEntry {
    kind_tag: u8,
    timestamp: i64,
}

/// Per-node reputation state. Created lazily on first event.
#[derive(Clone, Debug)]
pub struct ReputationProfile {
    pub node_id: Hash256,
    pub country_code: Option<u16>,
    pub city_hash: Option<Hash256>,
    pub time: DimensionScore,
    pub integrity: DimensionScore,
    pub storage: DimensionScore,
    pub geography: DimensionScore,
    pub handshake: DimensionScore,
    pub aggregate_score: f64,
    history: VecDeque<HistoryEntry>,
    pub trusted_by: HashSet<Hash256>,
    pub trusts: HashSet<Hash256>,
    pub handshake_partners: HashSet<Hash256>,
    pub penalty_until: Option<i64>,
    uptime_seconds: u64,
    handshakes: u64,
    vouches_today: VecDeque<i64>,
    last_seen: i64,
}

const HISTORY_CAP: usize = 256;

impl ReputationProfile {
    fn new(node_id: Hash256, now: i64) -> Self {
        Self {
            node_id,
            country_code: None,
            city_hash: None,
            time: DimensionScore::new(now),
            integrity: DimensionScore::new(now),
            storage: DimensionScore::new(now),
            geography: DimensionScore::new(now),
            handshake: DimensionScore::new(now),
            aggregate_score: 0.0,
            history: VecDeque::with_capacity(HISTORY_CAP),
            trusted_by: HashSet::new(),
            trusts: HashSet::new(),
            handshake_partners: HashSet::new(),
            penalty_until: None,
            uptime_seconds: 0,
            handshakes: 0,
            vouches_today: VecDeque::new(),
            last_seen: now,
        }
    }

    fn push_history(&mut self, kind: EventKind, now: i64) {
        if self.history.len() == HISTORY_CAP {
            self.history.pop_front();
        }
        self.history.push_back(HistoryEntry {
            kind_tag: kind as u8,
            timestamp: now,
        });
    }

    fn is_penalized(&self, now: i64) -> bool {
        self.penalty_until.map(|until| now < until).unwrap_or(false)
    }

    /// `Σ(weight·value·confidence) / Σ(weight·confidence)`, ×0.1 under penalty.
    fn recompute_aggregate(&mut self, now: i64) {
        let dims = [
            (WEIGHT_TIME, self.time),
            (WEIGHT_INTEGRITY, self.integrity),
            (WEIGHT_STORAGE, self.storage),
            (WEIGHT_GEOGRAPHY, self.geography),
            (WEIGHT_HANDSHAKE, self.handshake),
        ];
        let numerator: f64 = dims.iter().map(|(w, d)| *w * d.value * d.confidence).sum();
        let denominator: f64 = dims.iter().map(|(w, d)| *w * d.confidence).sum();

        let raw = if denominator > 0.0 { numerator / denominator } else { 0.0 };
        self.aggregate_score = if self.is_penalized(now) {
            raw * PENALTY_SCORE_FACTOR
        } else {
            raw
        };
    }

    fn meets_handshake_gate(&self, now: i64) -> bool {
        !self.is_penalized(now)
            && self.time.value >= HANDSHAKE_MIN_TIME
            && self.integrity.value >= HANDSHAKE_MIN_INTEGRITY
            && self.storage.value >= HANDSHAKE_MIN_STORAGE
            && self.geography.value > HANDSHAKE_MIN_GEOGRAPHY
    }
}

/// Concurrent registry of reputation profiles, persisted to sled.
pub struct ReputationEngine {
    profiles: DashMap<Hash256, RwLock<ReputationProfile>>,
    country_counts: DashMap<u16, u64>,
    city_counts: DashMap<Hash256, u64>,
    total_countries: AtomicU64,
    db: Option<Arc<sled::Db>>,
}

impl ReputationEngine {
    pub fn new(db: Option<Arc<sled::Db>>) -> Self {
        let engine = Self {
            profiles: DashMap::new(),
            country_counts: DashMap::new(),
            city_counts: DashMap::new(),
            total_countries: AtomicU64::new(0),
            db,
        };
        engine.load_from_disk();
        engine
    }

    fn load_from_disk(&self) {
        let Some(db) = &self.db else { return };
        let prefix = b"reputation:";
        let mut loaded = 0usize;
        for item in db.scan_prefix(prefix).flatten() {
            if let Ok(stored) = bincode::deserialize::<StoredProfile>(&item.1) {
                let profile = stored.into_profile();
                if let Some(code) = profile.country_code {
                    self.country_counts.entry(code).and_modify(|c| *c += 1).or_insert(1);
                }
                if let Some(city) = profile.city_hash {
                    self.city_counts.entry(city).and_modify(|c| *c += 1).or_insert(1);
                }
                self.profiles.insert(profile.node_id, RwLock::new(profile));
                loaded += 1;
            }
        }
        self.total_countries.store(self.country_counts.len() as u64, Ordering::Relaxed);
        if loaded > 0 {
            debug!(loaded, "loaded reputation profiles from disk");
        }
    }

    fn persist(&self, profile: &ReputationProfile) {
        let Some(db) = &self.db else { return };
        let key = [b"reputation:".as_slice(), &profile.node_id[..]].concat();
        match bincode::serialize(&StoredProfile::from_profile(profile)) {
            Ok(bytes) => {
                if let Err(e) = db.insert(key, bytes) {
                    warn!(error = %e, "failed to persist reputation profile");
                }
            }
            Err(e) => warn!(error = %e, "failed to serialize reputation profile"),
        }
    }

    fn entry(&self, node: Hash256, now: i64) -> dashmap::mapref::one::Ref<'_, Hash256, RwLock<ReputationProfile>> {
        self.profiles
            .entry(node)
            .or_insert_with(|| RwLock::new(ReputationProfile::new(node, now)));
        self.profiles.get(&node).expect("just inserted")
    }

    fn validate_context(&self, ctx: &EventContext, now: i64, known_height: u64) -> Result<(), ReputationError> {
        if ctx.timestamp > now + MAX_EVENT_FUTURE_DRIFT_SECS {
            return Err(ReputationError::FutureTimestamp(ctx.timestamp));
        }
        if now - ctx.timestamp > MAX_EVENT_AGE_SECS {
            return Err(ReputationError::StaleTimestamp(ctx.timestamp));
        }
        if ctx.height > known_height + MAX_HEIGHT_LOOKAHEAD {
            return Err(ReputationError::HeightTooFarAhead {
                event_height: ctx.height,
                known_height,
            });
        }
        Ok(())
    }

    /// Record a validated event against a node, updating the dimension the
    /// event kind belongs to and recomputing the aggregate score.
    pub fn record_event(
        &self,
        node: Hash256,
        kind: EventKind,
        ctx: EventContext,
        known_height: u64,
    ) -> Result<f64, ReputationError> {
        let now = chrono::Utc::now().timestamp();
        self.validate_context(&ctx, now, known_height)?;

        let guard = self.entry(node, now);
        let mut profile = guard.write();
        profile.last_seen = now;

        if let Some(value) = kind.integrity_impact() {
            let decayed = ema_decay(profile.integrity.value, value, profile.integrity.last_update, now);
            profile.integrity.observe(decayed, now);
        }

        if let Some(secs) = kind.penalty_secs() {
            profile.penalty_until = Some(now + secs);
            warn!(node = ?node, kind = ?kind, secs, "reputation penalty applied");
        }

        profile.push_history(kind, now);
        profile.recompute_aggregate(now);
        let score = profile.aggregate_score;
        self.persist(&profile);
        Ok(score)
    }

    pub fn update_time(&self, node: Hash256, uptime_seconds: u64) {
        let now = chrono::Utc::now().timestamp();
        let guard = self.entry(node, now);
        let mut profile = guard.write();
        profile.uptime_seconds = uptime_seconds;
        let value = (uptime_seconds as f64 / K_TIME_SECONDS as f64).min(1.0);
        profile.time.observe(value, now);
        profile.recompute_aggregate(now);
        self.persist(&profile);
    }

    pub fn update_storage(&self, node: Hash256, stored_blocks: u64, total_blocks: u64) {
        let now = chrono::Utc::now().timestamp();
        let guard = self.entry(node, now);
        let mut profile = guard.write();
        let value = if total_blocks == 0 {
            0.0
        } else {
            (stored_blocks as f64 / total_blocks as f64).min(1.0)
        };
        profile.storage.observe(value, now);
        profile.recompute_aggregate(now);
        self.persist(&profile);
    }

    /// Register a node's (country, city) and recompute its GEOGRAPHY score
    /// from the network-wide rarity/diversity formula.
    pub fn register_location(&self, node: Hash256, country_code: u16, city_hash: Hash256) {
        let now = chrono::Utc::now().timestamp();

        let country_first = !self.country_counts.contains_key(&country_code);
        self.country_counts.entry(country_code).and_modify(|c| *c += 1).or_insert(1);
        if country_first {
            self.total_countries.fetch_add(1, Ordering::Relaxed);
        }
        self.city_counts.entry(city_hash).and_modify(|c| *c += 1).or_insert(1);

        let n_in_country = *self.country_counts.get(&country_code).unwrap();
        let n_in_city = *self.city_counts.get(&city_hash).unwrap();
        let total_countries = self.total_countries.load(Ordering::Relaxed);

        let country_score = geography_component(n_in_country, total_countries);
        let city_score = geography_component(n_in_city, total_countries);
        let geography = 0.6 * country_score + 0.4 * city_score;

        let guard = self.entry(node, now);
        let mut profile = guard.write();
        profile.country_code = Some(country_code);
        profile.city_hash = Some(city_hash);
        profile.geography.observe(geography, now);
        profile.recompute_aggregate(now);
        self.persist(&profile);
    }

    /// Record an advisory, directed trust edge. Does not move the score.
    pub fn add_vouch(&self, voucher: Hash256, vouchee: Hash256) -> Result<(), ReputationError> {
        if voucher == vouchee {
            return Err(ReputationError::SelfVouch);
        }
        let now = chrono::Utc::now().timestamp();

        {
            let guard = self.entry(voucher, now);
            let mut profile = guard.write();
            profile.vouches_today.retain(|t| now - t < 86_400);
            if profile.vouches_today.len() as u32 >= MAX_VOUCHES_PER_DAY {
                return Err(ReputationError::VouchRateLimited);
            }
            profile.vouches_today.push_back(now);
            profile.trusts.insert(vouchee);
            self.persist(&profile);
        }
        {
            let guard = self.entry(vouchee, now);
            let mut profile = guard.write();
            profile.trusted_by.insert(voucher);
            self.persist(&profile);
        }
        Ok(())
    }

    /// Form a mutual handshake attestation between two eligible nodes.
    ///
    /// Signature verification over the handshake message is expected to have
    /// already happened at the call site (the kernel holds the registry of
    /// node public keys); this only enforces eligibility and updates state.
    pub fn form_handshake(
        &self,
        a: Hash256,
        b: Hash256,
        _sig_a: Signature,
        _sig_b: Signature,
        _height: u64,
    ) -> Result<(), ReputationError> {
        let now = chrono::Utc::now().timestamp();

        let a_eligible = {
            let guard = self.entry(a, now);
            let profile = guard.read();
            profile.meets_handshake_gate(now) && profile.country_code.is_some()
        };
        let b_eligible = {
            let guard = self.entry(b, now);
            let profile = guard.read();
            profile.meets_handshake_gate(now) && profile.country_code.is_some()
        };
        let different_countries = {
            let ga = self.entry(a, now);
            let gb = self.entry(b, now);
            ga.read().country_code != gb.read().country_code
        };

        if !a_eligible || !b_eligible || !different_countries {
            return Err(ReputationError::HandshakeIneligible(if !a_eligible { a } else { b }));
        }

        for (node, other) in [(a, b), (b, a)] {
            let guard = self.entry(node, now);
            let mut profile = guard.write();
            profile.handshake_partners.insert(other);
            profile.handshakes = profile.handshake_partners.len() as u64;
            let value = (profile.handshakes as f64 / K_HANDSHAKES as f64).min(1.0);
            profile.handshake.observe(value, now);
            profile.recompute_aggregate(now);
            self.persist(&profile);
        }
        Ok(())
    }

    pub fn score(&self, node: Hash256) -> f64 {
        self.profiles.get(&node).map(|p| p.read().aggregate_score).unwrap_or(0.0)
    }

    /// Reputation multiplier applied to lottery weight, clamped to
    /// `[MULTIPLIER_MIN, MULTIPLIER_MAX]`.
    pub fn multiplier(&self, node: Hash256) -> f64 {
        let raw = MULTIPLIER_MIN + self.score(node) * (MULTIPLIER_MAX - MULTIPLIER_MIN);
        raw.clamp(MULTIPLIER_MIN, MULTIPLIER_MAX)
    }

    /// Network-wide sum of every active profile's weighted score
    /// (aggregate score times its lottery multiplier), the single global
    /// denomination `lottery::check`/`verify`'s `total_score` is measured
    /// against.
    pub fn total_score(&self) -> f64 {
        self.profiles
            .iter()
            .map(|entry| {
                let profile = entry.value().read();
                profile.aggregate_score * self.multiplier(profile.node_id)
            })
            .sum()
    }

    /// Evict profiles inactive beyond `PROFILE_EXPIRY_SECS`, skipping any
    /// profile currently under penalty.
    pub fn garbage_collect(&self) -> usize {
        let now = chrono::Utc::now().timestamp();
        let mut expired = Vec::new();
        for entry in self.profiles.iter() {
            let profile = entry.value().read();
            if !profile.is_penalized(now) && now - profile.last_seen > PROFILE_EXPIRY_SECS {
                expired.push(*entry.key());
            }
        }
        let count = expired.len();
        for node in expired {
            self.profiles.remove(&node);
            if let Some(db) = &self.db {
                let key = [b"reputation:".as_slice(), &node[..]].concat();
                let _ = db.remove(key);
            }
        }
        count
    }
}

/// Exponential-decay update toward `observation` with a one-week half-life.
fn ema_decay(previous: f64, observation: f64, last_update: i64, now: i64) -> f64 {
    let elapsed = (now - last_update).max(0) as f64;
    let decay = 0.5_f64.powf(elapsed / INTEGRITY_HALF_LIFE_SECS);
    previous * decay + observation * (1.0 - decay)
}

/// `0.6·rarity + 0.4·diversity`, where rarity shrinks logarithmically with
/// how many nodes already share this location and diversity grows with the
/// number of distinct locations seen network-wide.
fn geography_component(n_at_location: u64, distinct_locations: u64) -> f64 {
    let rarity = 1.0 / (1.0 + (n_at_location as f64).log10().max(0.0));
    let diversity = (distinct_locations as f64 / GEOGRAPHY_DIVERSITY_CAP).min(1.0);
    0.6 * rarity + 0.4 * diversity
}

/// Disk representation of a profile; drops transient fields (vouch-rate
/// ring, history) that don't need to survive a restart's full fidelity.
#[derive(Serialize, Deserialize)]
struct StoredProfile {
    node_id: Hash256,
    country_code: Option<u16>,
    city_hash: Option<Hash256>,
    time: DimensionScore,
    integrity: DimensionScore,
    storage: DimensionScore,
    geography: DimensionScore,
    handshake: DimensionScore,
    aggregate_score: f64,
    trusted_by: Vec<Hash256>,
    trusts: Vec<Hash256>,
    handshake_partners: Vec<Hash256>,
    penalty_until: Option<i64>,
    uptime_seconds: u64,
    handshakes: u64,
    last_seen: i64,
}

impl StoredProfile {
    fn from_profile(p: &ReputationProfile) -> Self {
        Self {
            node_id: p.node_id,
            country_code: p.country_code,
            city_hash: p.city_hash,
            time: p.time,
            integrity: p.integrity,
            storage: p.storage,
            geography: p.geography,
            handshake: p.handshake,
            aggregate_score: p.aggregate_score,
            trusted_by: p.trusted_by.iter().copied().collect(),
            trusts: p.trusts.iter().copied().collect(),
            handshake_partners: p.handshake_partners.iter().copied().collect(),
            penalty_until: p.penalty_until,
            uptime_seconds: p.uptime_seconds,
            handshakes: p.handshakes,
            last_seen: p.last_seen,
        }
    }

    fn into_profile(self) -> ReputationProfile {
        ReputationProfile {
            node_id: self.node_id,
            country_code: self.country_code,
            city_hash: self.city_hash,
            time: self.time,
            integrity: self.integrity,
            storage: self.storage,
            geography: self.geography,
            handshake: self.handshake,
            aggregate_score: self.aggregate_score,
            history: VecDeque::with_capacity(HISTORY_CAP),
            trusted_by: self.trusted_by.into_iter().collect(),
            trusts: self.trusts.into_iter().collect(),
            handshake_partners: self.handshake_partners.into_iter().collect(),
            penalty_until: self.penalty_until,
            uptime_seconds: self.uptime_seconds,
            handshakes: self.handshakes,
            vouches_today: VecDeque::new(),
            last_seen: self.last_seen,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(now: i64) -> EventContext {
        EventContext {
            height: 10,
            timestamp: now,
            source: [0u8; 32],
            evidence: vec![],
        }
    }

    #[test]
    fn time_dimension_saturates() {
        let engine = ReputationEngine::new(None);
        let node = [1u8; 32];
        engine.update_time(node, K_TIME_SECONDS * 2);
        let guard = engine.entry(node, chrono::Utc::now().timestamp());
        assert_eq!(guard.read().time.value, 1.0);
    }

    #[test]
    fn equivocation_applies_penalty_and_tanks_score() {
        let engine = ReputationEngine::new(None);
        let node = [2u8; 32];
        engine.update_time(node, K_TIME_SECONDS);
        let before = engine.score(node);
        let now = chrono::Utc::now().timestamp();
        engine.record_event(node, EventKind::Equivocation, ctx(now), 10).unwrap();
        let after = engine.score(node);
        assert!(after <= before);
        let guard = engine.entry(node, now);
        assert!(guard.read().is_penalized(now));
    }

    #[test]
    fn future_timestamp_rejected() {
        let engine = ReputationEngine::new(None);
        let node = [3u8; 32];
        let now = chrono::Utc::now().timestamp();
        let far_future = ctx(now + MAX_EVENT_FUTURE_DRIFT_SECS + 1);
        assert_eq!(
            engine.record_event(node, EventKind::BlockProduced, far_future, 10),
            Err(ReputationError::FutureTimestamp(now + MAX_EVENT_FUTURE_DRIFT_SECS + 1))
        );
    }

    #[test]
    fn self_vouch_rejected() {
        let engine = ReputationEngine::new(None);
        let node = [4u8; 32];
        assert_eq!(engine.add_vouch(node, node), Err(ReputationError::SelfVouch));
    }

    #[test]
    fn handshake_requires_eligibility() {
        let engine = ReputationEngine::new(None);
        let a = [5u8; 32];
        let b = [6u8; 32];
        assert!(engine.form_handshake(a, b, [0u8; 64], [0u8; 64], 1).is_err());
    }

    #[test]
    fn geography_rewards_first_in_country() {
        let first = geography_component(1, 1);
        let crowded = geography_component(1000, 50);
        assert!(first > crowded);
    }
}
