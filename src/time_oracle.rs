//! Atomic-Time Oracle: a fault-tolerant consensus UTC offset derived from
//! several independent external time sources.
//!
//! Grounded on `src/time_sync.rs` for the async query mechanics (concurrent
//! per-source queries gathered under a timeout) but replaces its
//! median-deviation-only reduction with the fuller Byzantine-cluster
//! algorithm the original implementation's `core/atomic_time.py` uses.

use crate::constants::time_oracle::{MAX_DRIFT_MS, Q_MIN, QUERY_TIMEOUT, R_MIN};
use async_trait::async_trait;
use chrono::Utc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// One external clock's response to a query.
#[derive(Clone, Copy, Debug)]
pub struct TimeSample {
    pub offset_ms: i64,
    pub rtt_ms: i64,
    pub region: u8,
}

/// A narrow trait abstracting an external time source (NTP server,
/// federated beacon, etc). The kernel depends only on this, never on a
/// concrete transport.
#[async_trait]
pub trait TimeSource: Send + Sync {
    async fn query(&self) -> Option<TimeSample>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OracleStatus {
    Valid,
    Insufficient,
    Divergent,
}

#[derive(Clone, Copy, Debug)]
pub struct TimeConsensus {
    pub status: OracleStatus,
    pub offset_ms: i64,
    pub sampled_at: Instant,
}

pub struct AtomicTimeOracle {
    sources: Vec<Box<dyn TimeSource>>,
    last_valid: parking_lot::RwLock<Option<TimeConsensus>>,
}

impl AtomicTimeOracle {
    pub fn new(sources: Vec<Box<dyn TimeSource>>) -> Self {
        Self {
            sources,
            last_valid: parking_lot::RwLock::new(None),
        }
    }

    /// Query every configured source concurrently and reduce the responses
    /// via the Byzantine-median clustering algorithm.
    pub async fn synchronize(&self) -> TimeConsensus {
        let queries = self.sources.iter().map(|s| async move {
            tokio::time::timeout(QUERY_TIMEOUT, s.query()).await.ok().flatten()
        });
        let samples: Vec<TimeSample> = futures_join_all(queries).await.into_iter().flatten().collect();

        let consensus = reduce_samples(&samples);

        if consensus.status == OracleStatus::Valid {
            *self.last_valid.write() = Some(consensus);
            consensus
        } else {
            warn!(status = ?consensus.status, "atomic-time oracle degraded, retaining last valid consensus");
            match *self.last_valid.read() {
                Some(prev) if prev.sampled_at.elapsed() < crate::constants::time_oracle::CONSENSUS_STALE_AFTER => prev,
                _ => consensus,
            }
        }
    }

    /// Local monotonic time corrected by the last valid consensus offset.
    pub fn current_time_ms(&self) -> i64 {
        let offset = self.last_valid.read().map(|c| c.offset_ms).unwrap_or(0);
        Utc::now().timestamp_millis() + offset
    }
}

/// Run the Byzantine-median clustering algorithm over a set of samples:
/// require `Q_MIN` responses, find the largest cluster of mutually-close
/// offsets spanning `R_MIN` distinct regions, and take its median.
fn reduce_samples(samples: &[TimeSample]) -> TimeConsensus {
    let now = Instant::now();
    if samples.len() < Q_MIN {
        return TimeConsensus {
            status: OracleStatus::Insufficient,
            offset_ms: 0,
            sampled_at: now,
        };
    }

    let mut best_cluster: Vec<&TimeSample> = Vec::new();
    for candidate in samples {
        let cluster: Vec<&TimeSample> = samples
            .iter()
            .filter(|s| (s.offset_ms - candidate.offset_ms).abs() <= MAX_DRIFT_MS)
            .collect();
        if cluster.len() > best_cluster.len() {
            best_cluster = cluster;
        }
    }

    let distinct_regions: std::collections::HashSet<u8> =
        best_cluster.iter().map(|s| s.region).collect();

    if best_cluster.len() < Q_MIN || distinct_regions.len() < R_MIN {
        debug!(
            cluster_size = best_cluster.len(),
            regions = distinct_regions.len(),
            "atomic-time cluster failed quorum/region requirements"
        );
        return TimeConsensus {
            status: OracleStatus::Divergent,
            offset_ms: 0,
            sampled_at: now,
        };
    }

    let mut offsets: Vec<i64> = best_cluster.iter().map(|s| s.offset_ms).collect();
    offsets.sort_unstable();
    let median = if offsets.len() % 2 == 0 {
        let mid = offsets.len() / 2;
        (offsets[mid - 1] + offsets[mid]) / 2
    } else {
        offsets[offsets.len() / 2]
    };

    TimeConsensus {
        status: OracleStatus::Valid,
        offset_ms: median,
        sampled_at: now,
    }
}

async fn futures_join_all<I>(iter: I) -> Vec<I::Item>
where
    I: IntoIterator,
    I::Item: std::future::Future,
{
    let futs: Vec<_> = iter.into_iter().collect();
    let mut out = Vec::with_capacity(futs.len());
    for f in futs {
        out.push(f.await);
    }
    out
}

pub fn within_allowed_drift(timestamp_ms: i64, now_ms: i64) -> bool {
    let drift = Duration::from_millis(timestamp_ms.abs_diff(now_ms));
    drift <= crate::constants::time_oracle::MAX_TIME_DRIFT
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(offset: i64, region: u8) -> TimeSample {
        TimeSample {
            offset_ms: offset,
            rtt_ms: 10,
            region,
        }
    }

    #[test]
    fn cluster_excludes_outlier() {
        let samples = vec![
            sample(10, 1),
            sample(12, 2),
            sample(11, 3),
            sample(9, 4),
            sample(900, 5),
        ];
        let consensus = reduce_samples(&samples);
        assert_eq!(consensus.status, OracleStatus::Valid);
        assert_eq!(consensus.offset_ms, 10);
    }

    #[test]
    fn insufficient_below_q_min() {
        let samples = vec![sample(10, 1), sample(11, 2)];
        assert_eq!(reduce_samples(&samples).status, OracleStatus::Insufficient);
    }

    #[test]
    fn divergent_single_region() {
        let samples = vec![sample(10, 7), sample(11, 7), sample(12, 7)];
        assert_eq!(reduce_samples(&samples).status, OracleStatus::Divergent);
    }
}
