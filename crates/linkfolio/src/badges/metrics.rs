use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::domain::{Metric, UserId};

/// Point-in-time metric values for one user. Absent metrics read as zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricSnapshot {
    pub user_id: UserId,
    pub captured_at: DateTime<Utc>,
    values: BTreeMap<Metric, u64>,
}

impl MetricSnapshot {
    pub fn new(user_id: UserId, captured_at: DateTime<Utc>) -> Self {
        Self {
            user_id,
            captured_at,
            values: BTreeMap::new(),
        }
    }

    pub fn with(mut self, metric: Metric, value: u64) -> Self {
        self.values.insert(metric, value);
        self
    }

    pub fn insert(&mut self, metric: Metric, value: u64) {
        self.values.insert(metric, value);
    }

    pub fn get(&self, metric: Metric) -> u64 {
        self.values.get(&metric).copied().unwrap_or(0)
    }

    pub fn contains(&self, metric: Metric) -> bool {
        self.values.contains_key(&metric)
    }
}

/// Raised when an external metric store cannot answer in time.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("metric '{metric}' unavailable for user {user_id}: {detail}")]
pub struct MetricSourceUnavailable {
    pub user_id: UserId,
    pub metric: Metric,
    pub detail: String,
}

/// External collaborator supplying current metric values (link storage, analytics counters).
pub trait MetricSource: Send + Sync {
    fn metric(&self, user_id: &UserId, metric: Metric) -> Result<u64, MetricSourceUnavailable>;
}

/// Assembles snapshots over the metrics a catalog actually references.
pub struct MetricAggregator<M> {
    source: Arc<M>,
    metrics: BTreeSet<Metric>,
}

impl<M> MetricAggregator<M>
where
    M: MetricSource,
{
    pub fn new(source: Arc<M>, metrics: BTreeSet<Metric>) -> Self {
        Self { source, metrics }
    }

    /// Read every tracked metric; fails on the first unreachable one.
    pub fn snapshot(&self, user_id: &UserId) -> Result<MetricSnapshot, MetricSourceUnavailable> {
        let mut snapshot = MetricSnapshot::new(user_id.clone(), Utc::now());
        for metric in &self.metrics {
            let value = self.source.metric(user_id, *metric)?;
            snapshot.insert(*metric, value);
        }
        Ok(snapshot)
    }

    /// Start a lazily-filled snapshot scoped to a single evaluation pass.
    pub fn begin_pass(&self, user_id: &UserId) -> PassSnapshot<'_, M> {
        PassSnapshot {
            source: &self.source,
            snapshot: MetricSnapshot::new(user_id.clone(), Utc::now()),
            failures: BTreeMap::new(),
        }
    }
}

/// Per-pass metric cache. Each metric is read at most once per pass;
/// failures are remembered so dependent checks skip without re-reading.
pub struct PassSnapshot<'a, M> {
    source: &'a Arc<M>,
    snapshot: MetricSnapshot,
    failures: BTreeMap<Metric, MetricSourceUnavailable>,
}

impl<'a, M> PassSnapshot<'a, M>
where
    M: MetricSource,
{
    pub fn resolve(
        &mut self,
        metrics: &BTreeSet<Metric>,
    ) -> Result<&MetricSnapshot, MetricSourceUnavailable> {
        for metric in metrics {
            if let Some(failure) = self.failures.get(metric) {
                return Err(failure.clone());
            }
            if self.snapshot.contains(*metric) {
                continue;
            }
            match self.source.metric(&self.snapshot.user_id, *metric) {
                Ok(value) => self.snapshot.insert(*metric, value),
                Err(failure) => {
                    self.failures.insert(*metric, failure.clone());
                    return Err(failure);
                }
            }
        }
        Ok(&self.snapshot)
    }
}
