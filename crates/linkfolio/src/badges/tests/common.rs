use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::response::Response;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::badges::catalog::{BadgeCatalog, CatalogEntry};
use crate::badges::domain::{AwardNotification, AwardRecord, BadgeId, Metric, Rarity, UserId};
use crate::badges::ledger::{AwardLedger, AwardOutcome, LedgerError, SqliteAwardLedger};
use crate::badges::metrics::{MetricSource, MetricSourceUnavailable};
use crate::badges::notify::{AwardNotifier, NotifyError};
use crate::badges::service::BadgeEvaluationService;

pub(super) type TestService = BadgeEvaluationService<SqliteAwardLedger, MemoryMetrics, MemoryNotifier>;

pub(super) fn user(name: &str) -> UserId {
    UserId(name.to_string())
}

pub(super) fn badge(id: &str) -> BadgeId {
    BadgeId(id.to_string())
}

pub(super) fn entry(id: &str, rarity: Rarity, rule: &str) -> CatalogEntry {
    CatalogEntry {
        id: id.to_string(),
        title: String::new(),
        description: String::new(),
        rarity,
        icon: "star".to_string(),
        rule: rule.to_string(),
    }
}

pub(super) fn catalog(entries: Vec<CatalogEntry>) -> Arc<BadgeCatalog> {
    Arc::new(BadgeCatalog::from_entries(entries).expect("catalog loads"))
}

/// `first-link` (common, linkCount >= 1) and `century-views` (rare, profileViews >= 100).
pub(super) fn starter_catalog() -> Arc<BadgeCatalog> {
    catalog(vec![
        entry("century-views", Rarity::Rare, "profileViews >= 100"),
        entry("first-link", Rarity::Common, "linkCount >= 1"),
    ])
}

pub(super) fn build_service(
    catalog: Arc<BadgeCatalog>,
) -> (
    TestService,
    Arc<SqliteAwardLedger>,
    Arc<MemoryMetrics>,
    Arc<MemoryNotifier>,
) {
    let ledger = Arc::new(SqliteAwardLedger::open_in_memory().expect("ledger opens"));
    let metrics = Arc::new(MemoryMetrics::default());
    let notifier = Arc::new(MemoryNotifier::default());
    let service =
        BadgeEvaluationService::new(catalog, ledger.clone(), metrics.clone(), notifier.clone());
    (service, ledger, metrics, notifier)
}

pub(super) fn badge_ids(records: &[AwardRecord]) -> Vec<&str> {
    records.iter().map(|record| record.badge_id.as_str()).collect()
}

#[derive(Default)]
pub(super) struct MemoryMetrics {
    values: Mutex<HashMap<(UserId, Metric), u64>>,
    offline: Mutex<HashSet<Metric>>,
    reads: Mutex<Vec<Metric>>,
}

impl MemoryMetrics {
    pub(super) fn set(&self, user_id: &UserId, metric: Metric, value: u64) {
        self.values
            .lock()
            .expect("metrics mutex poisoned")
            .insert((user_id.clone(), metric), value);
    }

    pub(super) fn take_offline(&self, metric: Metric) {
        self.offline
            .lock()
            .expect("metrics mutex poisoned")
            .insert(metric);
    }

    pub(super) fn bring_online(&self, metric: Metric) {
        self.offline
            .lock()
            .expect("metrics mutex poisoned")
            .remove(&metric);
    }

    pub(super) fn reads(&self) -> Vec<Metric> {
        self.reads.lock().expect("metrics mutex poisoned").clone()
    }
}

impl MetricSource for MemoryMetrics {
    fn metric(&self, user_id: &UserId, metric: Metric) -> Result<u64, MetricSourceUnavailable> {
        self.reads
            .lock()
            .expect("metrics mutex poisoned")
            .push(metric);
        if self
            .offline
            .lock()
            .expect("metrics mutex poisoned")
            .contains(&metric)
        {
            return Err(MetricSourceUnavailable {
                user_id: user_id.clone(),
                metric,
                detail: "analytics timeout".to_string(),
            });
        }
        Ok(self
            .values
            .lock()
            .expect("metrics mutex poisoned")
            .get(&(user_id.clone(), metric))
            .copied()
            .unwrap_or(0))
    }
}

#[derive(Default)]
pub(super) struct MemoryNotifier {
    events: Mutex<Vec<AwardNotification>>,
}

impl MemoryNotifier {
    pub(super) fn events(&self) -> Vec<AwardNotification> {
        self.events.lock().expect("notifier mutex poisoned").clone()
    }
}

impl AwardNotifier for MemoryNotifier {
    fn publish(&self, notification: AwardNotification) -> Result<(), NotifyError> {
        self.events
            .lock()
            .expect("notifier mutex poisoned")
            .push(notification);
        Ok(())
    }
}

pub(super) struct OfflineNotifier;

impl AwardNotifier for OfflineNotifier {
    fn publish(&self, _notification: AwardNotification) -> Result<(), NotifyError> {
        Err(NotifyError::Transport("push gateway offline".to_string()))
    }
}

/// Delegates to an in-memory ledger but rejects writes for selected badges.
pub(super) struct RefusingLedger {
    pub(super) inner: SqliteAwardLedger,
    pub(super) refuse: BTreeSet<BadgeId>,
    pub(super) reads_fail: bool,
}

impl RefusingLedger {
    pub(super) fn new(refuse: &[&str]) -> Self {
        Self {
            inner: SqliteAwardLedger::open_in_memory().expect("ledger opens"),
            refuse: refuse.iter().map(|id| badge(id)).collect(),
            reads_fail: false,
        }
    }
}

impl AwardLedger for RefusingLedger {
    fn has_award(&self, user_id: &UserId, badge_id: &BadgeId) -> Result<bool, LedgerError> {
        self.inner.has_award(user_id, badge_id)
    }

    fn held(&self, user_id: &UserId) -> Result<BTreeSet<BadgeId>, LedgerError> {
        if self.reads_fail {
            return Err(LedgerError::Unavailable("replica lagging".to_string()));
        }
        self.inner.held(user_id)
    }

    fn awards_for(&self, user_id: &UserId) -> Result<Vec<AwardRecord>, LedgerError> {
        if self.reads_fail {
            return Err(LedgerError::Unavailable("replica lagging".to_string()));
        }
        self.inner.awards_for(user_id)
    }

    fn try_award(
        &self,
        user_id: &UserId,
        badge_id: &BadgeId,
        awarded_at: DateTime<Utc>,
    ) -> Result<AwardOutcome, LedgerError> {
        if self.refuse.contains(badge_id) {
            return Err(LedgerError::Unavailable("write timeout".to_string()));
        }
        self.inner.try_award(user_id, badge_id, awarded_at)
    }
}

/// Ledger whose listing waits until another task opens the gate.
pub(super) struct GatedLedger {
    inner: SqliteAwardLedger,
    gate: Mutex<Receiver<()>>,
}

impl GatedLedger {
    pub(super) fn new() -> (Self, Sender<()>) {
        let (open, gate) = mpsc::channel();
        let ledger = Self {
            inner: SqliteAwardLedger::open_in_memory().expect("ledger opens"),
            gate: Mutex::new(gate),
        };
        (ledger, open)
    }
}

impl AwardLedger for GatedLedger {
    fn has_award(&self, user_id: &UserId, badge_id: &BadgeId) -> Result<bool, LedgerError> {
        self.inner.has_award(user_id, badge_id)
    }

    fn held(&self, user_id: &UserId) -> Result<BTreeSet<BadgeId>, LedgerError> {
        self.inner.held(user_id)
    }

    fn awards_for(&self, user_id: &UserId) -> Result<Vec<AwardRecord>, LedgerError> {
        self.gate
            .lock()
            .expect("gate mutex poisoned")
            .recv_timeout(Duration::from_secs(5))
            .map_err(|_| LedgerError::Unavailable("gate never opened".to_string()))?;
        self.inner.awards_for(user_id)
    }

    fn try_award(
        &self,
        user_id: &UserId,
        badge_id: &BadgeId,
        awarded_at: DateTime<Utc>,
    ) -> Result<AwardOutcome, LedgerError> {
        self.inner.try_award(user_id, badge_id, awarded_at)
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
