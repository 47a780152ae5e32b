use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::catalog::BadgeCatalog;
use super::domain::{
    ActivityEvent, ActivityKind, AwardNotification, AwardRecord, BadgeIcon, BadgeId, Metric,
    Rarity, UserId,
};
use super::evaluation::RuleEvaluator;
use super::ledger::{AwardLedger, LedgerError};
use super::metrics::{MetricAggregator, MetricSource};
use super::notify::AwardNotifier;

/// Orchestrates evaluation passes: held badges, metrics, rules, conditional awards.
pub struct BadgeEvaluationService<L, M, N> {
    catalog: Arc<BadgeCatalog>,
    ledger: Arc<L>,
    aggregator: MetricAggregator<M>,
    notifier: Arc<N>,
    evaluator: RuleEvaluator,
}

impl<L, M, N> BadgeEvaluationService<L, M, N>
where
    L: AwardLedger + 'static,
    M: MetricSource + 'static,
    N: AwardNotifier + 'static,
{
    pub fn new(catalog: Arc<BadgeCatalog>, ledger: Arc<L>, metrics: Arc<M>, notifier: Arc<N>) -> Self {
        let aggregator = MetricAggregator::new(metrics, catalog.referenced_metrics());
        Self {
            catalog,
            ledger,
            aggregator,
            notifier,
            evaluator: RuleEvaluator::new(),
        }
    }

    pub fn catalog(&self) -> &BadgeCatalog {
        &self.catalog
    }

    /// Host-facing entry point: returns only the badges newly granted by this pass.
    pub fn on_activity_event(&self, user_id: &UserId, kind: ActivityKind) -> Vec<AwardRecord> {
        let event = ActivityEvent {
            user_id: user_id.clone(),
            kind,
        };
        self.run_pass(&event).granted
    }

    /// Run one evaluation pass for the event's user.
    ///
    /// A failed check is recorded in `skipped` and never stops later checks.
    pub fn run_pass(&self, event: &ActivityEvent) -> EvaluationPass {
        let user_id = &event.user_id;
        let mut pass = EvaluationPass {
            user_id: user_id.clone(),
            trigger: event.kind,
            granted: Vec::new(),
            skipped: Vec::new(),
        };

        // An unreadable held set only costs redundant checks; the conditional
        // insert still refuses duplicates.
        let held = match self.ledger.held(user_id) {
            Ok(held) => held,
            Err(err) => {
                warn!(user = %user_id, error = %err, "held badges unavailable; checking full catalog");
                BTreeSet::new()
            }
        };

        let mut snapshot = self.aggregator.begin_pass(user_id);

        for definition in self.catalog.list_definitions() {
            if held.contains(&definition.id) {
                continue;
            }

            let metrics = match snapshot.resolve(&definition.rule.metrics()) {
                Ok(metrics) => metrics,
                Err(err) => {
                    warn!(user = %user_id, badge = %definition.id, error = %err, "badge check skipped");
                    pass.skipped.push(SkippedCheck {
                        badge_id: definition.id.clone(),
                        reason: SkipReason::MetricSourceUnavailable {
                            metric: err.metric,
                            detail: err.detail,
                        },
                    });
                    continue;
                }
            };

            if !self.evaluator.evaluate(definition, metrics) {
                continue;
            }

            match self.ledger.try_award(user_id, &definition.id, Utc::now()) {
                Ok(outcome) => match outcome.record {
                    Some(record) if outcome.granted => {
                        info!(
                            user = %user_id,
                            badge = %definition.id,
                            rarity = definition.rarity.label(),
                            trigger = event.kind.label(),
                            "badge granted"
                        );
                        pass.granted.push(record);
                    }
                    _ => {
                        debug!(user = %user_id, badge = %definition.id, "badge already held");
                    }
                },
                Err(err) => {
                    warn!(user = %user_id, badge = %definition.id, error = %err, "badge check skipped");
                    let LedgerError::Unavailable(detail) = err;
                    pass.skipped.push(SkippedCheck {
                        badge_id: definition.id.clone(),
                        reason: SkipReason::LedgerUnavailable { detail },
                    });
                }
            }
        }

        for notification in pass.notifications(&self.catalog) {
            let badge_id = notification.badge_id.clone();
            if let Err(err) = self.notifier.publish(notification) {
                warn!(user = %user_id, badge = %badge_id, error = %err, "award notification dropped");
            }
        }

        pass
    }

    /// A user's badge set joined with catalog metadata for display.
    pub fn badges_for(&self, user_id: &UserId) -> Result<Vec<HeldBadge>, LedgerError> {
        let records = self.ledger.awards_for(user_id)?;
        Ok(records
            .into_iter()
            .map(|record| {
                let definition = self.catalog.get(&record.badge_id);
                HeldBadge {
                    title: definition.map(|definition| definition.title.clone()),
                    rarity: definition.map(|definition| definition.rarity),
                    icon: definition
                        .map(|definition| definition.icon)
                        .unwrap_or(BadgeIcon::Unknown),
                    badge_id: record.badge_id,
                    awarded_at: record.awarded_at,
                }
            })
            .collect())
    }
}

/// Outcome of a single evaluation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EvaluationPass {
    pub user_id: UserId,
    pub trigger: ActivityKind,
    pub granted: Vec<AwardRecord>,
    pub skipped: Vec<SkippedCheck>,
}

impl EvaluationPass {
    /// Presentation payloads for the pass's grants, in grant order.
    pub fn notifications(&self, catalog: &BadgeCatalog) -> Vec<AwardNotification> {
        self.granted
            .iter()
            .filter_map(|record| {
                catalog.get(&record.badge_id).map(|definition| AwardNotification {
                    user_id: record.user_id.clone(),
                    badge_id: record.badge_id.clone(),
                    rarity: definition.rarity,
                    awarded_at: record.awarded_at,
                })
            })
            .collect()
    }
}

/// Badge check that could not complete during a pass; retried by the next event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedCheck {
    pub badge_id: BadgeId,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    MetricSourceUnavailable { metric: Metric, detail: String },
    LedgerUnavailable { detail: String },
}

/// Held badge with whatever catalog metadata is still available.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeldBadge {
    pub badge_id: BadgeId,
    pub awarded_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rarity: Option<Rarity>,
    pub icon: BadgeIcon,
}
