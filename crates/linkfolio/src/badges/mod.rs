//! Badge and achievement engine.
//!
//! Activity events drive evaluation passes: the catalog lists badges in rarity
//! order, the aggregator reads the metrics their rules reference, the evaluator
//! decides qualification, and the ledger's conditional insert decides which
//! caller actually wins each award.

pub mod catalog;
pub mod domain;
pub mod evaluation;
pub mod ledger;
pub mod metrics;
pub mod notify;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use catalog::{BadgeCatalog, BadgeDefinition, CatalogEntry, CatalogLoadError};
pub use domain::{
    ActivityEvent, ActivityKind, AwardNotification, AwardRecord, BadgeIcon, BadgeId, Metric,
    Rarity, UserId,
};
pub use evaluation::{evaluate, Comparison, Rule, RuleEvaluator, RuleParseError};
pub use ledger::{AwardLedger, AwardOutcome, LedgerError, SqliteAwardLedger};
pub use metrics::{
    MetricAggregator, MetricSnapshot, MetricSource, MetricSourceUnavailable, PassSnapshot,
};
pub use notify::{AwardNotifier, NotifyError, TracingNotifier};
pub use router::badge_router;
pub use service::{BadgeEvaluationService, EvaluationPass, HeldBadge, SkipReason, SkippedCheck};
