use chrono::{DateTime, Utc};
use linkfolio::badges::{
    BadgeCatalog, CatalogLoadError, Metric, MetricSource, MetricSourceUnavailable, UserId,
};
use linkfolio::config::CatalogConfig;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Activity counters for one profile as reported by the link/profile services.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct ProfileActivity {
    #[serde(default)]
    pub(crate) counters: BTreeMap<Metric, u64>,
    #[serde(default)]
    pub(crate) registered_at: Option<DateTime<Utc>>,
}

/// Stand-in for the profile/link stores and analytics counters.
#[derive(Default, Clone)]
pub(crate) struct InMemoryActivityStore {
    profiles: Arc<Mutex<HashMap<UserId, ProfileActivity>>>,
}

impl InMemoryActivityStore {
    /// Merge counters into the user's profile, replacing values for supplied metrics.
    pub(crate) fn record(&self, user_id: &UserId, update: ProfileActivity) -> ProfileActivity {
        let mut guard = self.profiles.lock().expect("activity mutex poisoned");
        let profile = guard.entry(user_id.clone()).or_default();
        profile.counters.extend(update.counters);
        if update.registered_at.is_some() {
            profile.registered_at = update.registered_at;
        }
        profile.clone()
    }

    pub(crate) fn set(&self, user_id: &UserId, metric: Metric, value: u64) {
        let mut guard = self.profiles.lock().expect("activity mutex poisoned");
        guard
            .entry(user_id.clone())
            .or_default()
            .counters
            .insert(metric, value);
    }
}

impl MetricSource for InMemoryActivityStore {
    fn metric(&self, user_id: &UserId, metric: Metric) -> Result<u64, MetricSourceUnavailable> {
        let guard = self
            .profiles
            .lock()
            .map_err(|_| MetricSourceUnavailable {
                user_id: user_id.clone(),
                metric,
                detail: "activity store poisoned".to_string(),
            })?;
        let Some(profile) = guard.get(user_id) else {
            return Ok(0);
        };

        if metric == Metric::AccountAgeDays {
            if let Some(registered_at) = profile.registered_at {
                let days = (Utc::now() - registered_at).num_days().max(0);
                return Ok(days as u64);
            }
        }

        Ok(profile.counters.get(&metric).copied().unwrap_or(0))
    }
}

/// Load the configured catalog file, or the built-in catalog when none is set.
pub(crate) fn load_catalog(config: &CatalogConfig) -> Result<BadgeCatalog, CatalogLoadError> {
    match &config.path {
        Some(path) => {
            info!(path = %path.display(), "loading badge catalog from file");
            BadgeCatalog::from_path(path)
        }
        None => BadgeCatalog::standard(),
    }
}
