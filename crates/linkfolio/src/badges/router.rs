use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::catalog::BadgeDefinition;
use super::domain::{ActivityEvent, ActivityKind, AwardNotification, BadgeIcon, Rarity, UserId};
use super::ledger::AwardLedger;
use super::metrics::MetricSource;
use super::notify::AwardNotifier;
use super::service::{BadgeEvaluationService, SkippedCheck};

/// Router builder exposing the activity trigger and badge listings.
pub fn badge_router<L, M, N>(service: Arc<BadgeEvaluationService<L, M, N>>) -> Router
where
    L: AwardLedger + 'static,
    M: MetricSource + 'static,
    N: AwardNotifier + 'static,
{
    Router::new()
        .route("/api/v1/badges", get(catalog_handler::<L, M, N>))
        .route(
            "/api/v1/users/:user_id/activity",
            post(activity_handler::<L, M, N>),
        )
        .route(
            "/api/v1/users/:user_id/badges",
            get(user_badges_handler::<L, M, N>),
        )
        .with_state(service)
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActivityRequest {
    pub kind: ActivityKind,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivityResponse {
    pub user_id: UserId,
    pub trigger: ActivityKind,
    pub granted: Vec<AwardNotification>,
    pub skipped: Vec<SkippedCheck>,
}

/// Catalog entry as exposed to clients.
#[derive(Debug, Clone, Serialize)]
pub struct BadgeDefinitionView {
    pub id: String,
    pub title: String,
    pub description: String,
    pub rarity: Rarity,
    pub display_weight: u8,
    pub icon: BadgeIcon,
    pub rule: String,
}

impl From<&BadgeDefinition> for BadgeDefinitionView {
    fn from(definition: &BadgeDefinition) -> Self {
        Self {
            id: definition.id.0.clone(),
            title: definition.title.clone(),
            description: definition.description.clone(),
            rarity: definition.rarity,
            display_weight: definition.rarity.display_weight(),
            icon: definition.icon,
            rule: definition.rule.to_string(),
        }
    }
}

pub(crate) async fn catalog_handler<L, M, N>(
    State(service): State<Arc<BadgeEvaluationService<L, M, N>>>,
) -> Response
where
    L: AwardLedger + 'static,
    M: MetricSource + 'static,
    N: AwardNotifier + 'static,
{
    let views: Vec<BadgeDefinitionView> = service
        .catalog()
        .list_definitions()
        .iter()
        .map(BadgeDefinitionView::from)
        .collect();
    (StatusCode::OK, axum::Json(views)).into_response()
}

pub(crate) async fn activity_handler<L, M, N>(
    State(service): State<Arc<BadgeEvaluationService<L, M, N>>>,
    Path(user_id): Path<String>,
    axum::Json(request): axum::Json<ActivityRequest>,
) -> Response
where
    L: AwardLedger + 'static,
    M: MetricSource + 'static,
    N: AwardNotifier + 'static,
{
    let event = ActivityEvent {
        user_id: UserId(user_id),
        kind: request.kind,
    };

    let worker = service.clone();
    let pass = match tokio::task::spawn_blocking(move || worker.run_pass(&event)).await {
        Ok(pass) => pass,
        Err(err) => {
            let payload = json!({ "error": format!("evaluation pass aborted: {err}") });
            return (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response();
        }
    };

    let granted = pass.notifications(service.catalog());
    let response = ActivityResponse {
        user_id: pass.user_id,
        trigger: pass.trigger,
        granted,
        skipped: pass.skipped,
    };
    (StatusCode::OK, axum::Json(response)).into_response()
}

pub(crate) async fn user_badges_handler<L, M, N>(
    State(service): State<Arc<BadgeEvaluationService<L, M, N>>>,
    Path(user_id): Path<String>,
) -> Response
where
    L: AwardLedger + 'static,
    M: MetricSource + 'static,
    N: AwardNotifier + 'static,
{
    let user_id = UserId(user_id);
    let listing = tokio::task::spawn_blocking(move || service.badges_for(&user_id)).await;

    match listing {
        Ok(Ok(badges)) => (StatusCode::OK, axum::Json(badges)).into_response(),
        Ok(Err(err)) => {
            let payload = json!({ "error": err.to_string() });
            (StatusCode::SERVICE_UNAVAILABLE, axum::Json(payload)).into_response()
        }
        Err(err) => {
            let payload = json!({ "error": format!("badge listing aborted: {err}") });
            (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
        }
    }
}
