use crate::infra::{AppState, InMemoryActivityStore, ProfileActivity};
use axum::extract::Path;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use linkfolio::badges::{
    badge_router, AwardLedger, AwardNotifier, BadgeEvaluationService, UserId,
};
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

pub(crate) fn with_badge_routes<L, N>(
    service: Arc<BadgeEvaluationService<L, InMemoryActivityStore, N>>,
    store: Arc<InMemoryActivityStore>,
) -> axum::Router
where
    L: AwardLedger + 'static,
    N: AwardNotifier + 'static,
{
    badge_router(service)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route(
            "/api/v1/users/:user_id/metrics",
            axum::routing::put(record_metrics_endpoint),
        )
        .layer(Extension(store))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

/// Accepts counter updates from the link and profile services. Does not trigger a pass.
pub(crate) async fn record_metrics_endpoint(
    Extension(store): Extension<Arc<InMemoryActivityStore>>,
    Path(user_id): Path<String>,
    Json(update): Json<ProfileActivity>,
) -> Json<ProfileActivity> {
    let user_id = UserId(user_id);
    debug!(user_id = %user_id, counters = update.counters.len(), "recording profile metrics");
    Json(store.record(&user_id, update))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use linkfolio::badges::{BadgeCatalog, SqliteAwardLedger, TracingNotifier};
    use tower::ServiceExt;

    fn app() -> axum::Router {
        let store = Arc::new(InMemoryActivityStore::default());
        let service = Arc::new(BadgeEvaluationService::new(
            Arc::new(BadgeCatalog::standard().expect("standard catalog")),
            Arc::new(SqliteAwardLedger::open_in_memory().expect("ledger opens")),
            store.clone(),
            Arc::new(TracingNotifier),
        ));
        with_badge_routes(service, store)
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body reads");
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn healthcheck_reports_ok() {
        let Json(body) = healthcheck().await;
        assert_eq!(body["status"], json!("ok"));
    }

    #[tokio::test]
    async fn metric_updates_feed_the_next_pass() {
        let app = app();

        let response = app
            .clone()
            .oneshot(
                Request::put("/api/v1/users/ada/metrics")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"counters":{"linkCount":1}}"#))
                    .expect("request builds"),
            )
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["counters"]["linkCount"], json!(1));

        let response = app
            .oneshot(
                Request::post("/api/v1/users/ada/activity")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"kind":"linkCreated"}"#))
                    .expect("request builds"),
            )
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        let granted: Vec<&str> = body["granted"]
            .as_array()
            .expect("granted list")
            .iter()
            .filter_map(|entry| entry["badge_id"].as_str())
            .collect();
        assert!(granted.contains(&"first-link"));
    }

    #[tokio::test]
    async fn unknown_metric_names_are_rejected() {
        let response = app()
            .oneshot(
                Request::put("/api/v1/users/ada/metrics")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"counters":{"karma":4}}"#))
                    .expect("request builds"),
            )
            .await
            .expect("route executes");

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
