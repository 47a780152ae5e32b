use crate::cli::ServeArgs;
use crate::infra::{load_catalog, AppState, InMemoryActivityStore};
use crate::routes::with_badge_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use linkfolio::badges::{BadgeEvaluationService, SqliteAwardLedger, TracingNotifier};
use linkfolio::config::AppConfig;
use linkfolio::error::AppError;
use linkfolio::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{error, info};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let catalog = load_catalog(&config.catalog).map_err(|err| {
        error!(error = %err, "badge catalog rejected");
        AppError::from(err)
    })?;
    let ledger = SqliteAwardLedger::from_config(&config.ledger)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let store = Arc::new(InMemoryActivityStore::default());
    let badge_service = Arc::new(BadgeEvaluationService::new(
        Arc::new(catalog),
        Arc::new(ledger),
        store.clone(),
        Arc::new(TracingNotifier),
    ));

    let app = with_badge_routes(badge_service, store)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        ledger = %config.ledger.path.display(),
        "badge engine ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
