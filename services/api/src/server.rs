use crate::cli::ServeArgs;
use crate::infra::{in_memory_survey_state, seed_catalog_from_path, AppState};
use crate::routes::with_survey_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use risk_assessment::assessments::{Clock, SystemClock};
use risk_assessment::config::AppConfig;
use risk_assessment::error::AppError;
use risk_assessment::http::{AdminKeys, RateLimiter};
use risk_assessment::telemetry;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }
    if let Some(path) = args.catalog_csv.take() {
        config.catalog_csv = Some(path);
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let survey_state = in_memory_survey_state(clock, config.assessments.clone());
    if let Some(path) = config.catalog_csv.as_deref() {
        let summary = seed_catalog_from_path(&survey_state, path)?;
        info!(
            path = %path.display(),
            types = summary.types,
            groups = summary.groups,
            questions = summary.questions,
            "catalog seeded"
        );
    }

    let keys = AdminKeys::new(config.security.admin_api_keys.iter().cloned());
    if keys.is_empty() {
        warn!("no admin API keys configured; admin routes will reject every request");
    }
    let limiter = Arc::new(RateLimiter::new(config.security.rate_limit.clone()));

    let app = with_survey_routes(survey_state, keys, limiter)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "risk assessment service ready");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}
