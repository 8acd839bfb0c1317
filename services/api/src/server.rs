use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use tracing::info;

use estate_intel::config::AppConfig;
use estate_intel::error::AppError;
use estate_intel::intelligence::{
    IntelligenceService, IntelligenceState, ReminderEngine, TriggerDispatcher,
};
use estate_intel::telemetry;

use crate::cli::ServeArgs;
use crate::infra::{
    AppState, ConsoleNotificationSender, InMemoryCrmStore, InMemoryModuleConfig,
    InMemorySnapshotStore, TracingAuditSink,
};
use crate::routes::with_intelligence_routes;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let crm = Arc::new(InMemoryCrmStore::default());
    let snapshots = Arc::new(InMemorySnapshotStore::default());
    let module_config = Arc::new(InMemoryModuleConfig::default());
    let audit = Arc::new(TracingAuditSink);
    let notifications = Arc::new(ConsoleNotificationSender::default());

    let service = Arc::new(IntelligenceService::new(
        crm.clone(),
        snapshots,
        module_config,
        audit.clone(),
    ));
    let dispatcher = TriggerDispatcher::spawn(service.clone());
    let sweep_engine = Arc::new(ReminderEngine::new(crm, notifications, audit));

    let app = with_intelligence_routes(IntelligenceState {
        service,
        dispatcher,
    })
    .layer(Extension(app_state))
    .layer(Extension(sweep_engine))
    .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "intelligence engine ready");

    axum::serve(listener, app).await?;
    Ok(())
}
