use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use kindred_core::events::{EventBroadcaster, HookRegistry, HookSystemBuilder};
use kindred_db_memory::MemoryStore;
use kindred_notifications::DynGateway;
use kindred_storage::{DynStore, EventedStore};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::AppConfig;
use crate::handlers::{HandlerContext, Handlers};
use crate::maintenance::CounterMaintenance;
use crate::retention::RetentionService;
use crate::routes;

/// Services shared by every request handler, created once per process.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: DynStore,
    pub gateway: DynGateway,
    pub handlers: Handlers,
    pub retention: Arc<RetentionService>,
    pub maintenance: Arc<CounterMaintenance>,
}

impl AppState {
    pub fn new(config: AppConfig, store: DynStore, gateway: DynGateway) -> Self {
        let context = Arc::new(HandlerContext::new(store.clone(), gateway.clone()));
        let retention = RetentionService::from_config(store.clone(), &config.retention);
        let maintenance = CounterMaintenance::new(
            store.clone(),
            config.maintenance.allow_reset,
            config.retention.batch_limit,
        );
        Self {
            config: Arc::new(config),
            store,
            gateway,
            handlers: Handlers::new(context),
            retention: Arc::new(retention),
            maintenance: Arc::new(maintenance),
        }
    }

    /// Default wiring: in-memory store that publishes document events on
    /// `broadcaster`, and the configured push gateway.
    pub fn from_config(
        config: AppConfig,
        broadcaster: Arc<EventBroadcaster>,
    ) -> anyhow::Result<Self> {
        let store: DynStore = Arc::new(EventedStore::new(MemoryStore::new(), broadcaster));
        tracing::info!(backend = store.backend_name(), "Document store ready");
        let gateway = crate::create_gateway(&config.gateway)?;
        Ok(Self::new(config, store, gateway))
    }
}

pub fn build_app(state: AppState) -> Router {
    let body_limit = state.config.server.body_limit_bytes;
    Router::new()
        // Health and metrics
        .route("/healthz", get(routes::health::healthz))
        .route("/readyz", get(routes::health::readyz))
        .route("/metrics", get(routes::health::metrics))
        // Direct dispatch
        .route("/api/notifications/send", post(routes::notifications::send))
        // External trigger runtime
        .route(
            "/api/triggers/{collection}/{id}",
            post(routes::triggers::ingest),
        )
        // Document writes through the in-process trigger runtime
        .route("/api/documents/{collection}", post(routes::documents::create))
        .route(
            "/api/documents/{collection}/{id}",
            get(routes::documents::read),
        )
        // Operator maintenance
        .route(
            "/api/maintenance/counters/{counter}/reset",
            post(routes::maintenance::reset_counter),
        )
        .route(
            "/api/maintenance/counters/{counter}/recount",
            post(routes::maintenance::recount_counter),
        )
        .route(
            "/api/maintenance/sweeps/{collection}",
            post(routes::maintenance::run_sweep),
        )
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(axum::extract::DefaultBodyLimit::max(body_limit))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(|req: &axum::http::Request<_>| {
                            use tracing::field::Empty;
                            tracing::info_span!(
                                "http.request",
                                http.method = %req.method(),
                                http.target = %req.uri(),
                                http.status_code = Empty,
                            )
                        })
                        .on_response(
                            |res: &axum::http::Response<_>,
                             latency: std::time::Duration,
                             span: &tracing::Span| {
                                span.record(
                                    "http.status_code",
                                    tracing::field::display(res.status().as_u16()),
                                );
                                tracing::info!(
                                    http.status = %res.status().as_u16(),
                                    elapsed_ms = %latency.as_millis(),
                                    "request handled"
                                );
                            },
                        ),
                )
                .layer(CorsLayer::permissive()),
        )
}

pub struct ServerBuilder {
    addr: SocketAddr,
    config: AppConfig,
}

impl ServerBuilder {
    pub fn new() -> Self {
        let cfg = AppConfig::default();
        Self {
            addr: cfg.addr(),
            config: cfg,
        }
    }

    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.addr = cfg.addr();
        self.config = cfg;
        self
    }

    pub fn build(self) -> anyhow::Result<KindredServer> {
        let broadcaster = Arc::new(EventBroadcaster::with_capacity(
            self.config.triggers.buffer_size,
        ));
        let state = AppState::from_config(self.config, broadcaster.clone())?;
        Ok(KindredServer {
            addr: self.addr,
            app: build_app(state.clone()),
            state,
            broadcaster,
        })
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub struct KindredServer {
    addr: SocketAddr,
    app: Router,
    state: AppState,
    broadcaster: Arc<EventBroadcaster>,
}

impl KindredServer {
    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let hooks = if self.state.config.triggers.enabled {
            Some(start_triggers(&self.state, &self.broadcaster).await)
        } else {
            tracing::info!("In-process triggers disabled");
            None
        };
        let scheduler = self.state.retention.scheduler();
        let jobs = scheduler.job_count();
        let retention_shutdown = scheduler.start();
        tracing::info!(jobs, "Retention scheduler started");

        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);
        let served = axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await;

        let _ = retention_shutdown.send(true);
        if let Some(registry) = hooks
            && let Err(e) = registry.on_shutdown().await
        {
            tracing::warn!(error = %e, "Error during hook shutdown");
        }
        served?;
        Ok(())
    }
}

/// Registers every handler as a hook and starts dispatching creation events.
pub async fn start_triggers(
    state: &AppState,
    broadcaster: &EventBroadcaster,
) -> Arc<HookRegistry> {
    let mut builder = HookSystemBuilder::with_timeout(state.config.triggers.hook_timeout());
    for hook in state.handlers.hooks() {
        builder = builder.register(hook).await;
    }
    let registry = builder.start(broadcaster.subscribe());
    if let Err(e) = registry.on_start().await {
        tracing::warn!(error = %e, "Hook on_start failed");
    }
    tracing::info!(hooks = registry.hook_count().await, "In-process triggers started");
    registry
}

async fn shutdown_signal() {
    // Wait for Ctrl+C
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
