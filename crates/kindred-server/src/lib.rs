pub mod config;
pub mod error;
pub mod handlers;
pub mod ledger;
pub mod maintenance;
pub mod metrics;
pub mod observability;
pub mod processed;
pub mod retention;
pub mod routes;
pub mod server;

use std::sync::Arc;

pub use config::{AppConfig, GatewayConfig, GatewayKind, RetentionConfig, ServerConfig};
pub use handlers::{EventHandler, HandlerError, HandlerOutcome, Handlers};
pub use ledger::{CounterLedger, LedgerOutcome};
pub use observability::init_tracing;
pub use server::{AppState, KindredServer, ServerBuilder, build_app};

use kindred_notifications::{DynGateway, FcmAdapter, FcmConfig, LogGateway, NotificationError};

/// Create the push gateway selected by configuration.
///
/// `log` never delivers anything; it is meant for local runs.
pub fn create_gateway(config: &GatewayConfig) -> Result<DynGateway, NotificationError> {
    match config.kind {
        GatewayKind::Log => {
            tracing::info!("Using log push gateway; notifications are logged, not delivered");
            Ok(Arc::new(LogGateway::new()))
        }
        GatewayKind::Fcm => {
            let mut fcm = FcmConfig::new(
                config.project_id.clone().unwrap_or_default(),
                config.access_token.clone().unwrap_or_default(),
            );
            fcm.timeout = config.timeout();
            if let Some(endpoint) = &config.endpoint {
                fcm = fcm.with_endpoint(endpoint.clone());
            }
            tracing::info!(project_id = %fcm.project_id, endpoint = %fcm.endpoint, "Using FCM push gateway");
            Ok(Arc::new(FcmAdapter::new(fcm)?))
        }
    }
}
