//! Application startup and lifecycle management.

use crate::config::{InvoicingConfig, StorageBackend};
use crate::handlers;
use crate::services::metrics::HTTP_REQUESTS_TOTAL;
use crate::services::{
    init_metrics, BillingApi, Database, HttpBillingApi, HttpObjectStorage, LocalStorage,
    MemoryStore, SessionRegistry, Storage, StoreHealth, Stores,
};
use crate::workflows::{BoletaForm, IssuancePipeline, SummaryWorkflow};
use axum::{
    extract::{MatchedPath, Request},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use secrecy::ExposeSecret;
use service_core::error::AppError;
use service_core::middleware::tracing::request_id_middleware;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Income account seeded into the in-memory store.
const DEV_DEFAULT_ACCOUNT: &str = "Caja Principal";

/// Upper bound on how long an expired session waits for the sweep.
const MAX_SWEEP_PERIOD: Duration = Duration::from_secs(60);

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<InvoicingConfig>,
    pub stores: Stores,
    pub pipeline: Arc<IssuancePipeline>,
    pub boleta_forms: Arc<SessionRegistry<BoletaForm>>,
    pub summary_forms: Arc<SessionRegistry<SummaryWorkflow>>,
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application with the backends named in the configuration.
    pub async fn build(config: InvoicingConfig) -> Result<Self, AppError> {
        init_metrics();

        let stores = connect_stores(&config).await?;
        let storage = open_storage(&config).await?;
        Self::build_with(config, stores, storage).await
    }

    /// Build the application on the given stores and artifact storage.
    pub async fn build_with(
        config: InvoicingConfig,
        stores: Stores,
        storage: Arc<dyn Storage>,
    ) -> Result<Self, AppError> {
        let api: Arc<dyn BillingApi> =
            Arc::new(HttpBillingApi::new(config.billing_api.clone()).map_err(|e| {
                tracing::error!(error = %e, "Failed to build billing API client");
                AppError::from(e)
            })?);

        let pipeline = Arc::new(IssuancePipeline::new(
            api,
            storage,
            stores.incomes.clone(),
            config.billing_api.company_id.clone(),
            config.billing_api.branch_id.clone(),
        ));

        let addr = config.common.bind_address();
        let listener = TcpListener::bind(&addr).await.map_err(|e| {
            tracing::error!(error = %e, addr = %addr, "Failed to bind HTTP listener");
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!(port = port, "Invoicing service listener bound");

        let ttl = config.session_ttl();
        let state = AppState {
            config: Arc::new(config),
            stores,
            pipeline,
            boleta_forms: Arc::new(SessionRegistry::new()),
            summary_forms: Arc::new(SessionRegistry::new()),
        };
        spawn_session_sweeper(&state, ttl);

        Ok(Self {
            port,
            listener,
            state,
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Handle used to close the store after the server stops.
    pub fn store_health(&self) -> Arc<dyn StoreHealth> {
        self.state.stores.health.clone()
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let router = router(self.state);

        tracing::info!(
            service = "invoicing-service",
            version = env!("CARGO_PKG_VERSION"),
            port = self.port,
            "Service ready to accept connections"
        );

        axum::serve(self.listener, router).await.map_err(|e| {
            tracing::error!(error = %e, "HTTP server error");
            std::io::Error::other(format!("HTTP server error: {}", e))
        })
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics_handler))
        .route("/accounts", get(handlers::list_accounts))
        .route("/boleta-forms", post(handlers::open_boleta_form))
        .route(
            "/boleta-forms/:id",
            get(handlers::get_boleta_form).delete(handlers::delete_boleta_form),
        )
        .route("/boleta-forms/:id/client-lookup", post(handlers::client_lookup))
        .route("/boleta-forms/:id/submit", post(handlers::submit_boleta))
        .route("/boleta-forms/:id/reset", post(handlers::reset_boleta_form))
        .route("/boleta-forms/:id/pdf", get(handlers::download_pdf))
        .route("/summary-forms", post(handlers::open_summary_form))
        .route(
            "/summary-forms/:id",
            get(handlers::get_summary_form).delete(handlers::delete_summary_form),
        )
        .route("/summary-forms/:id/create", post(handlers::create_summary))
        .route("/summary-forms/:id/send", post(handlers::send_summary))
        .route("/daily-summaries", get(handlers::list_daily_summaries))
        .route_layer(middleware::from_fn(track_http_metrics))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(request_id_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Count requests by route template, not by raw path.
async fn track_http_metrics(req: Request, next: Next) -> Response {
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let response = next.run(req).await;

    HTTP_REQUESTS_TOTAL
        .with_label_values(&[route.as_str(), response.status().as_str()])
        .inc();
    response
}

/// Periodically drop idle form sessions. The task ends once the
/// registries are gone.
fn spawn_session_sweeper(state: &AppState, ttl: Duration) {
    let boleta_forms = Arc::downgrade(&state.boleta_forms);
    let summary_forms = Arc::downgrade(&state.summary_forms);
    let period = (ttl / 2).clamp(Duration::from_secs(1), MAX_SWEEP_PERIOD);

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if !sweep_sessions(&boleta_forms, &summary_forms, ttl) {
                break;
            }
        }
    });
}

fn sweep_sessions(
    boleta_forms: &Weak<SessionRegistry<BoletaForm>>,
    summary_forms: &Weak<SessionRegistry<SummaryWorkflow>>,
    ttl: Duration,
) -> bool {
    let (Some(boleta_forms), Some(summary_forms)) =
        (boleta_forms.upgrade(), summary_forms.upgrade())
    else {
        return false;
    };

    let boletas = boleta_forms.evict_idle(ttl).len();
    let summaries = summary_forms.evict_idle(ttl);
    let summary_count = summaries.len();
    for (id, mut workflow) in summaries {
        if let Some(summary) = workflow.discard() {
            tracing::warn!(
                form_id = %id,
                summary_id = summary.id,
                numero = %summary.numero_completo,
                "Idle summary form expired with an unsent summary"
            );
        }
    }

    if boletas + summary_count > 0 {
        tracing::info!(
            boleta_forms = boletas,
            summary_forms = summary_count,
            "Expired idle form sessions"
        );
    }
    true
}

/// PostgreSQL when a database is configured, otherwise an in-memory store.
async fn connect_stores(config: &InvoicingConfig) -> Result<Stores, AppError> {
    let Some(db_config) = &config.database else {
        tracing::warn!("DATABASE_URL not set, using the in-memory store");
        return Ok(Stores::from_shared(Arc::new(
            MemoryStore::with_default_account(DEV_DEFAULT_ACCOUNT),
        )));
    };

    let db = Database::new(
        db_config.url.expose_secret(),
        db_config.max_connections,
        db_config.min_connections,
    )
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "Failed to connect to PostgreSQL");
        AppError::from(e)
    })?;

    if db_config.run_migrations {
        db.run_migrations().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to run migrations");
            AppError::from(e)
        })?;
    }

    Ok(Stores::from_shared(Arc::new(db)))
}

async fn open_storage(config: &InvoicingConfig) -> Result<Arc<dyn Storage>, AppError> {
    let storage = &config.storage;
    match storage.backend {
        StorageBackend::Local => {
            let local = LocalStorage::new(&storage.local_path, &storage.bucket)
                .await
                .map_err(|e| {
                    tracing::error!(
                        error = %e,
                        path = %storage.local_path,
                        "Failed to initialize local storage"
                    );
                    AppError::from(e)
                })?;
            Ok(Arc::new(local))
        }
        StorageBackend::Http => {
            let url = storage.http_url.as_deref().ok_or_else(|| {
                AppError::ConfigError(anyhow::anyhow!(
                    "STORAGE_HTTP_URL is required when STORAGE_BACKEND=http"
                ))
            })?;
            Ok(Arc::new(HttpObjectStorage::new(
                url,
                &storage.bucket,
                storage.http_token.clone(),
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sweep_drops_expired_sessions_and_stops_with_the_registries() {
        let boleta_forms = Arc::new(SessionRegistry::<BoletaForm>::new());
        let summary_forms = Arc::new(SessionRegistry::new());
        summary_forms.open(SummaryWorkflow::new());
        summary_forms.open(SummaryWorkflow::new());

        let boleta_weak = Arc::downgrade(&boleta_forms);
        let summary_weak = Arc::downgrade(&summary_forms);
        assert!(sweep_sessions(&boleta_weak, &summary_weak, Duration::from_secs(3600)));
        assert_eq!(summary_forms.len(), 2);

        assert!(sweep_sessions(&boleta_weak, &summary_weak, Duration::ZERO));
        assert!(summary_forms.is_empty());

        drop(summary_forms);
        assert!(!sweep_sessions(&boleta_weak, &summary_weak, Duration::ZERO));
    }
}
