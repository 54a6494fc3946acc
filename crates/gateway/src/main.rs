//! StudyOwl API Gateway
//!
//! The main entry point for all external API requests.
//! Handles:
//! - Authentication against the configured identity provider
//! - Rate limiting
//! - Request routing to the notes, quiz, evaluation and query services
//! - Observability (logging, metrics)

mod handlers;
mod middleware;
mod services;
#[cfg(test)]
mod tests;

use axum::{
    extract::{DefaultBodyLimit, FromRef},
    http::StatusCode,
    middleware::{from_fn, from_fn_with_state},
    response::Redirect,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use services::{EvaluationService, NotesService, QueryService, QuizService};
use std::sync::Arc;
use studyowl_common::{
    auth::{create_identity_provider, IdentityProvider},
    config::{AppConfig, ObservabilityConfig},
    genai::create_clients,
    metrics::{self, EMBEDDING_BUCKETS, GENERATION_BUCKETS, LATENCY_BUCKETS},
    store::create_store,
    Embedder, Generator, StudyStore,
};
use tokio::signal;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn StudyStore>,
    pub generator: Arc<dyn Generator>,
    pub identity: Arc<dyn IdentityProvider>,
    pub notes: Arc<NotesService>,
    pub quiz: Arc<QuizService>,
    pub evaluation: Arc<EvaluationService>,
    pub query: Arc<QueryService>,
}

impl AppState {
    /// Wire the study services over the given backends
    pub fn new(
        config: Arc<AppConfig>,
        store: Arc<dyn StudyStore>,
        generator: Arc<dyn Generator>,
        embedder: Arc<dyn Embedder>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        let notes = Arc::new(NotesService::new(
            generator.clone(),
            embedder.clone(),
            store.clone(),
            &config.genai,
            &config.study,
        ));
        let quiz = Arc::new(QuizService::new(
            generator.clone(),
            store.clone(),
            notes.clone(),
            &config.study,
        ));
        let evaluation = Arc::new(EvaluationService::new(generator.clone(), store.clone()));
        let query = Arc::new(QueryService::new(
            generator.clone(),
            embedder,
            store.clone(),
            config.study.query_limit,
        ));

        Self {
            config,
            store,
            generator,
            identity,
            notes,
            quiz,
            evaluation,
            query,
        }
    }
}

impl FromRef<AppState> for Arc<dyn IdentityProvider> {
    fn from_ref(state: &AppState) -> Self {
        state.identity.clone()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;
    init_tracing(&config.observability);

    info!(
        service = %config.observability.service_name,
        "Starting StudyOwl API Gateway v{}",
        studyowl_common::VERSION
    );

    let metrics_handle = if config.observability.metrics_enabled {
        let handle = install_metrics_recorder()?;
        metrics::register_metrics();
        Some(handle)
    } else {
        None
    };

    let config = Arc::new(config);

    let store = create_store(&config).await?;
    let (generator, embedder) = create_clients(&config.genai)?;
    let identity = create_identity_provider(&config.auth)?;

    let state = AppState::new(config.clone(), store, generator, embedder, identity);
    let app = create_router(state, metrics_handle);

    let listener = tokio::net::TcpListener::bind((config.server.host.as_str(), config.server.port)).await?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// `RUST_LOG` wins over the configured level
fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);

    if config.json_logging {
        builder.json().init();
    } else {
        builder.compact().init();
    }
}

fn install_metrics_recorder() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Suffix("request_duration_seconds".to_string()),
            LATENCY_BUCKETS,
        )?
        .set_buckets_for_metric(
            Matcher::Suffix("generation_duration_seconds".to_string()),
            GENERATION_BUCKETS,
        )?
        .set_buckets_for_metric(
            Matcher::Suffix("embedding_duration_seconds".to_string()),
            EMBEDDING_BUCKETS,
        )?
        .install_recorder()?;
    Ok(handle)
}

/// Create the main application router
fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let config = state.config.clone();

    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    // API routes
    let api_routes = Router::new()
        // Health endpoints (no auth)
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))

        // Accounts
        .route("/api/signup", post(handlers::auth::signup))
        .route("/api/login", post(handlers::auth::login))
        .route("/api/welcome", get(handlers::auth::welcome))

        // Notes and quizzes
        .route(
            "/api/get-notes-from-uploaded-file",
            post(handlers::notes::get_notes_from_uploaded_file),
        )
        .route(
            "/api/get-quiz-from-uploaded-notes",
            post(handlers::quiz::get_quiz_from_uploaded_notes),
        )
        .route("/api/regenerate-quiz", post(handlers::quiz::regenerate_quiz))

        // Evaluation
        .route(
            "/api/evaluate-student-answer",
            post(handlers::evaluation::evaluate_student_answer),
        )
        .route(
            "/api/get-student-strength-weakness",
            post(handlers::evaluation::get_student_strength_weakness),
        )

        // Retrieval
        .route("/api/query-bot", post(handlers::query::query_bot))

        // Maintenance
        .route("/api/delete-media", post(handlers::maintenance::delete_media))
        .route("/api/delete-collections", post(handlers::maintenance::delete_collections))
        .route_layer(from_fn(middleware::metrics::track_metrics));

    let mut app = Router::new()
        .route("/", get(|| async { Redirect::temporary("/v1") }))
        .route("/v1", get(handlers::health::root))
        .route("/v1/", get(handlers::health::root))
        .nest("/v1", api_routes);

    if let Some(handle) = metrics_handle {
        app = app.route("/metrics", get(move || std::future::ready(handle.render())));
    }

    if config.rate_limit.enabled {
        let limiter = middleware::rate_limit::create_rate_limiter(
            config.rate_limit.requests_per_second,
            config.rate_limit.burst,
        );
        app = app.layer(from_fn_with_state(
            limiter,
            middleware::rate_limit::rate_limit_middleware,
        ));
    }

    // Compose the app
    app.layer(DefaultBodyLimit::max(config.server.max_upload_bytes))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            config.request_timeout(),
        ))
        .layer(GlobalConcurrencyLimitLayer::new(config.server.max_concurrent_requests))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(request_id)
        .layer(propagate_id)
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
