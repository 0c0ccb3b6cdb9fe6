//! curio-api - HTTP API server for curio

mod signature;

use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, Method, StatusCode},
    response::{
        sse::{Event, KeepAlive},
        IntoResponse, Response, Sse,
    },
    routing::{get, post},
    Json, Router,
};
use governor::{Quota, RateLimiter};
use serde::Deserialize;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use curio_core::{defaults, EventBus};
use curio_db::Database;
use curio_inference::OpenAiBackend;
use curio_pipeline::{
    EventProcessor, MergeConfig, MergeEngine, MergeRequest, OrchestratorConfig, StageOrchestrator,
    SweepConfig, Sweeper, WebhookPayload,
};

use signature::SignatureConfig;

// =============================================================================
// REQUEST ID (UUIDv7)
// =============================================================================

/// Generates time-ordered UUIDv7 request correlation IDs.
#[derive(Clone, Default)]
struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

/// Global rate limiter type (direct quota, no keyed bucketing).
type GlobalRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Application state shared across handlers.
#[derive(Clone)]
struct AppState {
    db: Database,
    event_bus: EventBus,
    processor: Arc<EventProcessor>,
    merge_engine: Arc<MergeEngine>,
    webhook: SignatureConfig,
    /// Global rate limiter (None if rate limiting is disabled).
    rate_limiter: Option<Arc<GlobalRateLimiter>>,
}

// =============================================================================
// ERROR MAPPING
// =============================================================================

/// Maps pipeline errors onto HTTP responses. Internal detail is logged,
/// never leaked to the caller.
struct ApiError(curio_core::Error);

impl From<curio_core::Error> for ApiError {
    fn from(e: curio_core::Error) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        use curio_core::Error;
        let (status, message) = match &self.0 {
            Error::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Error::NotFound(msg) => (StatusCode::NOT_FOUND, format!("Not found: {}", msg)),
            Error::AssetNotFound(id) => (StatusCode::NOT_FOUND, format!("Asset not found: {}", id)),
            Error::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            other => {
                error!(error_msg = %other, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (
            status,
            Json(serde_json::json!({ "success": false, "error": message })),
        )
            .into_response()
    }
}

// =============================================================================
// MAIN
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with configurable output
    //
    // Environment variables:
    //   LOG_FORMAT  - "json" or "text" (default: "text")
    //   LOG_FILE    - path to log file (optional, enables file logging)
    //   LOG_ANSI    - "true"/"false" override ANSI colors (auto-detected by default)
    //   RUST_LOG    - standard env filter (default: "curio_api=debug,tower_http=debug")
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "curio_api=debug,curio_pipeline=debug,tower_http=debug".into());

    let registry = tracing_subscriber::registry().with(env_filter);

    // Optionally create a file appender with daily rotation
    let _file_guard = if let Some(ref path) = log_file {
        let file_dir = std::path::Path::new(path)
            .parent()
            .unwrap_or(std::path::Path::new("."));
        let file_name = std::path::Path::new(path)
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("curio-api.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer().with_writer(non_blocking);
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            } else {
                layer = layer.with_ansi(false); // no ANSI in files
            }
            registry.with(layer).init();
        }
        Some(guard)
    } else {
        if log_format == "json" {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer();
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            }
            registry.with(layer).init();
        }
        None
    };

    info!(
        log_format = %log_format,
        log_file = log_file.as_deref().unwrap_or("(stdout)"),
        "Logging initialized"
    );

    // Get configuration from environment
    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "postgres://localhost/curio".to_string());
    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(defaults::SERVER_PORT);

    // Rate limiting configuration
    let rate_limit_requests: u64 = std::env::var("RATE_LIMIT_REQUESTS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(defaults::RATE_LIMIT_REQUESTS);
    let rate_limit_period_secs: u64 = std::env::var("RATE_LIMIT_PERIOD_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(defaults::RATE_LIMIT_PERIOD_SECS);
    let rate_limit_enabled: bool = std::env::var("RATE_LIMIT_ENABLED")
        .map(|v| v != "false" && v != "0")
        .unwrap_or(true);

    let db = Database::connect(&database_url).await?;
    db.migrate().await?;
    info!(subsystem = "db", "Database connected and migrated");

    let event_bus = EventBus::new(defaults::EVENT_BUS_CAPACITY);

    let backend = Arc::new(OpenAiBackend::from_env()?);
    let merge_engine = Arc::new(MergeEngine::new(
        db.clone(),
        backend,
        event_bus.clone(),
        MergeConfig::from_env(),
    ));
    let orchestrator = Arc::new(StageOrchestrator::new(
        db.clone(),
        merge_engine.clone(),
        OrchestratorConfig::from_env(),
    )?);
    let processor = Arc::new(EventProcessor::new(
        db.clone(),
        event_bus.clone(),
        orchestrator.clone(),
    ));

    // Stuck-asset sweep (retry path for lost dispatches)
    let _sweep_handle =
        Sweeper::new(db.clone(), orchestrator.clone(), SweepConfig::from_env()).start();

    let rate_limiter = if rate_limit_enabled {
        let quota = Quota::with_period(std::time::Duration::from_secs(rate_limit_period_secs))
            .ok_or_else(|| anyhow::anyhow!("Rate limit period must be non-zero"))?
            .allow_burst(
                NonZeroU32::new(rate_limit_requests as u32)
                    .ok_or_else(|| anyhow::anyhow!("Rate limit must be non-zero"))?,
            );
        Some(Arc::new(RateLimiter::direct(quota)))
    } else {
        None
    };

    let webhook = SignatureConfig::from_env();
    if webhook.disabled {
        warn!("Webhook signature verification is DISABLED (non-production only)");
    }

    let state = AppState {
        db,
        event_bus,
        processor,
        merge_engine,
        webhook,
        rate_limiter,
    };

    // The merge endpoint is the only user-facing call and the only one rate
    // limited; the webhook path is exempt so provider redelivery never
    // collides with the limiter.
    let rate_limited = Router::new()
        .route("/api/v1/merge", post(merge))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ));

    let app = Router::new()
        .route("/health", get(health))
        .route("/webhooks/provider", get(webhook_liveness).post(webhook_receive))
        .route("/api/v1/events", get(sse_events))
        .merge(rate_limited)
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(AllowOrigin::any())
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers([
                    axum::http::header::CONTENT_TYPE,
                    axum::http::header::AUTHORIZATION,
                    axum::http::HeaderName::from_static(defaults::SIGNATURE_HEADER),
                ]),
        )
        .layer(CatchPanicLayer::new())
        .layer(RequestBodyLimitLayer::new(defaults::MAX_BODY_BYTES))
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!(%addr, "curio-api listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// =============================================================================
// HEALTH
// =============================================================================

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let pool = state.db.pool();
    Json(serde_json::json!({
        "status": "ok",
        "db": {
            "pool_size": pool.size(),
            "pool_idle": pool.num_idle(),
        }
    }))
}

/// Liveness probe for the webhook path (the provider's endpoint check).
async fn webhook_liveness() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

// =============================================================================
// WEBHOOK INGESTION
// =============================================================================

/// Receive one provider delivery.
///
/// Order matters: verify the signature first (401, no side effects on
/// failure), then parse, then store and process. The response is 200 once
/// the body parses, regardless of downstream success; the provider's retry
/// semantics cannot express partial failure.
async fn webhook_receive(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let header = headers
        .get(defaults::SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());
    let now = chrono::Utc::now().timestamp();

    if let Err(reason) = state.webhook.verify(header, &body, now) {
        warn!(
            subsystem = "api",
            component = "webhook",
            reject_reason = reason.as_str(),
            "Webhook signature rejected"
        );
        return (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "error": "invalid signature" })),
        )
            .into_response();
    }

    let raw: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": "invalid JSON body" })),
            )
                .into_response();
        }
    };
    // Anything object-shaped is acknowledged, even without a `type` field;
    // a 4xx here would put the provider into an endless retry loop.
    let Some(payload) = WebhookPayload::parse(&raw) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "expected a JSON object" })),
        )
            .into_response();
    };

    // Processing failures never change the acknowledgement; the event is
    // already durable and the sweep/redelivery recover.
    if let Err(e) = state.processor.ingest(&payload, raw).await {
        error!(
            subsystem = "api",
            component = "webhook",
            event_type = %payload.event_type,
            error_msg = %e,
            "Webhook processing failed after ack decision"
        );
    }

    Json(serde_json::json!({ "received": true, "type": payload.declared_type() })).into_response()
}

// =============================================================================
// MERGE ENDPOINT
// =============================================================================

/// Merge request body. `mux_asset_id` is accepted as a legacy alias for
/// `provider_asset_id`.
#[derive(Debug, Deserialize)]
struct MergeBody {
    user_id: Option<Uuid>,
    asset_id: Option<Uuid>,
    provider_asset_id: Option<String>,
    mux_asset_id: Option<String>,
    transcript: Option<String>,
}

async fn merge(
    State(state): State<AppState>,
    Json(body): Json<MergeBody>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = body.user_id.ok_or_else(|| {
        curio_core::Error::InvalidInput("user_id is required".to_string())
    })?;
    let provider_asset_id = body.provider_asset_id.or(body.mux_asset_id);
    if body.asset_id.is_none() && provider_asset_id.is_none() {
        return Err(curio_core::Error::InvalidInput(
            "asset_id or provider_asset_id is required".to_string(),
        )
        .into());
    }

    let outcome = state
        .merge_engine
        .merge(MergeRequest {
            user_id,
            asset_id: body.asset_id,
            provider_asset_id,
            transcript: body.transcript,
        })
        .await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "items": outcome.items,
        "message": format!("Merged {} items", outcome.items.len()),
    })))
}

// =============================================================================
// REALTIME FEED (SSE)
// =============================================================================

#[derive(Debug, Deserialize)]
struct EventsQuery {
    /// Filter to one user's events. Unowned events (raw webhook stores)
    /// are not delivered to filtered subscribers.
    user_id: Option<Uuid>,
}

async fn sse_events(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> Sse<impl futures::Stream<Item = Result<Event, std::convert::Infallible>>> {
    let rx = state.event_bus.subscribe();
    let filter_user = query.user_id;

    use tokio_stream::StreamExt as _;
    let stream = tokio_stream::wrappers::BroadcastStream::new(rx).filter_map(move |result| {
        match result {
            Ok(envelope) => {
                if let Some(user_id) = filter_user {
                    if envelope.payload.user_id() != Some(user_id) {
                        return None;
                    }
                }
                match serde_json::to_string(&envelope) {
                    Ok(json) => Some(Ok(Event::default().event(envelope.event_type).data(json))),
                    Err(_) => None,
                }
            }
            Err(_) => None, // Skip lagged/closed errors
        }
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(std::time::Duration::from_secs(15))
            .text("keepalive"),
    )
}

// =============================================================================
// RATE LIMITING MIDDLEWARE
// =============================================================================

async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: axum::extract::Request,
    next: axum::middleware::Next,
) -> Result<impl IntoResponse, (StatusCode, Json<serde_json::Value>)> {
    if let Some(limiter) = &state.rate_limiter {
        if limiter.check().is_err() {
            warn!("Rate limit exceeded");
            return Err((
                StatusCode::TOO_MANY_REQUESTS,
                Json(serde_json::json!({
                    "error": "rate_limit_exceeded",
                    "error_description": "Too many requests. Please wait before retrying."
                })),
            ));
        }
    }
    Ok(next.run(request).await)
}
