//! Gateway HTTP server: webhook handshake and events, local test endpoint, health.

use crate::channels::{ReplyDispatcher, WhatsAppChannel};
use crate::config::{self, Config};
use crate::fallback::FallbackResponder;
use crate::gateway::protocol::{
    ErrorResponse, HealthResponse, MetaResponse, TestRequest, TestResponse, WebhookQuery,
};
use crate::knowledge::{KnowledgeStore, SqliteKnowledgeStore};
use crate::resolver::Resolver;
use crate::webhook::{self, IncomingMessage, ParsedEvent};
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Inbound queue depth between the webhook handler and the processor.
const INBOUND_QUEUE: usize = 256;

/// How long shutdown waits for in-flight resolutions.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(15);

/// Shared state for the gateway handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub config: Arc<Config>,
    /// Expected `hub.verify_token`. None rejects every handshake.
    pub verify_token: Option<String>,
    /// HMAC secret for `X-Hub-Signature-256`. None accepts unsigned events.
    pub app_secret: Option<String>,
    pub store: Arc<dyn KnowledgeStore>,
    pub resolver: Arc<Resolver>,
    pub dispatcher: Arc<dyn ReplyDispatcher>,
    /// Sender for parsed webhook messages. Processor task receives.
    pub inbound_tx: mpsc::Sender<IncomingMessage>,
}

impl GatewayState {
    /// Build state from config (env overrides applied). Returns the receiving end of the
    /// inbound queue for [`process_inbound`].
    pub fn new(
        config: Config,
        store: Arc<dyn KnowledgeStore>,
        dispatcher: Arc<dyn ReplyDispatcher>,
    ) -> (Self, mpsc::Receiver<IncomingMessage>) {
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_QUEUE);
        let fallback = FallbackResponder::from_config(&config);
        let resolver = Arc::new(Resolver::new(store.clone(), fallback));
        let state = Self {
            verify_token: config::resolve_verify_token(&config),
            app_secret: config::resolve_app_secret(&config),
            config: Arc::new(config),
            store,
            resolver,
            dispatcher,
            inbound_tx,
        };
        (state, inbound_rx)
    }
}

/// Routes served by the gateway.
pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health_http))
        .route("/ready", get(ready_http))
        .route("/meta", get(meta_http))
        .route("/webhook", get(webhook_verify).post(webhook_event))
        .route("/test", post(test_message))
        .with_state(state)
}

/// Run the gateway: open the knowledge store, then serve until SIGINT/SIGTERM.
/// `config_path` locates the default SQLite file when no database URL is configured.
/// An unreachable database does not stop startup: the gateway serves degraded and the store
/// retries on each request.
pub async fn run_gateway(config: Config, config_path: PathBuf) -> Result<()> {
    let database_url = config::resolve_database_url(&config, &config_path);
    let store = SqliteKnowledgeStore::open(&database_url, config.database.max_connections)
        .await
        .with_context(|| format!("opening knowledge store {}", database_url))?;
    log::info!("knowledge store: {}", database_url);
    serve(config, Arc::new(store)).await
}

/// Serve the gateway over an already opened store. Binds to gateway.bind:gateway.port.
pub async fn serve(config: Config, store: Arc<dyn KnowledgeStore>) -> Result<()> {
    let whatsapp = WhatsAppChannel::from_config(&config).context("building whatsapp client")?;
    if !whatsapp.is_configured() {
        log::warn!("WHATSAPP_TOKEN or PHONE_NUMBER_ID not set; replies will not be delivered");
    }
    let bind_addr = format!("{}:{}", config.gateway.bind.trim(), config.gateway.port);

    let (state, inbound_rx) = GatewayState::new(config, store, Arc::new(whatsapp));
    if state.app_secret.is_none() {
        log::warn!("APP_SECRET not set; webhook signatures are not verified");
    }
    if state.verify_token.is_none() {
        log::warn!("VERIFY_TOKEN not set; webhook subscription handshakes will be rejected");
    }
    log::info!(
        "fallback backend: {}",
        state.resolver.fallback().backend_name()
    );

    let processor = tokio::spawn(process_inbound(
        inbound_rx,
        state.resolver.clone(),
        state.dispatcher.clone(),
    ));

    let app = router(state);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!("gateway listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("gateway server exited")?;

    // The router (and its queue sender) is gone; the processor drains and exits.
    match tokio::time::timeout(DRAIN_TIMEOUT, processor).await {
        Ok(_) => log::info!("inbound queue drained"),
        Err(_) => log::warn!("inbound queue not drained within {:?}", DRAIN_TIMEOUT),
    }
    log::info!("gateway stopped");
    Ok(())
}

/// Resolve and answer queued messages, one task per message. Returns once the queue is closed
/// and every spawned task has finished.
pub async fn process_inbound(
    mut inbound_rx: mpsc::Receiver<IncomingMessage>,
    resolver: Arc<Resolver>,
    dispatcher: Arc<dyn ReplyDispatcher>,
) {
    let mut tasks = JoinSet::new();
    while let Some(msg) = inbound_rx.recv().await {
        let resolver = resolver.clone();
        let dispatcher = dispatcher.clone();
        tasks.spawn(async move {
            if let Err(e) = resolver.handle(&msg, dispatcher.as_ref()).await {
                log::error!("reply to {} failed: {}", msg.sender_id, e);
            }
        });
        // reap finished tasks
        while tasks.try_join_next().is_some() {}
    }
    while tasks.join_next().await.is_some() {}
}

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                log::error!("failed to install SIGTERM handler: {}", e);
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
    log::info!("shutdown signal received, draining connections");
}

/// GET / returns a service banner.
async fn index() -> Json<serde_json::Value> {
    Json(json!({
        "service": "edubot",
        "version": VERSION,
        "endpoints": {
            "webhook": "/webhook",
            "test": "/test",
            "health": "/health",
            "ready": "/ready",
            "meta": "/meta",
        },
    }))
}

/// GET /health reports store reachability and active row counts. Always 200.
async fn health_http(State(state): State<GatewayState>) -> Json<HealthResponse> {
    let body = match state.store.counts().await {
        Ok(counts) => HealthResponse {
            status: "healthy",
            database: "connected",
            courses: counts.courses,
            faqs: counts.faqs,
        },
        Err(e) => {
            log::warn!("health: {}", e);
            HealthResponse {
                status: "degraded",
                database: "unavailable",
                courses: 0,
                faqs: 0,
            }
        }
    };
    Json(body)
}

/// GET /ready is a liveness probe with no store round trip.
async fn ready_http() -> Json<serde_json::Value> {
    Json(json!({ "ready": true, "version": VERSION }))
}

/// GET /meta describes the running configuration without secrets.
async fn meta_http(State(state): State<GatewayState>) -> Json<MetaResponse> {
    Json(MetaResponse {
        version: VERSION,
        api_version: config::resolve_api_version(&state.config),
        fallback_backend: state.resolver.fallback().backend_name().to_string(),
        signature_mode: if state.app_secret.is_some() {
            "hmac-sha256"
        } else {
            "open"
        },
        dispatch_configured: config::resolve_access_token(&state.config).is_some()
            && config::resolve_phone_number_id(&state.config).is_some(),
    })
}

/// GET /webhook echoes `hub.challenge` when mode and token match; 403 otherwise.
async fn webhook_verify(
    State(state): State<GatewayState>,
    Query(query): Query<WebhookQuery>,
) -> Response {
    match webhook::verify_subscription(
        query.mode.as_deref(),
        query.verify_token.as_deref(),
        query.challenge.as_deref(),
        state.verify_token.as_deref(),
    ) {
        Some(challenge) => {
            log::info!("webhook: subscription verified");
            (StatusCode::OK, challenge).into_response()
        }
        None => {
            log::warn!("webhook: subscription handshake rejected");
            (StatusCode::FORBIDDEN, "Forbidden").into_response()
        }
    }
}

/// POST /webhook verifies the signature, parses the event and queues text messages.
/// Anything past the signature check is acknowledged with 200 so the platform does not retry.
async fn webhook_event(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let signature = headers
        .get(webhook::SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());
    if !webhook::verify_signature(&body, signature, state.app_secret.as_deref()) {
        log::warn!("webhook: signature verification failed");
        return (StatusCode::FORBIDDEN, "Forbidden").into_response();
    }

    match webhook::parse_event(&body) {
        ParsedEvent::Text(msg) => {
            if state.inbound_tx.send(msg).await.is_err() {
                log::error!("webhook: inbound queue closed, message dropped");
            }
        }
        ParsedEvent::NoMessage(reason) => log::debug!("webhook: nothing to answer ({:?})", reason),
        ParsedEvent::Malformed(detail) => log::warn!("webhook: malformed event: {}", detail),
    }
    (StatusCode::OK, Json(json!({ "status": "ok" }))).into_response()
}

/// POST /test resolves `{ "message" }` without signature check or dispatch.
async fn test_message(State(state): State<GatewayState>, body: Bytes) -> Response {
    let request: TestRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => {
            return bad_request(format!("expected {{\"message\": string}}: {}", e));
        }
    };
    if request.message.trim().is_empty() {
        return bad_request("message must not be empty".to_string());
    }

    let resolution = state.resolver.resolve(&request.message).await;
    let counts = state.store.counts().await.unwrap_or_default();
    Json(TestResponse {
        input: request.message,
        reply: resolution.reply,
        source: resolution.source,
        courses: counts.courses,
        faqs: counts.faqs,
    })
    .into_response()
}

fn bad_request(error: String) -> Response {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse { error })).into_response()
}
