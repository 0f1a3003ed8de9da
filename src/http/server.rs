//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with all handlers
//! - Wire up middleware (tracing, limits, request ID, error pages)
//! - Own the lazily built blob service client
//! - Bind plain and TLS listeners, drain on shutdown
//!
//! # Design Decisions
//! - The blob client is built on first use, not at startup, so a portal
//!   without storage configuration boots and serves its pages
//! - Strict-Transport-Security is attached outside every other layer and
//!   only outside development

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{DefaultBodyLimit, MatchedPath, Request, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, OnceCell};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::schema::{AppConfig, TlsConfig};
use crate::http::error::error_page_middleware;
use crate::http::request::{PortalRequestId, X_REQUEST_ID};
use crate::identity::ChainedTokenCredential;
use crate::observability::metrics;
use crate::storage::{BlobServiceClient, StorageResult};
use crate::web::handlers;

/// 30 days, attached outside development.
const HSTS_VALUE: &str = "max-age=2592000";

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    http: reqwest::Client,
    blobs: Arc<OnceCell<Arc<BlobServiceClient>>>,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>, http: reqwest::Client) -> Self {
        Self {
            config,
            http,
            blobs: Arc::new(OnceCell::new()),
        }
    }

    /// The shared blob service client.
    ///
    /// Built once on first use and reused by every request thereafter.
    /// A failed build (for example, no endpoint configured) is reported
    /// to the caller and retried on the next use instead of being
    /// latched forever.
    pub async fn blob_client(&self) -> StorageResult<Arc<BlobServiceClient>> {
        let client = self
            .blobs
            .get_or_try_init(|| async {
                let credential = Arc::new(ChainedTokenCredential::standard(
                    &self.config.credentials,
                    self.http.clone(),
                ));
                BlobServiceClient::from_config(
                    &self.config.storage,
                    credential,
                    self.http.clone(),
                )
                .map(Arc::new)
            })
            .await?;
        Ok(Arc::clone(client))
    }
}

/// HTTP server for the portal.
pub struct HttpServer {
    router: Router,
    config: Arc<AppConfig>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: Arc<AppConfig>, http: reqwest::Client) -> Self {
        let state = AppState::new(config.clone(), http);
        let router = Self::build_router(&config, state);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &AppConfig, state: AppState) -> Router {
        Self::apply_middleware(Self::routes(), config, state)
    }

    /// The portal's route table, without middleware.
    fn routes() -> Router<AppState> {
        Router::new()
            .route("/", get(handlers::index))
            .route("/error", get(handlers::error_page))
            .route("/health", get(handlers::health))
            .route(
                "/api/blobs",
                get(handlers::list_blobs).post(handlers::upload_blob),
            )
            .route(
                "/api/blobs/{*name}",
                get(handlers::download_blob).delete(handlers::delete_blob),
            )
            .route("/api/container", post(handlers::create_container))
    }

    /// Wrap a route table in the portal's middleware stack.
    ///
    /// Later `.layer` calls wrap earlier ones, so the list reads from the
    /// innermost layer outward: body limits and timeout, panic recovery,
    /// the error-page rewrite, request ID propagation, tracing, request
    /// ID generation, and finally HSTS outside development.
    fn apply_middleware(routes: Router<AppState>, config: &AppConfig, state: AppState) -> Router {
        let request_timeout = Duration::from_secs(config.limits.request_timeout_secs);

        let mut router = routes
            .route_layer(middleware::from_fn(record_metrics))
            .layer(DefaultBodyLimit::max(config.limits.max_body_bytes))
            .layer(RequestBodyLimitLayer::new(config.limits.max_body_bytes))
            .layer(TimeoutLayer::new(request_timeout))
            .layer(CatchPanicLayer::new())
            .layer(middleware::from_fn_with_state(
                state.clone(),
                error_page_middleware,
            ))
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID.clone()))
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::new(X_REQUEST_ID.clone(), PortalRequestId))
            .with_state(state);

        if !config.environment.is_development() {
            router = router.layer(SetResponseHeaderLayer::overriding(
                header::STRICT_TRANSPORT_SECURITY,
                HeaderValue::from_static(HSTS_VALUE),
            ));
        }

        router
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            environment = %self.config.environment,
            "HTTP server starting"
        );

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Run the server over TLS.
    pub async fn run_tls(
        self,
        addr: SocketAddr,
        tls: &TlsConfig,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let rustls = RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path).await?;

        let handle = axum_server::Handle::new();
        let graceful = handle.clone();
        tokio::spawn(async move {
            let _ = shutdown.recv().await;
            graceful.graceful_shutdown(Some(Duration::from_secs(10)));
        });

        tracing::info!(
            address = %addr,
            environment = %self.config.environment,
            "HTTPS server starting"
        );

        axum_server::bind_rustls(addr, rustls)
            .handle(handle)
            .serve(self.router.into_make_service())
            .await?;

        tracing::info!("HTTPS server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}

/// Record per-request metrics using the matched route template.
async fn record_metrics(request: Request, next: Next) -> Response {
    let started = Instant::now();
    let method = request.method().to_string();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    let response = next.run(request).await;
    metrics::record_http_request(&method, &path, response.status().as_u16(), started);
    response
}

/// Run a plain-HTTP listener that redirects everything to HTTPS.
pub async fn run_redirect(
    listener: TcpListener,
    https_port: u16,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!(address = %addr, "HTTP redirect listener starting");

    let router = Router::new()
        .fallback(redirect_handler)
        .with_state(https_port);

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await
}

async fn redirect_handler(State(https_port): State<u16>, request: Request) -> Response {
    let Some(host) = request
        .headers()
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
    else {
        return StatusCode::BAD_REQUEST.into_response();
    };

    let path_and_query = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    match https_location(host, https_port, path_and_query) {
        Some(location) => {
            (StatusCode::PERMANENT_REDIRECT, [(header::LOCATION, location)]).into_response()
        }
        None => StatusCode::BAD_REQUEST.into_response(),
    }
}

/// Build the HTTPS form of a request's location from its Host header.
fn https_location(host: &str, https_port: u16, path_and_query: &str) -> Option<HeaderValue> {
    // Strip a port suffix; bracketed IPv6 hosts without one end in ']'.
    let bare = if host.ends_with(']') {
        host
    } else {
        host.rsplit_once(':').map(|(h, _)| h).unwrap_or(host)
    };
    if bare.is_empty() {
        return None;
    }

    let location = if https_port == 443 {
        format!("https://{bare}{path_and_query}")
    } else {
        format!("https://{bare}:{https_port}{path_and_query}")
    };
    HeaderValue::from_str(&location).ok()
}
