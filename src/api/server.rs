//! HTTP(S) listener: binds a socket, optionally wraps it in TLS, and runs
//! the whole API on one background worker until told to stop.
//!
//! If TLS is requested and cannot be set up, startup fails outright.
//! There is no fallback to plaintext; a caller who wants plaintext asks
//! for it explicitly.

use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::extract::{ConnectInfo as PeerInfo, State};
use axum::http::{header, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::api::router::{ApiRouter, Dispatched};
use crate::api::types::{ApiContext, ConnectInfo};
use crate::cert::{CertError, CertificateAuthority};
use crate::registry::ProjectRegistry;
use crate::tasks::TaskList;
use crate::tokens::TokenStore;

/// Largest request body we accept. Prompts are short; anything bigger is
/// a mistake.
const MAX_BODY_BYTES: usize = 1024 * 1024;

#[derive(Debug, Error)]
pub enum ServeError {
    #[error("tls setup failed: {0}")]
    Cert(#[from] CertError),

    #[error("could not bind listener: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct ServeOptions {
    pub host: IpAddr,
    pub port: u16,
    pub auth: bool,
    pub tls: bool,
}

/// Identity of one server run.
#[derive(Debug, Clone)]
pub struct ServerSession {
    pub session_id: Uuid,
    pub server_addr: SocketAddr,
    pub tls: bool,
    pub started_at: chrono::DateTime<chrono::Utc>,
}

/// Handle to the running listener.
pub struct ApiServer {
    session: ServerSession,
    shutdown_tx: Option<oneshot::Sender<()>>,
    tls_handle: Option<axum_server::Handle>,
    worker: tokio::task::JoinHandle<()>,
}

impl ApiServer {
    pub fn session(&self) -> &ServerSession {
        &self.session
    }

    pub fn is_running(&self) -> bool {
        !self.worker.is_finished()
    }

    /// Ask the worker to stop. Safe to call more than once.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.tls_handle.take() {
            handle.graceful_shutdown(Some(std::time::Duration::from_secs(2)));
        }
    }
}

/// Bind and start serving. Returns once the socket is listening; requests
/// are handled on a spawned worker.
pub async fn start_server(
    opts: ServeOptions,
    tokens: TokenStore,
    tasks: TaskList,
    registry: ProjectRegistry,
    ca: &CertificateAuthority,
) -> Result<ApiServer, ServeError> {
    // TLS material first, so a broken certificate store aborts startup
    // before we ever accept a connection.
    let (rustls_config, fingerprint) = if opts.tls {
        ca.ensure_certificate()?;
        let config = ca.tls_config().await?;
        (Some(config), Some(ca.fingerprint()?))
    } else {
        (None, None)
    };

    let listener = std::net::TcpListener::bind(SocketAddr::new(opts.host, opts.port))?;
    let server_addr = listener.local_addr()?;

    let connect = ConnectInfo {
        host: server_addr.ip().to_string(),
        port: server_addr.port(),
        tls: opts.tls,
        fingerprint,
    };
    let ctx = ApiContext {
        tokens: Arc::new(Mutex::new(tokens)),
        tasks: Arc::new(Mutex::new(tasks)),
        registry,
        connect,
        auth_required: opts.auth,
        started_at: std::time::Instant::now(),
    };
    let router = Arc::new(ApiRouter::new(ctx));
    let app = axum::Router::new()
        .fallback(handle_any)
        .with_state(router);

    let session = ServerSession {
        session_id: Uuid::new_v4(),
        server_addr,
        tls: opts.tls,
        started_at: chrono::Utc::now(),
    };
    tracing::info!(
        session_id = %session.session_id,
        addr = %server_addr,
        tls = opts.tls,
        auth = opts.auth,
        "api server listening"
    );

    let (shutdown_tx, tls_handle, worker) = match rustls_config {
        Some(config) => {
            let handle = axum_server::Handle::new();
            let serve_handle = handle.clone();
            let worker = tokio::spawn(async move {
                let result = axum_server::from_tcp_rustls(listener, config)
                    .handle(serve_handle)
                    .serve(app.into_make_service_with_connect_info::<SocketAddr>())
                    .await;
                if let Err(err) = result {
                    tracing::error!("api server stopped with error: {err}");
                }
            });
            (None, Some(handle), worker)
        }
        None => {
            listener.set_nonblocking(true)?;
            let listener = tokio::net::TcpListener::from_std(listener)?;
            let (tx, rx) = oneshot::channel::<()>();
            let worker = tokio::spawn(async move {
                let result = axum::serve(
                    listener,
                    app.into_make_service_with_connect_info::<SocketAddr>(),
                )
                .with_graceful_shutdown(async {
                    let _ = rx.await;
                })
                .await;
                if let Err(err) = result {
                    tracing::error!("api server stopped with error: {err}");
                }
            });
            (Some(tx), None, worker)
        }
    };

    Ok(ApiServer {
        session,
        shutdown_tx,
        tls_handle,
        worker,
    })
}

/// Single entry point for every request. The real routing lives in
/// [`ApiRouter::dispatch`]; this just adapts the transport.
async fn handle_any(
    State(router): State<Arc<ApiRouter>>,
    PeerInfo(peer): PeerInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let (parts, body) = request.into_parts();
    let method = parts.method.as_str().to_string();
    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());
    let bearer = bearer_token(&parts.headers);

    // Read the bytes up front but leave decoding to the router, which
    // only looks at the body once the caller is authenticated.
    let raw_body = axum::body::to_bytes(body, MAX_BODY_BYTES).await.ok();

    let dispatched = router.dispatch(
        &method,
        &path_and_query,
        raw_body.as_deref(),
        bearer.as_deref(),
        peer.ip(),
    );
    match dispatched {
        Dispatched::Json { status, body } => {
            let status =
                StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, Json(body)).into_response()
        }
        Dispatched::Asset { content_type, body } => {
            ([(header::CONTENT_TYPE, content_type)], body).into_response()
        }
    }
}

fn bearer_token(headers: &axum::http::HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(|t| t.trim().to_string())
}
