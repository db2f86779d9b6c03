//! `RelayServer` builder and server loop.
//!
//! One listener serves both transports. Every TCP connection is an HTTP/1
//! connection; a WebSocket upgrade turns it into a persistent relay
//! channel, anything else goes to the [`RestRouter`].

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use amman_relay_transport::WebSocketConnection;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::header::{self, HeaderValue};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::handshake::derive_accept_key;
use tokio_tungstenite::tungstenite::protocol::Role;

use crate::channel::serve_channel;
use crate::rest::RestRouter;
use crate::{RelayConfig, RelayHandler, ServerError, ServerExit, ShutdownSignal};

/// Shared server state passed to each connection task.
struct ServerState<H> {
    handler: Arc<H>,
    rest: RestRouter<H>,
    shutdown: ShutdownSignal,
    /// Upgraded connections outlive the HTTP connection they came from.
    channels: Mutex<JoinSet<()>>,
}

/// Builder for configuring and starting a relay server.
///
/// # Example
///
/// ```rust,ignore
/// let server = RelayServerBuilder::new()
///     .bind("127.0.0.1:50474")
///     .build(handler)
///     .await?;
/// let exit = server.run().await?;
/// std::process::exit(exit.exit_code());
/// ```
#[derive(Debug, Clone, Default)]
pub struct RelayServerBuilder {
    config: RelayConfig,
    shutdown: ShutdownSignal,
}

impl RelayServerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Sets the largest HTTP request body accepted.
    pub fn max_body_bytes(mut self, limit: usize) -> Self {
        self.config.max_body_bytes = limit;
        self
    }

    /// Sets how long connections get to finish once shutdown starts.
    pub fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.config.shutdown_grace = grace;
        self
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: RelayConfig) -> Self {
        self.config = config;
        self
    }

    /// Uses `signal` instead of a fresh one, so the host can stop the
    /// server from outside.
    pub fn shutdown_signal(mut self, signal: ShutdownSignal) -> Self {
        self.shutdown = signal;
        self
    }

    /// Binds the listener.
    ///
    /// # Errors
    /// Returns `ServerError::Bind` if the address cannot be bound.
    pub async fn build<H: RelayHandler>(
        self,
        handler: H,
    ) -> Result<RelayServer<H>, ServerError> {
        let listener =
            TcpListener::bind(&self.config.bind_addr).await.map_err(|source| {
                ServerError::Bind {
                    addr: self.config.bind_addr.clone(),
                    source,
                }
            })?;

        let handler = Arc::new(handler);
        let rest = RestRouter::new(Arc::clone(&handler), self.shutdown.clone())
            .max_body_bytes(self.config.max_body_bytes);
        let state = Arc::new(ServerState {
            handler,
            rest,
            shutdown: self.shutdown,
            channels: Mutex::new(JoinSet::new()),
        });

        Ok(RelayServer {
            listener,
            state,
            shutdown_grace: self.config.shutdown_grace,
        })
    }
}

/// A bound relay server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct RelayServer<H> {
    listener: TcpListener,
    state: Arc<ServerState<H>>,
    shutdown_grace: Duration,
}

impl<H: RelayHandler> RelayServer<H> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// The handler every connection is served by.
    pub fn handler(&self) -> &Arc<H> {
        &self.state.handler
    }

    /// Raise this to stop the server.
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.state.shutdown.clone()
    }

    /// Runs the accept loop until the shutdown signal is raised, then
    /// gives open connections the grace period to finish.
    ///
    /// Returns why the server stopped; a kill request maps to the
    /// dedicated exit code through [`ServerExit::exit_code`].
    pub async fn run(self) -> Result<ServerExit, ServerError> {
        tracing::info!(addr = ?self.listener.local_addr().ok(), "relay server running");

        let mut connections = JoinSet::new();
        let exit = loop {
            tokio::select! {
                exit = self.state.shutdown.triggered() => break exit,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let state = Arc::clone(&self.state);
                        connections.spawn(async move {
                            if let Err(e) = serve_connection(stream, state).await {
                                tracing::debug!(%peer, error = %e, "connection ended with error");
                            }
                        });
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "accept failed");
                    }
                },
            }
            while connections.try_join_next().is_some() {}
        };

        drop(self.listener);
        drain(connections, self.shutdown_grace, "http").await;
        let channels = std::mem::take(&mut *self.state.channels.lock().await);
        drain(channels, self.shutdown_grace, "channel").await;

        tracing::info!(?exit, "relay server stopped");
        Ok(exit)
    }
}

/// Waits up to `grace` for `tasks`, then aborts what is left.
async fn drain(mut tasks: JoinSet<()>, grace: Duration, kind: &str) {
    let finished = tokio::time::timeout(grace, async {
        while tasks.join_next().await.is_some() {}
    })
    .await;
    if finished.is_err() {
        tracing::warn!(kind, remaining = tasks.len(), "aborting connections after grace period");
        tasks.shutdown().await;
    }
}

async fn serve_connection<H: RelayHandler>(
    stream: TcpStream,
    state: Arc<ServerState<H>>,
) -> Result<(), ServerError> {
    let shutdown = state.shutdown.clone();
    let service = service_fn(move |req| {
        let state = Arc::clone(&state);
        async move { Ok::<_, Infallible>(respond(&state, req).await) }
    });

    let conn = http1::Builder::new()
        .serve_connection(TokioIo::new(stream), service)
        .with_upgrades();
    tokio::pin!(conn);

    tokio::select! {
        result = &mut conn => result?,
        _ = shutdown.triggered() => {
            conn.as_mut().graceful_shutdown();
            conn.await?;
        }
    }
    Ok(())
}

async fn respond<H: RelayHandler>(
    state: &ServerState<H>,
    req: Request<Incoming>,
) -> Response<Full<Bytes>> {
    if is_websocket_upgrade(&req) {
        return upgrade(state, req).await;
    }
    let path = req.uri().path().to_string();
    match state.rest.route(req).await {
        Some(response) => response,
        None => {
            tracing::trace!(%path, "not a relay route");
            plain(StatusCode::NOT_FOUND)
        }
    }
}

fn is_websocket_upgrade<B>(req: &Request<B>) -> bool {
    req.method() == Method::GET
        && req
            .headers()
            .get(header::UPGRADE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.eq_ignore_ascii_case("websocket"))
}

/// Answers the handshake and hands the upgraded stream to a channel task.
async fn upgrade<H: RelayHandler>(
    state: &ServerState<H>,
    req: Request<Incoming>,
) -> Response<Full<Bytes>> {
    let Some(accept) = req
        .headers()
        .get(header::SEC_WEBSOCKET_KEY)
        .map(|key| derive_accept_key(key.as_bytes()))
        .and_then(|accept| HeaderValue::from_str(&accept).ok())
    else {
        return plain(StatusCode::BAD_REQUEST);
    };

    let handler = Arc::clone(&state.handler);
    let shutdown = state.shutdown.clone();
    let mut channels = state.channels.lock().await;
    channels.spawn(async move {
        let upgraded = match hyper::upgrade::on(req).await {
            Ok(upgraded) => upgraded,
            Err(e) => {
                tracing::debug!(error = %e, "websocket upgrade failed");
                return;
            }
        };
        let ws = WebSocketStream::from_raw_socket(
            TokioIo::new(upgraded),
            Role::Server,
            None,
        )
        .await;
        let conn = Arc::new(WebSocketConnection::from_stream(ws));
        serve_channel(conn, handler, shutdown).await;
    });
    while channels.try_join_next().is_some() {}

    let mut response = plain(StatusCode::SWITCHING_PROTOCOLS);
    let headers = response.headers_mut();
    headers.insert(header::CONNECTION, HeaderValue::from_static("upgrade"));
    headers.insert(header::UPGRADE, HeaderValue::from_static("websocket"));
    headers.insert(header::SEC_WEBSOCKET_ACCEPT, accept);
    response
}

fn plain(status: StatusCode) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::default());
    *response.status_mut() = status;
    response
}
