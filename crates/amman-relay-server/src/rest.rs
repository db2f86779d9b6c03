//! Stateless HTTP router.
//!
//! `GET|POST /relay/<request event>`, positional arguments as a JSON
//! array body, the reply envelope as the response body. Dispatches
//! through the same [`dispatch`] as the persistent channel, so both
//! transports answer identically. No version check, no acknowledgements.
//!
//! | Condition                          | Status |
//! |------------------------------------|--------|
//! | handled (including `{err}` replies) | 200   |
//! | unknown or channel-only event      | 404    |
//! | wrong verb                         | 405    |
//! | body over the size limit           | 413    |
//! | bad arguments                      | 422    |
//! | body not a JSON array, or a panic  | 500    |

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use amman_relay_protocol::{RelayMethod, RequestKind, strip_relay_prefix};
use bytes::Bytes;
use futures_util::FutureExt;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Body;
use hyper::header::{self, HeaderValue};
use hyper::{Method, Request, Response, StatusCode};
use serde_json::{Value, json};

use crate::handler::{is_success, panic_message};
use crate::{RelayConfig, RelayHandler, ServerExit, ShutdownSignal, dispatch};

use crate::BoxError;

/// Routes HTTP requests under `/relay` to a [`RelayHandler`].
pub struct RestRouter<H> {
    handler: Arc<H>,
    shutdown: ShutdownSignal,
    max_body_bytes: usize,
}

impl<H> Clone for RestRouter<H> {
    fn clone(&self) -> Self {
        Self {
            handler: Arc::clone(&self.handler),
            shutdown: self.shutdown.clone(),
            max_body_bytes: self.max_body_bytes,
        }
    }
}

impl<H: RelayHandler> RestRouter<H> {
    /// A router over `handler`. A successful kill raises `shutdown`.
    pub fn new(handler: Arc<H>, shutdown: ShutdownSignal) -> Self {
        Self {
            handler,
            shutdown,
            max_body_bytes: RelayConfig::default().max_body_bytes,
        }
    }

    /// Sets the largest body a POST may carry.
    pub fn max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }

    /// Answers `req` if its path is under `/relay`, otherwise returns
    /// `None` so the caller can serve it some other way.
    pub async fn route<B>(&self, req: Request<B>) -> Option<Response<Full<Bytes>>>
    where
        B: Body + Send,
        B::Data: Send,
        B::Error: Into<BoxError>,
    {
        let path = req.uri().path().to_string();
        let event = strip_relay_prefix(&path)?;
        tracing::trace!(method = %req.method(), %path, "relay http request");
        Some(self.handle(req, &path, event).await)
    }

    async fn handle<B>(
        &self,
        req: Request<B>,
        path: &str,
        event: &str,
    ) -> Response<Full<Bytes>>
    where
        B: Body + Send,
        B::Data: Send,
        B::Error: Into<BoxError>,
    {
        let Some(route) =
            event.parse::<RequestKind>().ok().and_then(RequestKind::route)
        else {
            return fail(StatusCode::NOT_FOUND, &format!("Unknown route {path}"));
        };

        let expected = match route.method {
            RelayMethod::Get => Method::GET,
            RelayMethod::Post => Method::POST,
        };
        if *req.method() != expected {
            return fail(
                StatusCode::METHOD_NOT_ALLOWED,
                &format!("{path} needs to be {}", route.method),
            );
        }

        let args = match route.method {
            RelayMethod::Get => Vec::new(),
            RelayMethod::Post => match self.read_args(req.into_body()).await {
                Ok(args) => args,
                Err(response) => return response,
            },
        };

        let request =
            match amman_relay_protocol::Request::from_args(route.kind, args) {
                Ok(request) => request,
                Err(e) => {
                    return fail(StatusCode::UNPROCESSABLE_ENTITY, &e.to_string());
                }
            };

        let outcome = AssertUnwindSafe(dispatch(&*self.handler, request))
            .catch_unwind()
            .await;
        let envelope = match outcome {
            Ok(Ok(envelope)) => envelope,
            Ok(Err(e)) => {
                return fail(
                    StatusCode::UNPROCESSABLE_ENTITY,
                    &format!("Failed to stringify payload: {e}"),
                );
            }
            Err(panic) => {
                let message = panic_message(&*panic);
                tracing::error!(request = %route.kind, %message, "relay handler panicked");
                return fail(StatusCode::INTERNAL_SERVER_ERROR, &message);
            }
        };

        if route.kind == RequestKind::KillAmman && is_success(&envelope) {
            self.shutdown.trigger(ServerExit::KillRequested);
        }

        match serde_json::to_vec(&envelope) {
            Ok(body) => respond(StatusCode::OK, body),
            Err(e) => fail(
                StatusCode::UNPROCESSABLE_ENTITY,
                &format!("Failed to stringify payload: {e}"),
            ),
        }
    }

    /// Buffers the body and decodes it as a positional argument list. An
    /// empty body means no arguments.
    async fn read_args<B>(
        &self,
        body: B,
    ) -> Result<Vec<Value>, Response<Full<Bytes>>>
    where
        B: Body + Send,
        B::Data: Send,
        B::Error: Into<BoxError>,
    {
        let bytes = match Limited::new(body, self.max_body_bytes).collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) if e.is::<LengthLimitError>() => {
                return Err(fail(
                    StatusCode::PAYLOAD_TOO_LARGE,
                    &format!("Request body exceeds {} bytes", self.max_body_bytes),
                ));
            }
            Err(e) => {
                return Err(fail(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    &format!("Failed to read request body: {e}"),
                ));
            }
        };

        if bytes.is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_slice(&bytes).map_err(|e| {
            fail(
                StatusCode::INTERNAL_SERVER_ERROR,
                &format!(
                    "Failed to parse JSON input: {}\n{e}",
                    String::from_utf8_lossy(&bytes)
                ),
            )
        })
    }
}

/// An error response: `{"err": "<Reason Phrase>: <message>"}`.
fn fail(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    let reason = status.canonical_reason().unwrap_or("Error");
    let body = json!({ "err": format!("{reason}: {message}") });
    respond(status, body.to_string().into_bytes())
}

/// Every relay response is JSON and readable from any origin.
fn respond(status: StatusCode, body: Vec<u8>) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("POST, GET, OPTIONS, DELETE, PUT"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("*"),
    );
    // 30 days
    headers.insert(
        header::ACCESS_CONTROL_MAX_AGE,
        HeaderValue::from_static("2592000"),
    );
    response
}
