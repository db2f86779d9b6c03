//! Persistent-channel router.
//!
//! Serves one connection: each incoming frame names a request event and
//! carries positional arguments; the reply goes back on the paired
//! response event with the request's correlation id. Requests are handled
//! on their own tasks, so a slow restart does not hold up a label fetch
//! on the same connection.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use amman_relay_protocol::{
    AckReply, Codec, Frame, JsonCodec, Request, RequestKind,
};
use amman_relay_transport::{Connection, TransportError};
use futures_util::FutureExt;
use serde_json::{Value, json};
use tokio::task::JoinSet;

use crate::handler::{err_envelope, is_success, panic_message};
use crate::{RelayHandler, ServerError, ServerExit, ShutdownSignal, dispatch};

/// Serves relay requests arriving on `conn` until the peer goes away or
/// `shutdown` is raised. In-flight requests are finished before returning.
pub async fn serve_channel<C, H>(
    conn: Arc<C>,
    handler: Arc<H>,
    shutdown: ShutdownSignal,
) where
    C: Connection<Error = TransportError>,
    H: RelayHandler,
{
    let conn_id = conn.id();
    tracing::info!(%conn_id, "relay channel opened");

    let mut in_flight = JoinSet::new();

    loop {
        let data = tokio::select! {
            received = conn.recv() => match received {
                Ok(Some(data)) => data,
                Ok(None) => {
                    tracing::debug!(%conn_id, "relay channel closed by peer");
                    break;
                }
                Err(e) => {
                    tracing::debug!(%conn_id, error = %e, "recv error");
                    break;
                }
            },
            _ = shutdown.triggered() => break,
        };

        let frame: Frame = match JsonCodec.decode(&data) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "failed to decode frame");
                continue;
            }
        };

        let Ok(kind) = frame.event.parse::<RequestKind>() else {
            tracing::debug!(%conn_id, event = %frame.event, "ignoring unknown event");
            continue;
        };

        let conn = Arc::clone(&conn);
        let handler = Arc::clone(&handler);
        let shutdown = shutdown.clone();
        in_flight.spawn(async move {
            if let Err(e) =
                handle_frame(&*conn, &*handler, &shutdown, kind, frame).await
            {
                tracing::debug!(%conn_id, request = %kind, error = %e, "failed to reply");
            }
        });

        while in_flight.try_join_next().is_some() {}
    }

    while in_flight.join_next().await.is_some() {}
    if let Err(e) = conn.close().await {
        tracing::debug!(%conn_id, error = %e, "error closing relay channel");
    }
    tracing::info!(%conn_id, "relay channel finished");
}

async fn handle_frame<C, H>(
    conn: &C,
    handler: &H,
    shutdown: &ShutdownSignal,
    kind: RequestKind,
    frame: Frame,
) -> Result<(), ServerError>
where
    C: Connection<Error = TransportError>,
    H: RelayHandler,
{
    let id = frame.id;
    tracing::trace!(request = %kind, ?id, "<- request");

    let envelope = match Request::from_args(kind, frame.args) {
        Ok(request) => {
            match AssertUnwindSafe(dispatch(handler, request))
                .catch_unwind()
                .await
            {
                Ok(Ok(envelope)) => envelope,
                Ok(Err(e)) => {
                    err_envelope(format!("Failed to stringify payload: {e}"))
                }
                Err(panic) => {
                    let message = panic_message(&*panic);
                    tracing::error!(request = %kind, ?id, %message, "relay handler panicked");
                    err_envelope(message)
                }
            }
        }
        Err(e) => {
            tracing::debug!(request = %kind, error = %e, "rejecting arguments");
            err_envelope(e)
        }
    };
    let succeeded = is_success(&envelope);

    let response = kind.response();
    let payload = if response.is_ack() {
        ack_payload(&envelope)
    } else {
        envelope
    };

    let bytes = JsonCodec.encode(&Frame::response(response, id, payload))?;
    let sent = conn.send(&bytes).await;
    tracing::trace!(response = %response, ?id, "-> reply");

    if kind == RequestKind::KillAmman && succeeded {
        shutdown.trigger(ServerExit::KillRequested);
    }
    sent.map_err(ServerError::from)
}

fn ack_payload(envelope: &Value) -> Value {
    match AckReply::from_envelope(envelope) {
        AckReply::Success { success } => json!({ "success": success }),
        AckReply::Err { err } => json!({ "err": err }),
    }
}
