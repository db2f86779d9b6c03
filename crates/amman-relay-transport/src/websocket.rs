//! WebSocket connection implementation using `tokio-tungstenite`.
//!
//! The relay server obtains its streams from an HTTP upgrade, clients
//! open theirs with [`WebSocketConnection::connect`]. Both sides end up
//! with the same [`WebSocketConnection`] type, generic over the
//! underlying byte stream.

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::{Connection, ConnectionId, TransportError};

/// The byte stream behind a client-side connection.
pub type ClientStream = MaybeTlsStream<TcpStream>;

/// A single WebSocket connection.
///
/// The stream is split into its sink and source halves, each behind its
/// own lock, so a reader parked in `recv` never blocks a `send`.
pub struct WebSocketConnection<S = ClientStream> {
    id: ConnectionId,
    sink: Mutex<SplitSink<WebSocketStream<S>, Message>>,
    source: Mutex<SplitStream<WebSocketStream<S>>>,
}

impl<S> WebSocketConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    /// Wraps an already negotiated WebSocket stream.
    pub fn from_stream(ws: WebSocketStream<S>) -> Self {
        let id = ConnectionId::next();
        let (sink, source) = ws.split();
        tracing::debug!(%id, "WebSocket connection established");
        Self {
            id,
            sink: Mutex::new(sink),
            source: Mutex::new(source),
        }
    }
}

impl WebSocketConnection<ClientStream> {
    /// Opens a client connection to the relay at `url` (`ws://host:port`).
    pub async fn connect(url: &str) -> Result<Self, TransportError> {
        let (ws, _) =
            tokio_tungstenite::connect_async(url).await.map_err(|e| {
                TransportError::ConnectFailed {
                    url: url.to_string(),
                    source: std::io::Error::new(
                        std::io::ErrorKind::ConnectionRefused,
                        e,
                    ),
                }
            })?;
        tracing::info!(url, "connected to relay");
        Ok(Self::from_stream(ws))
    }
}

impl<S> Connection for WebSocketConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    type Error = TransportError;

    async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
        let msg = Message::Binary(data.to_vec().into());
        self.sink.lock().await.send(msg).await.map_err(|e| {
            TransportError::SendFailed(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                e,
            ))
        })
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        let mut source = self.source.lock().await;
        loop {
            match source.next().await {
                Some(Ok(Message::Binary(data))) => {
                    return Ok(Some(data.into()));
                }
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some(text.as_bytes().to_vec()));
                }
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue, // skip ping/pong/frame
                Some(Err(e)) => {
                    return Err(TransportError::ReceiveFailed(
                        std::io::Error::new(
                            std::io::ErrorKind::ConnectionReset,
                            e,
                        ),
                    ));
                }
            }
        }
    }

    async fn close(&self) -> Result<(), Self::Error> {
        self.sink.lock().await.close().await.map_err(|e| {
            TransportError::SendFailed(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                e,
            ))
        })
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}
