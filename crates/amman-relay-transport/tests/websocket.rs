//! Integration tests for the WebSocket connection.
//!
//! These tests spin up a real TCP listener, negotiate a WebSocket on the
//! server side with `tokio-tungstenite`, and connect to it through
//! [`WebSocketConnection::connect`], so bytes actually cross the network.

#[cfg(feature = "websocket")]
mod websocket {
    use std::sync::Arc;
    use std::time::Duration;

    use amman_relay_transport::{Connection, WebSocketConnection};
    use tokio::net::{TcpListener, TcpStream};

    /// Binds a listener on a random port and accepts exactly one
    /// WebSocket connection in the background.
    async fn accept_one() -> (
        String,
        tokio::task::JoinHandle<WebSocketConnection<TcpStream>>,
    ) {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = listener.local_addr().expect("local addr").to_string();

        let handle = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("should accept");
            let ws = tokio_tungstenite::accept_async(stream)
                .await
                .expect("should upgrade");
            WebSocketConnection::from_stream(ws)
        });

        (format!("ws://{addr}"), handle)
    }

    #[tokio::test]
    async fn test_websocket_send_receive_both_directions() {
        let (url, server_handle) = accept_one().await;

        let client = WebSocketConnection::connect(&url)
            .await
            .expect("client should connect");
        let server = server_handle.await.expect("task should complete");

        assert!(server.id().into_inner() > 0);
        assert_ne!(server.id(), client.id());

        server.send(b"hello from server").await.expect("send");
        let received = client.recv().await.expect("recv").expect("data");
        assert_eq!(received, b"hello from server");

        client.send(b"hello from client").await.expect("send");
        let received = server.recv().await.expect("recv").expect("data");
        assert_eq!(received, b"hello from client");

        server.close().await.expect("close should succeed");
    }

    #[tokio::test]
    async fn test_websocket_recv_returns_none_on_peer_close() {
        let (url, server_handle) = accept_one().await;

        let client = WebSocketConnection::connect(&url).await.unwrap();
        let server = server_handle.await.unwrap();

        client.close().await.unwrap();

        let result = server.recv().await.expect("recv should not error");
        assert!(result.is_none(), "should return None on client close");
    }

    #[tokio::test]
    async fn test_websocket_send_is_not_blocked_by_pending_recv() {
        // A reader parked in recv must not hold the sink lock.
        let (url, server_handle) = accept_one().await;

        let client =
            Arc::new(WebSocketConnection::connect(&url).await.unwrap());
        let server = server_handle.await.unwrap();

        let reader = Arc::clone(&client);
        let pending = tokio::spawn(async move { reader.recv().await });

        tokio::time::timeout(
            Duration::from_secs(1),
            client.send(b"while reading"),
        )
        .await
        .expect("send should not wait for recv")
        .expect("send should succeed");

        let got = server.recv().await.unwrap().unwrap();
        assert_eq!(got, b"while reading");

        server.send(b"unpark").await.unwrap();
        let unparked = pending.await.unwrap().unwrap().unwrap();
        assert_eq!(unparked, b"unpark");
    }

    #[tokio::test]
    async fn test_connect_to_closed_port_fails() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = WebSocketConnection::connect(&format!("ws://{addr}")).await;
        assert!(result.is_err());
    }
}
