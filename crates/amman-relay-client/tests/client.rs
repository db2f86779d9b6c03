//! Client behaviour against a scripted relay on an in-memory connection.

use std::collections::BTreeMap;
use std::time::Duration;

use amman_relay_client::{
    ClientConfig, ConnectedRelayClient, RelayClient, RelayError,
    VersionGateError,
};
use amman_relay_protocol::{AddressLabels, Frame, RequestKind};
use amman_relay_transport::{Connection, MemoryConnection};
use ed25519_dalek::SigningKey;
use serde_json::{Value, json};
use tokio::time::Instant;

/// The relay end of the connection, driven step by step by each test.
struct FakeRelay {
    conn: MemoryConnection,
}

impl FakeRelay {
    async fn next(&self) -> Frame {
        let bytes = self.conn.recv().await.unwrap().expect("client hung up");
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn send(&self, frame: Frame) {
        self.conn.send(&serde_json::to_vec(&frame).unwrap()).await.unwrap();
    }

    async fn reply(&self, request: &Frame, payload: Value) {
        let kind: RequestKind = request.event.parse().unwrap();
        self.send(Frame::response(kind.response(), request.id, payload))
            .await;
    }

    async fn pass_version_check(&self) {
        let frame = self.next().await;
        assert_eq!(frame.event, RequestKind::Version.as_str());
        self.reply(&frame, json!({"result": [0, 12, 1]})).await;
    }

    /// Returns `true` if the client sends nothing within 100ms.
    async fn stays_quiet(&self) -> bool {
        tokio::time::timeout(Duration::from_millis(100), self.conn.recv())
            .await
            .is_err()
    }
}

fn setup(config: ClientConfig) -> (ConnectedRelayClient<MemoryConnection>, FakeRelay) {
    let (client_side, relay_side) = MemoryConnection::pair();
    let client = ConnectedRelayClient::new(client_side, config);
    (client, FakeRelay { conn: relay_side })
}

fn with_ack() -> ClientConfig {
    ClientConfig {
        ack: true,
        ..ClientConfig::default()
    }
}

// =========================================================================
// Version gate
// =========================================================================

#[tokio::test]
async fn test_version_handshake_happens_once() {
    let (client, relay) = setup(ClientConfig::default());

    let calls = async {
        for _ in 0..3 {
            client.fetch_address_labels().await.unwrap();
        }
    };
    let script = async {
        let mut version_requests = 0;
        let mut label_requests = 0;
        while label_requests < 3 {
            let frame = relay.next().await;
            if frame.event == RequestKind::Version.as_str() {
                version_requests += 1;
                relay.reply(&frame, json!({"result": [0, 12, 1]})).await;
            } else {
                label_requests += 1;
                relay.reply(&frame, json!({"result": {"labels": {}}})).await;
            }
        }
        version_requests
    };

    let ((), version_requests) = tokio::join!(calls, script);
    assert_eq!(version_requests, 1);
}

#[tokio::test(start_paused = true)]
async fn test_outdated_relay_fails_every_call_after_one_handshake() {
    let (client, relay) = setup(ClientConfig::default());

    let calls = async {
        let mut errors = Vec::new();
        for _ in 0..3 {
            errors.push(client.fetch_validator_pid().await.unwrap_err());
        }
        errors
    };
    let script = async {
        let frame = relay.next().await;
        relay.reply(&frame, json!({"result": [0, 11, 0]})).await;
    };

    let (errors, ()) = tokio::join!(calls, script);
    for err in errors {
        assert!(matches!(
            err,
            RelayError::VersionGate(VersionGateError::Outdated { ref detected })
                if detected == "0.11.0"
        ));
    }
    assert!(relay.stays_quiet().await);
}

#[tokio::test]
async fn test_legacy_bare_version_reply_is_outdated() {
    let (client, relay) = setup(ClientConfig::default());

    let (result, ()) = tokio::join!(client.verify_version(), async {
        let frame = relay.next().await;
        relay.reply(&frame, json!([0, 9, 2])).await;
    });

    let err = result.unwrap_err();
    assert!(err.to_string().contains("outdated amman relay version 0.9.2"));
}

#[tokio::test]
async fn test_version_err_reply_is_incompatible() {
    let (client, relay) = setup(ClientConfig::default());

    let (result, ()) = tokio::join!(client.fetch_address_labels(), async {
        let frame = relay.next().await;
        relay.reply(&frame, json!({"err": "relay misconfigured"})).await;
    });

    assert!(matches!(
        result,
        Err(RelayError::VersionGate(VersionGateError::Incompatible { ref err }))
            if err == "relay misconfigured"
    ));
}

#[tokio::test(start_paused = true)]
async fn test_unanswered_handshake_is_unreachable_and_sticky() {
    let (client, relay) = setup(ClientConfig::default());

    let (first, _) = tokio::join!(client.fetch_validator_pid(), relay.next());
    assert!(matches!(
        first,
        Err(RelayError::VersionGate(VersionGateError::Unreachable(_)))
    ));

    let second = client.fetch_validator_pid().await;
    assert!(matches!(
        second,
        Err(RelayError::VersionGate(VersionGateError::Unreachable(_)))
    ));
    assert!(relay.stays_quiet().await);
}

#[tokio::test(start_paused = true)]
async fn test_abandoned_first_call_does_not_repeat_handshake() {
    let (client, relay) = setup(ClientConfig::default());

    let abandoned =
        tokio::time::timeout(Duration::from_millis(50), client.fetch_address_labels())
            .await;
    assert!(abandoned.is_err());
    let handshake = relay.next().await;
    assert_eq!(handshake.event, RequestKind::Version.as_str());

    let (labels, ()) = tokio::join!(client.fetch_address_labels(), async {
        relay.reply(&handshake, json!({"result": [0, 12, 1]})).await;
        let frame = relay.next().await;
        assert_eq!(frame.event, RequestKind::FetchAddressLabels.as_str());
        relay.reply(&frame, json!({"result": {"labels": {}}})).await;
    });

    assert!(labels.unwrap().is_empty());
    assert_eq!(client.outstanding().await, 0);
}

// =========================================================================
// Correlation and deadlines
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_abandoned_call_leaves_nothing_pending() {
    let (client, relay) = setup(ClientConfig::default());
    let (verified, ()) = tokio::join!(client.verify_version(), relay.pass_version_check());
    verified.unwrap();

    let abandoned =
        tokio::time::timeout(Duration::from_millis(50), client.fetch_validator_pid())
            .await;

    assert!(abandoned.is_err());
    assert_eq!(relay.next().await.event, RequestKind::ValidatorPid.as_str());
    assert_eq!(client.outstanding().await, 0);
}

#[tokio::test(start_paused = true)]
async fn test_call_times_out_at_configured_deadline() {
    let (client, relay) = setup(ClientConfig::default());

    let call = async {
        let start = Instant::now();
        let result = client.fetch_validator_pid().await;
        (result, start.elapsed())
    };
    let script = async {
        relay.pass_version_check().await;
        relay.next().await
    };
    let ((result, elapsed), request) = tokio::join!(call, script);

    let err = result.unwrap_err();
    assert!(matches!(err, RelayError::Timeout { .. }));
    assert!(
        err.to_string()
            .starts_with("Unable to fetch validator pid, is the relay running?")
    );
    assert!(elapsed >= Duration::from_millis(2000));
    assert!(elapsed < Duration::from_millis(2100));
    assert_eq!(client.outstanding().await, 0);

    // The late reply must not leak into the next call.
    relay.reply(&request, json!({"result": 1111})).await;
    let (pid, ()) = tokio::join!(client.fetch_validator_pid(), async {
        let frame = relay.next().await;
        relay.reply(&frame, json!({"result": 2222})).await;
    });
    assert_eq!(pid.unwrap(), 2222);
}

#[tokio::test(start_paused = true)]
async fn test_lifecycle_calls_use_longer_deadline() {
    let (client, relay) = setup(ClientConfig::default());

    let call = async {
        let start = Instant::now();
        let result = client.request_restart_validator().await;
        (result, start.elapsed())
    };
    let script = async {
        relay.pass_version_check().await;
        relay.next().await
    };
    let ((result, elapsed), _) = tokio::join!(call, script);

    assert!(matches!(result, Err(RelayError::Timeout { .. })));
    assert!(elapsed >= Duration::from_millis(5000));
}

#[tokio::test]
async fn test_concurrent_same_kind_calls_get_their_own_replies() {
    let (client, relay) = setup(ClientConfig::default());
    let slots = BTreeMap::from([("AAA", 1), ("BBB", 2)]);

    let script = async {
        relay.pass_version_check().await;
        let first = relay.next().await;
        let second = relay.next().await;
        // Answer in reverse order.
        for frame in [&second, &first] {
            let address = frame.args[0].as_str().unwrap();
            let payload = json!({"result": {
                "address": address,
                "states": [{"slot": slots[address], "timestamp": 0}]
            }});
            relay.reply(frame, payload).await;
        }
    };
    let (a, b, ()) = tokio::join!(
        client.fetch_account_states("AAA"),
        client.fetch_account_states("BBB"),
        script
    );

    assert_eq!(a.unwrap()[0].slot, 1);
    assert_eq!(b.unwrap()[0].slot, 2);
}

#[tokio::test]
async fn test_reply_without_id_matches_by_kind() {
    let (client, relay) = setup(ClientConfig::default());

    let (pid, ()) = tokio::join!(client.fetch_validator_pid(), async {
        relay.pass_version_check().await;
        let frame = relay.next().await;
        let mut reply = frame.clone();
        reply.id = None;
        relay.reply(&reply, json!({"result": 4242})).await;
    });

    assert_eq!(pid.unwrap(), 4242);
}

#[tokio::test(start_paused = true)]
async fn test_connection_loss_fails_pending_calls_immediately() {
    let (client, relay) = setup(ClientConfig::default());

    let call = async {
        let start = Instant::now();
        let result = client.fetch_validator_pid().await;
        (result, start.elapsed())
    };
    let script = async {
        relay.pass_version_check().await;
        relay.next().await;
        relay.conn.close().await.unwrap();
    };
    let ((result, elapsed), ()) = tokio::join!(call, script);

    assert!(matches!(result, Err(RelayError::Transport(_))));
    assert!(elapsed < Duration::from_millis(2000));
    assert!(matches!(
        client.fetch_validator_pid().await,
        Err(RelayError::Closed)
    ));
}

#[tokio::test]
async fn test_err_envelope_becomes_server_error() {
    let (client, relay) = setup(ClientConfig::default());

    let (result, ()) = tokio::join!(client.request_save_account("AAA"), async {
        relay.pass_version_check().await;
        let frame = relay.next().await;
        relay.reply(&frame, json!({"err": "account AAA not found"})).await;
    });

    assert!(matches!(
        result,
        Err(RelayError::Server(ref msg)) if msg == "account AAA not found"
    ));
}

// =========================================================================
// Fire-and-forget
// =========================================================================

#[tokio::test]
async fn test_labels_without_ack_resolve_once_written() {
    let (client, relay) = setup(ClientConfig::default());
    let labels = AddressLabels::from([("AAA".to_string(), "payer".to_string())]);

    client.add_address_labels(labels).await.unwrap();

    // No version check for fire-and-forget requests.
    let frame = relay.next().await;
    assert_eq!(frame.event, RequestKind::UpdateAddressLabels.as_str());
    assert_eq!(frame.args, vec![json!({"labels": {"AAA": "payer"}})]);
}

#[tokio::test]
async fn test_labels_with_ack_wait_for_relay() {
    let (client, relay) = setup(with_ack());

    let (result, ()) = tokio::join!(client.clear_address_labels(), async {
        let frame = relay.next().await;
        assert_eq!(frame.event, RequestKind::ClearAddressLabels.as_str());
        relay.reply(&frame, json!({"success": true})).await;
    });

    result.unwrap();
}

#[tokio::test]
async fn test_failed_ack_is_server_error() {
    let (client, relay) = setup(with_ack());

    let (result, ()) =
        tokio::join!(client.add_address_labels(AddressLabels::new()), async {
            let frame = relay.next().await;
            relay.reply(&frame, json!({"err": "labels rejected"})).await;
        });

    assert!(matches!(
        result,
        Err(RelayError::Server(ref msg)) if msg == "labels rejected"
    ));
}

#[tokio::test(start_paused = true)]
async fn test_missing_ack_times_out() {
    let (client, relay) = setup(with_ack());

    let (result, _) = tokio::join!(
        client.add_address_labels(AddressLabels::new()),
        relay.next()
    );

    assert!(matches!(
        result,
        Err(RelayError::Timeout { ref action }) if action == "add address labels"
    ));
}

// =========================================================================
// Keypairs
// =========================================================================

#[tokio::test]
async fn test_store_then_load_keypair() {
    let (client, relay) = setup(ClientConfig::default());
    let key = SigningKey::from_bytes(&[9; 32]);

    let script = async {
        relay.pass_version_check().await;
        let store = relay.next().await;
        assert_eq!(store.args[0], json!("payer"));
        let secret = store.args[1].clone();
        relay.reply(&store, json!({"result": null})).await;

        let load = relay.next().await;
        relay
            .reply(&load, json!({"result": {"id": "payer", "secretKeyBytes": secret}}))
            .await;
    };
    let calls = async {
        client.request_store_keypair("payer", &key).await.unwrap();
        client.request_load_keypair("payer").await.unwrap()
    };
    let (loaded, ()) = tokio::join!(calls, script);

    assert_eq!(loaded.unwrap().to_bytes(), key.to_bytes());
}

#[tokio::test]
async fn test_missing_or_invalid_keypair_loads_as_none() {
    let (client, relay) = setup(ClientConfig::default());

    let script = async {
        relay.pass_version_check().await;
        let missing = relay.next().await;
        relay.reply(&missing, json!({"result": {"id": "missing"}})).await;

        let invalid = relay.next().await;
        relay
            .reply(&invalid, json!({"result": {"id": "bad", "secretKeyBytes": [1, 2, 3]}}))
            .await;
    };
    let calls = async {
        (
            client.request_load_keypair("missing").await,
            client.request_load_keypair("bad").await,
        )
    };
    let ((missing, invalid), ()) = tokio::join!(calls, script);

    assert!(missing.unwrap().is_none());
    assert!(invalid.unwrap().is_none());
}

// =========================================================================
// Snapshots and lifecycle
// =========================================================================

#[tokio::test]
async fn test_snapshot_without_label_uses_timestamp() {
    let (client, relay) = setup(ClientConfig::default());

    let (dir, label) = tokio::join!(client.request_snapshot(None), async {
        relay.pass_version_check().await;
        let frame = relay.next().await;
        let label = frame.args[0].as_str().unwrap().to_string();
        let dir = format!("/tmp/snapshots/{label}");
        relay.reply(&frame, json!({"result": {"snapshotDir": dir}})).await;
        label
    });

    assert!(!label.contains(':'));
    assert_eq!(dir.unwrap(), format!("/tmp/snapshots/{label}"));
}

#[tokio::test]
async fn test_kill_resolves_on_void_reply() {
    let (client, relay) = setup(ClientConfig::default());

    let (result, ()) = tokio::join!(client.request_kill_amman(), async {
        relay.pass_version_check().await;
        let frame = relay.next().await;
        assert_eq!(frame.event, RequestKind::KillAmman.as_str());
        relay.reply(&frame, json!({"result": null})).await;
        relay.conn.close().await.unwrap();
    });

    result.unwrap();
}

#[tokio::test]
async fn test_disconnect_rejects_later_calls() {
    let (client, relay) = setup(ClientConfig::default());

    client.disconnect().await;

    assert!(matches!(
        client.request_save_account("AAA").await,
        Err(RelayError::VersionGate(VersionGateError::Unreachable(_)))
    ));
    assert_eq!(relay.conn.recv().await.unwrap(), None);
}
