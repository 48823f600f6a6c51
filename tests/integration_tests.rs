//! Integration tests for the session layer.
//!
//! These tests drive whole sessions end-to-end through the framed transport
//! over in-memory duplex pipes, validating the externally observable wire
//! behavior rather than component internals.

use server::admission::AdmissionError;
use server::network::{GameServer, ServerConfig};
use server::session::Session;
use server::transport::{framed, MessageSink, MessageStream};
use shared::protocol::{
    MSG_DISCONNECTED, MSG_LOGIN, MSG_MOVE_APPROVED, MSG_MOVE_REQUEST, MSG_POSITION_CORRECTION,
};
use assert_approx_eq::assert_approx_eq;
use shared::{Envelope, Login, MoveApproved, MoveRequest, PositionCorrection, Vec3, MOVE_SPEED};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::duplex;
use tokio::time::timeout;
use tokio_test::assert_ok;

struct TestClient {
    rx: Box<dyn MessageStream>,
    tx: Box<dyn MessageSink>,
}

async fn connect(
    server: &GameServer,
    name: &str,
) -> (Result<Arc<Session>, AdmissionError>, TestClient) {
    let (client_io, server_io) = duplex(64 * 1024);
    let (server_rx, server_tx) = framed(server_io);
    let (client_rx, client_tx) = framed(client_io);

    let result = server
        .accept_connection(Box::new(server_rx), Box::new(server_tx), name.to_string())
        .await;
    (
        result,
        TestClient {
            rx: Box::new(client_rx),
            tx: Box::new(client_tx),
        },
    )
}

fn test_server(max_sessions: usize) -> Arc<GameServer> {
    Arc::new(GameServer::new(ServerConfig {
        max_sessions,
        admission_timeout: Duration::from_millis(0),
        correction_interval: Duration::from_millis(200),
    }))
}

/// END-TO-END PROTOCOL SCENARIO
mod end_to_end {
    use super::*;

    /// The canonical client exchange: login, request a move to (10,0,0) from
    /// the origin, receive an immediate approval at the server's speed, then
    /// a monotone stream of corrections at the tick cadence, terminating
    /// exactly on the target with no further frames.
    #[tokio::test(start_paused = true)]
    async fn login_then_move_converges_on_target() {
        let server = test_server(8);
        let (session, mut client) = connect(&server, "endtoend").await;
        let session = session.unwrap();

        client
            .tx
            .send(
                Envelope::encode(
                    MSG_LOGIN,
                    &Login {
                        client_id: 1,
                        username: "a".to_string(),
                    },
                )
                .unwrap(),
            )
            .await
            .unwrap();

        let target = Vec3::new(10.0, 0.0, 0.0);
        client
            .tx
            .send(Envelope::encode(MSG_MOVE_REQUEST, &MoveRequest { target }).unwrap())
            .await
            .unwrap();

        // Approval comes first, carrying the authoritative speed.
        let approved = assert_ok!(client.rx.recv().await);
        assert_eq!(approved.msg_type, MSG_MOVE_APPROVED);
        let approved: MoveApproved = approved.decode().unwrap();
        assert_eq!(approved.target, target);
        assert_eq!(approved.speed, MOVE_SPEED);

        // First correction: one 200ms tick of travel at 1.0 units/s.
        let first = assert_ok!(client.rx.recv().await);
        assert_eq!(first.msg_type, MSG_POSITION_CORRECTION);
        let first: PositionCorrection = first.decode().unwrap();
        assert_approx_eq!(first.position.x, 0.2, 1e-3);
        let mut corrections = 1u32;
        let mut last_x = first.position.x;

        // Corrections: strictly increasing X, about one per 200ms tick, and
        // a bounded count (10 units at 0.2 units per tick is 50 ticks, plus
        // the snapping tick).
        loop {
            let envelope = client.rx.recv().await.unwrap();
            assert_eq!(envelope.msg_type, MSG_POSITION_CORRECTION);
            let correction: PositionCorrection = envelope.decode().unwrap();

            assert!(
                correction.position.x > last_x,
                "X must increase monotonically"
            );
            assert!(correction.position.x <= 10.0, "must never pass the target");
            assert_eq!(correction.position.y, 0.0);
            assert_eq!(correction.position.z, 0.0);

            last_x = correction.position.x;
            corrections += 1;
            assert!(corrections <= 55, "too many corrections for the distance");

            if correction.position == target {
                break;
            }
        }
        assert!(corrections >= 45, "arrived suspiciously fast");

        // Silence after arrival, until the next request.
        assert!(timeout(Duration::from_secs(3), client.rx.recv())
            .await
            .is_err());

        // A fresh request starts a fresh correction stream.
        let second_target = Vec3::new(10.0, 1.0, 0.0);
        client
            .tx
            .send(
                Envelope::encode(
                    MSG_MOVE_REQUEST,
                    &MoveRequest {
                        target: second_target,
                    },
                )
                .unwrap(),
            )
            .await
            .unwrap();

        let approved = client.rx.recv().await.unwrap();
        assert_eq!(approved.msg_type, MSG_MOVE_APPROVED);

        let envelope = client.rx.recv().await.unwrap();
        assert_eq!(envelope.msg_type, MSG_POSITION_CORRECTION);
        let correction: PositionCorrection = envelope.decode().unwrap();
        assert!(correction.position.y > 0.0, "moving toward the new target");

        let (client_id, username) = session.client_info().await;
        assert_eq!(client_id, Some(1));
        assert_eq!(username, "a");
    }

    /// Unknown inbound frames produce no error frame and no disconnect.
    #[tokio::test(start_paused = true)]
    async fn unknown_inbound_type_is_silently_ignored() {
        let server = test_server(8);
        let (session, mut client) = connect(&server, "unknown").await;
        session.unwrap();

        client
            .tx
            .send(Envelope {
                msg_type: "chat".to_string(),
                data: serde_json::json!({ "text": "hello" }),
            })
            .await
            .unwrap();

        // No response to the unknown frame...
        assert!(timeout(Duration::from_millis(500), client.rx.recv())
            .await
            .is_err());

        // ...and the session still works.
        client
            .tx
            .send(
                Envelope::encode(
                    MSG_MOVE_REQUEST,
                    &MoveRequest {
                        target: Vec3::new(0.1, 0.0, 0.0),
                    },
                )
                .unwrap(),
            )
            .await
            .unwrap();
        let envelope = client.rx.recv().await.unwrap();
        assert_eq!(envelope.msg_type, MSG_MOVE_APPROVED);
    }
}

/// ADMISSION CONTROL TESTS
mod admission_tests {
    use super::*;

    /// capacity+1 concurrent connection attempts: at most `capacity` active
    /// sessions; the extra one is rejected with a service-unavailable notice
    /// and leaks nothing.
    #[tokio::test(start_paused = true)]
    async fn capacity_plus_one_attempts_never_exceed_capacity() {
        let capacity = 4;
        let server = test_server(capacity);

        let mut clients = Vec::new();
        let mut admitted = 0;
        let mut rejected = Vec::new();
        for i in 0..=capacity {
            let (result, client) = connect(&server, &format!("c{}", i)).await;
            match result {
                Ok(_) => {
                    admitted += 1;
                    clients.push(client);
                }
                Err(err) => rejected.push((err, client)),
            }
        }

        assert_eq!(admitted, capacity);
        assert_eq!(rejected.len(), 1);
        assert_eq!(server.registry().len().await, capacity);

        let (err, mut client) = rejected.remove(0);
        assert!(matches!(err, AdmissionError::CapacityExceeded));
        let notice = client.rx.recv().await.unwrap();
        assert_eq!(notice.msg_type, MSG_DISCONNECTED);
    }

    /// A rejected attempt succeeds once a slot frees up.
    #[tokio::test(start_paused = true)]
    async fn slot_becomes_available_after_disconnect() {
        let server = test_server(1);

        let (first, first_client) = connect(&server, "first").await;
        first.unwrap();

        let (denied, _denied_client) = connect(&server, "denied").await;
        assert!(denied.is_err());

        drop(first_client);
        for _ in 0..200 {
            if server.registry().is_empty().await && server.admission().available() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let (retry, _retry_client) = connect(&server, "retry").await;
        assert!(retry.is_ok());
        assert_eq!(server.registry().len().await, 1);
    }
}

/// TEARDOWN TESTS
mod teardown_tests {
    use super::*;

    /// Concurrent termination triggers (client disconnect racing external
    /// stops) must deregister once and release the slot exactly once.
    #[tokio::test(start_paused = true)]
    async fn concurrent_triggers_release_exactly_once() {
        let capacity = 4;
        let server = test_server(capacity);

        let (session, client) = connect(&server, "racer").await;
        let session = session.unwrap();

        let mut triggers = Vec::new();
        for _ in 0..8 {
            let session = Arc::clone(&session);
            triggers.push(tokio::spawn(async move { session.stop().await }));
        }
        drop(client);
        for trigger in triggers {
            trigger.await.unwrap();
        }

        for _ in 0..200 {
            if server.registry().is_empty().await
                && server.admission().available() == capacity
            {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(server.registry().len().await, 0);
        assert_eq!(server.admission().available(), capacity);
    }

    /// Stress the race between transport-side and server-side teardown over
    /// many sessions; every slot must come back.
    #[tokio::test(start_paused = true)]
    async fn teardown_stress_returns_all_slots() {
        let capacity = 32;
        let server = test_server(capacity);

        let mut sessions = Vec::new();
        let mut clients = Vec::new();
        for i in 0..capacity {
            let (session, client) = connect(&server, &format!("s{}", i)).await;
            sessions.push(session.unwrap());
            clients.push(client);
        }
        assert_eq!(server.registry().len().await, capacity);

        // Half the clients vanish; every session also gets an explicit stop.
        clients.truncate(capacity / 2);
        let stops: Vec<_> = sessions
            .iter()
            .map(|session| {
                let session = Arc::clone(session);
                tokio::spawn(async move { session.stop().await })
            })
            .collect();
        for stop in stops {
            stop.await.unwrap();
        }

        for _ in 0..200 {
            if server.registry().is_empty().await
                && server.admission().available() == capacity
            {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(server.registry().len().await, 0);
        assert_eq!(server.admission().available(), capacity);
    }
}

/// WRITE SERIALIZATION TESTS
mod write_serialization_tests {
    use super::*;

    /// Direct responses and reconciliation corrections write to one channel
    /// from different tasks; every byte frame on the wire must still parse
    /// as a complete envelope of a known outbound type.
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_writes_never_tear_frames() {
        let server = test_server(8);
        let (session, mut client) = connect(&server, "writer").await;
        let session = session.unwrap();

        // Keep the ticker busy on a long flight while direct approvals fire.
        client
            .tx
            .send(
                Envelope::encode(
                    MSG_MOVE_REQUEST,
                    &MoveRequest {
                        target: Vec3::new(1000.0, 0.0, 0.0),
                    },
                )
                .unwrap(),
            )
            .await
            .unwrap();

        let writer = {
            let session = Arc::clone(&session);
            tokio::spawn(async move {
                for i in 0..50 {
                    let approved = MoveApproved {
                        target: Vec3::new(i as f32, 0.0, 0.0),
                        speed: MOVE_SPEED,
                    };
                    session.send(MSG_MOVE_APPROVED, &approved).await;
                }
            })
        };

        let mut frames = 0;
        while frames < 52 {
            match timeout(Duration::from_secs(5), client.rx.recv()).await {
                Ok(Ok(envelope)) => {
                    // Any torn frame would fail envelope parsing inside
                    // recv(); reaching here means the frame was intact.
                    match envelope.msg_type.as_str() {
                        MSG_MOVE_APPROVED => {
                            let _: MoveApproved = envelope.decode().unwrap();
                        }
                        MSG_POSITION_CORRECTION => {
                            let _: PositionCorrection = envelope.decode().unwrap();
                        }
                        other => panic!("unexpected outbound type {:?}", other),
                    }
                    frames += 1;
                }
                Ok(Err(err)) => panic!("transport error mid-stream: {}", err),
                Err(_) => panic!("stream stalled after {} frames", frames),
            }
        }

        writer.await.unwrap();
        session.stop().await;
    }
}
