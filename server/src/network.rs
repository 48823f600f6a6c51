//! Connection acceptance and session spawning.
//!
//! `GameServer` owns the admission gate and the registry. Each accepted
//! connection goes through identity verification at the boundary, then the
//! admission gate, and only then becomes a registered, running session.
//! Failures on one connection never affect other sessions or the accept
//! loop's ability to keep serving.

use crate::admission::{AdmissionController, AdmissionError};
use crate::auth::IdentityVerifier;
use crate::registry::SessionRegistry;
use crate::session::Session;
use crate::transport::{framed, MessageSink, MessageStream};
use log::{info, warn};
use shared::protocol::MSG_DISCONNECTED;
use shared::{Disconnected, Envelope, CORRECTION_INTERVAL_MS, MAX_SESSIONS};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Cap on concurrently registered sessions.
    pub max_sessions: usize,
    /// How long an accept waits for a free slot before rejecting.
    pub admission_timeout: Duration,
    /// Cadence of per-session position corrections.
    pub correction_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            max_sessions: MAX_SESSIONS,
            admission_timeout: Duration::from_secs(5),
            correction_interval: Duration::from_millis(CORRECTION_INTERVAL_MS),
        }
    }
}

pub struct GameServer {
    config: ServerConfig,
    admission: AdmissionController,
    registry: Arc<SessionRegistry>,
    next_session_id: AtomicU64,
}

impl GameServer {
    pub fn new(config: ServerConfig) -> GameServer {
        let admission = AdmissionController::new(config.max_sessions);
        GameServer {
            config,
            admission,
            registry: Arc::new(SessionRegistry::new()),
            next_session_id: AtomicU64::new(1),
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn admission(&self) -> &AdmissionController {
        &self.admission
    }

    /// Admits an established duplex channel as a new session.
    ///
    /// On a free slot: the session is created, registered, and started, and
    /// the slot travels with it until cleanup. On denial: the client gets a
    /// `disconnected` notice on the sink, nothing is registered, and nothing
    /// is held.
    pub async fn accept_connection(
        &self,
        stream: Box<dyn MessageStream>,
        mut sink: Box<dyn MessageSink>,
        identity: String,
    ) -> Result<Arc<Session>, AdmissionError> {
        let slot = match self.admission.acquire(self.config.admission_timeout).await {
            Ok(slot) => slot,
            Err(err) => {
                warn!("rejecting connection from {}: {}", identity, err);
                let notice = Disconnected {
                    reason: "server is at capacity".to_string(),
                };
                if let Ok(envelope) = Envelope::encode(MSG_DISCONNECTED, &notice) {
                    let _ = sink.send(envelope).await;
                }
                let _ = sink.close().await;
                return Err(err);
            }
        };

        let id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        let session = Session::new(
            id,
            identity,
            sink,
            slot,
            Arc::clone(&self.registry),
            self.config.correction_interval,
        );

        self.registry.insert(Arc::clone(&session)).await;
        session.start(stream);

        info!(
            "session {} ({}) connected ({} registered)",
            session.id(),
            session.identity(),
            self.registry.len().await
        );
        Ok(session)
    }

    /// Accept loop over a bound TCP listener. Per-connection failures are
    /// logged and skipped; the loop only ends on listener failure.
    pub async fn run(
        self: Arc<Self>,
        listener: TcpListener,
        verifier: Arc<dyn IdentityVerifier>,
    ) -> Result<(), std::io::Error> {
        loop {
            let (socket, addr) = listener.accept().await?;

            let credential = addr.to_string();
            let identity = match verifier.verify_identity(&credential) {
                Ok(identity) => identity,
                Err(err) => {
                    warn!("refusing connection from {}: {}", addr, err);
                    continue;
                }
            };

            let (stream, sink) = framed(socket);
            if let Err(err) = self
                .accept_connection(Box::new(stream), Box::new(sink), identity)
                .await
            {
                warn!("connection from {} not admitted: {}", addr, err);
            }
        }
    }

    /// Stops every registered session; used for graceful shutdown.
    pub async fn stop_all(&self) {
        let sessions = self.registry.all().await;
        info!("stopping {} sessions", sessions.len());
        for session in sessions {
            session.stop().await;
        }
    }
}
