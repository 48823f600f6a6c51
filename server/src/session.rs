//! Per-connection session lifecycle and authoritative player state.
//!
//! A session owns one duplex channel and runs two concurrent duties: the
//! read loop, which applies inbound envelopes strictly in arrival order, and
//! the reconciliation ticker, which advances the player toward its target on
//! a fixed cadence and pushes corrections back. Both write through the same
//! sink, so every outbound frame goes through the session's write lock.
//!
//! Termination can come from the transport (close, reset, timeout), from an
//! external [`stop`](Session::stop), or from both racing; the cleanup path is
//! guarded so teardown happens exactly once.

use crate::admission::AdmissionSlot;
use crate::movement;
use crate::registry::SessionRegistry;
use crate::transport::{MessageSink, MessageStream, TransportError};
use log::{debug, info, warn};
use serde::Serialize;
use shared::protocol::{
    MSG_LOGIN, MSG_MOVE_APPROVED, MSG_MOVE_REQUEST, MSG_POSITION_CORRECTION,
};
use shared::{
    Envelope, Login, MoveApproved, MoveRequest, MoveState, PlayerState, PositionCorrection,
    INITIAL_HEALTH, MOVE_SPEED,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};

pub type SessionId = u64;

/// Login-provided identity, recorded at face value. The verified identity
/// from the admission boundary lives on the session itself.
#[derive(Debug, Clone)]
struct Profile {
    client_id: Option<i64>,
    username: String,
}

/// Simulation state owned by the session.
///
/// The ticker handle shares this lock with the `moving` flag on purpose: the
/// ticker clears its own slot under the lock when it decides to exit, and a
/// move request inspects the slot under the same lock before spawning, so a
/// racing request either reuses the live ticker or starts a fresh one —
/// never neither.
struct Simulation {
    state: PlayerState,
    moving: bool,
    last_update: Instant,
    ticker: Option<JoinHandle<()>>,
}

pub struct Session {
    id: SessionId,
    identity: String,
    registry: Arc<SessionRegistry>,
    profile: Mutex<Profile>,
    sim: Mutex<Simulation>,
    /// Write lock: ticker corrections and direct responses share one sink.
    sink: Mutex<Box<dyn MessageSink>>,
    correction_interval: Duration,
    shutdown: watch::Sender<bool>,
    cleaned: AtomicBool,
    slot: Mutex<Option<AdmissionSlot>>,
}

impl Session {
    pub fn new(
        id: SessionId,
        identity: String,
        sink: Box<dyn MessageSink>,
        slot: AdmissionSlot,
        registry: Arc<SessionRegistry>,
        correction_interval: Duration,
    ) -> Arc<Session> {
        let (shutdown, _) = watch::channel(false);
        let profile = Profile {
            client_id: None,
            username: identity.clone(),
        };
        Arc::new(Session {
            id,
            identity,
            registry,
            profile: Mutex::new(profile),
            sim: Mutex::new(Simulation {
                state: PlayerState::new(INITIAL_HEALTH),
                moving: false,
                last_update: Instant::now(),
                ticker: None,
            }),
            sink: Mutex::new(sink),
            correction_interval,
            shutdown,
            cleaned: AtomicBool::new(false),
            slot: Mutex::new(Some(slot)),
        })
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Identity verified at the admission boundary.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Activates the session: stamps the simulation clock and spawns the
    /// read loop. Called once by the server after registration.
    pub fn start(self: &Arc<Self>, stream: Box<dyn MessageStream>) {
        let session = Arc::clone(self);
        tokio::spawn(session.read_loop(stream));
    }

    /// Externally triggered termination; safe to call any number of times.
    pub async fn stop(&self) {
        self.cleanup().await;
    }

    pub async fn state_snapshot(&self) -> PlayerState {
        self.sim.lock().await.state
    }

    pub async fn is_moving(&self) -> bool {
        self.sim.lock().await.moving
    }

    pub async fn client_info(&self) -> (Option<i64>, String) {
        let profile = self.profile.lock().await;
        (profile.client_id, profile.username.clone())
    }

    /// Blocks on inbound envelopes, applying them one at a time in arrival
    /// order, until the transport fails or the stop signal fires. Cleanup
    /// runs on every exit path.
    async fn read_loop(self: Arc<Self>, mut stream: Box<dyn MessageStream>) {
        {
            let mut sim = self.sim.lock().await;
            sim.last_update = Instant::now();
        }
        info!("session {} ({}): read loop started", self.id, self.identity);

        let mut shutdown = self.shutdown.subscribe();
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                result = stream.recv() => match result {
                    Ok(envelope) => Arc::clone(&self).handle_envelope(envelope).await,
                    Err(TransportError::Closed) => {
                        info!("session {}: connection closed by peer", self.id);
                        break;
                    }
                    Err(TransportError::Reset) => {
                        warn!("session {}: connection reset", self.id);
                        break;
                    }
                    Err(TransportError::Timeout) => {
                        warn!("session {}: network timeout", self.id);
                        break;
                    }
                    Err(err) => {
                        warn!("session {}: unexpected read error: {}", self.id, err);
                        break;
                    }
                },
            }
        }

        self.cleanup().await;
    }

    /// Dispatches one inbound envelope by its type tag. Unknown tags and
    /// malformed payloads are logged and dropped; neither ends the session.
    async fn handle_envelope(self: Arc<Self>, envelope: Envelope) {
        match envelope.msg_type.as_str() {
            MSG_LOGIN => match envelope.decode::<Login>() {
                Ok(login) => self.handle_login(login).await,
                Err(err) => warn!("session {}: bad login payload: {}", self.id, err),
            },
            MSG_MOVE_REQUEST => match envelope.decode::<MoveRequest>() {
                Ok(request) => self.handle_move_request(request).await,
                Err(err) => warn!("session {}: bad moveRequest payload: {}", self.id, err),
            },
            other => debug!("session {}: ignoring message type {:?}", self.id, other),
        }
    }

    async fn handle_login(&self, login: Login) {
        info!(
            "session {}: client {} logged in as {:?}",
            self.id, login.client_id, login.username
        );
        let mut profile = self.profile.lock().await;
        profile.client_id = Some(login.client_id);
        profile.username = login.username;
    }

    /// Records the new target, approves the move at the server's speed, and
    /// ensures the reconciliation ticker is running. A request arriving while
    /// already moving only retargets; it never spawns a second ticker.
    async fn handle_move_request(self: Arc<Self>, request: MoveRequest) {
        {
            let mut sim = self.sim.lock().await;
            sim.state.target = request.target;
            sim.moving = true;
            sim.last_update = Instant::now();
        }

        let approved = MoveApproved {
            target: request.target,
            speed: MOVE_SPEED,
        };
        self.send(MSG_MOVE_APPROVED, &approved).await;

        self.start_ticker().await;
    }

    async fn start_ticker(self: Arc<Self>) {
        let mut sim = self.sim.lock().await;
        if let Some(handle) = &sim.ticker {
            if !handle.is_finished() {
                return;
            }
        }
        let task = tokio::spawn(Arc::clone(&self).ticker_loop());
        sim.ticker = Some(task);
    }

    /// Advances the simulation every tick while the player is moving and
    /// pushes a correction per step. Exits when the player arrives (clearing
    /// its own handle slot under the simulation lock) or on the stop signal.
    async fn ticker_loop(self: Arc<Self>) {
        let mut shutdown = self.shutdown.subscribe();
        let mut ticker = interval(self.correction_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick fires immediately; corrections start one interval in.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = ticker.tick() => {
                    let correction = {
                        let mut sim = self.sim.lock().await;
                        if !sim.moving {
                            sim.ticker = None;
                            return;
                        }

                        let now = Instant::now();
                        let dt = (now - sim.last_update).as_secs_f32();
                        sim.last_update = now;

                        let (next, arrived) = movement::step(
                            sim.state.position,
                            sim.state.target,
                            MOVE_SPEED,
                            dt,
                        );
                        sim.state.position = next;
                        if arrived {
                            sim.moving = false;
                            sim.state.move_state = MoveState::Idle;
                            debug!("session {}: arrived at target", self.id);
                        } else {
                            sim.state.move_state = MoveState::Moving;
                        }

                        PositionCorrection { position: next }
                    };

                    self.send(MSG_POSITION_CORRECTION, &correction).await;
                }
            }
        }

        let mut sim = self.sim.lock().await;
        sim.ticker = None;
    }

    /// Serializes the payload and writes it as one frame under the session's
    /// write lock. Write failures are logged, not escalated: the read loop
    /// observes the broken transport and drives teardown.
    pub async fn send<T: Serialize>(&self, msg_type: &str, payload: &T) {
        let envelope = match Envelope::encode(msg_type, payload) {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!("session {}: failed to encode {}: {}", self.id, msg_type, err);
                return;
            }
        };

        let mut sink = self.sink.lock().await;
        if let Err(err) = sink.send(envelope).await {
            warn!("session {}: write failed: {}", self.id, err);
        }
    }

    /// Tears the session down exactly once: signals the ticker and read
    /// loop, closes the transport, removes the registry entry, and releases
    /// the admission slot. Concurrent invocations beyond the first return
    /// immediately.
    async fn cleanup(&self) {
        if self.cleaned.swap(true, Ordering::SeqCst) {
            return;
        }

        let _ = self.shutdown.send(true);

        {
            let mut sim = self.sim.lock().await;
            sim.moving = false;
            // Detached, not aborted: the ticker exits on the signal.
            sim.ticker.take();
        }

        {
            let mut sink = self.sink.lock().await;
            if let Err(err) = sink.close().await {
                debug!("session {}: transport close: {}", self.id, err);
            }
        }

        self.registry.remove(self.id).await;
        self.slot.lock().await.take();

        info!("session {} ({}) closed", self.id, self.identity);
    }
}
