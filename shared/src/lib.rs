//! Shared wire-level types for the session server and its clients.
//!
//! Everything a client needs to talk to the server lives here: the 3D vector
//! math used by the movement protocol, the type-tagged message envelope, and
//! the payload records carried inside it. Nothing in this crate performs I/O;
//! all types serialize independently of the transport that carries them.

pub mod math;
pub mod protocol;

pub use math::Vec3;
pub use protocol::{
    Disconnected, Envelope, Login, MoveApproved, MoveRequest, MoveState, PlayerState,
    PositionCorrection,
};

/// Server-authoritative movement speed in units per second. Never taken from
/// the client; only the target position is client-supplied.
pub const MOVE_SPEED: f32 = 1.0;

/// A moving entity within this distance of its target is snapped onto it.
pub const ARRIVAL_THRESHOLD: f32 = 0.01;

/// Cadence of authoritative position corrections, in milliseconds.
pub const CORRECTION_INTERVAL_MS: u64 = 200;

/// Default cap on concurrently registered sessions.
pub const MAX_SESSIONS: usize = 10_000;

/// Health assigned to a freshly created player.
pub const INITIAL_HEALTH: i32 = 100;
