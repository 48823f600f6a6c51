//! # Session Server Library
//!
//! This library provides the real-time session layer for the multiplayer
//! game backend. It accepts persistent bidirectional connections, registers
//! each one as a player session, receives movement intents, and runs an
//! authoritative simulation that reconciles client-requested targets against
//! server-computed positions pushed back on a fixed cadence.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Movement
//! The server, not the client, decides where a player is. Clients only ask
//! to move toward a target; the server approves the request at its own fixed
//! speed and streams position corrections until the target is reached.
//!
//! ### Session Lifecycle
//! Each connection becomes exactly one session with a well-defined life:
//! admitted, registered, started, and torn down exactly once — whether the
//! client disconnects, the transport fails, or the server stops it.
//!
//! ### Admission Control
//! A capacity-bounded gate keeps the number of concurrent sessions inside a
//! configured limit. A connection that cannot get a slot is rejected with a
//! notice, holding no resources.
//!
//! ## Module Organization
//!
//! - [`movement`] — the pure reconciliation step advancing a position
//!   toward its target with snap-on-arrival semantics.
//! - [`transport`] — the duplex-channel boundary: framed message traits,
//!   close-classified errors, and a newline-delimited JSON adapter usable
//!   over TCP sockets and in-memory pipes.
//! - [`auth`] — the identity-verification boundary invoked at admission.
//! - [`admission`] — the semaphore-backed session capacity gate.
//! - [`registry`] — the lock-guarded map of live sessions.
//! - [`session`] — per-connection read loop, reconciliation ticker,
//!   serialized writes, and idempotent cleanup.
//! - [`network`] — the accept loop tying verification, admission, and
//!   session spawning together.
//!
//! ## Concurrency Model
//!
//! One task per session read loop, one ticker task per actively-moving
//! session. Inbound messages on a session apply strictly sequentially;
//! outbound frames serialize through the session's write lock. The registry
//! map and the admission gate are the only cross-session shared state.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::auth::AllowAnonymous;
//! use server::network::{GameServer, ServerConfig};
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let listener = TcpListener::bind("127.0.0.1:9160").await?;
//!     let server = Arc::new(GameServer::new(ServerConfig::default()));
//!     server.run(listener, Arc::new(AllowAnonymous)).await?;
//!     Ok(())
//! }
//! ```

pub mod admission;
pub mod auth;
pub mod movement;
pub mod network;
pub mod registry;
pub mod session;
pub mod transport;
