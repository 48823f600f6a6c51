//! Message envelope and payload records for the session wire protocol.
//!
//! Every frame on the wire is one JSON object of the shape
//! `{ "type": <tag>, "data": <payload> }`. The payload schema is determined
//! solely by the type tag; receivers ignore tags they do not recognize
//! instead of treating them as fatal.

use crate::math::Vec3;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub const MSG_LOGIN: &str = "login";
pub const MSG_MOVE_REQUEST: &str = "moveRequest";
pub const MSG_MOVE_APPROVED: &str = "moveApproved";
pub const MSG_POSITION_CORRECTION: &str = "positionCorrection";
pub const MSG_PLAYER_STATE: &str = "playerState";
pub const MSG_DISCONNECTED: &str = "disconnected";

/// Outer wrapper around every protocol message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub msg_type: String,
    pub data: serde_json::Value,
}

impl Envelope {
    /// Wraps a payload record under the given type tag.
    pub fn encode<T: Serialize>(msg_type: &str, payload: &T) -> Result<Envelope, serde_json::Error> {
        Ok(Envelope {
            msg_type: msg_type.to_string(),
            data: serde_json::to_value(payload)?,
        })
    }

    /// Decodes the payload as the record type selected by the caller.
    ///
    /// The caller is expected to have dispatched on `msg_type` first; a
    /// mismatch surfaces as a decode error, not a panic.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.data.clone())
    }
}

/// Client self-identification, accepted at face value by the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Login {
    #[serde(rename = "clientID")]
    pub client_id: i64,
    pub username: String,
}

/// Client request to move toward a target position.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MoveRequest {
    pub target: Vec3,
}

/// Server acknowledgement of a move request, carrying the authoritative speed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MoveApproved {
    pub target: Vec3,
    pub speed: f32,
}

/// Authoritative position pushed to the client on each reconciliation tick.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PositionCorrection {
    pub position: Vec3,
}

/// Server notice that the connection is being refused or dropped.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Disconnected {
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MoveState {
    Idle,
    Moving,
}

/// Snapshot of a player's authoritative state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PlayerState {
    pub health: i32,
    pub position: Vec3,
    pub target: Vec3,
    pub move_state: MoveState,
}

impl PlayerState {
    pub fn new(health: i32) -> PlayerState {
        PlayerState {
            health,
            position: Vec3::default(),
            target: Vec3::default(),
            move_state: MoveState::Idle,
        }
    }
}
