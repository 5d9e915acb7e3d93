//! Room records and the read-only views handed to clients.

use std::fmt;

use matchhall_protocol::RoomId;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Endpoint / RoomStatus
// ---------------------------------------------------------------------------

/// Where a running match worker can be reached.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// The lifecycle state of a room.
///
/// ```text
/// Waiting ──(worker launched)──→ Playing ──(worker exited)──→ Waiting
/// ```
///
/// The endpoint lives inside `Playing`, so a waiting room with an endpoint
/// (or a playing room without one) cannot be built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomStatus {
    Waiting,
    Playing { endpoint: Endpoint },
}

impl RoomStatus {
    pub fn is_waiting(&self) -> bool {
        matches!(self, Self::Waiting)
    }

    pub fn endpoint(&self) -> Option<&Endpoint> {
        match self {
            Self::Waiting => None,
            Self::Playing { endpoint } => Some(endpoint),
        }
    }
}

// ---------------------------------------------------------------------------
// Room
// ---------------------------------------------------------------------------

/// One room, owned by the [`RoomRegistry`](crate::RoomRegistry).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Room {
    pub id: RoomId,
    pub host: String,
    pub game_name: String,
    /// Pinned at creation; joiners must offer exactly this.
    pub version: String,
    pub max_players: usize,
    /// Join order. The host is not necessarily first after a promotion.
    pub members: Vec<String>,
    pub status: RoomStatus,
}

impl Room {
    pub fn is_full(&self) -> bool {
        self.members.len() >= self.max_players
    }

    /// Full snapshot for `get_room_info` and `create_room`.
    pub fn view(&self) -> RoomView {
        let endpoint = self.status.endpoint();
        RoomView {
            id: self.id,
            host: self.host.clone(),
            game_name: self.game_name.clone(),
            version: self.version.clone(),
            max_players: self.max_players,
            players: self.members.clone(),
            status: if endpoint.is_some() {
                StatusTag::Playing
            } else {
                StatusTag::Waiting
            },
            server_ip: endpoint.map(|e| e.host.clone()),
            server_port: endpoint.map(|e| e.port),
        }
    }

    /// Compact entry for `get_room_list`.
    pub fn summary(&self) -> RoomSummary {
        RoomSummary {
            id: self.id,
            game_name: self.game_name.clone(),
            host: self.host.clone(),
            players: self.members.len(),
            max: self.max_players,
        }
    }
}

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

/// Wire form of [`RoomStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StatusTag {
    Waiting,
    Playing,
}

/// Everything a member polls for while waiting or playing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomView {
    pub id: RoomId,
    pub host: String,
    pub game_name: String,
    pub version: String,
    pub max_players: usize,
    pub players: Vec<String>,
    pub status: StatusTag,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_port: Option<u16>,
}

/// One line of the lobby's room list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSummary {
    pub id: RoomId,
    pub game_name: String,
    pub host: String,
    /// Current member count.
    pub players: usize,
    pub max: usize,
}

/// A pending invitation, resolved against a room that still exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvitationView {
    pub id: RoomId,
    pub game_name: String,
    pub host: String,
}

// ---------------------------------------------------------------------------
// Operation results
// ---------------------------------------------------------------------------

/// What `leave_room` did to the room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeaveOutcome {
    /// The leaver was the last member; the room is gone.
    Deleted { room_id: RoomId },
    /// The room lives on. `new_host` is set when the host left.
    Left {
        room_id: RoomId,
        new_host: Option<String>,
    },
}

impl LeaveOutcome {
    pub fn room_id(&self) -> RoomId {
        match self {
            Self::Deleted { room_id } | Self::Left { room_id, .. } => *room_id,
        }
    }
}

/// Everything needed to launch a match, captured atomically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchTicket {
    pub room_id: RoomId,
    pub game_name: String,
    pub version: String,
    /// Members at the time of the start request, in join order.
    pub roster: Vec<String>,
}
