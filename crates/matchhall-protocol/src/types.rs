//! Core protocol types for matchhall's wire format.
//!
//! Every frame carries one JSON record. Clients send a [`Request`]:
//!
//! ```text
//! { "action": "join_room", "user_type": "player", "data": { "room_id": 3, "version": "1.0" } }
//! ```
//!
//! and the server answers each request with exactly one [`Response`]:
//!
//! ```text
//! { "type": "ROOM_RESPONSE", "success": false, "message": "Version mismatch. ..." }
//! ```
//!
//! The generic `data` record is turned into a typed [`Action`] as soon as
//! the request is decoded, and typed results are turned back into a
//! generic record only when the response is built. Nothing between those
//! two points touches untyped JSON.

use std::fmt;

use serde::de::{self, DeserializeOwned};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for a room.
///
/// Serialized as a plain number. Deserialization also accepts a numeric
/// string (`"3"`), which is what older clients send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RoomId(pub u64);

impl<'de> Deserialize<'de> for RoomId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Number(u64),
            Text(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Number(n) => Ok(RoomId(n)),
            Repr::Text(s) => s
                .trim()
                .parse()
                .map(RoomId)
                .map_err(|_| de::Error::custom(format!("invalid room id '{s}'"))),
        }
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which account table a request authenticates against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// A player account. The lobby's default.
    #[default]
    #[serde(alias = "players")]
    Player,
    /// A developer account (catalog uploads).
    #[serde(alias = "developers")]
    Developer,
}

impl Role {
    /// Parses the request's `user_type` field. Missing means player.
    pub fn from_user_type(user_type: Option<&str>) -> Option<Self> {
        match user_type {
            None | Some("player") | Some("players") => Some(Self::Player),
            Some("developer") | Some("developers") => Some(Self::Developer),
            Some(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// A request record as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// What the client wants done, e.g. `"create_room"`.
    pub action: String,

    /// The account type the client claims (`"player"` for the lobby).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_type: Option<String>,

    /// Action-specific fields. Missing or `null` means "no fields".
    #[serde(default)]
    pub data: Value,
}

impl Request {
    /// Builds a player request for `action` with the given data record.
    pub fn new(action: impl Into<String>, data: Value) -> Self {
        Self {
            action: action.into(),
            user_type: Some("player".to_string()),
            data,
        }
    }
}

// ---------------------------------------------------------------------------
// Action: typed view of a request
// ---------------------------------------------------------------------------

/// Username and password for `register` / `login`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Data for `create_room`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRoom {
    pub game_name: String,
    pub version: String,
}

/// Data for `join_room`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinRoom {
    pub room_id: RoomId,
    pub version: String,
}

/// Data for `invite_user`. Without `room_id` the caller's room is used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InviteUser {
    pub target_user: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<RoomId>,
}

/// Optional room reference for `get_room_info` / `start_game`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<RoomId>,
}

/// A decoded, validated request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Register(Credentials),
    Login(Credentials),
    Logout,
    CreateRoom(CreateRoom),
    GetRoomList,
    JoinRoom(JoinRoom),
    LeaveRoom,
    GetRoomInfo(RoomRef),
    InviteUser(InviteUser),
    GetInvitations,
    GetOnlinePlayers,
    StartGame(RoomRef),
    GetHistory,
    GetGameList,
}

impl Action {
    /// Turns a wire request into a typed action.
    ///
    /// # Errors
    /// - [`ProtocolError::UnknownAction`] for an unrecognised `action`.
    /// - [`ProtocolError::InvalidData`] when `data` lacks required fields.
    pub fn parse(request: &Request) -> Result<Self, ProtocolError> {
        let name = request.action.as_str();
        let action = match name {
            "register" => Self::Register(parse_data(name, &request.data)?),
            "login" => Self::Login(parse_data(name, &request.data)?),
            "logout" => Self::Logout,
            "create_room" => Self::CreateRoom(parse_data(name, &request.data)?),
            "get_room_list" => Self::GetRoomList,
            "join_room" => Self::JoinRoom(parse_data(name, &request.data)?),
            "leave_room" => Self::LeaveRoom,
            "get_room_info" => Self::GetRoomInfo(parse_data(name, &request.data)?),
            "invite_user" => Self::InviteUser(parse_data(name, &request.data)?),
            "get_invitations" => Self::GetInvitations,
            "get_online_players" => Self::GetOnlinePlayers,
            "start_game" => Self::StartGame(parse_data(name, &request.data)?),
            "get_history" => Self::GetHistory,
            "get_game_list" => Self::GetGameList,
            other => return Err(ProtocolError::UnknownAction(other.to_string())),
        };
        Ok(action)
    }

    /// The response `type` this action is answered with.
    pub fn response_kind(&self) -> ResponseKind {
        match self {
            Self::Register(_) => ResponseKind::Register,
            Self::Login(_) => ResponseKind::Login,
            Self::Logout => ResponseKind::Logout,
            Self::CreateRoom(_) | Self::JoinRoom(_) | Self::LeaveRoom => ResponseKind::Room,
            Self::GetRoomList => ResponseKind::RoomList,
            Self::GetRoomInfo(_) => ResponseKind::RoomInfo,
            Self::InviteUser(_) => ResponseKind::Invite,
            Self::GetInvitations => ResponseKind::InviteList,
            Self::GetOnlinePlayers => ResponseKind::OnlineUsers,
            Self::StartGame(_) => ResponseKind::StartGame,
            Self::GetHistory => ResponseKind::History,
            Self::GetGameList => ResponseKind::GameList,
        }
    }

    /// Whether the connection must be logged in to perform this action.
    ///
    /// Account creation, login and the public list queries are open.
    pub fn requires_login(&self) -> bool {
        !matches!(
            self,
            Self::Register(_)
                | Self::Login(_)
                | Self::GetRoomList
                | Self::GetOnlinePlayers
                | Self::GetGameList
        )
    }
}

/// Deserializes an action's data record. `null` counts as `{}`.
fn parse_data<T: DeserializeOwned>(action: &str, data: &Value) -> Result<T, ProtocolError> {
    let data = match data {
        Value::Null => Value::Object(serde_json::Map::new()),
        other => other.clone(),
    };
    serde_json::from_value(data).map_err(|source| ProtocolError::InvalidData {
        action: action.to_string(),
        source,
    })
}

// ---------------------------------------------------------------------------
// Response
// ---------------------------------------------------------------------------

/// The `type` tag of a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResponseKind {
    #[serde(rename = "REGISTER_RESPONSE")]
    Register,
    #[serde(rename = "LOGIN_RESPONSE")]
    Login,
    #[serde(rename = "LOGOUT_RESPONSE")]
    Logout,
    #[serde(rename = "ROOM_RESPONSE")]
    Room,
    #[serde(rename = "ROOM_LIST_RESPONSE")]
    RoomList,
    #[serde(rename = "ROOM_INFO_RESPONSE")]
    RoomInfo,
    #[serde(rename = "INVITE_RESPONSE")]
    Invite,
    #[serde(rename = "INVITE_LIST_RESPONSE")]
    InviteList,
    #[serde(rename = "ONLINE_USERS_RESPONSE")]
    OnlineUsers,
    #[serde(rename = "START_GAME_RESPONSE")]
    StartGame,
    #[serde(rename = "HISTORY_RESPONSE")]
    History,
    #[serde(rename = "GAME_LIST_RESPONSE")]
    GameList,
    #[serde(rename = "ERROR")]
    Error,
}

/// A response record as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    #[serde(rename = "type")]
    pub kind: ResponseKind,

    pub success: bool,

    /// Human-readable outcome, always present on failures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Typed result, converted to a generic record. An explicit `null`
    /// decodes as `Some(Value::Null)`; only a missing field is `None`.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present_value"
    )]
    pub data: Option<Value>,
}

/// Runs only when the field is present, so `null` stays distinct from absent.
fn present_value<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

impl Response {
    /// A successful response with no message or data.
    pub fn success(kind: ResponseKind) -> Self {
        Self {
            kind,
            success: true,
            message: None,
            data: None,
        }
    }

    /// A failed response carrying a human-readable reason.
    pub fn failure(kind: ResponseKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            success: false,
            message: Some(message.into()),
            data: None,
        }
    }

    /// The reply to any login-only action from an anonymous connection.
    pub fn permission_denied() -> Self {
        Self::failure(ResponseKind::Error, "Permission denied. Please log in first.")
    }

    /// Attaches a message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Attaches a typed result as the `data` record.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Encode`] if `value` cannot be represented
    /// as JSON (e.g. a map with non-string keys).
    pub fn with_data<T: Serialize>(mut self, value: &T) -> Result<Self, ProtocolError> {
        let value = serde_json::to_value(value).map_err(ProtocolError::Encode)?;
        // Results with nothing to report leave the field off the wire.
        self.data = (!value.is_null()).then_some(value);
        Ok(self)
    }

    /// Reads the `data` record back as a typed value.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Decode`] if the record doesn't match `T`.
    pub fn data_as<T: DeserializeOwned>(&self) -> Result<T, ProtocolError> {
        let value = self.data.clone().unwrap_or(Value::Null);
        serde_json::from_value(value).map_err(ProtocolError::Decode)
    }
}

// =========================================================================
// Tests
// =========================================================================
