//! Wire protocol for matchhall.
//!
//! This crate defines what travels inside one frame:
//!
//! - **Types** ([`Request`], [`Response`], [`Action`], [`RoomId`]): the
//!   records clients and the server exchange, plus the typed view of a
//!   request that the server actually dispatches on.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how those records are
//!   converted to/from bytes.
//! - **Errors** ([`ProtocolError`]).
//!
//! Framing (where one payload ends and the next begins) belongs to the
//! transport crate.
//!
//! ```text
//! Transport (frames) → Protocol (Request/Action) → Session / Room / Match
//! ```

mod codec;
mod error;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use types::{
    Action, CreateRoom, Credentials, InviteUser, JoinRoom, Request, Response,
    ResponseKind, Role, RoomId, RoomRef,
};
