//! Room and matchmaking state for matchhall.
//!
//! A room groups players around one pinned game version until its host
//! starts a match, then tracks where that match is running until it ends.
//!
//! # Key types
//!
//! - [`RoomRegistry`]: owns all rooms and invitations; every operation is atomic
//! - [`Catalog`]: the hook that says which games (and versions) exist
//! - [`Room`] / [`RoomStatus`]: the state machine's records
//! - [`RoomView`], [`RoomSummary`], [`InvitationView`]: what clients see
//! - [`MatchTicket`]: a validated start request, handed to the orchestrator

#![allow(async_fn_in_trait)]

mod catalog;
mod error;
mod registry;
mod room;

pub use catalog::{Catalog, GameInfo};
pub use error::RoomError;
pub use registry::RoomRegistry;
pub use room::{
    Endpoint, InvitationView, LeaveOutcome, MatchTicket, Room, RoomStatus, RoomSummary,
    RoomView, StatusTag,
};
