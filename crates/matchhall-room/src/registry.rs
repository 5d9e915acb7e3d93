//! Room registry: the matchmaking state machine.
//!
//! All room and invitation state lives in one [`RoomTable`] behind one
//! `tokio::sync::Mutex`. Every public method takes the lock once, checks
//! its guards and mutates, so each operation is atomic with respect to
//! every other, including the orchestrator's completion writes.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use matchhall_protocol::RoomId;
use tokio::sync::Mutex;

use crate::{
    Catalog, Endpoint, InvitationView, LeaveOutcome, MatchTicket, Room, RoomError,
    RoomStatus, RoomSummary, RoomView,
};

/// The state guarded by the registry's lock.
#[derive(Debug, Default)]
struct RoomTable {
    /// Ordered by id so listings come out in creation order.
    rooms: BTreeMap<RoomId, Room>,
    /// identity → the one room it belongs to.
    memberships: HashMap<String, RoomId>,
    /// identity → rooms it was invited to, oldest first.
    invitations: HashMap<String, Vec<RoomId>>,
    next_id: u64,
}

impl RoomTable {
    /// Resolves an explicit room id, or falls back to the caller's room.
    fn resolve(&self, identity: &str, room_id: Option<RoomId>) -> Result<&Room, RoomError> {
        match room_id {
            Some(id) => self.rooms.get(&id).ok_or(RoomError::RoomNotFound(id)),
            None => {
                let id = self.memberships.get(identity).ok_or(RoomError::NotInRoom)?;
                self.rooms.get(id).ok_or(RoomError::RoomNotFound(*id))
            }
        }
    }
}

/// Owns every room and invitation.
///
/// Shared across connection tasks and the orchestrator as
/// `Arc<RoomRegistry<C>>`.
pub struct RoomRegistry<C: Catalog> {
    catalog: Arc<C>,
    table: Mutex<RoomTable>,
}

impl<C: Catalog> RoomRegistry<C> {
    /// Creates an empty registry that validates games against `catalog`.
    pub fn new(catalog: Arc<C>) -> Self {
        Self {
            catalog,
            table: Mutex::new(RoomTable {
                next_id: 1,
                ..RoomTable::default()
            }),
        }
    }

    /// The catalog this registry checks against.
    pub fn catalog(&self) -> &Arc<C> {
        &self.catalog
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Creates a room with `host` as its only member.
    ///
    /// # Errors
    /// - [`RoomError::GameNotFound`] if the catalog doesn't know `game_name`.
    /// - [`RoomError::VersionMismatch`] unless `version` is the catalog's latest.
    /// - [`RoomError::AlreadyInRoom`] if `host` is in any room.
    pub async fn create_room(
        &self,
        host: &str,
        game_name: &str,
        version: &str,
    ) -> Result<RoomView, RoomError> {
        let game = self
            .catalog
            .game_info(game_name)
            .await
            .ok_or_else(|| RoomError::GameNotFound(game_name.to_string()))?;

        if game.version != version {
            return Err(RoomError::VersionMismatch {
                expected: game.version,
                actual: version.to_string(),
            });
        }

        let mut table = self.table.lock().await;
        if let Some(current) = table.memberships.get(host) {
            return Err(RoomError::AlreadyInRoom(*current));
        }

        let id = RoomId(table.next_id);
        table.next_id += 1;

        let room = Room {
            id,
            host: host.to_string(),
            game_name: game.name,
            version: version.to_string(),
            max_players: game.max_players.max(1),
            members: vec![host.to_string()],
            status: RoomStatus::Waiting,
        };
        let view = room.view();
        table.rooms.insert(id, room);
        table.memberships.insert(host.to_string(), id);

        tracing::info!(room_id = %id, %host, game = %game_name, %version, "room created");
        Ok(view)
    }

    /// Adds `identity` to a waiting room and consumes any invitation to it.
    ///
    /// Guards are checked in this order: already in a room, room exists,
    /// room waiting, room has a free seat, version matches the pinned one.
    pub async fn join_room(
        &self,
        identity: &str,
        room_id: RoomId,
        version: &str,
    ) -> Result<RoomView, RoomError> {
        let mut table = self.table.lock().await;

        if let Some(current) = table.memberships.get(identity) {
            return Err(RoomError::AlreadyInRoom(*current));
        }

        let room = table
            .rooms
            .get_mut(&room_id)
            .ok_or(RoomError::RoomNotFound(room_id))?;

        if !room.status.is_waiting() {
            return Err(RoomError::RoomNotWaiting(room_id));
        }
        if room.is_full() {
            return Err(RoomError::RoomFull(room_id));
        }
        if room.version != version {
            return Err(RoomError::VersionMismatch {
                expected: room.version.clone(),
                actual: version.to_string(),
            });
        }

        room.members.push(identity.to_string());
        let view = room.view();

        table.memberships.insert(identity.to_string(), room_id);
        if let Some(invites) = table.invitations.get_mut(identity) {
            invites.retain(|id| *id != room_id);
            if invites.is_empty() {
                table.invitations.remove(identity);
            }
        }

        tracing::info!(%room_id, %identity, "joined room");
        Ok(view)
    }

    /// Removes `identity` from its room.
    ///
    /// The last member out deletes the room. A departing host hands the
    /// room to the earliest-joined member still present.
    ///
    /// # Errors
    /// [`RoomError::NotInRoom`] if `identity` is in no room.
    pub async fn leave_room(&self, identity: &str) -> Result<LeaveOutcome, RoomError> {
        let mut table = self.table.lock().await;

        let room_id = table
            .memberships
            .remove(identity)
            .ok_or(RoomError::NotInRoom)?;

        let Some(room) = table.rooms.get_mut(&room_id) else {
            // Membership pointed at a missing room; nothing more to undo.
            tracing::warn!(%room_id, %identity, "membership referenced a missing room");
            return Ok(LeaveOutcome::Deleted { room_id });
        };

        room.members.retain(|m| m != identity);

        if room.members.is_empty() {
            table.rooms.remove(&room_id);
            tracing::info!(%room_id, %identity, "last member left, room deleted");
            return Ok(LeaveOutcome::Deleted { room_id });
        }

        let mut new_host = None;
        if room.host == identity {
            // Non-empty, checked above.
            room.host = room.members[0].clone();
            new_host = Some(room.host.clone());
            tracing::info!(%room_id, new_host = %room.host, "host left, promoted next member");
        }

        tracing::info!(%room_id, %identity, "left room");
        Ok(LeaveOutcome::Left { room_id, new_host })
    }

    /// Records an invitation from the room's host to `target`.
    ///
    /// `target` is not checked for existence or presence. Repeat invites
    /// to the same room collapse into one.
    ///
    /// # Errors
    /// - [`RoomError::NotInRoom`] without `room_id` when `host` has no room.
    /// - [`RoomError::RoomNotFound`] for an explicit, unknown `room_id`.
    /// - [`RoomError::NotHost`] unless `host` hosts that room.
    pub async fn invite_user(
        &self,
        host: &str,
        target: &str,
        room_id: Option<RoomId>,
    ) -> Result<RoomId, RoomError> {
        let mut table = self.table.lock().await;

        let room = table.resolve(host, room_id)?;
        if room.host != host {
            return Err(RoomError::NotHost { action: "invite" });
        }
        let room_id = room.id;

        let invites = table.invitations.entry(target.to_string()).or_default();
        if !invites.contains(&room_id) {
            invites.push(room_id);
        }

        tracing::debug!(%room_id, %host, %target, "invitation recorded");
        Ok(room_id)
    }

    /// Validates a start request and captures the roster.
    ///
    /// Does not change the room: the status only flips once the worker has
    /// actually launched (see [`mark_playing`](Self::mark_playing)).
    ///
    /// # Errors
    /// - [`RoomError::NotInRoom`] / [`RoomError::RoomNotFound`] if the room
    ///   can't be resolved.
    /// - [`RoomError::NotHost`] unless `host` is the current host.
    /// - [`RoomError::RoomNotWaiting`] if a match is already running.
    pub async fn prepare_start(
        &self,
        host: &str,
        room_id: Option<RoomId>,
    ) -> Result<MatchTicket, RoomError> {
        let table = self.table.lock().await;

        let room = table.resolve(host, room_id)?;
        if room.host != host {
            return Err(RoomError::NotHost { action: "start game" });
        }
        if !room.status.is_waiting() {
            return Err(RoomError::RoomNotWaiting(room.id));
        }

        Ok(MatchTicket {
            room_id: room.id,
            game_name: room.game_name.clone(),
            version: room.version.clone(),
            roster: room.members.clone(),
        })
    }

    /// Flips a waiting room to PLAYING at `endpoint`.
    ///
    /// # Errors
    /// - [`RoomError::RoomNotFound`] if the room vanished since `prepare_start`.
    /// - [`RoomError::RoomNotWaiting`] if another start won the race.
    pub async fn mark_playing(&self, room_id: RoomId, endpoint: Endpoint) -> Result<(), RoomError> {
        let mut table = self.table.lock().await;
        let room = table
            .rooms
            .get_mut(&room_id)
            .ok_or(RoomError::RoomNotFound(room_id))?;

        if !room.status.is_waiting() {
            return Err(RoomError::RoomNotWaiting(room_id));
        }
        room.status = RoomStatus::Playing { endpoint };
        Ok(())
    }

    /// Returns a room to WAITING and clears its endpoint.
    ///
    /// Returns `false` if the room no longer exists.
    pub async fn mark_waiting(&self, room_id: RoomId) -> bool {
        let mut table = self.table.lock().await;
        match table.rooms.get_mut(&room_id) {
            Some(room) => {
                room.status = RoomStatus::Waiting;
                true
            }
            None => false,
        }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Snapshot of one room.
    pub async fn room_info(&self, room_id: RoomId) -> Result<RoomView, RoomError> {
        let table = self.table.lock().await;
        table
            .rooms
            .get(&room_id)
            .map(Room::view)
            .ok_or(RoomError::RoomNotFound(room_id))
    }

    /// Snapshot of the caller's own room.
    pub async fn info_for_member(&self, identity: &str) -> Result<RoomView, RoomError> {
        let table = self.table.lock().await;
        table.resolve(identity, None).map(Room::view)
    }

    /// Every WAITING room, oldest first.
    pub async fn list_waiting_rooms(&self) -> Vec<RoomSummary> {
        let table = self.table.lock().await;
        table
            .rooms
            .values()
            .filter(|room| room.status.is_waiting())
            .map(Room::summary)
            .collect()
    }

    /// Pending invitations for `identity`, skipping rooms that are gone.
    pub async fn list_invitations(&self, identity: &str) -> Vec<InvitationView> {
        let table = self.table.lock().await;
        let Some(invites) = table.invitations.get(identity) else {
            return Vec::new();
        };
        invites
            .iter()
            .filter_map(|id| table.rooms.get(id))
            .map(|room| InvitationView {
                id: room.id,
                game_name: room.game_name.clone(),
                host: room.host.clone(),
            })
            .collect()
    }

    /// A full copy of one room, for invariant checks.
    pub async fn snapshot(&self, room_id: RoomId) -> Option<Room> {
        self.table.lock().await.rooms.get(&room_id).cloned()
    }

    /// Number of live rooms.
    pub async fn len(&self) -> usize {
        self.table.lock().await.rooms.len()
    }

    /// Whether there are no rooms.
    pub async fn is_empty(&self) -> bool {
        self.table.lock().await.rooms.is_empty()
    }
}
