//! Per-connection handler: decode, dispatch, respond.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Receive one frame → decode a `Request` (malformed closes the connection)
//!   2. Parse the action → check login → run it against the registries
//!   3. Encode and send exactly one `Response`
//!   4. Repeat until the peer disconnects; then leave the room and log out
//!
//! Requests on one connection run strictly one after another. Different
//! connections run concurrently and meet only inside the registries.

use std::sync::Arc;

use matchhall_orchestrator::MatchRecorder;
use matchhall_protocol::{Action, Codec, Request, Response, ResponseKind, Role};
use matchhall_room::{Catalog, Endpoint, LeaveOutcome, RoomError};
use matchhall_session::SessionError;
use matchhall_transport::{Connection, ConnectionId, TcpConnection};
use serde::Serialize;
use serde_json::json;

use crate::LobbyError;
use crate::server::{LobbyBackend, ServerState};

/// Drop guard that signs a connection's identity out when the handler exits.
///
/// The normal path calls [`release`](Self::release) explicitly. If the
/// handler task is cancelled or panics instead, `Drop` spawns the same
/// cleanup as a fire-and-forget task.
struct SessionGuard<S: LobbyBackend, C: Codec> {
    identity: Option<String>,
    conn_id: ConnectionId,
    state: Arc<ServerState<S, C>>,
}

impl<S: LobbyBackend, C: Codec> SessionGuard<S, C> {
    async fn release(&mut self) {
        if let Some(identity) = self.identity.take() {
            sign_out(&self.state, &identity).await;
        }
    }

    fn logged_in(&self) -> Result<String, LobbyError> {
        self.identity.clone().ok_or(LobbyError::NotLoggedIn)
    }
}

impl<S: LobbyBackend, C: Codec> Drop for SessionGuard<S, C> {
    fn drop(&mut self) {
        let Some(identity) = self.identity.take() else {
            return;
        };
        let state = Arc::clone(&self.state);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    sign_out(&state, &identity).await;
                });
            }
            Err(_) => {
                tracing::warn!(%identity, conn_id = %self.conn_id, "no runtime left to release session");
            }
        }
    }
}

/// Implicit leave-room followed by logout. Failures are logged only.
async fn sign_out<S: LobbyBackend, C: Codec>(state: &ServerState<S, C>, identity: &str) {
    match state.rooms.leave_room(identity).await {
        Ok(outcome) => log_leave(identity, &outcome),
        Err(RoomError::NotInRoom) => {}
        Err(e) => tracing::warn!(%identity, error = %e, "implicit leave failed"),
    }
    state.sessions.terminate(identity).await;
}

fn log_leave(identity: &str, outcome: &LeaveOutcome) {
    match outcome {
        LeaveOutcome::Deleted { room_id } => {
            tracing::info!(%identity, %room_id, "left room, room deleted");
        }
        LeaveOutcome::Left {
            room_id,
            new_host: Some(host),
        } => {
            tracing::info!(%identity, %room_id, new_host = %host, "left room, host reassigned");
        }
        LeaveOutcome::Left { room_id, new_host: None } => {
            tracing::info!(%identity, %room_id, "left room");
        }
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<S, C>(
    conn: TcpConnection,
    state: Arc<ServerState<S, C>>,
) -> Result<(), LobbyError>
where
    S: LobbyBackend,
    C: Codec,
{
    let conn_id = conn.id();
    tracing::debug!(%conn_id, peer = ?conn.peer_addr(), "handling new connection");

    let mut guard = SessionGuard {
        identity: None,
        conn_id,
        state: Arc::clone(&state),
    };

    let result = serve(&conn, &state, &mut guard).await;

    guard.release().await;
    if let Err(e) = conn.close().await {
        tracing::debug!(%conn_id, error = %e, "close failed");
    }
    result
}

/// The request/response loop. Returns when the peer goes away or breaks
/// the protocol.
async fn serve<S, C>(
    conn: &TcpConnection,
    state: &ServerState<S, C>,
    guard: &mut SessionGuard<S, C>,
) -> Result<(), LobbyError>
where
    S: LobbyBackend,
    C: Codec,
{
    let conn_id = conn.id();

    loop {
        let data = match conn.recv().await {
            Ok(Some(data)) => data,
            Ok(None) => {
                tracing::info!(%conn_id, identity = ?guard.identity, "connection closed");
                return Ok(());
            }
            Err(e) => {
                tracing::warn!(%conn_id, error = %e, "dropping connection");
                return Err(e.into());
            }
        };

        let request: Request = match state.codec.decode(&data) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(%conn_id, error = %e, "malformed request, closing connection");
                return Err(e.into());
            }
        };

        let response = dispatch(state, guard, request).await;
        let bytes = state.codec.encode(&response)?;
        conn.send(&bytes).await?;
    }
}

/// Turns one request into one response. Never fails: every error becomes
/// a `success: false` response.
async fn dispatch<S, C>(
    state: &ServerState<S, C>,
    guard: &mut SessionGuard<S, C>,
    request: Request,
) -> Response
where
    S: LobbyBackend,
    C: Codec,
{
    let conn_id = guard.conn_id;

    let action = match Action::parse(&request) {
        Ok(action) => action,
        Err(e) => {
            tracing::debug!(%conn_id, action = %request.action, error = %e, "rejected request");
            return Response::failure(ResponseKind::Error, e.to_string());
        }
    };

    if action.requires_login() && guard.identity.is_none() {
        tracing::debug!(%conn_id, action = %request.action, "permission denied");
        return Response::permission_denied();
    }

    tracing::debug!(%conn_id, identity = ?guard.identity, action = %request.action, "dispatching");

    let kind = action.response_kind();
    match execute(state, guard, action, request.user_type.as_deref()).await {
        Ok(response) => response,
        Err(LobbyError::NotLoggedIn) => Response::permission_denied(),
        Err(e) => {
            tracing::debug!(%conn_id, action = %request.action, error = %e, "request failed");
            Response::failure(kind, e.to_string())
        }
    }
}

/// Where to reach a started match.
#[derive(Serialize)]
struct MatchAddress<'a> {
    server_ip: &'a str,
    server_port: u16,
}

impl<'a> From<&'a Endpoint> for MatchAddress<'a> {
    fn from(endpoint: &'a Endpoint) -> Self {
        Self {
            server_ip: &endpoint.host,
            server_port: endpoint.port,
        }
    }
}

/// The lobby only serves player accounts.
fn player_role(user_type: Option<&str>) -> Result<Role, LobbyError> {
    match Role::from_user_type(user_type) {
        Some(Role::Player) => Ok(Role::Player),
        _ => Err(SessionError::InvalidCredential(
            "This lobby only accepts player accounts.".to_string(),
        )
        .into()),
    }
}

async fn execute<S, C>(
    state: &ServerState<S, C>,
    guard: &mut SessionGuard<S, C>,
    action: Action,
    user_type: Option<&str>,
) -> Result<Response, LobbyError>
where
    S: LobbyBackend,
    C: Codec,
{
    let kind = action.response_kind();

    let response = match action {
        // --- Accounts ---
        Action::Register(creds) => {
            let role = player_role(user_type)?;
            state
                .sessions
                .register(&creds.username, &creds.password, role)
                .await?;
            Response::success(kind)
                .with_message("Registration successful.")
                .with_data(&json!({ "username": creds.username }))?
        }

        Action::Login(creds) => {
            if let Some(current) = &guard.identity {
                return Err(SessionError::AlreadyLoggedIn(current.clone()).into());
            }
            let role = player_role(user_type)?;
            let session = state
                .sessions
                .authenticate(&creds.username, &creds.password, role, guard.conn_id)
                .await?;
            guard.identity = Some(session.identity.clone());

            let history = state.store.history(&session.identity).await;
            Response::success(kind)
                .with_message("Login successful.")
                .with_data(&json!({
                    "username": session.identity,
                    "play_history": history,
                }))?
        }

        Action::Logout => {
            guard.release().await;
            Response::success(kind).with_message("Logged out.")
        }

        // --- Rooms ---
        Action::CreateRoom(req) => {
            let me = guard.logged_in()?;
            let view = state
                .rooms
                .create_room(&me, &req.game_name, &req.version)
                .await?;
            Response::success(kind)
                .with_message("Room created.")
                .with_data(&json!({ "room_id": view.id, "room": view }))?
        }

        Action::GetRoomList => {
            let rooms = state.rooms.list_waiting_rooms().await;
            Response::success(kind).with_data(&rooms)?
        }

        Action::JoinRoom(req) => {
            let me = guard.logged_in()?;
            let view = state.rooms.join_room(&me, req.room_id, &req.version).await?;
            Response::success(kind)
                .with_message("Joined room.")
                .with_data(&view)?
        }

        Action::LeaveRoom => {
            let me = guard.logged_in()?;
            let outcome = state.rooms.leave_room(&me).await?;
            log_leave(&me, &outcome);
            Response::success(kind).with_message("Left room.")
        }

        Action::GetRoomInfo(target) => {
            let view = match target.room_id {
                Some(room_id) => state.rooms.room_info(room_id).await?,
                None => state.rooms.info_for_member(&guard.logged_in()?).await?,
            };
            Response::success(kind).with_data(&view)?
        }

        Action::InviteUser(req) => {
            let me = guard.logged_in()?;
            let room_id = state
                .rooms
                .invite_user(&me, &req.target_user, req.room_id)
                .await?;
            Response::success(kind)
                .with_message(format!("Invited {}.", req.target_user))
                .with_data(&json!({ "room_id": room_id }))?
        }

        Action::GetInvitations => {
            let me = guard.logged_in()?;
            let invitations = state.rooms.list_invitations(&me).await;
            Response::success(kind).with_data(&invitations)?
        }

        Action::GetOnlinePlayers => {
            let online = state.sessions.list_online(guard.identity.as_deref()).await;
            Response::success(kind).with_data(&online)?
        }

        // --- Matches ---
        Action::StartGame(target) => {
            let me = guard.logged_in()?;
            let endpoint = state.matches.start_game(&me, target.room_id).await?;
            Response::success(kind)
                .with_message("Game server started.")
                .with_data(&MatchAddress::from(&endpoint))?
        }

        Action::GetHistory => {
            let me = guard.logged_in()?;
            let history = state.store.history(&me).await;
            Response::success(kind).with_data(&history)?
        }

        Action::GetGameList => {
            let games = state.store.games().await;
            Response::success(kind).with_data(&games)?
        }
    };

    Ok(response)
}
