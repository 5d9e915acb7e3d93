//! Integration tests for the lobby server: real TCP connections driven by
//! `LobbyClient` against an in-memory store.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use matchhall::prelude::*;
use serde_json::{Value, json};

// =========================================================================
// Helpers
// =========================================================================

struct Lobby {
    addr: SocketAddr,
    store: Arc<MemoryStore>,
    matches: MatchOrchestrator<MemoryStore>,
}

fn accounts() -> MemoryStore {
    MemoryStore::new()
        .with_user("alice", "pw")
        .with_user("bob", "pw")
        .with_user("carol", "pw")
        .with_user("dave", "pw")
}

async fn start(store: MemoryStore) -> Lobby {
    start_with(LobbyServerBuilder::new(), store).await
}

async fn start_with(builder: LobbyServerBuilder, store: MemoryStore) -> Lobby {
    let store = Arc::new(store);
    let server = builder
        .bind("127.0.0.1:0")
        .build(Arc::clone(&store))
        .await
        .unwrap();
    let addr = server.local_addr().unwrap();
    let matches = server.matches();
    tokio::spawn(server.run());
    Lobby {
        addr,
        store,
        matches,
    }
}

async fn connect(lobby: &Lobby) -> LobbyClient {
    LobbyClient::connect(lobby.addr).await.unwrap()
}

async fn logged_in(lobby: &Lobby, name: &str) -> LobbyClient {
    let mut client = connect(lobby).await;
    let resp = client.login(name, "pw").await.unwrap();
    assert!(resp.success, "login failed: {resp:?}");
    client
}

/// `alice` hosts a Tetris 1.0 room; returns her client and the room id.
async fn alice_hosts(lobby: &Lobby) -> (LobbyClient, RoomId) {
    let mut alice = logged_in(lobby, "alice").await;
    let resp = alice
        .request(
            "create_room",
            json!({ "game_name": "Tetris", "version": "1.0" }),
        )
        .await
        .unwrap();
    assert!(resp.success, "create_room failed: {resp:?}");
    let data = resp.data.unwrap();
    let room_id: RoomId = serde_json::from_value(data["room_id"].clone()).unwrap();
    (alice, room_id)
}

async fn room_info(client: &mut LobbyClient, room_id: RoomId) -> RoomView {
    let resp = client
        .request("get_room_info", json!({ "room_id": room_id }))
        .await
        .unwrap();
    assert!(resp.success, "get_room_info failed: {resp:?}");
    resp.data_as().unwrap()
}

// =========================================================================
// Login gate
// =========================================================================

#[tokio::test]
async fn test_anonymous_room_action_is_denied() {
    let lobby = start(accounts().with_simple_game("Tetris", "1.0", 2)).await;
    let mut client = connect(&lobby).await;

    let resp = client
        .request(
            "create_room",
            json!({ "game_name": "Tetris", "version": "1.0" }),
        )
        .await
        .unwrap();

    assert_eq!(resp.kind, ResponseKind::Error);
    assert!(!resp.success);
    assert_eq!(
        resp.message.as_deref(),
        Some("Permission denied. Please log in first.")
    );

    // Connection stays open; the public list queries still work.
    let resp = client.request("get_room_list", json!({})).await.unwrap();
    assert!(resp.success);
    assert_eq!(resp.data, Some(json!([])));
}

#[tokio::test]
async fn test_register_then_login_returns_history() {
    let lobby = start(MemoryStore::new()).await;
    let mut client = connect(&lobby).await;

    let resp = client.register("erin", "secret").await.unwrap();
    assert!(resp.success);
    assert_eq!(resp.kind, ResponseKind::Register);
    assert_eq!(resp.data, Some(json!({ "username": "erin" })));

    let resp = client.login("erin", "secret").await.unwrap();
    assert!(resp.success);
    assert_eq!(resp.kind, ResponseKind::Login);
    let data = resp.data.unwrap();
    assert_eq!(data["username"], "erin");
    assert_eq!(data["play_history"], json!([]));
}

#[tokio::test]
async fn test_register_existing_account_fails() {
    let lobby = start(accounts()).await;
    let mut client = connect(&lobby).await;

    let resp = client.register("alice", "other").await.unwrap();

    assert!(!resp.success);
    assert_eq!(resp.message.as_deref(), Some("Account already exists."));
}

#[tokio::test]
async fn test_login_failures_keep_connection_open() {
    let lobby = start(accounts()).await;
    let mut client = connect(&lobby).await;

    let resp = client.login("alice", "wrong").await.unwrap();
    assert_eq!(resp.message.as_deref(), Some("Incorrect password."));

    let resp = client.login("nobody", "pw").await.unwrap();
    assert_eq!(resp.message.as_deref(), Some("Account not found."));

    let resp = client.login("", "").await.unwrap();
    assert_eq!(resp.message.as_deref(), Some("Missing credentials."));

    assert!(client.login("alice", "pw").await.unwrap().success);
}

#[tokio::test]
async fn test_second_login_for_same_identity_fails() {
    let lobby = start(accounts()).await;
    let _first = logged_in(&lobby, "alice").await;
    let mut second = connect(&lobby).await;

    let resp = second.login("alice", "pw").await.unwrap();

    assert!(!resp.success);
    assert_eq!(resp.message.as_deref(), Some("Already logged in."));
}

#[tokio::test]
async fn test_connection_cannot_switch_identity() {
    let lobby = start(accounts()).await;
    let mut alice = logged_in(&lobby, "alice").await;

    let resp = alice.login("bob", "pw").await.unwrap();

    assert!(!resp.success);
    assert_eq!(resp.message.as_deref(), Some("Already logged in."));
}

#[tokio::test]
async fn test_developer_user_type_is_rejected() {
    let lobby = start(accounts()).await;
    let mut client = connect(&lobby).await;

    let mut request = Request::new("login", json!({ "username": "alice", "password": "pw" }));
    request.user_type = Some("developer".into());
    let resp = client.send(&request).await.unwrap();

    assert!(!resp.success);
    assert_eq!(resp.kind, ResponseKind::Login);
}

#[tokio::test]
async fn test_logout_frees_identity_and_room() {
    let lobby = start(accounts().with_simple_game("Tetris", "1.0", 2)).await;
    let (mut alice, _room) = alice_hosts(&lobby).await;

    let resp = alice.request("logout", json!({})).await.unwrap();
    assert!(resp.success);
    assert_eq!(resp.kind, ResponseKind::Logout);

    // The sole member logged out, so the room is gone.
    let resp = alice.request("get_room_list", json!({})).await.unwrap();
    assert_eq!(resp.data, Some(json!([])));

    // Back to anonymous on this connection; the name is free elsewhere.
    let resp = alice.request("get_history", json!({})).await.unwrap();
    assert_eq!(resp.kind, ResponseKind::Error);
    let mut again = connect(&lobby).await;
    assert!(again.login("alice", "pw").await.unwrap().success);
}

// =========================================================================
// Request errors
// =========================================================================

#[tokio::test]
async fn test_unknown_action_is_reported() {
    let lobby = start(accounts()).await;
    let mut client = logged_in(&lobby, "alice").await;

    let resp = client.request("fly", json!({})).await.unwrap();

    assert_eq!(resp.kind, ResponseKind::Error);
    assert!(!resp.success);
    assert_eq!(resp.message.as_deref(), Some("Unknown action: fly"));
}

#[tokio::test]
async fn test_missing_fields_is_structured_failure() {
    let lobby = start(accounts()).await;
    let mut client = logged_in(&lobby, "alice").await;

    let resp = client.request("join_room", json!({})).await.unwrap();
    assert!(!resp.success);
    assert!(resp.message.unwrap().contains("join_room"));

    // Still connected.
    assert!(client.request("get_history", json!({})).await.unwrap().success);
}

#[tokio::test]
async fn test_malformed_payload_closes_connection_and_logs_out() {
    let lobby = start(accounts().with_simple_game("Tetris", "1.0", 2)).await;
    let (mut alice, _room) = alice_hosts(&lobby).await;

    alice.send_raw(b"this is not json").await.unwrap();

    // No response, just a close. Cleanup runs before the close.
    assert!(alice.recv().await.unwrap().is_none());

    let mut again = logged_in(&lobby, "alice").await;
    let resp = again.request("get_room_list", json!({})).await.unwrap();
    assert_eq!(resp.data, Some(json!([])));
}

#[tokio::test]
async fn test_oversized_frame_closes_connection() {
    let lobby = start_with(LobbyServerBuilder::new().max_frame_len(64), accounts()).await;
    let mut client = logged_in(&lobby, "alice").await;

    client.send_raw(&[b'x'; 100]).await.unwrap();

    // Either a clean EOF or a reset, depending on unread bytes.
    assert!(!matches!(client.recv().await, Ok(Some(_))));

    // The session was torn down with the connection.
    let mut again = connect(&lobby).await;
    let mut ok = false;
    for _ in 0..50 {
        if again.login("alice", "pw").await.unwrap().success {
            ok = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(ok, "alice should be able to log in again");
}

// =========================================================================
// Rooms
// =========================================================================

#[tokio::test]
async fn test_create_join_and_list() {
    let lobby = start(accounts().with_simple_game("Tetris", "1.0", 2)).await;
    let (mut alice, room_id) = alice_hosts(&lobby).await;
    let mut bob = logged_in(&lobby, "bob").await;

    let resp = bob
        .request("join_room", json!({ "room_id": room_id, "version": "1.0" }))
        .await
        .unwrap();
    assert!(resp.success);
    assert_eq!(resp.message.as_deref(), Some("Joined room."));

    let view = room_info(&mut alice, room_id).await;
    assert_eq!(view.players, vec!["alice", "bob"]);
    assert_eq!(view.host, "alice");
    assert_eq!(view.status, StatusTag::Waiting);

    let resp = alice.request("get_room_list", json!({})).await.unwrap();
    let rooms: Vec<RoomSummary> = resp.data_as().unwrap();
    assert_eq!(rooms.len(), 1);
    assert_eq!(rooms[0].players, 2);
    assert_eq!(rooms[0].max, 2);

    // Full now.
    let mut carol = logged_in(&lobby, "carol").await;
    let resp = carol
        .request("join_room", json!({ "room_id": room_id, "version": "1.0" }))
        .await
        .unwrap();
    assert_eq!(resp.message.as_deref(), Some("Room is full."));
}

#[tokio::test]
async fn test_join_with_wrong_version_fails() {
    let lobby = start(accounts().with_simple_game("Tetris", "1.0", 4)).await;
    let (mut alice, room_id) = alice_hosts(&lobby).await;
    let mut carol = logged_in(&lobby, "carol").await;

    let resp = carol
        .request("join_room", json!({ "room_id": room_id, "version": "0.9" }))
        .await
        .unwrap();

    assert!(!resp.success);
    assert!(resp.message.unwrap().contains("Version mismatch"));
    assert_eq!(room_info(&mut alice, room_id).await.players, vec!["alice"]);
}

#[tokio::test]
async fn test_room_id_accepted_as_string() {
    let lobby = start(accounts().with_simple_game("Tetris", "1.0", 2)).await;
    let (_alice, room_id) = alice_hosts(&lobby).await;
    let mut bob = logged_in(&lobby, "bob").await;

    let resp = bob
        .request(
            "join_room",
            json!({ "room_id": room_id.to_string(), "version": "1.0" }),
        )
        .await
        .unwrap();

    assert!(resp.success, "{resp:?}");
}

#[tokio::test]
async fn test_non_host_start_is_refused() {
    let lobby = start(accounts().with_simple_game("Tetris", "1.0", 4)).await;
    let (mut alice, room_id) = alice_hosts(&lobby).await;
    let mut dave = logged_in(&lobby, "dave").await;
    dave.request("join_room", json!({ "room_id": room_id, "version": "1.0" }))
        .await
        .unwrap();

    let resp = dave.request("start_game", json!({})).await.unwrap();

    assert!(!resp.success);
    assert_eq!(resp.kind, ResponseKind::StartGame);
    assert_eq!(resp.message.as_deref(), Some("Only host can start game."));
    assert_eq!(room_info(&mut alice, room_id).await.status, StatusTag::Waiting);
}

#[tokio::test]
async fn test_start_without_launch_command_leaves_room_waiting() {
    let lobby = start(accounts().with_simple_game("Tetris", "1.0", 2)).await;
    let (mut alice, room_id) = alice_hosts(&lobby).await;

    let resp = alice.request("start_game", json!({})).await.unwrap();

    assert_eq!(resp.message.as_deref(), Some("Server command not defined."));
    assert_eq!(room_info(&mut alice, room_id).await.status, StatusTag::Waiting);
}

#[tokio::test]
async fn test_disconnect_promotes_next_member() {
    let lobby = start(accounts().with_simple_game("Tetris", "1.0", 4)).await;
    let (alice, room_id) = alice_hosts(&lobby).await;
    let mut bob = logged_in(&lobby, "bob").await;
    bob.request("join_room", json!({ "room_id": room_id, "version": "1.0" }))
        .await
        .unwrap();

    alice.close().await.unwrap();

    let mut view = room_info(&mut bob, room_id).await;
    for _ in 0..50 {
        if view.host == "bob" {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        view = room_info(&mut bob, room_id).await;
    }
    assert_eq!(view.host, "bob");
    assert_eq!(view.players, vec!["bob"]);
}

#[tokio::test]
async fn test_invitation_flow() {
    let lobby = start(accounts().with_simple_game("Tetris", "1.0", 2)).await;
    let (mut alice, room_id) = alice_hosts(&lobby).await;
    let mut bob = logged_in(&lobby, "bob").await;

    let resp = alice
        .request("invite_user", json!({ "target_user": "bob" }))
        .await
        .unwrap();
    assert_eq!(resp.message.as_deref(), Some("Invited bob."));

    let resp = bob.request("get_invitations", json!({})).await.unwrap();
    let invites: Vec<InvitationView> = resp.data_as().unwrap();
    assert_eq!(invites.len(), 1);
    assert_eq!(invites[0].id, room_id);
    assert_eq!(invites[0].host, "alice");

    bob.request("join_room", json!({ "room_id": room_id, "version": "1.0" }))
        .await
        .unwrap();
    let resp = bob.request("get_invitations", json!({})).await.unwrap();
    assert_eq!(resp.data, Some(json!([])));
}

#[tokio::test]
async fn test_room_info_defaults_to_callers_room() {
    let lobby = start(accounts().with_simple_game("Tetris", "1.0", 2)).await;
    let (mut alice, room_id) = alice_hosts(&lobby).await;

    let resp = alice.request("get_room_info", json!({})).await.unwrap();
    let view: RoomView = resp.data_as().unwrap();
    assert_eq!(view.id, room_id);

    let mut bob = logged_in(&lobby, "bob").await;
    let resp = bob.request("get_room_info", json!({})).await.unwrap();
    assert_eq!(resp.message.as_deref(), Some("Not in a room."));
}

// =========================================================================
// Directory queries
// =========================================================================

#[tokio::test]
async fn test_online_players_excludes_caller() {
    let lobby = start(accounts()).await;
    let mut alice = logged_in(&lobby, "alice").await;
    let _bob = logged_in(&lobby, "bob").await;

    let resp = alice.request("get_online_players", json!({})).await.unwrap();
    assert_eq!(resp.data, Some(json!(["bob"])));

    let mut anon = connect(&lobby).await;
    let resp = anon.request("get_online_players", json!({})).await.unwrap();
    assert_eq!(resp.data, Some(json!(["alice", "bob"])));
}

#[tokio::test]
async fn test_game_list_is_public() {
    let lobby = start(
        MemoryStore::new()
            .with_simple_game("Tetris", "1.0", 2)
            .with_simple_game("Chess", "2.0", 2),
    )
    .await;
    let mut anon = connect(&lobby).await;

    let resp = anon.request("get_game_list", json!({})).await.unwrap();

    assert!(resp.success);
    let games = resp.data.unwrap();
    let names: Vec<&str> = games
        .as_array()
        .unwrap()
        .iter()
        .map(|g| g["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Chess", "Tetris"]);
    // Launch details stay server-side.
    assert_eq!(games[0].get("launch_command"), None::<&Value>);
}

// =========================================================================
// Shutdown
// =========================================================================

#[tokio::test]
async fn test_run_until_stops_accepting_but_keeps_sessions() {
    let store = Arc::new(accounts());
    let server = LobbyServerBuilder::new()
        .bind("127.0.0.1:0")
        .build(Arc::clone(&store))
        .await
        .unwrap();
    let addr = server.local_addr().unwrap();
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let running = tokio::spawn(server.run_until(async {
        let _ = stop_rx.await;
    }));

    let mut alice = LobbyClient::connect(addr).await.unwrap();
    assert!(alice.login("alice", "pw").await.unwrap().success);

    stop_tx.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(5), running)
        .await
        .expect("server should stop")
        .unwrap()
        .unwrap();

    assert!(LobbyClient::connect(addr).await.is_err());

    // The already-open connection is still served.
    let resp = alice.request("get_online_players", json!({})).await.unwrap();
    assert!(resp.success);
}

// =========================================================================
// Full match through a real worker
// =========================================================================

#[cfg(unix)]
mod full_match {
    use std::fs::File;
    use std::io::Write;
    use std::path::Path;

    use super::*;

    const BOB_WINS: &str =
        "echo 'GAME_RESULT: {\"winner\":\"bob\",\"players\":[\"alice\",\"bob\"]}'\n";

    fn tetris_with_worker(dir: &Path, script: &str) -> GameInfo {
        let file = File::create(dir.join("1.0.zip")).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        zip.start_file("worker.sh", zip::write::SimpleFileOptions::default())
            .unwrap();
        zip.write_all(script.as_bytes()).unwrap();
        zip.finish().unwrap();

        GameInfo {
            name: "Tetris".into(),
            version: "1.0".into(),
            min_players: 1,
            max_players: 2,
            description: "falling blocks".into(),
            launch_command: Some(vec!["sh".into(), "worker.sh".into()]),
            artifact_location: dir.to_path_buf(),
        }
    }

    #[tokio::test]
    async fn test_full_match_is_recorded_and_room_returns_to_waiting() {
        let artifacts = tempfile::tempdir().unwrap();
        let game = tetris_with_worker(artifacts.path(), BOB_WINS);
        let lobby = start(accounts().with_game(game)).await;
        let mut events = lobby.matches.subscribe();

        let (mut alice, room_id) = alice_hosts(&lobby).await;
        let mut bob = logged_in(&lobby, "bob").await;
        bob.request("join_room", json!({ "room_id": room_id, "version": "1.0" }))
            .await
            .unwrap();

        let resp = alice.request("start_game", json!({})).await.unwrap();
        assert!(resp.success, "start_game failed: {resp:?}");
        assert_eq!(resp.message.as_deref(), Some("Game server started."));
        let data = resp.data.unwrap();
        assert_eq!(data["server_ip"], "127.0.0.1");
        assert!(data["server_port"].as_u64().unwrap() > 0);

        let finished = tokio::time::timeout(Duration::from_secs(10), events.recv())
            .await
            .expect("worker should finish within 10s")
            .unwrap();
        assert_eq!(finished.room_id, room_id);

        let view = room_info(&mut alice, room_id).await;
        assert_eq!(view.status, StatusTag::Waiting);
        assert_eq!(view.server_ip, None);
        assert_eq!(view.server_port, None);

        assert_eq!(
            lobby.store.recorded().await,
            vec![MatchRecord {
                game: "Tetris".into(),
                players: vec!["alice".into(), "bob".into()],
                winner: Some("bob".into()),
            }]
        );

        let resp = bob.request("get_history", json!({})).await.unwrap();
        let history: Vec<HistoryEntry> = resp.data_as().unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].result, PlayerResult::Win);
    }

    #[tokio::test]
    async fn test_worker_without_result_records_nothing() {
        let artifacts = tempfile::tempdir().unwrap();
        let game = tetris_with_worker(artifacts.path(), "echo booting\nexit 2\n");
        let lobby = start(accounts().with_game(game)).await;
        let mut events = lobby.matches.subscribe();
        let (mut alice, room_id) = alice_hosts(&lobby).await;

        assert!(alice.request("start_game", json!({})).await.unwrap().success);
        let finished = tokio::time::timeout(Duration::from_secs(10), events.recv())
            .await
            .expect("worker should finish within 10s")
            .unwrap();

        assert_eq!(finished.outcome, None);
        assert_eq!(room_info(&mut alice, room_id).await.status, StatusTag::Waiting);
        assert!(lobby.store.recorded().await.is_empty());
    }
}
