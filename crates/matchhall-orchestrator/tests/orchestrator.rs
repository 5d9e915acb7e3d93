//! End-to-end orchestrator tests with real worker processes.
//!
//! Workers are small `sh` scripts zipped into a temporary artifact
//! directory, so these run on Unix only.

#![cfg(unix)]

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use matchhall_protocol::RoomId;
use matchhall_orchestrator::{
    HistoryEntry, MatchError, MatchFinished, MatchOrchestrator, MatchRecord, MatchRecorder,
    OrchestratorConfig,
};
use matchhall_room::{Catalog, GameInfo, RoomError, RoomRegistry, RoomStatus, StatusTag};
use tempfile::TempDir;
use tokio::sync::{Mutex, Notify, broadcast};

// =========================================================================
// Mock store: catalog + recorder in one.
// =========================================================================

#[derive(Default)]
struct MockStore {
    games: HashMap<String, GameInfo>,
    recorded: Mutex<Vec<MatchRecord>>,
    gate: LookupGate,
}

/// Once armed, holds the next `game_info` lookup until released.
#[derive(Default)]
struct LookupGate {
    armed: AtomicBool,
    reached: Notify,
    release: Notify,
}

impl LookupGate {
    fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    async fn pass(&self) {
        if self.armed.swap(false, Ordering::SeqCst) {
            self.reached.notify_one();
            self.release.notified().await;
        }
    }
}

impl MockStore {
    fn with_game(mut self, game: GameInfo) -> Self {
        self.games.insert(game.name.clone(), game);
        self
    }

    async fn recorded(&self) -> Vec<MatchRecord> {
        self.recorded.lock().await.clone()
    }
}

impl Catalog for MockStore {
    async fn game_info(&self, name: &str) -> Option<GameInfo> {
        self.gate.pass().await;
        self.games.get(name).cloned()
    }

    async fn games(&self) -> Vec<GameInfo> {
        self.games.values().cloned().collect()
    }
}

impl MatchRecorder for MockStore {
    async fn record_match(&self, record: &MatchRecord) -> Result<(), MatchError> {
        self.recorded.lock().await.push(record.clone());
        Ok(())
    }

    async fn history(&self, _identity: &str) -> Vec<HistoryEntry> {
        Vec::new()
    }
}

// =========================================================================
// Helpers
// =========================================================================

/// Waits for the test to create `release` in the worker's directory, then
/// prints a result naming bob.
const GATED_BOB_WINS: &str = r#"echo "$@" > args.txt
while [ ! -f release ]; do sleep 0.1; done
echo "match over"
echo 'GAME_RESULT: {"winner":"bob","players":["alice","bob"]}'
echo "worker shutting down" >&2
"#;

/// Ends the match without naming a winner.
const NO_WINNER: &str = "echo 'GAME_RESULT: {\"winner\": null, \"players\": [\"alice\", \"bob\"]}'\n";

/// Dies without a result line.
const CRASHING: &str = "echo \"booting\"\nexit 3\n";

struct Fixture {
    artifacts: TempDir,
    store: Arc<MockStore>,
    rooms: Arc<RoomRegistry<MockStore>>,
    orch: MatchOrchestrator<MockStore>,
}

impl Fixture {
    /// One game, "Tetris" 1.0 with room for two, running `script`.
    fn new(script: &str) -> Self {
        Self::with(|dir| {
            write_artifact(dir, "1.0", script);
            tetris(dir, Some(vec!["sh".into(), "worker.sh".into()]))
        })
    }

    fn with(make_game: impl FnOnce(&Path) -> GameInfo) -> Self {
        let artifacts = tempfile::tempdir().unwrap();
        let store = Arc::new(MockStore::default().with_game(make_game(artifacts.path())));
        let rooms = Arc::new(RoomRegistry::new(Arc::clone(&store)));
        let orch = MatchOrchestrator::new(
            Arc::clone(&rooms),
            OrchestratorConfig {
                advertise_host: "127.0.0.1".into(),
                port_bind_host: "127.0.0.1".parse().unwrap(),
            },
        );
        Self {
            artifacts,
            store,
            rooms,
            orch,
        }
    }

    fn workdir(&self) -> PathBuf {
        self.artifacts.path().join("1.0_extracted")
    }

    fn release(&self) {
        fs::write(self.workdir().join("release"), b"").unwrap();
    }

    async fn room_with(&self, members: &[&str]) -> RoomId {
        let id = self
            .rooms
            .create_room(members[0], "Tetris", "1.0")
            .await
            .unwrap()
            .id;
        for member in &members[1..] {
            self.rooms.join_room(member, id, "1.0").await.unwrap();
        }
        id
    }
}

fn tetris(dir: &Path, launch_command: Option<Vec<String>>) -> GameInfo {
    GameInfo {
        name: "Tetris".into(),
        version: "1.0".into(),
        min_players: 1,
        max_players: 2,
        description: String::new(),
        launch_command,
        artifact_location: dir.to_path_buf(),
    }
}

fn write_artifact(dir: &Path, version: &str, script: &str) {
    let file = File::create(dir.join(format!("{version}.zip"))).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    zip.start_file("worker.sh", zip::write::SimpleFileOptions::default())
        .unwrap();
    zip.write_all(script.as_bytes()).unwrap();
    zip.finish().unwrap();
}

async fn next_finished(events: &mut broadcast::Receiver<MatchFinished>) -> MatchFinished {
    tokio::time::timeout(Duration::from_secs(10), events.recv())
        .await
        .expect("worker should finish within 10s")
        .expect("event channel open")
}

// =========================================================================
// Happy path
// =========================================================================

#[tokio::test]
async fn test_start_game_runs_worker_and_records_winner() {
    let fx = Fixture::new(GATED_BOB_WINS);
    let room = fx.room_with(&["alice", "bob"]).await;
    let mut events = fx.orch.subscribe();

    let endpoint = fx.orch.start_game("alice", None).await.unwrap();

    // While the worker runs: PLAYING, endpoint published, process registered.
    let inspection = fx.orch.inspect(room).await;
    assert!(inspection.is_consistent());
    assert_eq!(
        inspection.status,
        Some(RoomStatus::Playing {
            endpoint: endpoint.clone()
        })
    );
    let view = fx.rooms.room_info(room).await.unwrap();
    assert_eq!(view.status, StatusTag::Playing);
    assert_eq!(view.server_ip.as_deref(), Some("127.0.0.1"));
    assert_eq!(view.server_port, Some(endpoint.port));
    assert_eq!(fx.orch.running().await, vec![room]);

    fx.release();
    let finished = next_finished(&mut events).await;

    assert_eq!(finished.room_id, room);
    assert_eq!(
        finished.outcome.and_then(|o| o.winner).as_deref(),
        Some("bob")
    );

    let inspection = fx.orch.inspect(room).await;
    assert_eq!(inspection.status, Some(RoomStatus::Waiting));
    assert!(inspection.process.is_none());
    assert!(fx.orch.running().await.is_empty());

    assert_eq!(
        fx.store.recorded().await,
        vec![MatchRecord {
            game: "Tetris".into(),
            players: vec!["alice".into(), "bob".into()],
            winner: Some("bob".into()),
        }]
    );
}

#[tokio::test]
async fn test_worker_receives_port_count_and_roster() {
    let fx = Fixture::new(GATED_BOB_WINS);
    fx.room_with(&["alice", "bob"]).await;
    let mut events = fx.orch.subscribe();

    let endpoint = fx.orch.start_game("alice", None).await.unwrap();
    fx.release();
    next_finished(&mut events).await;

    let args = fs::read_to_string(fx.workdir().join("args.txt")).unwrap();
    assert_eq!(
        args.trim(),
        format!("--port {} --player_count 2 --players alice bob", endpoint.port)
    );
}

#[tokio::test]
async fn test_roster_is_captured_at_launch() {
    let fx = Fixture::new(GATED_BOB_WINS);
    fx.room_with(&["alice", "bob"]).await;
    let mut events = fx.orch.subscribe();

    fx.orch.start_game("alice", None).await.unwrap();
    // bob walks out mid-match; he still gets his result.
    fx.rooms.leave_room("bob").await.unwrap();
    fx.release();
    next_finished(&mut events).await;

    let recorded = fx.store.recorded().await;
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].players, vec!["alice", "bob"]);
}

#[tokio::test]
async fn test_room_deleted_mid_match_completes_cleanly() {
    let fx = Fixture::new(GATED_BOB_WINS);
    let room = fx.room_with(&["alice"]).await;
    let mut events = fx.orch.subscribe();

    fx.orch.start_game("alice", None).await.unwrap();
    fx.rooms.leave_room("alice").await.unwrap();

    // Room gone but the worker is still registered.
    assert!(fx.orch.inspect(room).await.process.is_some());

    fx.release();
    next_finished(&mut events).await;

    let inspection = fx.orch.inspect(room).await;
    assert_eq!(inspection.status, None);
    assert!(inspection.process.is_none());
    assert_eq!(fx.store.recorded().await.len(), 1);
}

// =========================================================================
// Worker without a result
// =========================================================================

#[tokio::test]
async fn test_crashed_worker_records_nothing_and_frees_room() {
    let fx = Fixture::new(CRASHING);
    let room = fx.room_with(&["alice", "bob"]).await;
    let mut events = fx.orch.subscribe();

    fx.orch.start_game("alice", None).await.unwrap();
    let finished = next_finished(&mut events).await;

    assert_eq!(finished.outcome, None);
    let view = fx.rooms.room_info(room).await.unwrap();
    assert_eq!(view.status, StatusTag::Waiting);
    assert_eq!(view.server_port, None);
    assert!(fx.orch.inspect(room).await.is_consistent());
    assert!(fx.store.recorded().await.is_empty());
}

#[tokio::test]
async fn test_match_without_winner_is_not_recorded() {
    let fx = Fixture::new(NO_WINNER);
    let room = fx.room_with(&["alice", "bob"]).await;
    let mut events = fx.orch.subscribe();

    fx.orch.start_game("alice", None).await.unwrap();
    let finished = next_finished(&mut events).await;

    let outcome = finished.outcome.expect("result line was printed");
    assert_eq!(outcome.winner, None);
    assert_eq!(outcome.players, vec!["alice", "bob"]);
    assert_eq!(fx.orch.inspect(room).await.status, Some(RoomStatus::Waiting));
    assert!(fx.store.recorded().await.is_empty());
}

// =========================================================================
// Pre-launch failures leave the room WAITING
// =========================================================================

#[tokio::test]
async fn test_start_game_by_non_host_fails() {
    let fx = Fixture::new(CRASHING);
    let room = fx.room_with(&["alice", "dave"]).await;

    let err = fx.orch.start_game("dave", None).await.unwrap_err();

    assert!(matches!(err, MatchError::Room(RoomError::NotHost { .. })));
    assert_eq!(fx.orch.inspect(room).await.status, Some(RoomStatus::Waiting));
}

#[tokio::test]
async fn test_start_game_without_launch_command() {
    let fx = Fixture::with(|dir| {
        write_artifact(dir, "1.0", CRASHING);
        tetris(dir, None)
    });
    let room = fx.room_with(&["alice"]).await;

    let err = fx.orch.start_game("alice", None).await.unwrap_err();

    assert!(matches!(err, MatchError::NoLaunchCommand(ref g) if g == "Tetris"));
    let inspection = fx.orch.inspect(room).await;
    assert_eq!(inspection.status, Some(RoomStatus::Waiting));
    assert!(inspection.process.is_none());
}

#[tokio::test]
async fn test_start_game_without_artifact() {
    let fx = Fixture::with(|dir| tetris(dir, Some(vec!["sh".into(), "worker.sh".into()])));
    let room = fx.room_with(&["alice"]).await;

    let err = fx.orch.start_game("alice", None).await.unwrap_err();

    assert!(matches!(err, MatchError::ArtifactMissing { .. }));
    assert_eq!(fx.orch.inspect(room).await.status, Some(RoomStatus::Waiting));
    assert!(fx.orch.running().await.is_empty());
}

#[tokio::test]
async fn test_start_game_twice_is_refused_while_playing() {
    let fx = Fixture::new(GATED_BOB_WINS);
    let room = fx.room_with(&["alice", "bob"]).await;
    let mut events = fx.orch.subscribe();

    fx.orch.start_game("alice", None).await.unwrap();
    let err = fx.orch.start_game("alice", Some(room)).await.unwrap_err();
    assert!(matches!(err, MatchError::Room(RoomError::RoomNotWaiting(id)) if id == room));

    fx.release();
    next_finished(&mut events).await;
    assert_eq!(fx.store.recorded().await.len(), 1);
}

#[tokio::test]
async fn test_room_emptied_during_launch_kills_worker() {
    let fx = Fixture::new(GATED_BOB_WINS);
    let room = fx.room_with(&["alice"]).await;
    fx.store.gate.arm();

    let orch = fx.orch.clone();
    let starting = tokio::spawn(async move { orch.start_game("alice", None).await });

    // The ticket is issued; the room disappears before the worker is
    // registered.
    fx.store.gate.reached.notified().await;
    fx.rooms.leave_room("alice").await.unwrap();
    fx.store.gate.release.notify_one();

    let err = starting.await.unwrap().unwrap_err();
    assert!(matches!(err, MatchError::Room(RoomError::RoomNotFound(id)) if id == room));

    let inspection = fx.orch.inspect(room).await;
    assert_eq!(inspection.status, None);
    assert!(inspection.process.is_none());
    assert!(fx.orch.running().await.is_empty());
    assert!(fx.store.recorded().await.is_empty());
}
