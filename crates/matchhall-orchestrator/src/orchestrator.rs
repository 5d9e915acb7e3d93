//! The match orchestrator: launches one worker per started room and
//! supervises it to completion.
//!
//! ```text
//! start_game ─→ prepare_start ─→ unpack ─→ port ─→ spawn ─→ PLAYING ─→ (returns)
//!                                                             │
//!                                      supervisor task ◄──────┘
//!                                        wait for exit
//!                                        parse GAME_RESULT
//!                                        record match if it has a winner
//!                                        WAITING + publish MatchFinished
//! ```
//!
//! Lock order is always `processes` then the room registry. The start path
//! flips a room to PLAYING and registers its process under one
//! `processes` guard; the supervisor returns it to WAITING and drops the
//! entry under one guard. Anyone holding `processes` therefore sees
//! "PLAYING ⇔ process registered" hold.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use matchhall_protocol::RoomId;
use matchhall_room::{Catalog, Endpoint, MatchTicket, RoomError, RoomRegistry, RoomStatus};
use tokio::process::Child;
use tokio::sync::{Mutex, broadcast};

use crate::launch::{allocate_port, ensure_unpacked, worker_command};
use crate::{MatchError, MatchOutcome, MatchRecord, MatchRecorder, OrchestratorConfig, parse_outcome};

/// Capacity of the completion event channel. Slow subscribers lag rather
/// than block the supervisor.
const EVENT_CAPACITY: usize = 64;

/// A running worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchProcess {
    pub pid: Option<u32>,
    pub endpoint: Endpoint,
    pub game: String,
    /// Roster captured at launch.
    pub roster: Vec<String>,
    pub started_at: Instant,
}

/// Published once per finished worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchFinished {
    pub room_id: RoomId,
    pub game: String,
    /// `None` when the worker exited without a result line.
    pub outcome: Option<MatchOutcome>,
}

/// A room's status and process entry read under one lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomInspection {
    /// `None` if the room no longer exists.
    pub status: Option<RoomStatus>,
    pub process: Option<MatchProcess>,
}

impl RoomInspection {
    /// PLAYING with a process, or WAITING/absent without one.
    pub fn is_consistent(&self) -> bool {
        match (&self.status, &self.process) {
            (Some(RoomStatus::Playing { endpoint }), Some(process)) => *endpoint == process.endpoint,
            (Some(RoomStatus::Waiting), None) | (None, None) => true,
            _ => false,
        }
    }
}

struct Inner<S: Catalog + MatchRecorder> {
    rooms: Arc<RoomRegistry<S>>,
    store: Arc<S>,
    config: OrchestratorConfig,
    processes: Mutex<HashMap<RoomId, MatchProcess>>,
    events: broadcast::Sender<MatchFinished>,
}

/// Starts and supervises match workers.
///
/// Cheap to clone; clones share the process table.
pub struct MatchOrchestrator<S: Catalog + MatchRecorder> {
    inner: Arc<Inner<S>>,
}

impl<S: Catalog + MatchRecorder> Clone for MatchOrchestrator<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: Catalog + MatchRecorder> MatchOrchestrator<S> {
    /// Creates an orchestrator over `rooms`. The registry's catalog doubles
    /// as the match recorder.
    pub fn new(rooms: Arc<RoomRegistry<S>>, config: OrchestratorConfig) -> Self {
        let store = Arc::clone(rooms.catalog());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                rooms,
                store,
                config,
                processes: Mutex::new(HashMap::new()),
                events,
            }),
        }
    }

    /// The room registry this orchestrator writes to.
    pub fn rooms(&self) -> &Arc<RoomRegistry<S>> {
        &self.inner.rooms
    }

    /// Receives a [`MatchFinished`] for every worker that exits after this
    /// call.
    pub fn subscribe(&self) -> broadcast::Receiver<MatchFinished> {
        self.inner.events.subscribe()
    }

    /// Launches a worker for the host's room and returns its endpoint.
    ///
    /// Returns as soon as the process is running; the outcome is handled by
    /// a detached supervisor task.
    ///
    /// # Errors
    /// Room guard failures ([`MatchError::Room`]) and every pre-launch
    /// failure. In all cases the room stays WAITING.
    pub async fn start_game(
        &self,
        host: &str,
        room_id: Option<RoomId>,
    ) -> Result<Endpoint, MatchError> {
        let inner = &self.inner;
        let ticket = inner.rooms.prepare_start(host, room_id).await?;
        let room_id = ticket.room_id;

        let game = inner
            .store
            .game_info(&ticket.game_name)
            .await
            .ok_or_else(|| RoomError::GameNotFound(ticket.game_name.clone()))?;

        let launch = game
            .launch_command
            .filter(|cmd| !cmd.is_empty())
            .ok_or_else(|| MatchError::NoLaunchCommand(ticket.game_name.clone()))?;

        let workdir =
            ensure_unpacked(&game.artifact_location, &ticket.game_name, &ticket.version).await?;

        let port = allocate_port(inner.config.port_bind_host).await?;

        let mut child = worker_command(&ticket.game_name, &launch, port, &ticket.roster, &workdir)?
            .spawn()
            .map_err(MatchError::Spawn)?;

        let endpoint = Endpoint {
            host: inner.config.advertise_host.clone(),
            port,
        };

        {
            let mut processes = inner.processes.lock().await;
            if let Err(err) = inner.rooms.mark_playing(room_id, endpoint.clone()).await {
                // Lost a race (room emptied, or a concurrent start won).
                tracing::warn!(%room_id, error = %err, "room changed during launch, killing worker");
                if let Err(kill_err) = child.kill().await {
                    tracing::warn!(%room_id, error = %kill_err, "failed to kill orphaned worker");
                }
                return Err(err.into());
            }
            processes.insert(
                room_id,
                MatchProcess {
                    pid: child.id(),
                    endpoint: endpoint.clone(),
                    game: ticket.game_name.clone(),
                    roster: ticket.roster.clone(),
                    started_at: Instant::now(),
                },
            );
        }

        tracing::info!(
            %room_id,
            game = %ticket.game_name,
            version = %ticket.version,
            %endpoint,
            players = ticket.roster.len(),
            "match started"
        );

        tokio::spawn(supervise(Arc::clone(inner), ticket, child));
        Ok(endpoint)
    }

    /// Reads a room's status and process entry atomically.
    pub async fn inspect(&self, room_id: RoomId) -> RoomInspection {
        let processes = self.inner.processes.lock().await;
        let status = self
            .inner
            .rooms
            .snapshot(room_id)
            .await
            .map(|room| room.status);
        RoomInspection {
            status,
            process: processes.get(&room_id).cloned(),
        }
    }

    /// Rooms with a running worker.
    pub async fn running(&self) -> Vec<RoomId> {
        let mut ids: Vec<RoomId> = self.inner.processes.lock().await.keys().copied().collect();
        ids.sort();
        ids
    }
}

/// Waits for the worker, records its outcome and frees the room.
async fn supervise<S: Catalog + MatchRecorder>(
    inner: Arc<Inner<S>>,
    ticket: MatchTicket,
    child: Child,
) {
    let room_id = ticket.room_id;

    let outcome = match child.wait_with_output().await {
        Ok(output) => {
            for line in String::from_utf8_lossy(&output.stderr).lines() {
                tracing::debug!(%room_id, line, "worker stderr");
            }
            tracing::info!(%room_id, status = %output.status, "worker exited");
            parse_outcome(&String::from_utf8_lossy(&output.stdout))
        }
        Err(err) => {
            tracing::warn!(%room_id, error = %err, "failed to collect worker output");
            None
        }
    };

    // Only a declared winner is written to history.
    match outcome.as_ref().map(|result| result.winner.as_deref()) {
        Some(Some(winner)) => {
            let record = MatchRecord {
                game: ticket.game_name.clone(),
                players: ticket.roster.clone(),
                winner: Some(winner.to_string()),
            };
            match inner.store.record_match(&record).await {
                Ok(()) => tracing::info!(%room_id, winner, "match recorded"),
                Err(err) => tracing::warn!(%room_id, error = %err, "failed to record match"),
            }
        }
        Some(None) => tracing::info!(%room_id, "match finished without a winner, not recorded"),
        None => tracing::info!(%room_id, "match finished without a result"),
    }

    {
        let mut processes = inner.processes.lock().await;
        if !inner.rooms.mark_waiting(room_id).await {
            tracing::debug!(%room_id, "room emptied during match");
        }
        processes.remove(&room_id);
    }

    // No subscribers is fine.
    let _ = inner.events.send(MatchFinished {
        room_id,
        game: ticket.game_name,
        outcome,
    });
}
