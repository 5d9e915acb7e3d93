//! In-memory store for tests and demos.

use std::collections::HashMap;
use std::path::PathBuf;

use matchhall_orchestrator::{HistoryEntry, MatchError, MatchRecord, MatchRecorder, PlayerResult};
use matchhall_protocol::Role;
use matchhall_room::{Catalog, GameInfo};
use matchhall_session::{SessionError, UserStore};
use tokio::sync::Mutex;

use crate::timestamp_now;

/// Accounts, catalog and history held in memory.
///
/// Built with chained `with_*` calls:
///
/// ```rust
/// use matchhall_store::MemoryStore;
///
/// let store = MemoryStore::new()
///     .with_user("alice", "pw")
///     .with_simple_game("Tetris", "1.0", 2);
/// ```
#[derive(Default)]
pub struct MemoryStore {
    accounts: Mutex<HashMap<(Role, String), String>>,
    games: Mutex<HashMap<String, GameInfo>>,
    history: Mutex<HashMap<String, Vec<HistoryEntry>>>,
    recorded: Mutex<Vec<MatchRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a player account.
    pub fn with_user(mut self, name: &str, password: &str) -> Self {
        self.accounts
            .get_mut()
            .insert((Role::Player, name.to_string()), password.to_string());
        self
    }

    /// Adds a catalog entry.
    pub fn with_game(mut self, game: GameInfo) -> Self {
        self.games.get_mut().insert(game.name.clone(), game);
        self
    }

    /// Adds a catalog entry with no launch command or artifacts.
    pub fn with_simple_game(self, name: &str, version: &str, max_players: usize) -> Self {
        self.with_game(GameInfo {
            name: name.to_string(),
            version: version.to_string(),
            min_players: 1,
            max_players,
            description: String::new(),
            launch_command: None,
            artifact_location: PathBuf::new(),
        })
    }

    /// Replaces (or adds) a catalog entry after construction.
    pub async fn publish(&self, game: GameInfo) {
        self.games.lock().await.insert(game.name.clone(), game);
    }

    /// Every match recorded so far, in order.
    pub async fn recorded(&self) -> Vec<MatchRecord> {
        self.recorded.lock().await.clone()
    }
}

impl UserStore for MemoryStore {
    async fn authenticate(
        &self,
        identity: &str,
        credential: &str,
        role: Role,
    ) -> Result<(), SessionError> {
        let accounts = self.accounts.lock().await;
        match accounts.get(&(role, identity.to_string())) {
            Some(stored) if stored == credential => Ok(()),
            Some(_) => Err(SessionError::InvalidCredential("Incorrect password.".into())),
            None => Err(SessionError::InvalidCredential("Account not found.".into())),
        }
    }

    async fn register(
        &self,
        identity: &str,
        credential: &str,
        role: Role,
    ) -> Result<(), SessionError> {
        let mut accounts = self.accounts.lock().await;
        let key = (role, identity.to_string());
        if accounts.contains_key(&key) {
            return Err(SessionError::AccountExists(identity.to_string()));
        }
        accounts.insert(key, credential.to_string());
        Ok(())
    }
}

impl Catalog for MemoryStore {
    async fn game_info(&self, name: &str) -> Option<GameInfo> {
        self.games.lock().await.get(name).cloned()
    }

    async fn games(&self) -> Vec<GameInfo> {
        let mut games: Vec<GameInfo> = self.games.lock().await.values().cloned().collect();
        games.sort_by(|a, b| a.name.cmp(&b.name));
        games
    }
}

impl MatchRecorder for MemoryStore {
    async fn record_match(&self, record: &MatchRecord) -> Result<(), MatchError> {
        let timestamp = timestamp_now();
        {
            let mut history = self.history.lock().await;
            for player in &record.players {
                history.entry(player.clone()).or_default().push(HistoryEntry {
                    game: record.game.clone(),
                    timestamp: timestamp.clone(),
                    players: record.players.clone(),
                    winner: record.winner.clone(),
                    result: PlayerResult::for_player(player, record.winner.as_deref()),
                });
            }
        }
        self.recorded.lock().await.push(record.clone());
        Ok(())
    }

    async fn history(&self, identity: &str) -> Vec<HistoryEntry> {
        self.history
            .lock()
            .await
            .get(identity)
            .cloned()
            .unwrap_or_default()
    }
}
