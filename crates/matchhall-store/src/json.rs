//! File-backed store.
//!
//! Layout of a data directory:
//!
//! ```text
//! <data_dir>/
//!   users.json        {"developers": {name: account}, "players": {name: account}}
//!   games.json        {game_name: {version, min_players, max_players, server_cmd, ...}}
//!   uploaded_games/
//!     <game_name>/<version>.zip
//! ```
//!
//! `games.json` is owned by the catalog upload service and re-read on every
//! lookup, so a newly published version is visible immediately. `users.json`
//! is loaded once and rewritten (temp file + rename) after every change.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use matchhall_orchestrator::{HistoryEntry, MatchError, MatchRecord, MatchRecorder, PlayerResult};
use matchhall_protocol::Role;
use matchhall_room::{Catalog, GameInfo};
use matchhall_session::{SessionError, UserStore};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::Mutex;

use crate::{StoreError, timestamp_now};

const USERS_FILE: &str = "users.json";
const GAMES_FILE: &str = "games.json";
const GAMES_DIR: &str = "uploaded_games";

// ---------------------------------------------------------------------------
// On-disk records
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Serialize, Deserialize)]
struct UsersFile {
    #[serde(default)]
    developers: BTreeMap<String, Account>,
    #[serde(default)]
    players: BTreeMap<String, Account>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl UsersFile {
    fn table(&self, role: Role) -> &BTreeMap<String, Account> {
        match role {
            Role::Player => &self.players,
            Role::Developer => &self.developers,
        }
    }

    fn table_mut(&mut self, role: Role) -> &mut BTreeMap<String, Account> {
        match role {
            Role::Player => &mut self.players,
            Role::Developer => &mut self.developers,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Account {
    /// Stored as given; the file format predates hashing.
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    play_history: Vec<HistoryEntry>,
    /// Fields written by other services (e.g. a developer's `games`).
    #[serde(flatten)]
    extra: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct GameRecord {
    version: String,
    #[serde(default = "default_min_players")]
    min_players: usize,
    #[serde(default = "default_max_players")]
    max_players: usize,
    #[serde(default)]
    description: String,
    #[serde(default)]
    server_cmd: Option<LaunchSpec>,
}

fn default_min_players() -> usize {
    1
}

fn default_max_players() -> usize {
    2
}

/// `server_cmd` as an argv list, or as one whitespace-separated string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LaunchSpec {
    Argv(Vec<String>),
    Line(String),
}

impl LaunchSpec {
    fn into_argv(self) -> Vec<String> {
        match self {
            Self::Argv(argv) => argv,
            Self::Line(line) => line.split_whitespace().map(str::to_string).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// JsonStore
// ---------------------------------------------------------------------------

/// Accounts, catalog and history backed by JSON files in one directory.
pub struct JsonStore {
    users_path: PathBuf,
    games_path: PathBuf,
    games_dir: PathBuf,
    users: Mutex<UsersFile>,
}

impl JsonStore {
    /// Opens (creating if needed) the data directory at `data_dir`.
    ///
    /// # Errors
    /// [`StoreError::Io`] if the directory or `users.json` can't be
    /// created, [`StoreError::Corrupt`] if `users.json` doesn't parse.
    pub async fn open(data_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let data_dir = data_dir.as_ref();
        let games_dir = data_dir.join(GAMES_DIR);
        tokio::fs::create_dir_all(&games_dir)
            .await
            .map_err(|source| StoreError::Io {
                path: games_dir.clone(),
                source,
            })?;

        let users_path = data_dir.join(USERS_FILE);
        let users = match tokio::fs::read(&users_path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupt {
                path: users_path.clone(),
                source,
            })?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                let users = UsersFile::default();
                write_json(&users_path, &users).await?;
                users
            }
            Err(source) => {
                return Err(StoreError::Io {
                    path: users_path,
                    source,
                });
            }
        };

        tracing::info!(dir = %data_dir.display(), "json store opened");
        Ok(Self {
            users_path,
            games_path: data_dir.join(GAMES_FILE),
            games_dir,
            users: Mutex::new(users),
        })
    }

    /// Where `<game>/<version>.zip` artifacts live.
    pub fn games_dir(&self) -> &Path {
        &self.games_dir
    }

    async fn load_games(&self) -> BTreeMap<String, GameRecord> {
        let bytes = match tokio::fs::read(&self.games_path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return BTreeMap::new(),
            Err(err) => {
                tracing::warn!(path = %self.games_path.display(), error = %err, "failed to read catalog");
                return BTreeMap::new();
            }
        };

        // Parse entry by entry so one bad game doesn't hide the rest.
        let raw: BTreeMap<String, Value> = match serde_json::from_slice(&bytes) {
            Ok(raw) => raw,
            Err(err) => {
                tracing::warn!(path = %self.games_path.display(), error = %err, "catalog is corrupt");
                return BTreeMap::new();
            }
        };
        raw.into_iter()
            .filter_map(|(name, value)| match serde_json::from_value(value) {
                Ok(record) => Some((name, record)),
                Err(err) => {
                    tracing::warn!(game = %name, error = %err, "skipping malformed catalog entry");
                    None
                }
            })
            .collect()
    }

    fn to_info(&self, name: String, record: GameRecord) -> GameInfo {
        GameInfo {
            artifact_location: self.games_dir.join(&name),
            name,
            version: record.version,
            min_players: record.min_players,
            max_players: record.max_players,
            description: record.description,
            launch_command: record.server_cmd.map(LaunchSpec::into_argv),
        }
    }
}

/// Writes `value` as pretty JSON via a temp file and rename.
async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let bytes = serde_json::to_vec_pretty(value).map_err(StoreError::Encode)?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, &bytes)
        .await
        .map_err(|source| StoreError::Io {
            path: tmp.clone(),
            source,
        })?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })
}

impl UserStore for JsonStore {
    async fn authenticate(
        &self,
        identity: &str,
        credential: &str,
        role: Role,
    ) -> Result<(), SessionError> {
        let users = self.users.lock().await;
        let account = users
            .table(role)
            .get(identity)
            .ok_or_else(|| SessionError::InvalidCredential("Account not found.".into()))?;

        match account.password.as_deref() {
            Some(stored) if stored == credential => Ok(()),
            Some(_) => Err(SessionError::InvalidCredential("Incorrect password.".into())),
            None => Err(SessionError::InvalidCredential(
                "Account has no password. Please re-register.".into(),
            )),
        }
    }

    async fn register(
        &self,
        identity: &str,
        credential: &str,
        role: Role,
    ) -> Result<(), SessionError> {
        let mut users = self.users.lock().await;
        if users.table(role).contains_key(identity) {
            return Err(SessionError::AccountExists(identity.to_string()));
        }

        users.table_mut(role).insert(
            identity.to_string(),
            Account {
                password: Some(credential.to_string()),
                ..Account::default()
            },
        );

        if let Err(err) = write_json(&self.users_path, &*users).await {
            users.table_mut(role).remove(identity);
            return Err(SessionError::Storage(err.to_string()));
        }
        Ok(())
    }
}

impl Catalog for JsonStore {
    async fn game_info(&self, name: &str) -> Option<GameInfo> {
        let mut games = self.load_games().await;
        let record = games.remove(name)?;
        Some(self.to_info(name.to_string(), record))
    }

    async fn games(&self) -> Vec<GameInfo> {
        self.load_games()
            .await
            .into_iter()
            .map(|(name, record)| self.to_info(name, record))
            .collect()
    }
}

impl MatchRecorder for JsonStore {
    async fn record_match(&self, record: &MatchRecord) -> Result<(), MatchError> {
        let timestamp = timestamp_now();
        let mut users = self.users.lock().await;
        let mut appended = Vec::with_capacity(record.players.len());

        for player in &record.players {
            // Rostered names without an account are skipped.
            if let Some(account) = users.players.get_mut(player) {
                account.play_history.push(HistoryEntry {
                    game: record.game.clone(),
                    timestamp: timestamp.clone(),
                    players: record.players.clone(),
                    winner: record.winner.clone(),
                    result: PlayerResult::for_player(player, record.winner.as_deref()),
                });
                appended.push(player);
            }
        }

        if let Err(err) = write_json(&self.users_path, &*users).await {
            for player in appended {
                if let Some(account) = users.players.get_mut(player) {
                    account.play_history.pop();
                }
            }
            return Err(MatchError::Record(err.to_string()));
        }
        Ok(())
    }

    async fn history(&self, identity: &str) -> Vec<HistoryEntry> {
        self.users
            .lock()
            .await
            .players
            .get(identity)
            .map(|account| account.play_history.clone())
            .unwrap_or_default()
    }
}
