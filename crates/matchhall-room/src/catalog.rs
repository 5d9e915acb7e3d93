//! Catalog hook: what games exist and how to launch them.

use std::future::Future;
use std::path::PathBuf;

use serde::Serialize;

/// One published game, as the catalog describes it.
///
/// Serializes to the public listing shape; the launch command and the
/// artifact location stay server-side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GameInfo {
    pub name: String,
    /// The latest published version. Room hosts must offer exactly this.
    pub version: String,
    pub min_players: usize,
    pub max_players: usize,
    pub description: String,
    /// Program and leading arguments for the match worker.
    #[serde(skip)]
    pub launch_command: Option<Vec<String>>,
    /// Directory holding `<version>.zip` artifacts for this game.
    #[serde(skip)]
    pub artifact_location: PathBuf,
}

/// Read access to the game catalog.
///
/// Lookups that fail for storage reasons report the game as absent; the
/// lobby can't do anything more useful with a broken catalog.
pub trait Catalog: Send + Sync + 'static {
    /// Looks up one game by name.
    fn game_info(&self, name: &str) -> impl Future<Output = Option<GameInfo>> + Send;

    /// Every published game, sorted by name.
    fn games(&self) -> impl Future<Output = Vec<GameInfo>> + Send;
}
