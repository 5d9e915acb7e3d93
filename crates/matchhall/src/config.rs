//! Server configuration.

use matchhall_orchestrator::OrchestratorConfig;
use matchhall_transport::DEFAULT_MAX_FRAME_LEN;

/// Everything a [`LobbyServer`](crate::LobbyServer) needs besides its store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LobbyConfig {
    /// Address the lobby listens on.
    pub bind_addr: String,

    /// Largest request or response frame, in payload bytes.
    pub max_frame_len: usize,

    /// Match worker settings.
    pub orchestrator: OrchestratorConfig,
}

impl Default for LobbyConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8888".to_string(),
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            orchestrator: OrchestratorConfig::default(),
        }
    }
}
