//! `LobbyServer` builder and accept loop.
//!
//! This is the entry point for running a lobby. It ties together all the
//! layers: transport → protocol → session → rooms → match orchestration.

use std::net::IpAddr;
use std::sync::Arc;

use matchhall_orchestrator::{MatchOrchestrator, MatchRecorder};
use matchhall_protocol::{Codec, JsonCodec};
use matchhall_room::{Catalog, RoomRegistry};
use matchhall_session::{SessionRegistry, UserStore};
use matchhall_transport::{Transport, TcpTransport};

use crate::handler::handle_connection;
use crate::{LobbyConfig, LobbyError};

/// The collaborators a lobby needs, usually provided by one store.
///
/// Blanket-implemented for anything that is a user store, a game catalog
/// and a match recorder at once.
pub trait LobbyBackend: UserStore + Catalog + MatchRecorder {}

impl<T: UserStore + Catalog + MatchRecorder> LobbyBackend for T {}

/// Shared server state passed to each connection handler task.
///
/// Each registry guards its own map, so handlers never hold a lock across
/// network I/O.
pub(crate) struct ServerState<S: LobbyBackend, C: Codec> {
    pub(crate) sessions: SessionRegistry<S>,
    pub(crate) rooms: Arc<RoomRegistry<S>>,
    pub(crate) matches: MatchOrchestrator<S>,
    pub(crate) store: Arc<S>,
    pub(crate) codec: C,
}

/// Builder for configuring and starting a lobby server.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
///
/// use matchhall::prelude::*;
///
/// # async fn run() -> Result<(), LobbyError> {
/// let store = Arc::new(JsonStore::open("server_data").await?);
/// let server = LobbyServer::<JsonStore>::builder()
///     .bind("0.0.0.0:8888")
///     .advertise_host("203.0.113.7")
///     .build(store)
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct LobbyServerBuilder {
    config: LobbyConfig,
}

impl LobbyServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: LobbyConfig::default(),
        }
    }

    /// Sets the address to bind the lobby to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Sets the host clients are told to connect to for a running match.
    pub fn advertise_host(mut self, host: &str) -> Self {
        self.config.orchestrator.advertise_host = host.to_string();
        self
    }

    /// Sets the interface match worker ports are allocated on.
    pub fn port_bind_host(mut self, host: IpAddr) -> Self {
        self.config.orchestrator.port_bind_host = host;
        self
    }

    /// Sets the largest accepted frame.
    pub fn max_frame_len(mut self, max_frame_len: usize) -> Self {
        self.config.max_frame_len = max_frame_len;
        self
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: LobbyConfig) -> Self {
        self.config = config;
        self
    }

    /// Binds the listener and wires the registries to `store`.
    ///
    /// Uses `JsonCodec` over `TcpTransport`.
    pub async fn build<S: LobbyBackend>(
        self,
        store: Arc<S>,
    ) -> Result<LobbyServer<S, JsonCodec>, LobbyError> {
        let transport = TcpTransport::bind(&self.config.bind_addr)
            .await?
            .with_max_frame_len(self.config.max_frame_len);

        let rooms = Arc::new(RoomRegistry::new(Arc::clone(&store)));
        let matches = MatchOrchestrator::new(Arc::clone(&rooms), self.config.orchestrator);

        let state = Arc::new(ServerState {
            sessions: SessionRegistry::new(Arc::clone(&store)),
            rooms,
            matches,
            store,
            codec: JsonCodec,
        });

        Ok(LobbyServer { transport, state })
    }
}

impl Default for LobbyServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A lobby server ready to accept connections.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct LobbyServer<S: LobbyBackend, C: Codec = JsonCodec> {
    transport: TcpTransport,
    state: Arc<ServerState<S, C>>,
}

impl<S: LobbyBackend> LobbyServer<S, JsonCodec> {
    /// Creates a new builder. Equivalent to [`LobbyServerBuilder::new`].
    pub fn builder() -> LobbyServerBuilder {
        LobbyServerBuilder::new()
    }
}

impl<S, C> LobbyServer<S, C>
where
    S: LobbyBackend,
    C: Codec,
{
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// The orchestrator, for subscribing to match completions.
    pub fn matches(&self) -> MatchOrchestrator<S> {
        self.state.matches.clone()
    }

    /// The room registry.
    pub fn rooms(&self) -> Arc<RoomRegistry<S>> {
        Arc::clone(&self.state.rooms)
    }

    /// Runs the accept loop until the process is terminated.
    pub async fn run(self) -> Result<(), LobbyError> {
        self.run_until(std::future::pending()).await
    }

    /// Runs the accept loop until `signal` resolves, then closes the
    /// listener and returns.
    ///
    /// Spawns a handler task for each accepted connection. Connections
    /// already being served keep running after the listener is closed.
    pub async fn run_until<F>(mut self, signal: F) -> Result<(), LobbyError>
    where
        F: Future<Output = ()>,
    {
        tracing::info!(addr = ?self.transport.local_addr().ok(), "lobby server running");
        tokio::pin!(signal);

        loop {
            tokio::select! {
                () = &mut signal => break,
                accepted = self.transport.accept() => match accepted {
                    Ok(conn) => {
                        let state = Arc::clone(&self.state);
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(conn, state).await {
                                tracing::debug!(error = %e, "connection ended with error");
                            }
                        });
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "accept failed");
                    }
                },
            }
        }

        self.transport.shutdown().await?;
        let running_matches = self.state.matches.running().await.len();
        tracing::info!(running_matches, "lobby server stopped accepting");
        Ok(())
    }
}
