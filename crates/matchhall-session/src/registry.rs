//! The session registry: which identities are logged in, and where.
//!
//! Every connection task shares one registry. The identity map sits behind
//! a single `tokio::sync::Mutex`, and "is this identity already online?"
//! plus "insert it" happen under one lock acquisition, so two concurrent
//! logins for the same name can never both succeed.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use matchhall_protocol::Role;
use matchhall_transport::ConnectionId;
use tokio::sync::Mutex;

use crate::{Session, SessionError, UserStore};

/// Tracks every live [`Session`], keyed by identity.
///
/// ## Lifecycle
///
/// ```text
/// authenticate() ──→ [online] ──→ terminate()
///       │                              │
///       └── AlreadyLoggedIn if online   └── no-op if already gone
/// ```
pub struct SessionRegistry<U: UserStore> {
    users: Arc<U>,
    sessions: Mutex<HashMap<String, Session>>,
    next_seq: AtomicU64,
}

impl<U: UserStore> SessionRegistry<U> {
    /// Creates an empty registry that checks credentials against `users`.
    pub fn new(users: Arc<U>) -> Self {
        Self {
            users,
            sessions: Mutex::new(HashMap::new()),
            next_seq: AtomicU64::new(1),
        }
    }

    /// Logs `identity` in on `connection`.
    ///
    /// # Errors
    /// - [`SessionError::MissingCredentials`] for an empty name or password.
    /// - [`SessionError::AlreadyLoggedIn`] if the identity has a live session.
    /// - [`SessionError::InvalidCredential`] if the user store rejects it.
    pub async fn authenticate(
        &self,
        identity: &str,
        credential: &str,
        role: Role,
        connection: ConnectionId,
    ) -> Result<Session, SessionError> {
        if identity.is_empty() || credential.is_empty() {
            return Err(SessionError::MissingCredentials);
        }

        // Fail fast without a store round-trip. This check alone is not
        // enough: the store call below awaits, so it is repeated under
        // the lock before inserting.
        if self.is_online(identity).await {
            return Err(SessionError::AlreadyLoggedIn(identity.to_string()));
        }

        self.users.authenticate(identity, credential, role).await?;

        let mut sessions = self.sessions.lock().await;
        if sessions.contains_key(identity) {
            return Err(SessionError::AlreadyLoggedIn(identity.to_string()));
        }

        let session = Session {
            identity: identity.to_string(),
            connection,
            login_seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
            logged_in_at: Instant::now(),
        };
        sessions.insert(identity.to_string(), session.clone());

        tracing::info!(%identity, conn_id = %connection, "session created");
        Ok(session)
    }

    /// Creates a new account in the user store. Does not log in.
    ///
    /// # Errors
    /// - [`SessionError::MissingCredentials`] for an empty name or password.
    /// - Whatever the user store reports (usually [`SessionError::AccountExists`]).
    pub async fn register(
        &self,
        identity: &str,
        credential: &str,
        role: Role,
    ) -> Result<(), SessionError> {
        if identity.is_empty() || credential.is_empty() {
            return Err(SessionError::MissingCredentials);
        }
        self.users.register(identity, credential, role).await?;
        tracing::info!(%identity, ?role, "account registered");
        Ok(())
    }

    /// Removes the identity's session, returning it if one existed.
    pub async fn terminate(&self, identity: &str) -> Option<Session> {
        let removed = self.sessions.lock().await.remove(identity);
        if let Some(session) = &removed {
            tracing::info!(
                %identity,
                conn_id = %session.connection,
                online_for = ?session.logged_in_at.elapsed(),
                "session terminated"
            );
        }
        removed
    }

    /// Whether the identity currently has a live session.
    pub async fn is_online(&self, identity: &str) -> bool {
        self.sessions.lock().await.contains_key(identity)
    }

    /// Returns the session for `identity`, if any.
    pub async fn get(&self, identity: &str) -> Option<Session> {
        self.sessions.lock().await.get(identity).cloned()
    }

    /// All online identities except `excluding`, sorted by name.
    pub async fn list_online(&self, excluding: Option<&str>) -> Vec<String> {
        let sessions = self.sessions.lock().await;
        let mut online: Vec<String> = sessions
            .keys()
            .filter(|name| Some(name.as_str()) != excluding)
            .cloned()
            .collect();
        online.sort();
        online
    }

    /// Number of live sessions.
    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Whether no one is logged in.
    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }
}
