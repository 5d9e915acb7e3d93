//! The server's record of one logged-in identity.

use std::time::Instant;

use matchhall_transport::ConnectionId;

/// A live session: who is logged in, and over which connection.
///
/// Created by [`SessionRegistry::authenticate`](crate::SessionRegistry::authenticate),
/// destroyed by [`SessionRegistry::terminate`](crate::SessionRegistry::terminate).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// The authenticated username.
    pub identity: String,

    /// The connection this identity is bound to.
    pub connection: ConnectionId,

    /// Monotonic login counter; a later login always has a larger value.
    pub login_seq: u64,

    /// When the login succeeded.
    pub logged_in_at: Instant,
}
