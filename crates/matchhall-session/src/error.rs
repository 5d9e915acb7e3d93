//! Error types for the session layer.

/// Errors that can occur while authenticating or registering an identity.
///
/// The `Display` text is what the client sees in the response `message`,
/// so it is written for a person, not a log file.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The identity already has a live session somewhere, or the
    /// connection asking is already bound to an identity.
    #[error("Already logged in.")]
    AlreadyLoggedIn(String),

    /// The user store rejected the credential. Carries the store's reason
    /// (unknown account, wrong password, ...).
    #[error("{0}")]
    InvalidCredential(String),

    /// `register` for a name that is already taken.
    #[error("Account already exists.")]
    AccountExists(String),

    /// Register/login data was incomplete.
    #[error("Missing credentials.")]
    MissingCredentials,

    /// The user store itself failed (I/O, corrupt file).
    #[error("user store unavailable: {0}")]
    Storage(String),
}
