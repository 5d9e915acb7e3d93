//! User-store hook for validating identities.
//!
//! The lobby doesn't keep accounts itself. It defines the [`UserStore`]
//! trait and calls it during `login` and `register`. A file-backed and an
//! in-memory implementation live in `matchhall-store`; tests usually
//! define their own.

use std::future::Future;

use matchhall_protocol::Role;

use crate::SessionError;

/// Checks credentials and creates accounts.
///
/// `Send + Sync + 'static` because one store is shared by every
/// connection task for the lifetime of the server.
///
/// # Example
///
/// ```rust
/// use matchhall_protocol::Role;
/// use matchhall_session::{SessionError, UserStore};
///
/// /// Accepts any identity whose password equals its name.
/// struct EchoStore;
///
/// impl UserStore for EchoStore {
///     async fn authenticate(
///         &self,
///         identity: &str,
///         credential: &str,
///         _role: Role,
///     ) -> Result<(), SessionError> {
///         if identity == credential {
///             Ok(())
///         } else {
///             Err(SessionError::InvalidCredential("Incorrect password.".into()))
///         }
///     }
///
///     async fn register(
///         &self,
///         identity: &str,
///         _credential: &str,
///         _role: Role,
///     ) -> Result<(), SessionError> {
///         Err(SessionError::AccountExists(identity.to_string()))
///     }
/// }
/// ```
pub trait UserStore: Send + Sync + 'static {
    /// Validates `credential` for `identity` in the `role` account table.
    ///
    /// # Errors
    /// - [`SessionError::InvalidCredential`] with the reason for rejection.
    /// - [`SessionError::Storage`] if the store could not be read.
    fn authenticate(
        &self,
        identity: &str,
        credential: &str,
        role: Role,
    ) -> impl Future<Output = Result<(), SessionError>> + Send;

    /// Creates a new account.
    ///
    /// # Errors
    /// - [`SessionError::AccountExists`] if the name is taken.
    /// - [`SessionError::Storage`] if the account could not be persisted.
    fn register(
        &self,
        identity: &str,
        credential: &str,
        role: Role,
    ) -> impl Future<Output = Result<(), SessionError>> + Send;
}
