//! Session management for matchhall.
//!
//! This crate answers one question for the rest of the server: who is
//! logged in, and over which connection?
//!
//! 1. **Credential checks** are delegated to a [`UserStore`].
//! 2. **Session tracking** ([`SessionRegistry`]) enforces one live
//!    session per identity, atomically.
//!
//! # How it fits in the stack
//!
//! ```text
//! Connection handler (above)  ← binds a connection to an identity on login
//!     ↕
//! Session Layer (this crate)
//!     ↕
//! Protocol / Transport (below)  ← Role, ConnectionId
//! ```

#![allow(async_fn_in_trait)]

mod auth;
mod error;
mod registry;
mod session;

pub use auth::UserStore;
pub use error::SessionError;
pub use registry::SessionRegistry;
pub use session::Session;
