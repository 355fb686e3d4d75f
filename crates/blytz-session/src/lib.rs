//! Client-local credential cache.
//!
//! This crate provides:
//! - The `SessionStore` key-value abstraction (memory and file backed)
//! - `CredentialCache`, the typed view over the `authToken`, `user` and
//!   `userRole` entries

pub mod credentials;
pub mod error;
pub mod store;

pub use credentials::{keys, CredentialCache};
pub use error::{SessionError, SessionResult};
pub use store::{FileSessionStore, MemorySessionStore, SessionStore};
