//! Shared data models for the Blytz client.
//!
//! This crate provides Serde-serializable types for:
//! - Opaque session tokens
//! - The cached user summary and dashboard role
//! - Sign-in credentials

pub mod credentials;
pub mod role;
pub mod token;
pub mod user;

// Re-export common types
pub use credentials::Credentials;
pub use role::{BackendRole, RoleParseError, UserRole};
pub use token::SessionToken;
pub use user::UserSummary;
