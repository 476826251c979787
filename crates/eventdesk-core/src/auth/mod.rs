//! Authentication module for managing user sessions and credentials.
//!
//! This module provides:
//! - `Session`: bearer token plus the signed-in user, persisted to disk
//! - `CredentialStore`: secure OS-level credential storage via keyring

pub mod credentials;
pub mod session;

pub use credentials::CredentialStore;
pub use session::{Session, SessionData};
