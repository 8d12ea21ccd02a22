//! Authentication module for the upstream session.
//!
//! This module provides:
//! - `Credential`: the username/password used for the token login
//! - `CredentialStore`: OS keychain fallback for the password
//! - `SessionManager`: single shared token with validation and background reopen

pub mod credentials;
pub mod session;

pub use credentials::{Credential, CredentialStore};
pub use session::{
    BearerToken, ReopenHandle, Session, SessionError, SessionManager, SessionOptions, SessionPhase,
    SessionStats, VALID_TOKEN_CODE,
};
