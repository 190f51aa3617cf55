//! accounts
//!
//! Account lookup and creation, plus the session-key round trip between
//! the login server (which derives the key) and the world server (which
//! checks the auth-session digest against it).

use async_trait::async_trait;
use derive_more::Display;
use sqlx::Type;
use thiserror::Error;

use runeward_srp::{Salt, SessionKey, Verifier};

/// An id for an account.
#[derive(Debug, Display, PartialEq, Eq, Hash, Type, Clone, Copy)]
#[sqlx(transparent)]
pub struct AccountId(pub u32);

/// A basic account object. Immutable after creation except for the
/// password (salt + verifier) and the rolling session key.
#[derive(Debug, PartialEq, Clone)]
pub struct Account {
    pub id: AccountId,
    pub username: String,
    pub salt: Salt,
    pub verifier: Verifier,
    pub session_key: Option<SessionKey>,
}

/// The persistence capability for accounts. Implementations own the store
/// connection lifecycle; every operation acquires and releases a
/// connection on all exit paths.
#[async_trait]
pub trait AccountService: Send + Sync {
    /// Look an account up by its case-insensitive name.
    async fn account_by_name(&self, username: &str) -> Result<Option<Account>, AccountOpError>;

    /// Create a new account with a precomputed salt and verifier.
    async fn create_account(
        &self,
        username: &str,
        salt: Salt,
        verifier: Verifier,
    ) -> Result<AccountId, AccountOpError>;

    /// Store the session key derived by a successful login handshake.
    async fn set_session_key(
        &self,
        username: &str,
        key: &SessionKey,
    ) -> Result<(), AccountOpError>;

    /// Fetch the most recent session key for an account, if any login has
    /// completed since boot.
    async fn session_key(&self, username: &str) -> Result<Option<SessionKey>, AccountOpError>;
}

/// Errors that may occur when running account operations.
#[derive(Error, Debug)]
pub enum AccountOpError {
    #[error("username is longer than 16 characters")]
    UsernameTooLong,
    #[error("account {0} already exists")]
    AlreadyExists(String),
    #[error("persistence failure: {0}")]
    PersistError(String),
}
