//! Persistence of local accounts and their links to external identities.
//!
//! The link table holds at most one row per external id. Creating an account
//! and its link is a single atomic operation so a crash or a concurrent
//! callback can never leave an account without its link.

mod memory;
mod sqlite;

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use memory::MemoryAccountStore;
pub use sqlite::SqliteAccountStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LocalUserId(pub i64);

impl fmt::Display for LocalUserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalAccount {
    pub id: LocalUserId,
    pub name: String,
    pub real_name: String,
    pub email: Option<String>,
    pub email_authenticated_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Fields set on an account at creation time; the store assigns the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccount {
    pub name: String,
    pub real_name: String,
    pub email: Option<String>,
    pub email_authenticated_at: Option<DateTime<Utc>>,
    pub password_hash: Option<String>,
}

impl NewAccount {
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            real_name: name.clone(),
            name,
            email: None,
            email_authenticated_at: None,
            password_hash: None,
        }
    }

    fn into_account(self, id: LocalUserId, created_at: DateTime<Utc>) -> LocalAccount {
        LocalAccount {
            id,
            name: self.name,
            real_name: self.real_name,
            email: self.email,
            email_authenticated_at: self.email_authenticated_at,
            password_hash: self.password_hash,
            created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkOutcome {
    Created(LocalAccount),
    /// Another writer linked the external id first; nothing was written.
    AlreadyLinked(LocalUserId),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("username already taken: {0}")]
    UsernameTaken(String),

    #[error("link points at missing account {0}")]
    MissingAccount(LocalUserId),

    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find_link(&self, external_id: &str) -> Result<Option<LocalUserId>, StoreError>;

    async fn get_account(&self, id: LocalUserId) -> Result<Option<LocalAccount>, StoreError>;

    async fn is_name_taken(&self, name: &str) -> Result<bool, StoreError>;

    /// Insert `account` and link it to `external_id` atomically.
    ///
    /// Returns [`LinkOutcome::AlreadyLinked`] without creating anything when
    /// the external id is already linked, and [`StoreError::UsernameTaken`]
    /// when the name was claimed since it was checked.
    async fn create_linked_account(
        &self,
        account: NewAccount,
        external_id: &str,
    ) -> Result<LinkOutcome, StoreError>;
}
