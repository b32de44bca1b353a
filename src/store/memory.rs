use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use super::{AccountStore, LinkOutcome, LocalAccount, LocalUserId, NewAccount, StoreError};

#[derive(Debug, Default)]
struct Inner {
    accounts: BTreeMap<LocalUserId, LocalAccount>,
    names: HashMap<String, LocalUserId>,
    links: HashMap<String, LocalUserId>,
    next_id: i64,
}

impl Inner {
    fn insert(&mut self, account: NewAccount) -> Result<LocalAccount, StoreError> {
        if self.names.contains_key(&account.name) {
            return Err(StoreError::UsernameTaken(account.name));
        }
        self.next_id += 1;
        let account = account.into_account(LocalUserId(self.next_id), Utc::now());
        self.names.insert(account.name.clone(), account.id);
        self.accounts.insert(account.id, account.clone());
        Ok(account)
    }
}

/// Process-local store. Every operation runs under a single lock, so the
/// link check and both inserts in `create_linked_account` are atomic.
#[derive(Debug, Default)]
pub struct MemoryAccountStore {
    inner: Mutex<Inner>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an unlinked account, as the host platform would for users who
    /// registered locally.
    pub async fn insert_account(&self, account: NewAccount) -> Result<LocalAccount, StoreError> {
        self.inner.lock().await.insert(account)
    }

    pub async fn account_count(&self) -> usize {
        self.inner.lock().await.accounts.len()
    }

    pub async fn link_count(&self) -> usize {
        self.inner.lock().await.links.len()
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn find_link(&self, external_id: &str) -> Result<Option<LocalUserId>, StoreError> {
        Ok(self.inner.lock().await.links.get(external_id).copied())
    }

    async fn get_account(&self, id: LocalUserId) -> Result<Option<LocalAccount>, StoreError> {
        Ok(self.inner.lock().await.accounts.get(&id).cloned())
    }

    async fn is_name_taken(&self, name: &str) -> Result<bool, StoreError> {
        Ok(self.inner.lock().await.names.contains_key(name))
    }

    async fn create_linked_account(
        &self,
        account: NewAccount,
        external_id: &str,
    ) -> Result<LinkOutcome, StoreError> {
        let mut inner = self.inner.lock().await;
        if let Some(existing) = inner.links.get(external_id) {
            return Ok(LinkOutcome::AlreadyLinked(*existing));
        }
        let account = inner.insert(account)?;
        inner.links.insert(external_id.to_string(), account.id);
        Ok(LinkOutcome::Created(account))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn creates_account_and_link_together() {
        let store = MemoryAccountStore::new();
        let outcome = store
            .create_linked_account(NewAccount::named("Jane Doe"), "OAuth2Client.wiki.1")
            .await
            .unwrap();

        let LinkOutcome::Created(account) = outcome else {
            panic!("expected a new account");
        };
        assert_eq!(store.find_link("OAuth2Client.wiki.1").await.unwrap(), Some(account.id));
        assert!(store.is_name_taken("Jane Doe").await.unwrap());
    }

    #[tokio::test]
    async fn second_link_for_same_external_id_writes_nothing() {
        let store = MemoryAccountStore::new();
        store
            .create_linked_account(NewAccount::named("Jane Doe"), "OAuth2Client.wiki.1")
            .await
            .unwrap();
        let outcome = store
            .create_linked_account(NewAccount::named("Jane Doe 2"), "OAuth2Client.wiki.1")
            .await
            .unwrap();

        assert!(matches!(outcome, LinkOutcome::AlreadyLinked(LocalUserId(1))));
        assert_eq!(store.account_count().await, 1);
        assert_eq!(store.link_count().await, 1);
    }

    #[tokio::test]
    async fn taken_name_is_rejected() {
        let store = MemoryAccountStore::new();
        store.insert_account(NewAccount::named("Jane Doe")).await.unwrap();
        let result = store
            .create_linked_account(NewAccount::named("Jane Doe"), "OAuth2Client.wiki.1")
            .await;
        assert!(matches!(result, Err(StoreError::UsernameTaken(_))));
        assert_eq!(store.link_count().await, 0);
    }
}
