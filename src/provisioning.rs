//! Mapping of an [`ExternalIdentity`] onto a local account.
//!
//! Provisioning is idempotent per external id: the first callback for an
//! identity creates an account under the first free name derived from the
//! provider's display name, and every later callback resolves the stored link
//! back to that same account. Profile fields are never refreshed on repeat
//! logins.

use std::sync::Arc;

use chrono::Utc;

use crate::pkce::sha256_base64;
use crate::store::{AccountStore, LinkOutcome, LocalAccount, NewAccount, StoreError};
use crate::{ClientConfig, EmailTrust, ExternalIdentity, LoginError, random_token, username};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionOutcome {
    Created,
    Found,
}

#[derive(Debug, Clone)]
pub struct Provisioned {
    pub account: LocalAccount,
    pub outcome: ProvisionOutcome,
}

impl Provisioned {
    pub fn is_new(&self) -> bool {
        self.outcome == ProvisionOutcome::Created
    }
}

#[derive(Clone)]
pub struct AccountProvisioner {
    store: Arc<dyn AccountStore>,
    client_id: String,
    email_trust: EmailTrust,
    allow_password: bool,
}

impl AccountProvisioner {
    pub fn new(store: Arc<dyn AccountStore>, client_id: impl Into<String>) -> Self {
        Self {
            store,
            client_id: client_id.into(),
            email_trust: EmailTrust::default(),
            allow_password: true,
        }
    }

    pub fn from_config(store: Arc<dyn AccountStore>, config: &ClientConfig) -> Self {
        Self::new(store, &config.client_id)
            .with_email_trust(config.email_trust)
            .with_allow_password(config.allow_password)
    }

    pub fn with_email_trust(mut self, email_trust: EmailTrust) -> Self {
        self.email_trust = email_trust;
        self
    }

    pub fn with_allow_password(mut self, allow_password: bool) -> Self {
        self.allow_password = allow_password;
        self
    }

    #[tracing::instrument(
        skip(self, identity),
        fields(provider_user_id = identity.provider_user_id())
    )]
    pub async fn provision(&self, identity: &ExternalIdentity) -> Result<Provisioned, LoginError> {
        let external_id = identity.external_id(&self.client_id);

        if let Some(user_id) = self.store.find_link(&external_id).await? {
            return self.found(user_id).await;
        }

        for candidate in username::candidates(identity.display_name()) {
            if !username::is_creatable(&candidate) || self.store.is_name_taken(&candidate).await? {
                continue;
            }

            let account = self.new_account(candidate, identity)?;
            match self.store.create_linked_account(account, &external_id).await {
                Ok(LinkOutcome::Created(account)) => {
                    tracing::info!(user_id = %account.id, name = %account.name, "created account");
                    return Ok(Provisioned {
                        account,
                        outcome: ProvisionOutcome::Created,
                    });
                }
                Ok(LinkOutcome::AlreadyLinked(user_id)) => return self.found(user_id).await,
                Err(StoreError::UsernameTaken(name)) => {
                    tracing::debug!(%name, "name claimed concurrently, trying next");
                }
                Err(err) => return Err(err.into()),
            }
        }

        tracing::warn!(
            display_name = identity.display_name(),
            "no free username for external identity"
        );
        Err(LoginError::AccountCreationExhausted {
            display_name: identity.display_name().to_string(),
        })
    }

    async fn found(&self, user_id: crate::LocalUserId) -> Result<Provisioned, LoginError> {
        let account = self
            .store
            .get_account(user_id)
            .await?
            .ok_or(StoreError::MissingAccount(user_id))?;
        tracing::debug!(%user_id, "external identity already linked");
        Ok(Provisioned {
            account,
            outcome: ProvisionOutcome::Found,
        })
    }

    fn new_account(
        &self,
        name: String,
        identity: &ExternalIdentity,
    ) -> Result<NewAccount, LoginError> {
        let mut account = NewAccount::named(name);
        account.real_name = identity.display_name().to_string();

        if let Some(email) = identity.email() {
            account.email = Some(email.to_string());
            if self.email_trust == EmailTrust::TrustProvider {
                account.email_authenticated_at = Some(Utc::now());
            }
        }

        // Nobody ever learns this secret; only its digest is stored.
        if self.allow_password {
            account.password_hash = Some(sha256_base64(&random_token()?));
        }

        Ok(account)
    }
}
