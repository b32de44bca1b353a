use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use crate::{LocalUserId, OAuthError, random_token};

/// Authorization started by the redirector, awaiting its callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAuthorization {
    pub state: String,
    pub code_verifier: Option<String>,
}

#[derive(Debug)]
struct Session {
    user_id: Option<LocalUserId>,
    pending: Option<PendingAuthorization>,
    started_at: Instant,
}

impl Session {
    fn is_stale(&self, ttl: Duration) -> bool {
        self.started_at.elapsed() >= ttl
    }
}

/// In-process session table keyed by an opaque random id.
///
/// Sessions that never complete a login are evicted once `login_ttl` has
/// passed since their last authorization started.
#[derive(Debug, Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
    login_ttl: Duration,
}

impl SessionStore {
    pub fn new(login_ttl: Duration) -> Self {
        Self {
            sessions: Arc::default(),
            login_ttl,
        }
    }

    pub async fn user_id(&self, session_id: &str) -> Option<LocalUserId> {
        self.sessions.read().await.get(session_id)?.user_id
    }

    /// Record `pending` on the session, creating one when `session_id` is
    /// unknown or absent. Returns the id to hand back to the browser.
    pub async fn start_authorization(
        &self,
        session_id: Option<&str>,
        pending: PendingAuthorization,
    ) -> Result<String, OAuthError> {
        let mut sessions = self.sessions.write().await;
        let ttl = self.login_ttl;
        sessions.retain(|_, session| session.user_id.is_some() || !session.is_stale(ttl));

        let session_id = match session_id {
            Some(id) if sessions.contains_key(id) => id.to_string(),
            _ => random_token()?,
        };
        let session = sessions.entry(session_id.clone()).or_insert_with(|| Session {
            user_id: None,
            pending: None,
            started_at: Instant::now(),
        });
        session.pending = Some(pending);
        session.started_at = Instant::now();
        Ok(session_id)
    }

    /// Remove and return the pending authorization; it is single-use and
    /// expires after `login_ttl`.
    pub async fn take_pending(&self, session_id: &str) -> Option<PendingAuthorization> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.get_mut(session_id)?;
        let pending = session.pending.take()?;
        if session.is_stale(self.login_ttl) {
            tracing::debug!("pending authorization expired");
            return None;
        }
        Some(pending)
    }

    /// Bind `user_id` to a fresh session id, dropping `previous`.
    pub async fn log_in(
        &self,
        previous: Option<&str>,
        user_id: LocalUserId,
    ) -> Result<String, OAuthError> {
        let session_id = random_token()?;
        let mut sessions = self.sessions.write().await;
        if let Some(previous) = previous {
            sessions.remove(previous);
        }
        sessions.insert(
            session_id.clone(),
            Session {
                user_id: Some(user_id),
                pending: None,
                started_at: Instant::now(),
            },
        );
        Ok(session_id)
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(600);

    fn pending() -> PendingAuthorization {
        PendingAuthorization {
            state: "st".to_string(),
            code_verifier: None,
        }
    }

    #[tokio::test]
    async fn pending_authorization_is_single_use() {
        let store = SessionStore::new(TTL);
        let id = store.start_authorization(None, pending()).await.unwrap();

        assert_eq!(store.take_pending(&id).await, Some(pending()));
        assert_eq!(store.take_pending(&id).await, None);
    }

    #[tokio::test]
    async fn unknown_session_id_is_replaced() {
        let store = SessionStore::new(TTL);
        let id = store
            .start_authorization(Some("forged"), pending())
            .await
            .unwrap();
        assert_ne!(id, "forged");
    }

    #[tokio::test]
    async fn log_in_rotates_session_id() {
        let store = SessionStore::new(TTL);
        let before = store.start_authorization(None, pending()).await.unwrap();
        let after = store.log_in(Some(&before), LocalUserId(3)).await.unwrap();

        assert_ne!(before, after);
        assert_eq!(store.user_id(&before).await, None);
        assert_eq!(store.take_pending(&before).await, None);
        assert_eq!(store.user_id(&after).await, Some(LocalUserId(3)));
    }

    #[tokio::test]
    async fn abandoned_logins_are_evicted() {
        let store = SessionStore::new(Duration::from_millis(20));
        let abandoned = store.start_authorization(None, pending()).await.unwrap();
        let logged_in = store.log_in(None, LocalUserId(7)).await.unwrap();

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(store.take_pending(&abandoned).await, None);

        let fresh = store.start_authorization(None, pending()).await.unwrap();
        assert_eq!(store.len().await, 2);
        assert_eq!(store.user_id(&logged_in).await, Some(LocalUserId(7)));
        assert_eq!(store.take_pending(&fresh).await, Some(pending()));
    }

    #[tokio::test]
    async fn expired_session_id_is_not_reused() {
        let store = SessionStore::new(Duration::from_millis(20));
        let old = store.start_authorization(None, pending()).await.unwrap();

        tokio::time::sleep(Duration::from_millis(40)).await;
        let new = store.start_authorization(Some(&old), pending()).await.unwrap();
        assert_ne!(new, old);
    }
}
