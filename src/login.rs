use std::sync::Arc;

use crate::store::AccountStore;
use crate::{
    AccountProvisioner, AuthorizationResponse, CallbackParams, ClientConfig, ConfiguredProvider,
    ExternalIdentity, LocalUserId, LoginError, OAuthClient, OAuthClientConfig, OAuthError,
    PendingAuthorization, ProfileMapping, Provisioned, SessionStore,
};

/// Where to send the browser after the redirector ran.
#[derive(Debug, Clone)]
pub struct LoginStart {
    pub session_id: String,
    pub authorization_url: String,
}

/// Result of a successful callback.
#[derive(Debug, Clone)]
pub struct LoginComplete {
    pub session_id: String,
    pub provisioned: Provisioned,
    pub redirect_to: String,
}

/// Drives the redirect and callback halves of the login flow.
pub struct LoginService {
    client: OAuthClient<ConfiguredProvider>,
    provisioner: AccountProvisioner,
    sessions: SessionStore,
    profile_mapping: ProfileMapping,
    profile_completion_url: String,
    landing_url: String,
}

impl LoginService {
    pub fn new(config: &ClientConfig, store: Arc<dyn AccountStore>) -> Result<Self, LoginError> {
        config.validate()?;
        let client = OAuthClient::new(
            ConfiguredProvider::from_config(config),
            OAuthClientConfig::from_client_config(config),
        )?;

        Ok(Self {
            client,
            provisioner: AccountProvisioner::from_config(store, config),
            sessions: SessionStore::new(config.login_ttl),
            profile_mapping: config.profile_mapping.clone(),
            profile_completion_url: config.profile_completion_url.clone(),
            landing_url: config.landing_url.clone(),
        })
    }

    pub async fn current_user(&self, session_id: Option<&str>) -> Option<LocalUserId> {
        self.sessions.user_id(session_id?).await
    }

    #[tracing::instrument(skip_all)]
    pub async fn begin(&self, session_id: Option<&str>) -> Result<LoginStart, LoginError> {
        let request = self.client.authorization_url()?;
        let pending = PendingAuthorization {
            state: request.state,
            code_verifier: request.pkce.map(|pkce| pkce.code_verifier),
        };
        let session_id = self.sessions.start_authorization(session_id, pending).await?;

        tracing::debug!("redirecting to identity provider");
        Ok(LoginStart {
            session_id,
            authorization_url: request.authorization_url,
        })
    }

    #[tracing::instrument(skip_all)]
    pub async fn complete(
        &self,
        session_id: Option<&str>,
        params: CallbackParams,
    ) -> Result<LoginComplete, LoginError> {
        let pending = match session_id {
            Some(id) => self.sessions.take_pending(id).await,
            None => None,
        }
        .ok_or(LoginError::InvalidCallback(
            OAuthError::NoPendingAuthorization,
        ))?;

        let response =
            AuthorizationResponse::from_params(params).map_err(LoginError::InvalidCallback)?;

        let token = self
            .client
            .exchange_code(
                response,
                pending.code_verifier.as_deref(),
                Some(&pending.state),
            )
            .await
            .map_err(|err| {
                tracing::warn!(error = %err, "could not obtain access token");
                LoginError::InvalidCallback(err)
            })?;

        let profile = self.client.call_api_endpoint(&token.access_token).await?;
        let identity = ExternalIdentity::from_profile(&profile, &self.profile_mapping)?;
        let provisioned = self.provisioner.provision(&identity).await?;

        let session_id = self
            .sessions
            .log_in(session_id, provisioned.account.id)
            .await?;
        let redirect_to = if provisioned.is_new() {
            self.profile_completion_url.clone()
        } else {
            self.landing_url.clone()
        };

        tracing::info!(
            user_id = %provisioned.account.id,
            new = provisioned.is_new(),
            "login complete"
        );
        Ok(LoginComplete {
            session_id,
            provisioned,
            redirect_to,
        })
    }
}
