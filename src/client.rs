use std::collections::HashMap;
use std::time::Duration;

use reqwest::{
    Client, RequestBuilder,
    header::{AUTHORIZATION, HeaderName, HeaderValue},
};
use url::Url;

use crate::{
    AuthorizationRequest, AuthorizationResponse, ClientConfig, OAuthError, OAuthProvider,
    PkcePair, TokenDelivery, TokenResponse, random_token,
};

#[derive(Debug, Clone)]
pub struct OAuthClientConfig {
    pub client_id: String,
    pub client_secret: Option<String>,
    pub redirect_uri: String,
    pub scope: Option<String>,
    pub token_delivery: TokenDelivery,
    pub use_pkce: bool,
    pub timeout: Option<Duration>,
}

impl OAuthClientConfig {
    pub fn new(client_id: impl Into<String>, redirect_uri: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: None,
            redirect_uri: redirect_uri.into(),
            scope: None,
            token_delivery: TokenDelivery::default(),
            use_pkce: false,
            timeout: None,
        }
    }

    pub fn from_client_config(config: &ClientConfig) -> Self {
        let mut this = Self::new(&config.client_id, &config.redirect_uri)
            .with_client_secret(&config.client_secret)
            .with_token_delivery(config.token_delivery.clone())
            .with_pkce(config.use_pkce)
            .with_timeout(config.timeout);
        this.scope = config.scope.clone();
        this
    }

    pub fn with_client_secret(mut self, client_secret: impl Into<String>) -> Self {
        self.client_secret = Some(client_secret.into());
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_token_delivery(mut self, token_delivery: TokenDelivery) -> Self {
        self.token_delivery = token_delivery;
        self
    }

    pub fn with_pkce(mut self, use_pkce: bool) -> Self {
        self.use_pkce = use_pkce;
        self
    }
}

#[derive(Debug, Clone)]
pub struct OAuthClient<P: OAuthProvider> {
    provider: P,
    config: OAuthClientConfig,
    http: Client,
}

impl<P: OAuthProvider> OAuthClient<P> {
    pub fn new(provider: P, config: OAuthClientConfig) -> Result<Self, OAuthError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()?;
        Ok(Self {
            provider,
            config,
            http,
        })
    }

    pub fn authorization_url(&self) -> Result<AuthorizationRequest, OAuthError> {
        self.authorization_url_with_state(None)
    }

    #[tracing::instrument(skip(self, state), fields(provider = self.provider.id()))]
    pub fn authorization_url_with_state(
        &self,
        state: Option<String>,
    ) -> Result<AuthorizationRequest, OAuthError> {
        let pkce = if self.config.use_pkce {
            Some(PkcePair::generate()?)
        } else {
            None
        };
        let state = match state {
            Some(state) => state,
            None => random_token()?,
        };
        let scope = self.config.scope.clone();

        let mut url = Url::parse(self.provider.authorize_url())?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("response_type", "code")
                .append_pair("client_id", &self.config.client_id)
                .append_pair("redirect_uri", &self.config.redirect_uri);
            if let Some(scope) = &scope {
                pairs.append_pair("scope", scope);
            }
            if let Some(pkce) = &pkce {
                pairs
                    .append_pair("code_challenge", &pkce.code_challenge)
                    .append_pair("code_challenge_method", "S256");
            }
            pairs.append_pair("state", &state);
        }

        Ok(AuthorizationRequest {
            authorization_url: url.to_string(),
            pkce,
            state,
            scope,
        })
    }

    #[tracing::instrument(skip_all, fields(provider = self.provider.id()))]
    pub async fn exchange_code(
        &self,
        response: AuthorizationResponse,
        code_verifier: Option<&str>,
        expected_state: Option<&str>,
    ) -> Result<TokenResponse, OAuthError> {
        let AuthorizationResponse { code, state } = response;

        if let Some(expected) = expected_state {
            let returned = state.as_deref().unwrap_or_default();
            if expected != returned {
                return Err(OAuthError::StateMismatch {
                    expected: expected.to_string(),
                    received: returned.to_string(),
                });
            }
        }

        let mut payload = HashMap::new();
        payload.insert("grant_type".to_string(), "authorization_code".to_string());
        payload.insert("code".to_string(), code);
        payload.insert("client_id".to_string(), self.config.client_id.clone());
        payload.insert("redirect_uri".to_string(), self.config.redirect_uri.clone());

        if let Some(verifier) = code_verifier {
            payload.insert("code_verifier".to_string(), verifier.to_string());
        }
        if let Some(secret) = &self.config.client_secret {
            payload.insert("client_secret".to_string(), secret.clone());
        }

        tracing::debug!("exchanging authorization code for access token");
        self.send_token_request(payload).await
    }

    /// Call the provider's API endpoint with `access_token` and return the
    /// JSON body.
    #[tracing::instrument(skip_all, fields(provider = self.provider.id()))]
    pub async fn call_api_endpoint(
        &self,
        access_token: &str,
    ) -> Result<serde_json::Value, OAuthError> {
        let mut url = Url::parse(self.provider.api_url())?;
        let mut builder = match &self.config.token_delivery {
            TokenDelivery::Header { scheme } => {
                let value = format!("{scheme} {access_token}");
                let value =
                    HeaderValue::from_str(&value).map_err(|_| OAuthError::InvalidHeader {
                        name: AUTHORIZATION.to_string(),
                        value: format!("{scheme} <redacted>"),
                    })?;
                self.http.get(url).header(AUTHORIZATION, value)
            }
            TokenDelivery::Query { parameter } => {
                url.query_pairs_mut().append_pair(parameter, access_token);
                self.http.get(url)
            }
        };
        builder = builder.header("Accept", "application/json");

        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "api endpoint returned an error");
            return Err(OAuthError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|err| OAuthError::InvalidResponse {
            message: err.to_string(),
            body,
        })
    }

    async fn send_token_request(
        &self,
        payload: HashMap<String, String>,
    ) -> Result<TokenResponse, OAuthError> {
        let headers = self.provider.token_headers();
        let mut builder = self.http.post(self.provider.token_url());
        builder = apply_headers(builder, &headers)?;

        let response = builder.form(&payload).send().await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "token endpoint returned an error");
            return Err(OAuthError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        let token: TokenResponse =
            serde_json::from_str(&body).map_err(|err| OAuthError::InvalidResponse {
                message: err.to_string(),
                body: body.clone(),
            })?;

        if token.access_token.is_empty() {
            return Err(OAuthError::InvalidResponse {
                message: "token response carried an empty access_token".to_string(),
                body,
            });
        }

        Ok(token)
    }
}

fn apply_headers(
    mut builder: RequestBuilder,
    headers: &[(String, String)],
) -> Result<RequestBuilder, OAuthError> {
    for (name, value) in headers {
        let name =
            HeaderName::from_bytes(name.as_bytes()).map_err(|_| OAuthError::InvalidHeader {
                name: name.clone(),
                value: value.clone(),
            })?;
        let value = HeaderValue::from_str(value).map_err(|_| OAuthError::InvalidHeader {
            name: name.to_string(),
            value: value.clone(),
        })?;
        builder = builder.header(name, value);
    }
    Ok(builder)
}
