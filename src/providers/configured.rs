use crate::{ClientConfig, OAuthProvider};

/// A provider whose endpoints come entirely from configuration.
#[derive(Debug, Clone)]
pub struct ConfiguredProvider {
    id: String,
    authorize_url: String,
    token_url: String,
    api_url: String,
}

impl ConfiguredProvider {
    pub fn new(
        id: impl Into<String>,
        authorize_url: impl Into<String>,
        token_url: impl Into<String>,
        api_url: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            authorize_url: authorize_url.into(),
            token_url: token_url.into(),
            api_url: api_url.into(),
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(
            "oauth2",
            &config.authorize_endpoint,
            &config.access_token_endpoint,
            &config.api_endpoint,
        )
    }
}

impl OAuthProvider for ConfiguredProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn authorize_url(&self) -> &str {
        &self.authorize_url
    }

    fn token_url(&self) -> &str {
        &self.token_url
    }

    fn api_url(&self) -> &str {
        &self.api_url
    }
}
