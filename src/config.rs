use std::env;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::identity::ProfileMapping;
use crate::types::TokenDelivery;

pub const ENV_PREFIX: &str = "WIKI_OAUTH2_";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_LOGIN_TTL: Duration = Duration::from_secs(600);
const DEFAULT_PROFILE_COMPLETION_URL: &str = "/wiki/Special:Preferences";
const DEFAULT_LANDING_URL: &str = "/";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable: {0}")]
    MissingVar(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Whether a provider-supplied email address is marked authenticated when
/// the local account is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmailTrust {
    #[default]
    TrustProvider,
    RequireConfirmation,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub scope: Option<String>,
    pub authorize_endpoint: String,
    pub access_token_endpoint: String,
    pub api_endpoint: String,
    pub token_delivery: TokenDelivery,
    pub timeout: Duration,
    /// How long a started login may wait for its callback.
    pub login_ttl: Duration,
    pub use_pkce: bool,
    pub profile_mapping: ProfileMapping,
    pub email_trust: EmailTrust,
    pub allow_password: bool,
    pub profile_completion_url: String,
    pub landing_url: String,
}

impl ClientConfig {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: redirect_uri.into(),
            scope: None,
            authorize_endpoint: String::new(),
            access_token_endpoint: String::new(),
            api_endpoint: String::new(),
            token_delivery: TokenDelivery::default(),
            timeout: DEFAULT_TIMEOUT,
            login_ttl: DEFAULT_LOGIN_TTL,
            use_pkce: false,
            profile_mapping: ProfileMapping::default(),
            email_trust: EmailTrust::default(),
            allow_password: true,
            profile_completion_url: DEFAULT_PROFILE_COMPLETION_URL.to_string(),
            landing_url: DEFAULT_LANDING_URL.to_string(),
        }
    }

    pub fn with_endpoints(
        mut self,
        authorize: impl Into<String>,
        access_token: impl Into<String>,
        api: impl Into<String>,
    ) -> Self {
        self.authorize_endpoint = authorize.into();
        self.access_token_endpoint = access_token.into();
        self.api_endpoint = api.into();
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn with_token_delivery(mut self, token_delivery: TokenDelivery) -> Self {
        self.token_delivery = token_delivery;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_login_ttl(mut self, login_ttl: Duration) -> Self {
        self.login_ttl = login_ttl;
        self
    }

    pub fn with_pkce(mut self, use_pkce: bool) -> Self {
        self.use_pkce = use_pkce;
        self
    }

    pub fn with_profile_mapping(mut self, profile_mapping: ProfileMapping) -> Self {
        self.profile_mapping = profile_mapping;
        self
    }

    pub fn with_email_trust(mut self, email_trust: EmailTrust) -> Self {
        self.email_trust = email_trust;
        self
    }

    pub fn with_allow_password(mut self, allow_password: bool) -> Self {
        self.allow_password = allow_password;
        self
    }

    pub fn with_post_login_urls(
        mut self,
        profile_completion: impl Into<String>,
        landing: impl Into<String>,
    ) -> Self {
        self.profile_completion_url = profile_completion.into();
        self.landing_url = landing.into();
        self
    }

    /// Load configuration from `WIKI_OAUTH2_*` environment variables.
    ///
    /// Required: `CLIENT_ID`, `CLIENT_SECRET`, `REDIRECT_URI`,
    /// `AUTHORIZE_ENDPOINT`, `ACCESS_TOKEN_ENDPOINT`, `API_ENDPOINT`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(&format!("{ENV_PREFIX}{name}")).filter(|v| !v.is_empty());
        let require = |name: &str| {
            get(name).ok_or_else(|| ConfigError::MissingVar(format!("{ENV_PREFIX}{name}")))
        };

        let mut config = Self::new(
            require("CLIENT_ID")?,
            require("CLIENT_SECRET")?,
            require("REDIRECT_URI")?,
        )
        .with_endpoints(
            require("AUTHORIZE_ENDPOINT")?,
            require("ACCESS_TOKEN_ENDPOINT")?,
            require("API_ENDPOINT")?,
        );

        config.scope = get("SCOPE");

        let bearer = get("HTTP_BEARER_TOKEN");
        let query = get("QUERY_PARAMETER_TOKEN");
        config.token_delivery = match get("TOKEN_DELIVERY").as_deref() {
            None | Some("header") => TokenDelivery::Header {
                scheme: bearer.unwrap_or_else(|| "Bearer".to_string()),
            },
            Some("query") => TokenDelivery::Query {
                parameter: query.unwrap_or_else(|| "access_token".to_string()),
            },
            Some(other) => {
                return Err(ConfigError::Invalid(format!(
                    "{ENV_PREFIX}TOKEN_DELIVERY must be `header` or `query`, got `{other}`"
                )));
            }
        };

        if let Some(secs) = get("TIMEOUT_SECS") {
            let secs: u64 = secs.parse().map_err(|_| {
                ConfigError::Invalid(format!("{ENV_PREFIX}TIMEOUT_SECS is not a number: {secs}"))
            })?;
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = get("LOGIN_TTL_SECS") {
            let secs: u64 = secs.parse().map_err(|_| {
                ConfigError::Invalid(format!(
                    "{ENV_PREFIX}LOGIN_TTL_SECS is not a number: {secs}"
                ))
            })?;
            config.login_ttl = Duration::from_secs(secs);
        }

        if let Some(value) = get("USE_PKCE") {
            config.use_pkce = parse_bool("USE_PKCE", &value)?;
        }
        if let Some(value) = get("TRUST_PROVIDER_EMAIL") {
            config.email_trust = if parse_bool("TRUST_PROVIDER_EMAIL", &value)? {
                EmailTrust::TrustProvider
            } else {
                EmailTrust::RequireConfirmation
            };
        }
        if let Some(value) = get("ALLOW_PASSWORD") {
            config.allow_password = parse_bool("ALLOW_PASSWORD", &value)?;
        }

        if let Some(field) = get("PROFILE_ID_FIELD") {
            config.profile_mapping.id_field = field;
        }
        if let Some(field) = get("PROFILE_NAME_FIELD") {
            config.profile_mapping.name_field = field;
        }
        if let Some(field) = get("PROFILE_EMAIL_FIELD") {
            config.profile_mapping.email_field = field;
        }

        if let Some(url) = get("PROFILE_COMPLETION_URL") {
            config.profile_completion_url = url;
        }
        if let Some(url) = get("LANDING_URL") {
            config.landing_url = url;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.client_id.is_empty() {
            return Err(ConfigError::Invalid("client_id cannot be empty".to_string()));
        }
        if self.client_secret.is_empty() {
            return Err(ConfigError::Invalid(
                "client_secret cannot be empty".to_string(),
            ));
        }
        for (name, value) in [
            ("redirect_uri", &self.redirect_uri),
            ("authorize_endpoint", &self.authorize_endpoint),
            ("access_token_endpoint", &self.access_token_endpoint),
            ("api_endpoint", &self.api_endpoint),
        ] {
            Url::parse(value)
                .map_err(|err| ConfigError::Invalid(format!("{name} `{value}`: {err}")))?;
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::Invalid("timeout must be non-zero".to_string()));
        }
        Ok(())
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid(format!(
            "{ENV_PREFIX}{name} must be a boolean, got `{value}`"
        ))),
    }
}
