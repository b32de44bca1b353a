use thiserror::Error;

use crate::config::ConfigError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("os rng error: {message}")]
    OsRng { message: String },

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid header: {name}={value}")]
    InvalidHeader { name: String, value: String },

    #[error("http status {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("invalid response: {message}")]
    InvalidResponse { message: String, body: String },

    #[error("missing authorization code in callback")]
    MissingAuthorizationCode,

    #[error("provider returned error `{error}`: {description}")]
    ProviderDenied { error: String, description: String },

    #[error("state mismatch (expected={expected}, received={received})")]
    StateMismatch { expected: String, received: String },

    #[error("no authorization is pending for this session")]
    NoPendingAuthorization,
}

/// Failures surfaced by the login flow.
#[derive(Debug, Error)]
pub enum LoginError {
    /// No usable access token: the provider denied access, the callback was
    /// malformed, or the state did not match the session.
    #[error("invalid callback: {0}")]
    InvalidCallback(#[source] OAuthError),

    #[error("unable to create a new user account for `{display_name}`")]
    AccountCreationExhausted { display_name: String },

    #[error("persistence failure: {0}")]
    Persistence(#[from] StoreError),

    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("invalid profile: {0}")]
    InvalidProfile(String),

    #[error("identity provider error: {0}")]
    Provider(#[from] OAuthError),
}
