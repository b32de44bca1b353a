//! Log in to a wiki through an external OAuth 2.0 identity provider.
//!
//! The visitor is redirected to the provider's authorize endpoint, the
//! returned code is exchanged for an access token, the provider's profile
//! endpoint is called with that token, and the profile is linked to a local
//! account, which is created on first sight.

mod client;
mod config;
mod error;
mod identity;
mod login;
mod pkce;
mod providers;
mod provisioning;
#[cfg(feature = "server")]
mod server;
mod session;
pub mod store;
mod types;
pub mod username;

pub use client::{OAuthClient, OAuthClientConfig};
pub use config::{ClientConfig, ConfigError, ENV_PREFIX, EmailTrust};
pub use error::{LoginError, OAuthError};
pub use identity::{ExternalIdentity, ProfileMapping};
pub use login::{LoginComplete, LoginService, LoginStart};
pub use pkce::{PkcePair, random_token};
pub use providers::{ConfiguredProvider, OAuthProvider};
pub use provisioning::{AccountProvisioner, ProvisionOutcome, Provisioned};
#[cfg(feature = "server")]
pub use server::{LoginServer, ServerConfig};
pub use session::{PendingAuthorization, SessionStore};
pub use store::{AccountStore, LocalAccount, LocalUserId};
pub use types::{
    AuthorizationRequest, AuthorizationResponse, CallbackParams, TokenDelivery, TokenResponse,
};
