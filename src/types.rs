use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{OAuthError, PkcePair};

#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub authorization_url: String,
    pub pkce: Option<PkcePair>,
    pub state: String,
    pub scope: Option<String>,
}

/// What the provider sent back to the callback URL.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AuthorizationResponse {
    pub code: String,
    pub state: Option<String>,
}

impl AuthorizationResponse {
    pub fn from_params(params: CallbackParams) -> Result<Self, OAuthError> {
        if let Some(error) = params.error {
            return Err(OAuthError::ProviderDenied {
                error,
                description: params.error_description.unwrap_or_default(),
            });
        }

        let code = params
            .code
            .filter(|code| !code.is_empty())
            .ok_or(OAuthError::MissingAuthorizationCode)?;

        Ok(Self {
            code,
            state: params.state,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: Option<String>,
    pub scope: Option<String>,
    pub expires_in: Option<u64>,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// How the access token is presented to the API endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenDelivery {
    /// `Authorization: <scheme> <token>`
    Header { scheme: String },
    /// `?<parameter>=<token>`
    Query { parameter: String },
}

impl Default for TokenDelivery {
    fn default() -> Self {
        Self::Header {
            scheme: "Bearer".to_string(),
        }
    }
}
