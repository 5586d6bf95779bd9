use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A security scheme type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SecuritySchemeType {
    ApiKey,
    Http,
    #[serde(rename = "oauth2")]
    OAuth2,
    OpenIdConnect,
}

/// A security scheme definition. Only recorded; generated clients delegate
/// the actual handshake to the runtime authenticator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityScheme {
    #[serde(rename = "type")]
    pub scheme_type: SecuritySchemeType,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,
}

/// A security requirement: map of scheme name → required scopes.
pub type SecurityRequirement = IndexMap<String, Vec<String>>;

/// Whether a requirement list demands authentication.
///
/// An empty list, or one containing the empty requirement `{}`, makes
/// authentication optional and therefore counts as unauthenticated.
pub fn requires_authentication(requirements: &[SecurityRequirement]) -> bool {
    !requirements.is_empty() && requirements.iter().all(|r| !r.is_empty())
}
