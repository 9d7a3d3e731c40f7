use serde::{Deserialize, Serialize};

/// Successful token endpoint response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    /// Opaque bearer token.
    pub access_token: String,
    pub token_type: String,
    /// Signed ID token (compact JWS).
    pub id_token: String,
    pub expires_in: u64,
}

/// OAuth 2.0 error response per RFC 6749 Section 5.2.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}
