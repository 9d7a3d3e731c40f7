use std::sync::Arc;

use mini_oidc_core::TokenResponse;
use tracing::{debug, error, warn};

use crate::client::ClientRegistry;
use crate::code::{random_token, AuthorizationCodeStore};
use crate::directory::{UserDirectory, UserDirectoryErased};
use crate::error::OidcError;
use crate::token::TokenIssuer;

const INVALID_CLIENT: &str = "client authentication failed";
const INVALID_GRANT: &str = "authorization code is invalid, expired or already used";

/// Parameters of an authorization-code token request.
#[derive(Debug, Clone)]
pub struct TokenRequest {
    pub code: String,
    pub client_id: String,
    pub client_secret: String,
}

/// Exchanges authorization codes for ID tokens.
pub struct TokenEndpoint {
    registry: Arc<ClientRegistry>,
    codes: Arc<AuthorizationCodeStore>,
    issuer: Arc<TokenIssuer>,
    directory: Arc<dyn UserDirectoryErased>,
}

impl TokenEndpoint {
    pub fn new(
        registry: Arc<ClientRegistry>,
        codes: Arc<AuthorizationCodeStore>,
        issuer: Arc<TokenIssuer>,
        directory: impl UserDirectory,
    ) -> Self {
        Self::with_erased(registry, codes, issuer, Arc::new(directory))
    }

    pub(crate) fn with_erased(
        registry: Arc<ClientRegistry>,
        codes: Arc<AuthorizationCodeStore>,
        issuer: Arc<TokenIssuer>,
        directory: Arc<dyn UserDirectoryErased>,
    ) -> Self {
        Self {
            registry,
            codes,
            issuer,
            directory,
        }
    }

    /// Consume `code` without issuing anything, for requests rejected before
    /// the exchange proper.
    pub fn discard_code(&self, code: &str, now: u64) {
        if let Ok(code) = self.codes.redeem(code, now) {
            debug!(bound_client = %code.client_id, "Discarded authorization code from a rejected request");
        }
    }

    /// Redeem `request.code` and return a freshly signed ID token.
    ///
    /// The code is consumed before anything else is checked, so a request
    /// that fails for any reason still burns it. Callers only ever see
    /// `invalid_client` or `invalid_grant` with a fixed description; the
    /// precise cause is logged.
    pub async fn handle_token_request(
        &self,
        request: &TokenRequest,
        now: u64,
    ) -> Result<TokenResponse, OidcError> {
        let client_id = request.client_id.as_str();
        let redeemed = self.codes.redeem(&request.code, now);

        if !self
            .registry
            .authenticate(client_id, &request.client_secret)
            .await
        {
            let cause = if self.registry.lookup(client_id).is_some() {
                "secret mismatch"
            } else {
                "unknown client"
            };
            warn!(client_id, cause, "Client authentication failed at token endpoint");
            return Err(OidcError::InvalidClient(INVALID_CLIENT.into()));
        }

        let code = redeemed.map_err(|cause| {
            warn!(client_id, %cause, "Rejected authorization code");
            OidcError::InvalidGrant(INVALID_GRANT.into())
        })?;

        if code.client_id != client_id {
            warn!(
                client_id,
                bound_client = %code.client_id,
                "Authorization code presented by a different client"
            );
            return Err(OidcError::InvalidGrant(INVALID_GRANT.into()));
        }

        let Some(profile) = self.directory.find_by_subject(&code.subject_id).await else {
            error!(client_id, subject = %code.subject_id, "Code subject not found in user directory");
            return Err(OidcError::Internal("user profile unavailable".into()));
        };

        let id_token = self
            .issuer
            .issue_id_token(client_id, &code.subject_id, profile.claims(), now)?;
        debug!(client_id, subject = %code.subject_id, "Issued ID token");

        Ok(TokenResponse {
            access_token: random_token(),
            token_type: "Bearer".into(),
            id_token,
            expires_in: self.issuer.ttl_secs(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{InMemoryUserDirectory, UserProfile};
    use crate::keys::SigningKey;
    use std::sync::OnceLock;
    use std::time::Duration;

    const T0: u64 = 1_700_000_000;

    fn key() -> Arc<SigningKey> {
        static KEY: OnceLock<Arc<SigningKey>> = OnceLock::new();
        KEY.get_or_init(|| Arc::new(SigningKey::generate("test-key").unwrap()))
            .clone()
    }

    fn endpoint() -> (TokenEndpoint, Arc<AuthorizationCodeStore>) {
        let registry = ClientRegistry::new()
            .add_client("c1", "s1", ["http://app/cb"])
            .unwrap()
            .add_client("c2", "s2", ["http://other/cb"])
            .unwrap();
        let users = InMemoryUserDirectory::new().add_user(UserProfile {
            subject: "u1".into(),
            name: Some("User One".into()),
            email: None,
            picture: None,
        });
        let codes = Arc::new(AuthorizationCodeStore::new());
        let issuer = Arc::new(TokenIssuer::new(key(), "http://op", 3600));
        let endpoint = TokenEndpoint::new(Arc::new(registry), codes.clone(), issuer, users);
        (endpoint, codes)
    }

    fn request(code: &str, client_id: &str, secret: &str) -> TokenRequest {
        TokenRequest {
            code: code.into(),
            client_id: client_id.into(),
            client_secret: secret.into(),
        }
    }

    #[tokio::test]
    async fn exchanges_code_once() {
        let (endpoint, codes) = endpoint();
        let code = codes.issue("c1", "u1", Duration::from_secs(300), T0).unwrap();

        let response = endpoint
            .handle_token_request(&request(&code, "c1", "s1"), T0 + 5)
            .await
            .unwrap();
        assert_eq!(response.token_type, "Bearer");
        assert_eq!(response.expires_in, 3600);
        assert_eq!(response.id_token.split('.').count(), 3);
        assert_ne!(response.access_token, code);

        let err = endpoint
            .handle_token_request(&request(&code, "c1", "s1"), T0 + 6)
            .await
            .unwrap_err();
        assert!(matches!(err, OidcError::InvalidGrant(_)));
    }

    #[tokio::test]
    async fn failed_authentication_still_burns_the_code() {
        let (endpoint, codes) = endpoint();
        let code = codes.issue("c1", "u1", Duration::from_secs(300), T0).unwrap();

        let err = endpoint
            .handle_token_request(&request(&code, "c1", "wrong"), T0)
            .await
            .unwrap_err();
        assert!(matches!(err, OidcError::InvalidClient(_)));
        assert!(codes.is_empty());

        let err = endpoint
            .handle_token_request(&request(&code, "c1", "s1"), T0)
            .await
            .unwrap_err();
        assert!(matches!(err, OidcError::InvalidGrant(_)));
    }

    #[tokio::test]
    async fn code_bound_to_another_client_is_invalid_grant() {
        let (endpoint, codes) = endpoint();
        let code = codes.issue("c1", "u1", Duration::from_secs(300), T0).unwrap();

        let err = endpoint
            .handle_token_request(&request(&code, "c2", "s2"), T0)
            .await
            .unwrap_err();
        assert!(matches!(err, OidcError::InvalidGrant(_)));
        assert_eq!(err.description(), INVALID_GRANT);
        assert!(codes.is_empty());

        let err = endpoint
            .handle_token_request(&request(&code, "c1", "s1"), T0)
            .await
            .unwrap_err();
        assert!(matches!(err, OidcError::InvalidGrant(_)));
    }

    #[tokio::test]
    async fn discarded_code_cannot_be_exchanged() {
        let (endpoint, codes) = endpoint();
        let code = codes.issue("c1", "u1", Duration::from_secs(300), T0).unwrap();

        endpoint.discard_code(&code, T0);
        endpoint.discard_code("never-issued", T0);
        assert!(codes.is_empty());

        let err = endpoint
            .handle_token_request(&request(&code, "c1", "s1"), T0)
            .await
            .unwrap_err();
        assert!(matches!(err, OidcError::InvalidGrant(_)));
    }

    #[tokio::test]
    async fn unknown_and_expired_codes_share_one_description() {
        let (endpoint, codes) = endpoint();
        let code = codes.issue("c1", "u1", Duration::from_secs(1), T0).unwrap();

        let expired = endpoint
            .handle_token_request(&request(&code, "c1", "s1"), T0 + 2)
            .await
            .unwrap_err();
        let unknown = endpoint
            .handle_token_request(&request("never-issued", "c1", "s1"), T0 + 2)
            .await
            .unwrap_err();
        assert_eq!(expired.error_code(), "invalid_grant");
        assert_eq!(expired.description(), unknown.description());
    }

    #[tokio::test]
    async fn missing_profile_is_a_server_error() {
        let (endpoint, codes) = endpoint();
        let code = codes.issue("c1", "ghost", Duration::from_secs(300), T0).unwrap();

        let err = endpoint
            .handle_token_request(&request(&code, "c1", "s1"), T0)
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "server_error");
    }
}
