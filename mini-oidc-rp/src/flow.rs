use std::time::Duration;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use mini_oidc_core::{unix_now, IdTokenClaims, OAuthErrorBody, TokenResponse};
use rand::rngs::OsRng;
use rand::RngCore;
use tracing::{debug, warn};
use url::Url;

use crate::config::RelyingPartyConfig;
use crate::discovery::ProviderMetadata;
use crate::error::FlowError;
use crate::jwks::KeySet;
use crate::transport::{HttpRequest, HttpTransport};
use crate::verifier::IdTokenVerifier;

const STATE_BYTES: usize = 32;

/// Anti-CSRF value bound to one login attempt.
#[derive(Clone, PartialEq, Eq)]
pub struct CsrfState(String);

impl CsrfState {
    /// 256 random bits from the OS RNG, base64url without padding.
    pub fn generate() -> Self {
        let mut bytes = [0u8; STATE_BYTES];
        OsRng.fill_bytes(&mut bytes);
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }

    /// Restore a state previously stored in the user's session.
    pub fn from_stored(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Byte-for-byte comparison with the value returned on the callback.
    pub fn matches(&self, returned: &str) -> bool {
        self.0.as_bytes() == returned.as_bytes()
    }
}

impl std::fmt::Debug for CsrfState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CsrfState(..)")
    }
}

/// Query parameters the provider sends back to the redirect URI.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

impl CallbackParams {
    pub fn from_query(query: &str) -> Self {
        let mut params = Self::default();
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            let slot = match &*key {
                "code" => &mut params.code,
                "state" => &mut params.state,
                "error" => &mut params.error,
                "error_description" => &mut params.error_description,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.into_owned());
            }
        }
        params
    }
}

/// Result of a completed login.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    /// Verified ID token claims.
    pub claims: IdTokenClaims,
    pub tokens: TokenResponse,
}

/// Builds authorization URLs and exchanges codes at the token endpoint.
pub struct AuthorizationFlow<T> {
    transport: T,
    config: RelyingPartyConfig,
    authorization_endpoint: Url,
    token_endpoint: Url,
}

impl<T: HttpTransport> AuthorizationFlow<T> {
    pub fn new(
        transport: T,
        config: RelyingPartyConfig,
        authorization_endpoint: Url,
        token_endpoint: Url,
    ) -> Self {
        Self {
            transport,
            config,
            authorization_endpoint,
            token_endpoint,
        }
    }

    pub fn config(&self) -> &RelyingPartyConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// The URL to send the user agent to.
    pub fn build_authorization_url(&self, state: &CsrfState) -> Url {
        let mut url = self.authorization_endpoint.clone();
        url.query_pairs_mut()
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", &self.config.redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", &self.config.scopes.join(" "))
            .append_pair("state", state.as_str());
        url
    }

    /// POST the code to the token endpoint, giving up after `timeout`.
    ///
    /// Never retried: a second attempt with the same code can only fail.
    pub async fn exchange_code(
        &self,
        code: &str,
        timeout: Duration,
    ) -> Result<TokenResponse, FlowError> {
        let request = HttpRequest::post_form(
            self.token_endpoint.clone(),
            [
                ("grant_type", "authorization_code"),
                ("code", code),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("redirect_uri", self.config.redirect_uri.as_str()),
            ],
        );

        let response = tokio::time::timeout(timeout, self.transport.execute(request))
            .await
            .map_err(|_| {
                warn!(timeout_ms = timeout.as_millis() as u64, "Token exchange timed out");
                FlowError::Timeout
            })??;

        if !response.status.is_success() {
            let error = serde_json::from_slice::<OAuthErrorBody>(&response.body)
                .map(|body| body.error)
                .unwrap_or_else(|_| "unknown_error".into());
            warn!(status = response.status.as_u16(), %error, "Token endpoint rejected the exchange");
            return Err(FlowError::TokenEndpoint {
                status: response.status.as_u16(),
                error,
            });
        }

        serde_json::from_slice(&response.body)
            .map_err(|e| FlowError::InvalidTokenResponse(e.to_string()))
    }
}

/// A relying party: the flow plus the verifier for the tokens it receives.
pub struct RelyingParty<T> {
    flow: AuthorizationFlow<T>,
    verifier: IdTokenVerifier,
}

impl<T: HttpTransport> RelyingParty<T> {
    pub fn new(flow: AuthorizationFlow<T>, verifier: IdTokenVerifier) -> Self {
        Self { flow, verifier }
    }

    /// Discover the provider, check its issuer and fetch its keys once.
    pub async fn bootstrap(transport: T, config: RelyingPartyConfig) -> Result<Self, FlowError> {
        let metadata =
            ProviderMetadata::discover(&transport, &config.discovery_url(), &config.issuer).await?;
        let keys = KeySet::fetch(&transport, &metadata.jwks_uri).await?;
        let verifier = IdTokenVerifier::new(keys, config.verifier_config());
        let flow = AuthorizationFlow::new(
            transport,
            config,
            metadata.authorization_endpoint,
            metadata.token_endpoint,
        );
        Ok(Self::new(flow, verifier))
    }

    pub fn flow(&self) -> &AuthorizationFlow<T> {
        &self.flow
    }

    pub fn verifier(&self) -> &IdTokenVerifier {
        &self.verifier
    }

    /// Start a login: a fresh state and the URL to redirect to.
    pub fn begin_login(&self) -> (CsrfState, Url) {
        let state = CsrfState::generate();
        let url = self.flow.build_authorization_url(&state);
        (state, url)
    }

    /// [`complete_login`](Self::complete_login) with the configured exchange
    /// timeout and the current time.
    pub async fn handle_callback(
        &self,
        expected_state: &CsrfState,
        callback: &CallbackParams,
    ) -> Result<LoginOutcome, FlowError> {
        let timeout = self.flow.config().exchange_timeout();
        self.complete_login(expected_state, callback, timeout, unix_now())
            .await
    }

    /// Handle the redirect back from the provider.
    ///
    /// The state is compared before anything else, so a forged callback never
    /// reaches the token endpoint.
    pub async fn complete_login(
        &self,
        expected_state: &CsrfState,
        callback: &CallbackParams,
        timeout: Duration,
        now: u64,
    ) -> Result<LoginOutcome, FlowError> {
        let returned = callback.state.as_deref().unwrap_or_default();
        if !expected_state.matches(returned) {
            warn!("Callback state does not match the stored state");
            return Err(FlowError::StateMismatch);
        }

        if let Some(error) = &callback.error {
            warn!(%error, "Provider returned an authorization error");
            return Err(FlowError::AuthorizationDenied {
                error: error.clone(),
                description: callback.error_description.clone(),
            });
        }

        let code = match callback.code.as_deref() {
            Some(code) if !code.is_empty() => code,
            _ => return Err(FlowError::InvalidCallback("missing 'code' parameter".into())),
        };

        let tokens = self.flow.exchange_code(code, timeout).await?;
        let claims = self.verifier.verify(&tokens.id_token, now)?;
        debug!(sub = %claims.sub, "Login completed");
        Ok(LoginOutcome { claims, tokens })
    }
}
