use std::time::Duration;

use jsonwebtoken::Algorithm;
use mini_oidc_core::{ConfigError, OidcConfig};

/// Claim checks applied by [`IdTokenVerifier`](crate::IdTokenVerifier).
#[derive(Clone, Debug)]
pub struct VerifierConfig {
    /// Expected `iss`.
    pub issuer: String,

    /// Expected member of `aud` (this relying party's client id).
    pub audience: String,

    /// Allowed JWT algorithms. Tokens using other algorithms are rejected.
    /// Default: RS256 only.
    pub allowed_algorithms: Vec<Algorithm>,

    /// Clock skew tolerated on `exp` and `nbf`, in seconds (default: 60).
    pub leeway_secs: u64,
}

impl VerifierConfig {
    pub fn new(issuer: impl Into<String>, audience: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
            audience: audience.into(),
            allowed_algorithms: vec![Algorithm::RS256],
            leeway_secs: 60,
        }
    }

    /// Set the allowed JWT algorithms. An empty list rejects every token.
    pub fn with_allowed_algorithms(
        mut self,
        algorithms: impl IntoIterator<Item = Algorithm>,
    ) -> Self {
        self.allowed_algorithms = algorithms.into_iter().collect();
        self
    }

    pub fn with_leeway(mut self, leeway_secs: u64) -> Self {
        self.leeway_secs = leeway_secs;
        self
    }
}

/// Everything a relying party needs to run the login flow.
#[derive(Clone, Debug)]
pub struct RelyingPartyConfig {
    /// Provider issuer URL. Must equal the `issuer` the provider advertises.
    pub issuer: String,

    /// Where to fetch the discovery document. Defaults to
    /// `{issuer}/.well-known/openid-configuration`.
    pub discovery_url: Option<String>,

    pub client_id: String,
    pub client_secret: String,

    /// Callback URL registered with the provider.
    pub redirect_uri: String,

    /// Requested scopes (default: `openid profile email`).
    pub scopes: Vec<String>,

    /// Upper bound on one code exchange, in seconds (default: 10).
    pub exchange_timeout_secs: u64,

    pub leeway_secs: u64,
}

impl RelyingPartyConfig {
    pub fn new(
        issuer: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            issuer: issuer.into().trim_end_matches('/').to_string(),
            discovery_url: None,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: redirect_uri.into(),
            scopes: default_scopes(),
            exchange_timeout_secs: 10,
            leeway_secs: 60,
        }
    }

    pub fn with_discovery_url(mut self, url: impl Into<String>) -> Self {
        self.discovery_url = Some(url.into());
        self
    }

    pub fn with_scopes(mut self, scopes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    /// Read `rp.*` keys. Issuer, client id, secret and redirect URI are required.
    pub fn from_config(config: &OidcConfig) -> Result<Self, ConfigError> {
        let issuer: String = config.get("rp.issuer")?;
        let mut rp = Self::new(
            issuer,
            config.get::<String>("rp.client.id")?,
            config.get::<String>("rp.client.secret")?,
            config.get::<String>("rp.redirect.uri")?,
        );
        rp.discovery_url = config.get_or("rp.discovery.url", None)?;
        rp.scopes = config.get_or("rp.scopes", rp.scopes)?;
        rp.exchange_timeout_secs = config.get_or("rp.exchange.timeout", rp.exchange_timeout_secs)?;
        rp.leeway_secs = config.get_or("rp.leeway", rp.leeway_secs)?;
        Ok(rp)
    }

    pub fn discovery_url(&self) -> String {
        self.discovery_url.clone().unwrap_or_else(|| {
            format!("{}/.well-known/openid-configuration", self.issuer)
        })
    }

    pub fn exchange_timeout(&self) -> Duration {
        Duration::from_secs(self.exchange_timeout_secs)
    }

    pub fn verifier_config(&self) -> VerifierConfig {
        VerifierConfig::new(&self.issuer, &self.client_id).with_leeway(self.leeway_secs)
    }
}

fn default_scopes() -> Vec<String> {
    ["openid", "profile", "email"].map(String::from).to_vec()
}
