use std::time::Duration;

use mini_oidc_core::{ConfigError, OidcConfig};

/// Configuration for the OIDC provider.
#[derive(Clone, Debug)]
pub struct ProviderConfig {
    /// Issuer URL (`iss`), also the base of every advertised endpoint.
    pub issuer: String,
    /// Key ID (`kid`) included in token headers and the JWKS.
    pub kid: String,
    /// Mount path for the endpoints (e.g. `""` for root, `"/auth"` for `/auth/token`).
    pub base_path: String,
    /// ID token lifetime in seconds (`exp - iat`).
    pub id_token_ttl_secs: u64,
    /// Authorization code lifetime in seconds.
    pub code_ttl_secs: u64,
    /// Interval of the expired-code sweep in seconds.
    pub sweep_interval_secs: u64,
    /// External login page users are sent to when no subject is authenticated.
    pub login_url: Option<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            issuer: "http://127.0.0.1:9090".into(),
            kid: "mini-oidc-key-1".into(),
            base_path: String::new(),
            id_token_ttl_secs: 3600,
            code_ttl_secs: 300,
            sweep_interval_secs: 60,
            login_url: None,
        }
    }
}

impl ProviderConfig {
    /// Read `provider.*` keys, defaulting whatever is absent.
    pub fn from_config(config: &OidcConfig) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let issuer: String = config.get_or("provider.issuer", defaults.issuer)?;
        Ok(Self {
            issuer: issuer.trim_end_matches('/').to_string(),
            kid: config.get_or("provider.kid", defaults.kid)?,
            base_path: config.get_or("provider.base.path", defaults.base_path)?,
            id_token_ttl_secs: config.get_or("provider.token.ttl", defaults.id_token_ttl_secs)?,
            code_ttl_secs: config.get_or("provider.code.ttl", defaults.code_ttl_secs)?,
            sweep_interval_secs: config
                .get_or("provider.sweep.interval", defaults.sweep_interval_secs)?,
            login_url: config.get_or("provider.login.url", defaults.login_url)?,
        })
    }

    pub fn code_ttl(&self) -> Duration {
        Duration::from_secs(self.code_ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }

    /// Absolute URL of an endpoint served under `base_path`.
    pub fn endpoint_url(&self, path: &str) -> String {
        format!("{}{}{}", self.issuer, self.base_path, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_section_missing() {
        let config = ProviderConfig::from_config(&OidcConfig::empty()).unwrap();
        assert_eq!(config.id_token_ttl_secs, 3600);
        assert_eq!(config.code_ttl(), Duration::from_secs(300));
        assert!(config.login_url.is_none());
    }

    #[test]
    fn reads_provider_section() {
        let yaml = r#"
provider:
  issuer: https://op.example.com/
  kid: key-7
  base:
    path: /auth
  token:
    ttl: 600
  code:
    ttl: 30
  login:
    url: https://op.example.com/login
"#;
        let config =
            ProviderConfig::from_config(&OidcConfig::from_yaml_str(yaml, "test").unwrap()).unwrap();
        assert_eq!(config.issuer, "https://op.example.com");
        assert_eq!(config.kid, "key-7");
        assert_eq!(config.id_token_ttl_secs, 600);
        assert_eq!(config.code_ttl_secs, 30);
        assert_eq!(config.login_url.as_deref(), Some("https://op.example.com/login"));
        assert_eq!(config.endpoint_url("/token"), "https://op.example.com/auth/token");
    }

    #[test]
    fn malformed_ttl_is_an_error() {
        let yaml = "provider:\n  code:\n    ttl: soon\n";
        let result = ProviderConfig::from_config(&OidcConfig::from_yaml_str(yaml, "test").unwrap());
        assert!(matches!(result, Err(ConfigError::TypeMismatch { .. })));
    }
}
