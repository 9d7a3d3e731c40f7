use std::path::PathBuf;

use http::HeaderName;
use mini_oidc_core::{ConfigError, OidcConfig};
use mini_oidc_provider::{
    ClientRegistry, HeaderSubjectResolver, InMemoryUserDirectory, OidcError, OidcProvider,
    ProviderConfig, SigningKey, UserProfile,
};
use tracing::{debug, info};

pub const DEFAULT_BIND: &str = "127.0.0.1:9090";

/// Errors raised while turning configuration into a running provider.
#[derive(Debug)]
pub enum SetupError {
    Config(ConfigError),
    Provider(OidcError),
    InvalidHeader(String),
    Io(std::io::Error),
}

impl std::fmt::Display for SetupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SetupError::Config(e) => write!(f, "{e}"),
            SetupError::Provider(e) => write!(f, "provider setup failed: {e}"),
            SetupError::InvalidHeader(name) => write!(f, "invalid subject header name '{name}'"),
            SetupError::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for SetupError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SetupError::Config(e) => Some(e),
            SetupError::Provider(e) => Some(e),
            SetupError::Io(e) => Some(e),
            SetupError::InvalidHeader(_) => None,
        }
    }
}

impl From<ConfigError> for SetupError {
    fn from(e: ConfigError) -> Self {
        SetupError::Config(e)
    }
}

impl From<OidcError> for SetupError {
    fn from(e: OidcError) -> Self {
        SetupError::Provider(e)
    }
}

impl From<std::io::Error> for SetupError {
    fn from(e: std::io::Error) -> Self {
        SetupError::Io(e)
    }
}

/// Settings that belong to the binary rather than to the provider library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    pub bind: String,
    pub subject_header: String,
    /// PKCS#8 PEM file with the signing key. A fresh key is generated when absent.
    pub signing_key_file: Option<PathBuf>,
}

impl ServerSettings {
    pub fn from_config(config: &OidcConfig) -> Result<Self, ConfigError> {
        let key_file: Option<String> = config.get_or("provider.signing.key.file", None)?;
        Ok(Self {
            bind: config.get_or("server.bind", DEFAULT_BIND.to_string())?,
            subject_header: config.get_or(
                "provider.subject.header",
                HeaderSubjectResolver::DEFAULT_HEADER.to_string(),
            )?,
            signing_key_file: key_file.map(PathBuf::from),
        })
    }
}

/// Register every `clients.N` entry.
pub fn clients_from_config(config: &OidcConfig) -> Result<ClientRegistry, SetupError> {
    let mut registry = ClientRegistry::new();
    for i in 0..config.list_len("clients") {
        let id: String = config.get(&format!("clients.{i}.id"))?;
        let secret: String = config.get(&format!("clients.{i}.secret"))?;
        let redirect_uris: Vec<String> = config.get(&format!("clients.{i}.redirect_uris"))?;
        debug!(client_id = %id, redirects = redirect_uris.len(), "Registering client");
        registry = registry.add_client(id, &secret, redirect_uris)?;
    }
    Ok(registry)
}

/// Load every `users.N` entry into an in-memory directory.
pub fn users_from_config(config: &OidcConfig) -> Result<InMemoryUserDirectory, ConfigError> {
    let mut directory = InMemoryUserDirectory::new();
    for i in 0..config.list_len("users") {
        let profile = UserProfile {
            subject: config.get(&format!("users.{i}.subject"))?,
            name: config.get_or(&format!("users.{i}.name"), None)?,
            email: config.get_or(&format!("users.{i}.email"), None)?,
            picture: config.get_or(&format!("users.{i}.picture"), None)?,
        };
        directory = directory.add_user(profile);
    }
    Ok(directory)
}

/// Assemble a provider from configuration.
pub fn build_provider(
    config: &OidcConfig,
    settings: &ServerSettings,
) -> Result<OidcProvider, SetupError> {
    let provider_config = ProviderConfig::from_config(config)?;
    let header = HeaderName::from_bytes(settings.subject_header.as_bytes())
        .map_err(|_| SetupError::InvalidHeader(settings.subject_header.clone()))?;
    let users = users_from_config(config)?;
    if users.is_empty() {
        info!("No users configured, every token request will fail");
    }

    let mut builder = OidcProvider::builder()
        .with_client_registry(clients_from_config(config)?)
        .with_user_directory(users)
        .with_subject_resolver(HeaderSubjectResolver::new(header));

    if let Some(path) = &settings.signing_key_file {
        let pem = std::fs::read_to_string(path)?;
        let key = SigningKey::from_pkcs8_pem(&pem, &provider_config.kid)?;
        info!(path = %path.display(), "Loaded signing key");
        builder = builder.with_signing_key(key.into());
    }

    Ok(builder.config(provider_config).build()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = "\
provider:
  issuer: http://op.test/
  base:
    path: /oidc
server:
  bind: 0.0.0.0:8000
clients:
  - id: app-a
    secret: secret-a
    redirect_uris:
      - http://a.test/cb
      - http://a.test/cb2
  - id: app-b
    secret: secret-b
    redirect_uris: [http://b.test/cb]
users:
  - subject: user-1
    email: one@example.com
  - subject: user-2
";

    fn config() -> OidcConfig {
        OidcConfig::from_yaml_str(YAML, "test").unwrap()
    }

    #[test]
    fn server_settings_default_when_absent() {
        let settings = ServerSettings::from_config(&OidcConfig::empty()).unwrap();
        assert_eq!(settings.bind, DEFAULT_BIND);
        assert_eq!(settings.subject_header, "x-authenticated-user");
        assert!(settings.signing_key_file.is_none());

        let settings = ServerSettings::from_config(&config()).unwrap();
        assert_eq!(settings.bind, "0.0.0.0:8000");
    }

    #[test]
    fn clients_are_registered_with_all_redirects() {
        let registry = clients_from_config(&config()).unwrap();
        assert_eq!(registry.len(), 2);
        let a = registry.lookup("app-a").unwrap();
        assert!(registry.validate_redirect(a, "http://a.test/cb2"));
        assert!(!registry.validate_redirect(a, "http://b.test/cb"));
    }

    #[test]
    fn client_without_secret_is_a_config_error() {
        let config =
            OidcConfig::from_yaml_str("clients:\n  - id: x\n    redirect_uris: [http://x/cb]\n", "test")
                .unwrap();
        assert!(matches!(
            clients_from_config(&config),
            Err(SetupError::Config(ConfigError::NotFound(_)))
        ));
    }

    #[test]
    fn users_keep_optional_claims() {
        let users = users_from_config(&config()).unwrap();
        assert_eq!(users.len(), 2);
    }

    #[test]
    fn provider_uses_configured_issuer_and_base_path() {
        let config = config();
        let settings = ServerSettings::from_config(&config).unwrap();
        let provider = build_provider(&config, &settings).unwrap();
        assert_eq!(provider.config().issuer, "http://op.test");
        assert_eq!(provider.config().base_path, "/oidc");
    }

    #[tokio::test]
    async fn configured_provider_serves_discovery_under_base_path() {
        use tower::ServiceExt;

        let config = config();
        let settings = ServerSettings::from_config(&config).unwrap();
        let router = build_provider(&config, &settings).unwrap().router();
        let resp = router
            .oneshot(
                axum::http::Request::get("/oidc/.well-known/openid-configuration")
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), axum::http::StatusCode::OK);
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let doc: mini_oidc_core::DiscoveryDocument = serde_json::from_slice(&body).unwrap();
        assert_eq!(doc.issuer, "http://op.test");
        assert_eq!(doc.token_endpoint, "http://op.test/oidc/token");
    }

    #[test]
    fn bad_header_name_is_rejected() {
        let settings = ServerSettings {
            bind: DEFAULT_BIND.into(),
            subject_header: "not a header".into(),
            signing_key_file: None,
        };
        assert!(matches!(
            build_provider(&config(), &settings),
            Err(SetupError::InvalidHeader(_))
        ));
    }
}
