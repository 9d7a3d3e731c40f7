//! Minimal OpenID Connect provider.
//!
//! Issues single-use authorization codes at `/authorize` and exchanges them
//! at `/token` for RS256-signed ID tokens. Discovery and JWKS documents are
//! served alongside so relying parties can bootstrap themselves.
//!
//! # Example
//!
//! ```ignore
//! use mini_oidc_provider::{ClientRegistry, InMemoryUserDirectory, OidcProvider, UserProfile};
//!
//! let clients = ClientRegistry::new()
//!     .add_client("my-client-app", "my-client-secret", ["http://127.0.0.1:8080/auth/callback"])?;
//! let users = InMemoryUserDirectory::new().add_user(UserProfile {
//!     subject: "user-123".into(),
//!     email: Some("demo.user@example.com".into()),
//!     ..Default::default()
//! });
//!
//! let provider = OidcProvider::builder()
//!     .issuer("http://127.0.0.1:9090")
//!     .with_client_registry(clients)
//!     .with_user_directory(users)
//!     .build()?;
//!
//! let sweeper = provider.spawn_sweeper(cancel.clone());
//! axum::serve(listener, provider.router()).await?;
//! ```

pub mod authorize;
pub mod client;
pub mod code;
pub mod config;
pub mod directory;
pub mod discovery;
pub mod endpoint;
pub mod error;
pub mod keys;
pub mod token;

mod handlers;
mod state;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub use authorize::{
    validate_authorization_request, AuthorizationEndpoint, AuthorizationParams,
    AuthorizationRequest, HeaderSubjectResolver, SubjectResolver,
};
pub use client::{Client, ClientRegistry};
pub use code::{AuthorizationCode, AuthorizationCodeStore, RedeemError};
pub use config::ProviderConfig;
pub use directory::{InMemoryUserDirectory, UserDirectory, UserProfile};
pub use endpoint::{TokenEndpoint, TokenRequest};
pub use error::OidcError;
pub use keys::SigningKey;
pub use token::TokenIssuer;

use directory::UserDirectoryErased;
use state::ProviderState;

/// Builder for [`OidcProvider`].
pub struct OidcProviderBuilder {
    config: ProviderConfig,
    client_registry: ClientRegistry,
    user_directory: Option<Arc<dyn UserDirectoryErased>>,
    subject_resolver: Option<Arc<dyn SubjectResolver>>,
    signing_key: Option<Arc<SigningKey>>,
    code_store: Option<Arc<AuthorizationCodeStore>>,
}

impl OidcProviderBuilder {
    /// Replace the whole configuration.
    pub fn config(mut self, config: ProviderConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the issuer URL (`iss`). A trailing `/` is dropped.
    pub fn issuer(mut self, issuer: impl Into<String>) -> Self {
        self.config.issuer = issuer.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the base path for the endpoints.
    pub fn base_path(mut self, path: impl Into<String>) -> Self {
        self.config.base_path = path.into();
        self
    }

    /// Set the ID token lifetime in seconds.
    pub fn token_ttl(mut self, secs: u64) -> Self {
        self.config.id_token_ttl_secs = secs;
        self
    }

    /// Set the authorization code lifetime in seconds.
    pub fn code_ttl(mut self, secs: u64) -> Self {
        self.config.code_ttl_secs = secs;
        self
    }

    /// Send unauthenticated users to this page, with the incoming query.
    pub fn login_url(mut self, url: impl Into<String>) -> Self {
        self.config.login_url = Some(url.into());
        self
    }

    pub fn with_client_registry(mut self, registry: ClientRegistry) -> Self {
        self.client_registry = registry;
        self
    }

    /// Set the user directory (required).
    pub fn with_user_directory(mut self, directory: impl UserDirectory) -> Self {
        self.user_directory = Some(Arc::new(directory));
        self
    }

    /// Defaults to [`HeaderSubjectResolver::default`].
    pub fn with_subject_resolver(mut self, resolver: impl SubjectResolver) -> Self {
        self.subject_resolver = Some(Arc::new(resolver));
        self
    }

    /// Use an existing key instead of generating one at build time.
    pub fn with_signing_key(mut self, key: Arc<SigningKey>) -> Self {
        self.signing_key = Some(key);
        self
    }

    pub fn with_code_store(mut self, store: Arc<AuthorizationCodeStore>) -> Self {
        self.code_store = Some(store);
        self
    }

    pub fn build(self) -> Result<OidcProvider, OidcError> {
        let user_directory = self.user_directory.ok_or_else(|| {
            OidcError::Internal("a user directory is required, call with_user_directory()".into())
        })?;
        let signing_key = match self.signing_key {
            Some(key) => key,
            None => Arc::new(SigningKey::generate(&self.config.kid)?),
        };
        let code_store = self
            .code_store
            .unwrap_or_else(|| Arc::new(AuthorizationCodeStore::new()));
        let subject_resolver = self
            .subject_resolver
            .unwrap_or_else(|| Arc::new(HeaderSubjectResolver::default()));
        let registry = Arc::new(self.client_registry);
        let config = self.config;

        let issuer = Arc::new(TokenIssuer::new(
            signing_key.clone(),
            config.issuer.clone(),
            config.id_token_ttl_secs,
        ));
        let state = Arc::new(ProviderState {
            discovery: discovery::document(&config),
            jwks: signing_key.jwks(),
            authorize: AuthorizationEndpoint::new(
                registry.clone(),
                code_store.clone(),
                config.code_ttl(),
            ),
            token: TokenEndpoint::with_erased(registry.clone(), code_store.clone(), issuer, user_directory),
            subject_resolver,
            config,
        });

        info!(
            issuer = %state.config.issuer,
            kid = signing_key.kid(),
            clients = registry.len(),
            "OIDC provider ready"
        );

        Ok(OidcProvider {
            state,
            signing_key,
            code_store,
        })
    }
}

/// A configured provider: the HTTP surface plus handles on its shared parts.
pub struct OidcProvider {
    state: Arc<ProviderState>,
    signing_key: Arc<SigningKey>,
    code_store: Arc<AuthorizationCodeStore>,
}

impl OidcProvider {
    pub fn builder() -> OidcProviderBuilder {
        OidcProviderBuilder {
            config: ProviderConfig::default(),
            client_registry: ClientRegistry::new(),
            user_directory: None,
            subject_resolver: None,
            signing_key: None,
            code_store: None,
        }
    }

    /// Build the provider's Axum router.
    pub fn router(&self) -> Router {
        let router = Router::new()
            .route(discovery::DISCOVERY_PATH, get(handlers::discovery_handler))
            .route(discovery::JWKS_PATH, get(handlers::jwks_handler))
            .route(discovery::AUTHORIZE_PATH, get(handlers::authorize_handler))
            .route(discovery::TOKEN_PATH, post(handlers::token_handler))
            .with_state(self.state.clone());

        let base_path = self.state.config.base_path.as_str();
        if base_path.is_empty() {
            router
        } else {
            Router::new().nest(base_path, router)
        }
    }

    /// Start the expired-code sweeper at the configured interval.
    pub fn spawn_sweeper(&self, cancel: CancellationToken) -> JoinHandle<()> {
        self.code_store
            .spawn_sweeper(self.state.config.sweep_interval(), cancel)
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.state.config
    }

    pub fn signing_key(&self) -> &Arc<SigningKey> {
        &self.signing_key
    }

    pub fn code_store(&self) -> &Arc<AuthorizationCodeStore> {
        &self.code_store
    }

    pub fn token_endpoint(&self) -> &TokenEndpoint {
        &self.state.token
    }

    pub fn authorization_endpoint(&self) -> &AuthorizationEndpoint {
        &self.state.authorize
    }
}

pub mod prelude {
    //! Re-exports of the most commonly used provider types.
    pub use crate::{
        ClientRegistry, InMemoryUserDirectory, OidcProvider, UserDirectory, UserProfile,
    };
}
