use std::sync::Arc;

use mini_oidc_core::{DiscoveryDocument, JwksDocument};

use crate::authorize::{AuthorizationEndpoint, SubjectResolver};
use crate::config::ProviderConfig;
use crate::endpoint::TokenEndpoint;

/// Internal shared state for the provider's HTTP handlers.
pub(crate) struct ProviderState {
    pub config: ProviderConfig,
    pub discovery: DiscoveryDocument,
    pub jwks: JwksDocument,
    pub authorize: AuthorizationEndpoint,
    pub token: TokenEndpoint,
    pub subject_resolver: Arc<dyn SubjectResolver>,
}
