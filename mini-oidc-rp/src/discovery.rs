use mini_oidc_core::DiscoveryDocument;
use tracing::debug;
use url::Url;

use crate::error::FlowError;
use crate::transport::{HttpRequest, HttpTransport};

/// Endpoints of a provider, taken from its discovery document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderMetadata {
    pub issuer: String,
    pub authorization_endpoint: Url,
    pub token_endpoint: Url,
    pub jwks_uri: Url,
}

impl ProviderMetadata {
    /// Validate a discovery document for `expected_issuer`.
    ///
    /// The advertised issuer must equal the configured one exactly, and RS256
    /// must be among the advertised signing algorithms.
    pub fn from_document(
        document: DiscoveryDocument,
        expected_issuer: &str,
    ) -> Result<Self, FlowError> {
        if document.issuer != expected_issuer {
            return Err(FlowError::Discovery(format!(
                "issuer mismatch: expected '{expected_issuer}', provider advertises '{}'",
                document.issuer
            )));
        }
        if !document
            .id_token_signing_alg_values_supported
            .iter()
            .any(|alg| alg == "RS256")
        {
            return Err(FlowError::Discovery(
                "provider does not advertise RS256 ID tokens".into(),
            ));
        }
        Ok(Self {
            authorization_endpoint: parse_endpoint("authorization_endpoint", &document.authorization_endpoint)?,
            token_endpoint: parse_endpoint("token_endpoint", &document.token_endpoint)?,
            jwks_uri: parse_endpoint("jwks_uri", &document.jwks_uri)?,
            issuer: document.issuer,
        })
    }

    /// Fetch `discovery_url` and validate it for `expected_issuer`.
    pub async fn discover<T: HttpTransport>(
        transport: &T,
        discovery_url: &str,
        expected_issuer: &str,
    ) -> Result<Self, FlowError> {
        let url = parse_endpoint("discovery_url", discovery_url)?;
        let response = transport.execute(HttpRequest::get(url)).await?;
        if !response.status.is_success() {
            return Err(FlowError::Discovery(format!(
                "discovery endpoint returned {}",
                response.status
            )));
        }
        let document: DiscoveryDocument = serde_json::from_slice(&response.body)
            .map_err(|e| FlowError::Discovery(format!("failed to parse discovery document: {e}")))?;

        let metadata = Self::from_document(document, expected_issuer)?;
        debug!(issuer = %metadata.issuer, "Discovered provider");
        Ok(metadata)
    }
}

fn parse_endpoint(name: &str, value: &str) -> Result<Url, FlowError> {
    Url::parse(value).map_err(|e| FlowError::Discovery(format!("invalid {name} '{value}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document(issuer: &str) -> DiscoveryDocument {
        DiscoveryDocument {
            issuer: issuer.into(),
            authorization_endpoint: format!("{issuer}/authorize"),
            token_endpoint: format!("{issuer}/token"),
            jwks_uri: format!("{issuer}/.well-known/jwks.json"),
            response_types_supported: vec!["code".into()],
            id_token_signing_alg_values_supported: vec!["RS256".into()],
            subject_types_supported: vec![],
            grant_types_supported: vec![],
            token_endpoint_auth_methods_supported: vec![],
            scopes_supported: vec![],
            claims_supported: vec![],
        }
    }

    #[test]
    fn accepts_matching_issuer() {
        let metadata = ProviderMetadata::from_document(document("http://op"), "http://op").unwrap();
        assert_eq!(metadata.token_endpoint.as_str(), "http://op/token");
    }

    #[test]
    fn rejects_issuer_that_differs_even_by_a_slash() {
        let result = ProviderMetadata::from_document(document("http://op/"), "http://op");
        assert!(matches!(result, Err(FlowError::Discovery(_))));
    }

    #[test]
    fn rejects_provider_without_rs256() {
        let mut doc = document("http://op");
        doc.id_token_signing_alg_values_supported = vec!["HS256".into()];
        assert!(matches!(
            ProviderMetadata::from_document(doc, "http://op"),
            Err(FlowError::Discovery(_))
        ));
    }
}
