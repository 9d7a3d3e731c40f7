use mini_oidc_core::DiscoveryDocument;

use crate::config::ProviderConfig;

pub const DISCOVERY_PATH: &str = "/.well-known/openid-configuration";
pub const JWKS_PATH: &str = "/.well-known/jwks.json";
pub const AUTHORIZE_PATH: &str = "/authorize";
pub const TOKEN_PATH: &str = "/token";

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

/// OpenID Connect discovery document advertising this provider's endpoints.
pub fn document(config: &ProviderConfig) -> DiscoveryDocument {
    DiscoveryDocument {
        issuer: config.issuer.clone(),
        authorization_endpoint: config.endpoint_url(AUTHORIZE_PATH),
        token_endpoint: config.endpoint_url(TOKEN_PATH),
        jwks_uri: config.endpoint_url(JWKS_PATH),
        response_types_supported: strings(&["code"]),
        id_token_signing_alg_values_supported: strings(&["RS256"]),
        subject_types_supported: strings(&["public"]),
        grant_types_supported: strings(&["authorization_code"]),
        token_endpoint_auth_methods_supported: strings(&["client_secret_post"]),
        scopes_supported: strings(&["openid", "profile", "email"]),
        claims_supported: strings(&[
            "iss", "sub", "aud", "exp", "iat", "name", "email", "picture",
        ]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_hang_off_issuer_and_base_path() {
        let config = ProviderConfig {
            issuer: "https://op.example.com".into(),
            base_path: "/oidc".into(),
            ..Default::default()
        };
        let doc = document(&config);
        assert_eq!(doc.issuer, "https://op.example.com");
        assert_eq!(doc.authorization_endpoint, "https://op.example.com/oidc/authorize");
        assert_eq!(doc.token_endpoint, "https://op.example.com/oidc/token");
        assert_eq!(doc.jwks_uri, "https://op.example.com/oidc/.well-known/jwks.json");
        assert_eq!(doc.response_types_supported, ["code"]);
        assert_eq!(doc.id_token_signing_alg_values_supported, ["RS256"]);
    }
}
