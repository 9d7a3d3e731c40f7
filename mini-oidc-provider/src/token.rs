use std::sync::Arc;

use jsonwebtoken::{encode, Header};
use mini_oidc_core::{IdTokenClaims, ProfileClaims};

use crate::error::OidcError;
use crate::keys::SigningKey;

/// Builds and signs ID tokens.
///
/// Holds the same `Arc<SigningKey>` the JWKS endpoint publishes.
pub struct TokenIssuer {
    key: Arc<SigningKey>,
    issuer: String,
    ttl_secs: u64,
}

impl TokenIssuer {
    pub fn new(key: Arc<SigningKey>, issuer: impl Into<String>, ttl_secs: u64) -> Self {
        Self {
            key,
            issuer: issuer.into(),
            ttl_secs,
        }
    }

    /// Sign an ID token for `subject_id`, addressed to `client_id`.
    ///
    /// `iat = now`, `exp = now + ttl`. The header carries `kid` and `typ: JWT`.
    pub fn issue_id_token(
        &self,
        client_id: &str,
        subject_id: &str,
        profile: ProfileClaims,
        now: u64,
    ) -> Result<String, OidcError> {
        let claims = IdTokenClaims {
            iss: self.issuer.clone(),
            sub: subject_id.to_string(),
            aud: client_id.into(),
            exp: now.saturating_add(self.ttl_secs),
            iat: now,
            nbf: None,
            profile,
        };

        let mut header = Header::new(self.key.algorithm());
        header.kid = Some(self.key.kid().to_string());
        header.typ = Some("JWT".into());

        encode(&header, &claims, self.key.encoding_key())
            .map_err(|e| OidcError::Internal(format!("failed to sign ID token: {e}")))
    }

    pub fn ttl_secs(&self) -> u64 {
        self.ttl_secs
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
    use jsonwebtoken::{decode, DecodingKey, Validation};
    use std::sync::OnceLock;

    fn key() -> Arc<SigningKey> {
        static KEY: OnceLock<Arc<SigningKey>> = OnceLock::new();
        KEY.get_or_init(|| Arc::new(SigningKey::generate("test-key").unwrap()))
            .clone()
    }

    fn segment(token: &str, index: usize) -> serde_json::Value {
        let part = token.split('.').nth(index).unwrap();
        serde_json::from_slice(&URL_SAFE_NO_PAD.decode(part).unwrap()).unwrap()
    }

    #[test]
    fn header_carries_kid_alg_and_typ() {
        let issuer = TokenIssuer::new(key(), "http://op", 3600);
        let token = issuer
            .issue_id_token("c1", "u1", ProfileClaims::default(), 1_000)
            .unwrap();

        assert_eq!(token.split('.').count(), 3);
        let header = segment(&token, 0);
        assert_eq!(header["alg"], "RS256");
        assert_eq!(header["kid"], "test-key");
        assert_eq!(header["typ"], "JWT");
    }

    #[test]
    fn payload_binds_client_subject_and_times() {
        let issuer = TokenIssuer::new(key(), "http://op", 3600);
        let profile = ProfileClaims {
            name: Some("Demo".into()),
            email: Some("demo@example.com".into()),
            picture: Some("https://example.com/a.png".into()),
        };
        let token = issuer.issue_id_token("c1", "u1", profile, 1_000).unwrap();

        let payload = segment(&token, 1);
        assert_eq!(payload["iss"], "http://op");
        assert_eq!(payload["sub"], "u1");
        assert_eq!(payload["aud"], "c1");
        assert_eq!(payload["iat"], 1_000);
        assert_eq!(payload["exp"], 4_600);
        assert_eq!(payload["name"], "Demo");
        assert_eq!(payload["email"], "demo@example.com");
        assert_eq!(payload["picture"], "https://example.com/a.png");
        assert!(payload.get("nbf").is_none());
    }

    #[test]
    fn signature_verifies_with_published_key() {
        let key = key();
        let issuer = TokenIssuer::new(key.clone(), "http://op", 3600);
        let now = mini_oidc_core::unix_now();
        let token = issuer
            .issue_id_token("c1", "u1", ProfileClaims::default(), now)
            .unwrap();

        let jwk = &key.jwks().keys[0];
        let decoding =
            DecodingKey::from_rsa_components(jwk.n.as_deref().unwrap(), jwk.e.as_deref().unwrap())
                .unwrap();
        let mut validation = Validation::new(key.algorithm());
        validation.set_audience(&["c1"]);
        validation.set_issuer(&["http://op"]);
        let data = decode::<IdTokenClaims>(&token, &decoding, &validation).unwrap();
        assert_eq!(data.claims.sub, "u1");
    }
}
