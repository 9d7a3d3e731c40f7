use std::collections::HashSet;
use std::str::FromStr;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, Validation};
use mini_oidc_core::IdTokenClaims;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::VerifierConfig;
use crate::error::VerifyError;
use crate::jwks::KeySet;

/// The two header members verification depends on. Read by hand so that an
/// algorithm name `jsonwebtoken` does not know (e.g. `none`) still gets a
/// precise rejection.
#[derive(Deserialize)]
struct RawHeader {
    alg: String,
    #[serde(default)]
    kid: Option<String>,
}

/// Verifies ID tokens against a pre-fetched [`KeySet`].
///
/// Checks run in a fixed order and the first failure rejects the token:
/// 1. structure and header decoding
/// 2. algorithm allow-list
/// 3. key lookup by `kid` (no network access)
/// 4. signature, then typed payload decoding
/// 5. `iss`, `aud`, `exp`, `nbf`
pub struct IdTokenVerifier {
    keys: KeySet,
    config: VerifierConfig,
}

impl IdTokenVerifier {
    pub fn new(keys: KeySet, config: VerifierConfig) -> Self {
        Self { keys, config }
    }

    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    /// Verify against the configured issuer and audience.
    pub fn verify(&self, raw: &str, now: u64) -> Result<IdTokenClaims, VerifyError> {
        self.verify_with(raw, &self.config.issuer, &self.config.audience, now)
    }

    pub fn verify_with(
        &self,
        raw: &str,
        expected_issuer: &str,
        expected_audience: &str,
        now: u64,
    ) -> Result<IdTokenClaims, VerifyError> {
        let result = self.check(raw, expected_issuer, expected_audience, now);
        match &result {
            Ok(claims) => debug!(sub = %claims.sub, "ID token verified"),
            Err(err) => warn!(error = %err, "ID token rejected"),
        }
        result
    }

    fn check(
        &self,
        raw: &str,
        expected_issuer: &str,
        expected_audience: &str,
        now: u64,
    ) -> Result<IdTokenClaims, VerifyError> {
        // Step 1: structure and header
        let segments: Vec<&str> = raw.split('.').collect();
        if segments.len() != 3 {
            return Err(VerifyError::MalformedToken(format!(
                "expected 3 segments, found {}",
                segments.len()
            )));
        }
        let header_bytes = URL_SAFE_NO_PAD
            .decode(segments[0])
            .map_err(|e| VerifyError::MalformedToken(format!("header is not base64url: {e}")))?;
        let header: RawHeader = serde_json::from_slice(&header_bytes)
            .map_err(|e| VerifyError::MalformedToken(format!("header is not valid JSON: {e}")))?;

        // Step 2: algorithm
        let algorithm = Algorithm::from_str(&header.alg)
            .map_err(|_| VerifyError::UnsupportedAlgorithm(header.alg.clone()))?;
        if !self.config.allowed_algorithms.contains(&algorithm) {
            return Err(VerifyError::UnsupportedAlgorithm(header.alg));
        }

        // Step 3: key
        let kid = header
            .kid
            .ok_or_else(|| VerifyError::MalformedToken("header missing 'kid'".into()))?;
        let entry = self
            .keys
            .get(&kid)
            .ok_or_else(|| VerifyError::UnknownKeyId(kid.clone()))?;
        if let Some(key_alg) = entry.alg() {
            if key_alg != header.alg {
                return Err(VerifyError::UnsupportedAlgorithm(format!(
                    "{} (key '{kid}' is {key_alg})",
                    header.alg
                )));
            }
        }

        // Step 4: signature and payload. Claim checks are done below so that
        // each failure maps to its own error.
        let mut validation = Validation::new(algorithm);
        validation.algorithms = vec![algorithm];
        validation.required_spec_claims = HashSet::new();
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;

        let claims = decode::<IdTokenClaims>(raw, &entry.key, &validation)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => VerifyError::SignatureInvalid,
                ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
                    VerifyError::UnsupportedAlgorithm(header.alg.clone())
                }
                _ => VerifyError::MalformedToken(e.to_string()),
            })?
            .claims;

        // Step 5: claims
        if claims.iss != expected_issuer {
            return Err(VerifyError::IssuerMismatch);
        }
        if !claims.aud.contains(expected_audience) {
            return Err(VerifyError::AudienceMismatch);
        }
        let leeway = self.config.leeway_secs;
        if now > claims.exp.saturating_add(leeway) {
            return Err(VerifyError::TokenExpired);
        }
        if let Some(nbf) = claims.nbf {
            if now.saturating_add(leeway) < nbf {
                return Err(VerifyError::TokenNotYetValid);
            }
        }

        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verifier() -> IdTokenVerifier {
        IdTokenVerifier::new(KeySet::default(), VerifierConfig::new("http://op", "c1"))
    }

    fn segment(json: &str) -> String {
        URL_SAFE_NO_PAD.encode(json)
    }

    #[test]
    fn wrong_segment_count_is_malformed() {
        let v = verifier();
        assert!(matches!(v.verify("a.b", 0), Err(VerifyError::MalformedToken(_))));
        assert!(matches!(v.verify("a.b.c.d", 0), Err(VerifyError::MalformedToken(_))));
        assert!(matches!(v.verify("", 0), Err(VerifyError::MalformedToken(_))));
    }

    #[test]
    fn garbage_header_is_malformed() {
        let v = verifier();
        assert!(matches!(v.verify("!!!.e30.sig", 0), Err(VerifyError::MalformedToken(_))));
        let not_json = format!("{}.e30.sig", segment("nope"));
        assert!(matches!(v.verify(&not_json, 0), Err(VerifyError::MalformedToken(_))));
    }

    #[test]
    fn alg_none_is_unsupported() {
        let token = format!(
            "{}.{}.",
            segment(r#"{"alg":"none","kid":"k1"}"#),
            segment(r#"{"iss":"http://op","sub":"u1","aud":"c1","exp":9999999999,"iat":0}"#)
        );
        assert_eq!(
            verifier().verify(&token, 0),
            Err(VerifyError::UnsupportedAlgorithm("none".into()))
        );
    }

    #[test]
    fn known_but_disallowed_alg_is_unsupported() {
        let token = format!("{}.e30.sig", segment(r#"{"alg":"HS256","kid":"k1"}"#));
        assert!(matches!(
            verifier().verify(&token, 0),
            Err(VerifyError::UnsupportedAlgorithm(_))
        ));
    }

    #[test]
    fn missing_kid_is_malformed_and_unknown_kid_is_rejected() {
        let no_kid = format!("{}.e30.sig", segment(r#"{"alg":"RS256"}"#));
        assert!(matches!(verifier().verify(&no_kid, 0), Err(VerifyError::MalformedToken(_))));

        let unknown = format!("{}.e30.sig", segment(r#"{"alg":"RS256","kid":"k9"}"#));
        assert_eq!(
            verifier().verify(&unknown, 0),
            Err(VerifyError::UnknownKeyId("k9".into()))
        );
    }
}
