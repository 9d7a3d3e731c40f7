use std::collections::HashMap;

use jsonwebtoken::DecodingKey;
use mini_oidc_core::{Jwk, JwksDocument};
use tracing::{debug, warn};
use url::Url;

use crate::error::FlowError;
use crate::transport::{HttpRequest, HttpTransport};

/// A verification key together with the algorithm it is pinned to, if any.
pub struct KeyEntry {
    pub(crate) key: DecodingKey,
    /// The JWK's `alg` member.
    pub(crate) alg: Option<String>,
}

impl KeyEntry {
    fn from_jwk(jwk: &Jwk) -> Result<Self, String> {
        match jwk.kty.as_str() {
            "RSA" => {
                let n = jwk
                    .n
                    .as_deref()
                    .ok_or_else(|| "RSA key missing 'n' component".to_string())?;
                let e = jwk
                    .e
                    .as_deref()
                    .ok_or_else(|| "RSA key missing 'e' component".to_string())?;
                let key = DecodingKey::from_rsa_components(n, e)
                    .map_err(|err| format!("failed to construct RSA decoding key: {err}"))?;
                Ok(Self {
                    key,
                    alg: jwk.alg.clone(),
                })
            }
            other => Err(format!("unsupported key type: {other}")),
        }
    }

    pub fn alg(&self) -> Option<&str> {
        self.alg.as_deref()
    }
}

/// Provider keys indexed by `kid`, fetched once at bootstrap.
///
/// Verification only ever reads from this set; an unknown `kid` is a
/// rejection, never a trigger for a network refresh.
#[derive(Default)]
pub struct KeySet {
    keys: HashMap<String, KeyEntry>,
}

impl KeySet {
    /// Keep every usable key that has a `kid`. Others are skipped.
    pub fn from_document(document: &JwksDocument) -> Self {
        let mut keys = HashMap::new();
        for jwk in &document.keys {
            let Some(kid) = &jwk.kid else {
                debug!(kty = %jwk.kty, "Skipping JWK without kid");
                continue;
            };
            match KeyEntry::from_jwk(jwk) {
                Ok(entry) => {
                    keys.insert(kid.clone(), entry);
                }
                Err(reason) => warn!(kid = %kid, %reason, "Skipping unusable JWK"),
            }
        }
        Self { keys }
    }

    /// Fetch and parse the provider's JWKS.
    pub async fn fetch<T: HttpTransport>(transport: &T, jwks_uri: &Url) -> Result<Self, FlowError> {
        let response = transport.execute(HttpRequest::get(jwks_uri.clone())).await?;
        if !response.status.is_success() {
            return Err(FlowError::Discovery(format!(
                "JWKS endpoint returned {}",
                response.status
            )));
        }
        let document: JwksDocument = serde_json::from_slice(&response.body)
            .map_err(|e| FlowError::Discovery(format!("failed to parse JWKS: {e}")))?;

        let keys = Self::from_document(&document);
        if keys.is_empty() {
            return Err(FlowError::Discovery("JWKS contains no usable keys".into()));
        }
        debug!(keys = keys.len(), "Fetched provider JWKS");
        Ok(keys)
    }

    pub fn get(&self, kid: &str) -> Option<&KeyEntry> {
        self.keys.get(kid)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rsa_jwk(kid: Option<&str>) -> Jwk {
        // Any well-formed base64url modulus works for building the key.
        Jwk {
            kty: "RSA".into(),
            kid: kid.map(String::from),
            alg: Some("RS256".into()),
            key_use: Some("sig".into()),
            n: Some("sXchDaQebHnPiGvyDOAT4saGEUetSyo9MKLOoWFsueri23bOdgWp4Dy1WlUzewbgBHod5pcM9H95GQRV3JDXboIRROSBigeC5yjU1hGzHHyXss8UDprecbAYxknTcQkhslANGRUZmdTOQ5qTRsLAt6BTYuyvVRdhS8exSZEy_c4gs_7svlJJQ4H9_NxsiIoLwAEk7-Q3UXERGYw_75IDrGA84-lA_-Ct4eTlXHBIY2EaV7t7LjJaynVJCpkv4LKjTTAumiGUIuQhrNhZLuF_RJLqHpM2kgWFLU7-VTdL1VbC2tejvcI2BlMkEpk1BzBZI0KQB0GaDWFLN-aEAw3vRw".into()),
            e: Some("AQAB".into()),
        }
    }

    #[test]
    fn keys_without_kid_or_of_other_types_are_skipped() {
        let mut ec = rsa_jwk(Some("ec"));
        ec.kty = "EC".into();
        let mut broken = rsa_jwk(Some("broken"));
        broken.n = None;

        let set = KeySet::from_document(&JwksDocument {
            keys: vec![rsa_jwk(Some("k1")), rsa_jwk(None), ec, broken],
        });
        assert_eq!(set.len(), 1);
        assert_eq!(set.get("k1").and_then(KeyEntry::alg), Some("RS256"));
        assert!(set.get("ec").is_none());
        assert!(set.get("broken").is_none());
    }
}
