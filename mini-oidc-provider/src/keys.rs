use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::{Algorithm, EncodingKey};
use mini_oidc_core::{Jwk, JwksDocument};
use rand::rngs::OsRng;
use rsa::pkcs8::{DecodePrivateKey, EncodePrivateKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};

use crate::error::OidcError;

const RSA_BITS: usize = 2048;

/// RSA signing key for ID tokens and the matching JWKS entry.
///
/// Created once per process and shared by the token issuer and the JWKS
/// endpoint, so the published key is always the one tokens are signed with.
pub struct SigningKey {
    encoding_key: EncodingKey,
    /// Base64url-encoded RSA modulus (for JWKS).
    n: String,
    /// Base64url-encoded RSA public exponent (for JWKS).
    e: String,
    kid: String,
}

impl SigningKey {
    /// Generate a new RSA-2048 key pair.
    pub fn generate(kid: &str) -> Result<Self, OidcError> {
        let private_key = RsaPrivateKey::new(&mut OsRng, RSA_BITS)
            .map_err(|e| OidcError::Internal(format!("failed to generate RSA key: {e}")))?;
        Self::from_private_key(&private_key, kid)
    }

    /// Load an RSA private key from a PKCS#8 PEM document.
    pub fn from_pkcs8_pem(pem: &str, kid: &str) -> Result<Self, OidcError> {
        let private_key = RsaPrivateKey::from_pkcs8_pem(pem)
            .map_err(|e| OidcError::Internal(format!("failed to parse RSA key: {e}")))?;
        Self::from_private_key(&private_key, kid)
    }

    fn from_private_key(private_key: &RsaPrivateKey, kid: &str) -> Result<Self, OidcError> {
        let public_key = RsaPublicKey::from(private_key);

        // jsonwebtoken takes the private key as PEM.
        let pkcs8_pem = private_key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| OidcError::Internal(format!("failed to export RSA key: {e}")))?;
        let encoding_key = EncodingKey::from_rsa_pem(pkcs8_pem.as_bytes())
            .map_err(|e| OidcError::Internal(format!("failed to load RSA signing key: {e}")))?;

        Ok(Self {
            encoding_key,
            n: URL_SAFE_NO_PAD.encode(public_key.n().to_bytes_be()),
            e: URL_SAFE_NO_PAD.encode(public_key.e().to_bytes_be()),
            kid: kid.to_string(),
        })
    }

    pub fn kid(&self) -> &str {
        &self.kid
    }

    pub fn algorithm(&self) -> Algorithm {
        Algorithm::RS256
    }

    pub(crate) fn encoding_key(&self) -> &EncodingKey {
        &self.encoding_key
    }

    /// The public key set relying parties verify against.
    pub fn jwks(&self) -> JwksDocument {
        JwksDocument {
            keys: vec![Jwk {
                kty: "RSA".into(),
                kid: Some(self.kid.clone()),
                alg: Some("RS256".into()),
                key_use: Some("sig".into()),
                n: Some(self.n.clone()),
                e: Some(self.e.clone()),
            }],
        }
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey")
            .field("kid", &self.kid)
            .field("alg", &"RS256")
            .finish_non_exhaustive()
    }
}
