use std::collections::{BTreeSet, HashMap};
use std::sync::OnceLock;

use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use password_hash::{PasswordHash, SaltString};
use rand::rngs::OsRng;
use url::Url;

use crate::error::OidcError;

/// A registered relying party. Immutable once registered.
#[derive(Debug, Clone)]
pub struct Client {
    id: String,
    /// argon2 PHC string of the client secret.
    secret_hash: String,
    redirect_uris: BTreeSet<String>,
}

impl Client {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn redirect_uris(&self) -> impl Iterator<Item = &str> {
        self.redirect_uris.iter().map(String::as_str)
    }
}

/// Registry of OAuth 2.0 clients allowed to use the authorization-code grant.
pub struct ClientRegistry {
    /// Map: client_id -> client
    clients: HashMap<String, Client>,
}

impl ClientRegistry {
    /// Create an empty client registry.
    pub fn new() -> Self {
        dummy_hash();
        Self {
            clients: HashMap::new(),
        }
    }

    /// Register a client. The secret is hashed with argon2.
    ///
    /// Every redirect URI must be an absolute URL without a fragment. They are
    /// stored exactly as given; no normalization happens here or at lookup.
    pub fn add_client<I, S>(
        mut self,
        client_id: impl Into<String>,
        client_secret: &str,
        redirect_uris: I,
    ) -> Result<Self, OidcError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let client_id = client_id.into();
        let mut uris = BTreeSet::new();
        for uri in redirect_uris {
            let uri = uri.into();
            let parsed = Url::parse(&uri).map_err(|e| {
                OidcError::InvalidRequest(format!("client '{client_id}': invalid redirect URI '{uri}': {e}"))
            })?;
            if parsed.fragment().is_some() {
                return Err(OidcError::InvalidRequest(format!(
                    "client '{client_id}': redirect URI '{uri}' must not contain a fragment"
                )));
            }
            uris.insert(uri);
        }

        let salt = SaltString::generate(&mut OsRng);
        let secret_hash = Argon2::default()
            .hash_password(client_secret.as_bytes(), &salt)
            .map_err(|e| OidcError::Internal(format!("failed to hash client secret: {e}")))?
            .to_string();

        self.clients.insert(
            client_id.clone(),
            Client {
                id: client_id,
                secret_hash,
                redirect_uris: uris,
            },
        );
        Ok(self)
    }

    /// Look up a client by id.
    pub fn lookup(&self, client_id: &str) -> Option<&Client> {
        self.clients.get(client_id)
    }

    /// Exact string match against the client's registered redirect URIs.
    pub fn validate_redirect(&self, client: &Client, uri: &str) -> bool {
        client.redirect_uris.contains(uri)
    }

    /// Validate client credentials.
    ///
    /// Returns `true` if the client exists and the secret matches. The argon2
    /// verifier compares digests in constant time and runs on the blocking
    /// pool so it does not stall the async runtime.
    pub async fn authenticate(&self, client_id: &str, client_secret: &str) -> bool {
        // Unknown ids still pay for a full verification against a throwaway hash.
        let (hash_str, known) = match self.clients.get(client_id) {
            Some(client) => (client.secret_hash.clone(), true),
            None => (dummy_hash().to_string(), false),
        };
        let secret = client_secret.to_string();
        let verified = tokio::task::spawn_blocking(move || {
            let Ok(parsed) = PasswordHash::new(&hash_str) else {
                return false;
            };
            Argon2::default()
                .verify_password(secret.as_bytes(), &parsed)
                .is_ok()
        })
        .await
        .unwrap_or(false);
        verified && known
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

/// argon2 hash of a random secret, with the same parameters as client hashes.
fn dummy_hash() -> &'static str {
    static DUMMY: OnceLock<String> = OnceLock::new();
    DUMMY.get_or_init(|| {
        let mut secret = [0u8; 32];
        rand::RngCore::fill_bytes(&mut OsRng, &mut secret);
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(&secret, &salt)
            .map(|hash| hash.to_string())
            .unwrap_or_default()
    })
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new()
    }
}
