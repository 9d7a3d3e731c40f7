use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rand::rngs::OsRng;
use rand::RngCore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::OidcError;

/// Random bytes per code (256 bits before encoding).
const CODE_BYTES: usize = 32;
/// Attempts before giving up on finding an unused code.
const MAX_ISSUE_ATTEMPTS: usize = 8;

/// A pending authorization code and what it was issued for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationCode {
    pub code: String,
    pub client_id: String,
    pub subject_id: String,
    /// Integer UTC seconds.
    pub issued_at: u64,
    /// Integer UTC seconds. Redeemable while `now <= expires_at`.
    pub expires_at: u64,
}

impl AuthorizationCode {
    pub fn is_expired(&self, now: u64) -> bool {
        now > self.expires_at
    }
}

/// Why a redemption failed. Never shown to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedeemError {
    /// Never issued, already redeemed, or already swept.
    Unknown,
    /// Present but past its expiry; it has been removed.
    Expired,
}

impl std::fmt::Display for RedeemError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RedeemError::Unknown => write!(f, "unknown or already redeemed code"),
            RedeemError::Expired => write!(f, "expired code"),
        }
    }
}

impl std::error::Error for RedeemError {}

type CodeGenerator = Box<dyn Fn() -> String + Send + Sync>;

/// Single-use, TTL-bound authorization codes.
///
/// Backed by a `DashMap`: every operation holds one shard lock for a single
/// map access and never awaits, so `issue` and `redeem` are linearizable per
/// code. `redeem` removes before it checks, which makes "exactly one winner"
/// hold under any number of concurrent redeemers of the same code.
pub struct AuthorizationCodeStore {
    codes: DashMap<String, AuthorizationCode>,
    generate: CodeGenerator,
}

impl AuthorizationCodeStore {
    /// Create a store that mints 256-bit codes from the OS RNG.
    pub fn new() -> Self {
        Self::with_code_generator(random_token)
    }

    /// Create a store with a custom code generator.
    pub fn with_code_generator(generate: impl Fn() -> String + Send + Sync + 'static) -> Self {
        Self {
            codes: DashMap::new(),
            generate: Box::new(generate),
        }
    }

    /// Issue a code bound to `client_id` and `subject_id`, valid for `ttl` from `now`.
    ///
    /// A generated code that collides with a pending one is discarded and a new
    /// one drawn; an existing entry is never overwritten.
    pub fn issue(
        &self,
        client_id: &str,
        subject_id: &str,
        ttl: Duration,
        now: u64,
    ) -> Result<String, OidcError> {
        for _ in 0..MAX_ISSUE_ATTEMPTS {
            let code = (self.generate)();
            match self.codes.entry(code) {
                Entry::Occupied(occupied) => {
                    drop(occupied);
                    warn!(client_id, "Authorization code collision, drawing a new code");
                }
                Entry::Vacant(vacant) => {
                    let code = vacant.key().clone();
                    vacant.insert(AuthorizationCode {
                        code: code.clone(),
                        client_id: client_id.to_string(),
                        subject_id: subject_id.to_string(),
                        issued_at: now,
                        expires_at: now.saturating_add(ttl.as_secs()),
                    });
                    debug!(client_id, subject_id, ttl_secs = ttl.as_secs(), "Issued authorization code");
                    return Ok(code);
                }
            }
        }
        Err(OidcError::Internal(
            "could not allocate a unique authorization code".into(),
        ))
    }

    /// Atomically consume `code`.
    ///
    /// The entry is removed whether or not it turns out to be expired, so a
    /// presented code is never redeemable again.
    pub fn redeem(&self, code: &str, now: u64) -> Result<AuthorizationCode, RedeemError> {
        let (_, entry) = self.codes.remove(code).ok_or(RedeemError::Unknown)?;
        if entry.is_expired(now) {
            return Err(RedeemError::Expired);
        }
        Ok(entry)
    }

    /// Drop every entry already past its expiry. Returns how many were removed.
    pub fn purge_expired(&self, now: u64) -> usize {
        let before = self.codes.len();
        self.codes.retain(|_, entry| !entry.is_expired(now));
        before.saturating_sub(self.codes.len())
    }

    /// Spawn a task that calls [`purge_expired`](Self::purge_expired) every
    /// `interval` until `cancel` fires.
    ///
    /// This only reclaims memory; expiry is enforced by `redeem` itself.
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("Authorization code sweeper stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        let purged = store.purge_expired(mini_oidc_core::unix_now());
                        if purged > 0 {
                            info!(purged, remaining = store.len(), "Purged expired authorization codes");
                        }
                    }
                }
            }
        })
    }

    /// Number of pending (possibly expired, not yet swept) codes.
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

impl Default for AuthorizationCodeStore {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn random_token() -> String {
    let mut bytes = [0u8; CODE_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
