use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use dashmap::DashMap;
use mini_oidc_core::ProfileClaims;
use serde::{Deserialize, Serialize};

/// An end user as known to the user directory.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Unique, stable subject identifier (`sub`).
    pub subject: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub picture: Option<String>,
}

impl UserProfile {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            ..Default::default()
        }
    }

    /// Profile claims copied verbatim into the ID token.
    pub fn claims(&self) -> ProfileClaims {
        ProfileClaims {
            name: self.name.clone(),
            email: self.email.clone(),
            picture: self.picture.clone(),
        }
    }
}

/// Pluggable user directory: subject id -> profile.
///
/// Implement this trait to back the provider with your own storage
/// (SQL, LDAP, an upstream API, ...).
pub trait UserDirectory: Send + Sync + 'static {
    fn find_by_subject(&self, subject: &str) -> impl Future<Output = Option<UserProfile>> + Send;
}

/// Object-safe wrapper for `UserDirectory`.
pub(crate) trait UserDirectoryErased: Send + Sync {
    fn find_by_subject<'a>(
        &'a self,
        subject: &'a str,
    ) -> Pin<Box<dyn Future<Output = Option<UserProfile>> + Send + 'a>>;
}

impl<T: UserDirectory> UserDirectoryErased for T {
    fn find_by_subject<'a>(
        &'a self,
        subject: &'a str,
    ) -> Pin<Box<dyn Future<Output = Option<UserProfile>> + Send + 'a>> {
        Box::pin(UserDirectory::find_by_subject(self, subject))
    }
}

/// In-memory user directory for development and testing.
#[derive(Clone, Default)]
pub struct InMemoryUserDirectory {
    /// Map: subject -> profile
    users: Arc<DashMap<String, UserProfile>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a user, keyed by its subject.
    pub fn add_user(self, profile: UserProfile) -> Self {
        self.users.insert(profile.subject.clone(), profile);
        self
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

impl UserDirectory for InMemoryUserDirectory {
    fn find_by_subject(&self, subject: &str) -> impl Future<Output = Option<UserProfile>> + Send {
        let result = self.users.get(subject).map(|entry| entry.value().clone());
        async move { result }
    }
}
