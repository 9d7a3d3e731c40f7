//! Shared building blocks for the mini-oidc provider and relying party.
//!
//! Holds the wire types both sides must agree on (ID token claims, discovery
//! and JWKS documents, token endpoint responses) plus the configuration
//! loader used by the server binary.

pub mod claims;
pub mod config;
pub mod metadata;
pub mod time;
pub mod token;

pub use claims::{Audience, IdTokenClaims, ProfileClaims};
pub use config::{ConfigError, ConfigValue, FromConfigValue, OidcConfig};
pub use metadata::{DiscoveryDocument, Jwk, JwksDocument};
pub use time::unix_now;
pub use token::{OAuthErrorBody, TokenResponse};
