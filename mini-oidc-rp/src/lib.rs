//! Relying-party side of mini-oidc.
//!
//! [`RelyingParty::bootstrap`] discovers a provider and fetches its keys once;
//! afterwards [`RelyingParty::complete_login`] turns a provider callback into
//! verified ID token claims, failing closed on any mismatch.

pub mod config;
pub mod discovery;
pub mod error;
pub mod flow;
pub mod jwks;
pub mod transport;
pub mod verifier;

pub use config::{RelyingPartyConfig, VerifierConfig};
pub use discovery::ProviderMetadata;
pub use error::{FlowError, TransportError, VerifyError};
pub use flow::{AuthorizationFlow, CallbackParams, CsrfState, LoginOutcome, RelyingParty};
pub use jwks::{KeyEntry, KeySet};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport, TracingTransport};
pub use verifier::IdTokenVerifier;

pub mod prelude {
    //! Re-exports of the most commonly used relying-party types.
    pub use crate::{
        CallbackParams, CsrfState, IdTokenVerifier, RelyingParty, RelyingPartyConfig,
        ReqwestTransport,
    };
}
