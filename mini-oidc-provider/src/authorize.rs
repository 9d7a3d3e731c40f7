use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderMap, HeaderName};
use tracing::{debug, warn};
use url::Url;

use crate::client::ClientRegistry;
use crate::code::AuthorizationCodeStore;
use crate::error::OidcError;

/// Raw query parameters of an authorization request.
///
/// Every member is optional here; presence is checked by
/// [`validate_authorization_request`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorizationParams {
    pub client_id: Option<String>,
    pub redirect_uri: Option<String>,
    pub response_type: Option<String>,
    pub state: Option<String>,
    pub scope: Option<String>,
}

impl AuthorizationParams {
    /// Parse an `application/x-www-form-urlencoded` query. The first
    /// occurrence of a repeated parameter wins.
    pub fn from_query(query: &str) -> Self {
        let mut params = Self::default();
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            let slot = match &*key {
                "client_id" => &mut params.client_id,
                "redirect_uri" => &mut params.redirect_uri,
                "response_type" => &mut params.response_type,
                "state" => &mut params.state,
                "scope" => &mut params.scope,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.into_owned());
            }
        }
        params
    }
}

/// An authorization request whose client and redirect URI have been checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationRequest {
    pub client_id: String,
    pub redirect_uri: Url,
    pub state: String,
    pub scope: Option<String>,
}

/// Check an authorization request against the registry.
///
/// Order matters: the client and its redirect URI are established first, and
/// no error produced here ever redirects anywhere.
pub fn validate_authorization_request(
    registry: &ClientRegistry,
    params: &AuthorizationParams,
) -> Result<AuthorizationRequest, OidcError> {
    let client_id = params
        .client_id
        .as_deref()
        .ok_or_else(|| OidcError::InvalidRequest("missing 'client_id' parameter".into()))?;
    let Some(client) = registry.lookup(client_id) else {
        warn!(client_id, "Authorization request for unknown client");
        return Err(OidcError::InvalidClient("unknown client".into()));
    };

    let redirect_uri = params.redirect_uri.as_deref().unwrap_or_default();
    if !registry.validate_redirect(client, redirect_uri) {
        warn!(client_id, redirect_uri, "Unregistered redirect URI");
        return Err(OidcError::InvalidRedirect(
            "redirect_uri is not registered for this client".into(),
        ));
    }
    // Registered URIs were parsed at registration time.
    let redirect_uri = Url::parse(redirect_uri)
        .map_err(|e| OidcError::Internal(format!("registered redirect URI does not parse: {e}")))?;

    match params.response_type.as_deref() {
        Some("code") => {}
        other => {
            warn!(client_id, response_type = ?other, "Unsupported response_type");
            return Err(OidcError::UnsupportedResponseType(
                "only response_type=code is supported".into(),
            ));
        }
    }

    let state = params.state.as_deref().unwrap_or_default();
    if state.is_empty() {
        return Err(OidcError::InvalidRequest("missing 'state' parameter".into()));
    }

    Ok(AuthorizationRequest {
        client_id: client_id.to_string(),
        redirect_uri,
        state: state.to_string(),
        scope: params.scope.clone(),
    })
}

/// Front half of the flow: request validation and code issuance.
pub struct AuthorizationEndpoint {
    registry: Arc<ClientRegistry>,
    codes: Arc<AuthorizationCodeStore>,
    code_ttl: Duration,
}

impl AuthorizationEndpoint {
    pub fn new(
        registry: Arc<ClientRegistry>,
        codes: Arc<AuthorizationCodeStore>,
        code_ttl: Duration,
    ) -> Self {
        Self {
            registry,
            codes,
            code_ttl,
        }
    }

    pub fn validate(&self, params: &AuthorizationParams) -> Result<AuthorizationRequest, OidcError> {
        validate_authorization_request(&self.registry, params)
    }

    /// Issue a code for `subject_id` and build the redirect back to the client.
    ///
    /// `code` and `state` are appended to whatever query the registered
    /// redirect URI already carries.
    pub fn approve(
        &self,
        request: &AuthorizationRequest,
        subject_id: &str,
        now: u64,
    ) -> Result<Url, OidcError> {
        let code = self
            .codes
            .issue(&request.client_id, subject_id, self.code_ttl, now)?;
        let mut location = request.redirect_uri.clone();
        location
            .query_pairs_mut()
            .append_pair("code", &code)
            .append_pair("state", &request.state);
        debug!(client_id = %request.client_id, subject_id, "Authorization approved");
        Ok(location)
    }
}

/// Tells the authorize endpoint who the end user is.
///
/// Login and consent happen elsewhere; whatever sits in front of the provider
/// reports the outcome through this trait.
pub trait SubjectResolver: Send + Sync + 'static {
    /// The authenticated subject id, or `None` when nobody is logged in.
    fn resolve(&self, headers: &HeaderMap) -> Option<String>;
}

/// Reads the subject from a header set by a trusted login proxy.
#[derive(Debug, Clone)]
pub struct HeaderSubjectResolver {
    header: HeaderName,
}

impl HeaderSubjectResolver {
    pub const DEFAULT_HEADER: &'static str = "x-authenticated-user";

    pub fn new(header: HeaderName) -> Self {
        Self { header }
    }
}

impl Default for HeaderSubjectResolver {
    fn default() -> Self {
        Self::new(HeaderName::from_static(Self::DEFAULT_HEADER))
    }
}

impl SubjectResolver for HeaderSubjectResolver {
    fn resolve(&self, headers: &HeaderMap) -> Option<String> {
        let value = headers.get(&self.header)?.to_str().ok()?.trim();
        (!value.is_empty()).then(|| value.to_string())
    }
}
