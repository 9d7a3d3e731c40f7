use std::sync::Arc;

use axum::extract::{RawQuery, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Form, Json};
use mini_oidc_core::{unix_now, DiscoveryDocument, JwksDocument};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::authorize::AuthorizationParams;
use crate::endpoint::TokenRequest;
use crate::error::OidcError;
use crate::state::ProviderState;

/// RFC 6749 §5.1 required headers for token responses.
type TokenResponseHeaders = [(header::HeaderName, &'static str); 2];
const TOKEN_HEADERS: TokenResponseHeaders = [
    (header::CACHE_CONTROL, "no-store"),
    (header::PRAGMA, "no-cache"),
];

/// Token request parameters (form-urlencoded).
#[derive(Debug, Deserialize)]
pub(crate) struct TokenForm {
    pub grant_type: Option<String>,
    pub code: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

/// GET /.well-known/openid-configuration
pub(crate) async fn discovery_handler(
    State(state): State<Arc<ProviderState>>,
) -> Json<DiscoveryDocument> {
    Json(state.discovery.clone())
}

/// GET /.well-known/jwks.json
pub(crate) async fn jwks_handler(State(state): State<Arc<ProviderState>>) -> Json<JwksDocument> {
    Json(state.jwks.clone())
}

/// GET /authorize
pub(crate) async fn authorize_handler(
    State(state): State<Arc<ProviderState>>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> Result<Response, OidcError> {
    let query = query.unwrap_or_default();
    let request = state
        .authorize
        .validate(&AuthorizationParams::from_query(&query))?;

    match state.subject_resolver.resolve(&headers) {
        Some(subject) => {
            let location = state.authorize.approve(&request, &subject, unix_now())?;
            Ok(redirect(location.as_str()))
        }
        None => match state.config.login_url.as_deref() {
            Some(login_url) => {
                debug!(client_id = %request.client_id, "No authenticated user, sending to login");
                let separator = if login_url.contains('?') { '&' } else { '?' };
                Ok(redirect(&format!("{login_url}{separator}{query}")))
            }
            None => {
                warn!(client_id = %request.client_id, "No authenticated user and no login page configured");
                Err(OidcError::LoginRequired(
                    "end user is not authenticated".into(),
                ))
            }
        },
    }
}

fn redirect(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

/// POST /token
pub(crate) async fn token_handler(
    State(state): State<Arc<ProviderState>>,
    Form(form): Form<TokenForm>,
) -> Result<impl IntoResponse, OidcError> {
    if let Some(grant_type) = form.grant_type.as_deref() {
        if grant_type != "authorization_code" {
            if let Some(code) = form.code.as_deref() {
                state.token.discard_code(code, unix_now());
            }
            return Err(OidcError::UnsupportedGrantType(format!(
                "grant_type '{grant_type}' is not supported"
            )));
        }
    }
    let code = form
        .code
        .ok_or_else(|| OidcError::InvalidRequest("missing 'code' parameter".into()))?;

    // Missing credentials still go through the endpoint so the code is burned.
    let request = TokenRequest {
        code,
        client_id: form.client_id.unwrap_or_default(),
        client_secret: form.client_secret.unwrap_or_default(),
    };
    let response = state
        .token
        .handle_token_request(&request, unix_now())
        .await?;

    // RFC 6749 §5.1: token responses MUST include Cache-Control: no-store.
    Ok((TOKEN_HEADERS, Json(response)))
}
