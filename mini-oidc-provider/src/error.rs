use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use mini_oidc_core::OAuthErrorBody;
use tracing::error;

const INTERNAL_DESCRIPTION: &str = "internal error";

/// OIDC provider error type.
///
/// The message carried by each variant is what the caller sees as
/// `error_description`, except for `Internal`, whose detail is only logged.
/// The token endpoint only ever builds these with fixed generic messages;
/// precise causes go to the log instead.
#[derive(Debug)]
pub enum OidcError {
    /// Missing or malformed request parameters.
    InvalidRequest(String),
    /// Unknown client or failed client authentication.
    InvalidClient(String),
    /// Unknown, expired, already-redeemed or client-mismatched code.
    InvalidGrant(String),
    /// `redirect_uri` is not registered for the client.
    InvalidRedirect(String),
    /// Unsupported grant type.
    UnsupportedGrantType(String),
    /// Unsupported `response_type` at the authorization endpoint.
    UnsupportedResponseType(String),
    /// No authenticated end user and no login page to send them to.
    LoginRequired(String),
    /// Internal server error.
    Internal(String),
}

impl OidcError {
    pub fn error_code(&self) -> &'static str {
        match self {
            OidcError::InvalidRequest(_) | OidcError::InvalidRedirect(_) => "invalid_request",
            OidcError::InvalidClient(_) => "invalid_client",
            OidcError::InvalidGrant(_) => "invalid_grant",
            OidcError::UnsupportedGrantType(_) => "unsupported_grant_type",
            OidcError::UnsupportedResponseType(_) => "unsupported_response_type",
            OidcError::LoginRequired(_) => "login_required",
            OidcError::Internal(_) => "server_error",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            OidcError::InvalidRequest(_)
            | OidcError::InvalidGrant(_)
            | OidcError::InvalidRedirect(_)
            | OidcError::UnsupportedGrantType(_)
            | OidcError::UnsupportedResponseType(_) => StatusCode::BAD_REQUEST,
            OidcError::InvalidClient(_) | OidcError::LoginRequired(_) => StatusCode::UNAUTHORIZED,
            OidcError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn description(&self) -> &str {
        match self {
            OidcError::InvalidRequest(s)
            | OidcError::InvalidClient(s)
            | OidcError::InvalidGrant(s)
            | OidcError::InvalidRedirect(s)
            | OidcError::UnsupportedGrantType(s)
            | OidcError::UnsupportedResponseType(s)
            | OidcError::LoginRequired(s)
            | OidcError::Internal(s) => s,
        }
    }
}

impl IntoResponse for OidcError {
    fn into_response(self) -> Response {
        let description = match &self {
            OidcError::Internal(detail) => {
                error!(%detail, "Internal provider error");
                INTERNAL_DESCRIPTION
            }
            other => other.description(),
        };
        let body = OAuthErrorBody {
            error: self.error_code().to_string(),
            error_description: Some(description.to_string()),
        };
        (self.status_code(), Json(body)).into_response()
    }
}

impl std::fmt::Display for OidcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error_code(), self.description())
    }
}

impl std::error::Error for OidcError {}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body(err: OidcError) -> (StatusCode, OAuthErrorBody) {
        let resp = err.into_response();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn internal_detail_stays_out_of_the_response() {
        let (status, body) = body(OidcError::Internal(
            "failed to sign ID token: RSA key rejected".into(),
        ))
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error, "server_error");
        assert_eq!(body.error_description.as_deref(), Some("internal error"));
    }

    #[tokio::test]
    async fn protocol_errors_keep_their_description() {
        let (status, body) = body(OidcError::InvalidRequest("missing 'code' parameter".into())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.error, "invalid_request");
        assert_eq!(
            body.error_description.as_deref(),
            Some("missing 'code' parameter")
        );
    }
}
