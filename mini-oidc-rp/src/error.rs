/// Why an ID token was rejected. Every variant is final: nothing is retried
/// and no partial result is returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyError {
    /// Not three segments, undecodable header/payload, missing `kid`, or a
    /// payload lacking a required claim.
    MalformedToken(String),

    /// `alg` is unknown, not allowed, or not the algorithm the key declares.
    UnsupportedAlgorithm(String),

    /// The `kid` is not in the pre-fetched key set.
    UnknownKeyId(String),

    SignatureInvalid,
    IssuerMismatch,
    AudienceMismatch,
    TokenExpired,
    TokenNotYetValid,
}

impl std::fmt::Display for VerifyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VerifyError::MalformedToken(msg) => write!(f, "Malformed token: {msg}"),
            VerifyError::UnsupportedAlgorithm(alg) => write!(f, "Unsupported algorithm: {alg}"),
            VerifyError::UnknownKeyId(kid) => write!(f, "Unknown signing key: {kid}"),
            VerifyError::SignatureInvalid => write!(f, "Invalid signature"),
            VerifyError::IssuerMismatch => write!(f, "Issuer mismatch"),
            VerifyError::AudienceMismatch => write!(f, "Audience mismatch"),
            VerifyError::TokenExpired => write!(f, "Token expired"),
            VerifyError::TokenNotYetValid => write!(f, "Token not yet valid"),
        }
    }
}

impl std::error::Error for VerifyError {}

/// Failure to complete an HTTP round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Connecting, sending or reading the response failed.
    Request(String),
    /// The response body could not be read.
    Body(String),
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::Request(msg) => write!(f, "HTTP request failed: {msg}"),
            TransportError::Body(msg) => write!(f, "Failed to read HTTP response: {msg}"),
        }
    }
}

impl std::error::Error for TransportError {}

/// Relying-party login flow errors. Any of these ends the login attempt.
#[derive(Debug)]
pub enum FlowError {
    /// The callback's `state` does not equal the one issued for this session.
    StateMismatch,

    /// The provider redirected back with an `error` parameter.
    AuthorizationDenied {
        error: String,
        description: Option<String>,
    },

    /// The callback carries neither a code nor an error.
    InvalidCallback(String),

    Transport(TransportError),

    /// The code exchange did not finish within the caller's deadline.
    Timeout,

    /// The token endpoint answered with a non-2xx status.
    TokenEndpoint { status: u16, error: String },

    /// A 2xx token response that does not parse.
    InvalidTokenResponse(String),

    /// Discovery or JWKS bootstrap failed.
    Discovery(String),

    /// The returned ID token did not verify.
    Verification(VerifyError),
}

impl std::fmt::Display for FlowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlowError::StateMismatch => write!(f, "State mismatch"),
            FlowError::AuthorizationDenied { error, description } => match description {
                Some(description) => write!(f, "Authorization denied: {error} ({description})"),
                None => write!(f, "Authorization denied: {error}"),
            },
            FlowError::InvalidCallback(msg) => write!(f, "Invalid callback: {msg}"),
            FlowError::Transport(err) => write!(f, "{err}"),
            FlowError::Timeout => write!(f, "Token exchange timed out"),
            FlowError::TokenEndpoint { status, error } => {
                write!(f, "Token endpoint returned {status}: {error}")
            }
            FlowError::InvalidTokenResponse(msg) => write!(f, "Invalid token response: {msg}"),
            FlowError::Discovery(msg) => write!(f, "Provider discovery failed: {msg}"),
            FlowError::Verification(err) => write!(f, "ID token rejected: {err}"),
        }
    }
}

impl std::error::Error for FlowError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FlowError::Transport(err) => Some(err),
            FlowError::Verification(err) => Some(err),
            _ => None,
        }
    }
}

impl From<TransportError> for FlowError {
    fn from(err: TransportError) -> Self {
        FlowError::Transport(err)
    }
}

impl From<VerifyError> for FlowError {
    fn from(err: VerifyError) -> Self {
        FlowError::Verification(err)
    }
}
