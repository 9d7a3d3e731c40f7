use std::sync::{Arc, OnceLock};

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use jsonwebtoken::{decode, DecodingKey, Validation};
use mini_oidc_core::{IdTokenClaims, JwksDocument, TokenResponse};
use mini_oidc_provider::{
    ClientRegistry, InMemoryUserDirectory, OidcProvider, SigningKey, UserProfile,
};
use tower::ServiceExt;
use url::Url;

const CALLBACK: &str = "http://127.0.0.1:8080/auth/callback";

fn key() -> Arc<SigningKey> {
    static KEY: OnceLock<Arc<SigningKey>> = OnceLock::new();
    KEY.get_or_init(|| Arc::new(SigningKey::generate("it-key").unwrap()))
        .clone()
}

fn build_provider() -> OidcProvider {
    let clients = ClientRegistry::new()
        .add_client("my-client-app", "my-client-secret", [CALLBACK])
        .unwrap();
    let users = InMemoryUserDirectory::new().add_user(UserProfile {
        subject: "user-123".into(),
        name: Some("Demo User".into()),
        email: Some("demo.user@example.com".into()),
        picture: Some("https://example.com/avatar.png".into()),
    });
    OidcProvider::builder()
        .issuer("http://127.0.0.1:9090")
        .base_path("/oidc")
        .with_signing_key(key())
        .with_client_registry(clients)
        .with_user_directory(users)
        .build()
        .unwrap()
}

async fn body_bytes(resp: axum::http::Response<Body>) -> axum::body::Bytes {
    axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap()
}

async fn obtain_code(app: &axum::Router) -> String {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("client_id", "my-client-app")
        .append_pair("redirect_uri", CALLBACK)
        .append_pair("response_type", "code")
        .append_pair("scope", "openid profile email")
        .append_pair("state", "state-1")
        .finish();
    let resp = app
        .clone()
        .oneshot(
            Request::get(format!("/oidc/authorize?{query}"))
                .header("x-authenticated-user", "user-123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FOUND);

    let location = Url::parse(resp.headers()[header::LOCATION].to_str().unwrap()).unwrap();
    location
        .query_pairs()
        .find(|(k, _)| k == "code")
        .map(|(_, v)| v.into_owned())
        .unwrap()
}

fn exchange(code: &str) -> Request<Body> {
    let body = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("grant_type", "authorization_code")
        .append_pair("code", code)
        .append_pair("client_id", "my-client-app")
        .append_pair("client_secret", "my-client-secret")
        .append_pair("redirect_uri", CALLBACK)
        .finish();
    Request::post("/oidc/token")
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from(body))
        .unwrap()
}

/// Full round trip: authorize, exchange, then verify the ID token against the
/// published JWKS.
#[tokio::test]
async fn authorize_exchange_and_verify() {
    let provider = build_provider();
    let app = provider.router();

    let code = obtain_code(&app).await;
    let resp = app.clone().oneshot(exchange(&code)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let tokens: TokenResponse = serde_json::from_slice(&body_bytes(resp).await).unwrap();

    let resp = app
        .oneshot(
            Request::get("/oidc/.well-known/jwks.json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let jwks: JwksDocument = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    let jwk = &jwks.keys[0];

    let decoding =
        DecodingKey::from_rsa_components(jwk.n.as_deref().unwrap(), jwk.e.as_deref().unwrap())
            .unwrap();
    let mut validation = Validation::new(jsonwebtoken::Algorithm::RS256);
    validation.set_audience(&["my-client-app"]);
    validation.set_issuer(&["http://127.0.0.1:9090"]);
    let data = decode::<IdTokenClaims>(&tokens.id_token, &decoding, &validation).unwrap();

    assert_eq!(data.header.kid, jwk.kid);
    assert_eq!(data.claims.sub, "user-123");
    assert_eq!(data.claims.profile.name.as_deref(), Some("Demo User"));
    assert_eq!(
        data.claims.profile.picture.as_deref(),
        Some("https://example.com/avatar.png")
    );
}

#[tokio::test]
async fn concurrent_exchanges_have_one_winner() {
    let provider = build_provider();
    let app = provider.router();
    let code = obtain_code(&app).await;

    let attempts = (0..8).map(|_| {
        let app = app.clone();
        let request = exchange(&code);
        tokio::spawn(async move { app.oneshot(request).await.unwrap().status() })
    });
    let mut ok = 0;
    let mut rejected = 0;
    for attempt in attempts.collect::<Vec<_>>() {
        match attempt.await.unwrap() {
            StatusCode::OK => ok += 1,
            StatusCode::BAD_REQUEST => rejected += 1,
            other => panic!("unexpected status {other}"),
        }
    }
    assert_eq!(ok, 1);
    assert_eq!(rejected, 7);
}
