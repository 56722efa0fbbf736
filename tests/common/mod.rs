#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, Response},
    Router,
};
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use halluapp::{
    config::Config,
    create_router,
    identity::{IdentityError, IdentityVerifier, VerifiedIdentity},
    models::{Catalog, NewUser, User},
    seed::seed_roles_and_permissions,
    state::AppState,
    store::{MemoryStore, RoleStore, SessionStore, Store, UserStore},
    utils::{create_token, hash_password},
};

pub const APP_URL: &str = "https://halluapp.test";
pub const JWT_SECRET: &str = "integration-test-secret";
pub const PASSWORD: &str = "correct horse battery";

/// Accepts tokens of the form `valid:<uid>:<email>[:<name>]`; an empty email
/// segment yields an identity without an email claim. The `unverified:` prefix
/// works the same but reports the email as unverified.
pub struct FakeVerifier;

#[async_trait]
impl IdentityVerifier for FakeVerifier {
    async fn verify(&self, token: &str) -> Result<VerifiedIdentity, IdentityError> {
        let mut parts = token.split(':');
        let email_verified = match parts.next() {
            Some("valid") => true,
            Some("unverified") => false,
            _ => return Err(IdentityError::Rejected("bad signature".to_string())),
        };
        let subject = parts
            .next()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| IdentityError::Malformed("missing subject".to_string()))?;
        let email = parts.next().filter(|s| !s.is_empty()).map(str::to_string);
        let name = parts.next().map(str::to_string);

        Ok(VerifiedIdentity {
            subject: subject.to_string(),
            email,
            email_verified,
            name,
        })
    }
}

pub fn test_config() -> Config {
    Config::from_lookup(|name| match name {
        "JWT_SECRET" => Some(JWT_SECRET.to_string()),
        "APP_URL" => Some(APP_URL.to_string()),
        _ => None,
    })
    .unwrap()
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
}

impl TestApp {
    pub async fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        seed_roles_and_permissions(&*store).await.unwrap();

        let state = AppState::new(
            store.clone() as Arc<dyn Store>,
            Arc::new(FakeVerifier),
            Catalog::embedded().unwrap(),
            test_config(),
        );

        Self {
            router: create_router(state),
            store,
        }
    }

    pub async fn create_user(&self, email: &str, roles: &[&str]) -> User {
        let user = self
            .store
            .create_user(&NewUser {
                name: "Test User".to_string(),
                email: email.to_string(),
                password_hash: hash_password(PASSWORD).unwrap(),
                firebase_uid: None,
            })
            .await
            .unwrap();

        for slug in roles {
            let role = self.store.find_role_by_slug(slug).await.unwrap().unwrap();
            self.store.attach_role(user.id, role.id).await.unwrap();
        }
        user
    }

    /// `Cookie` header value for a fresh session belonging to `user`.
    pub async fn session_cookie(&self, user: &User) -> String {
        let session = self
            .store
            .create_session(user.id, Utc::now() + Duration::hours(1))
            .await
            .unwrap();
        let token = create_token(&session, JWT_SECRET).unwrap();
        format!("auth_token={}", token)
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }
}

pub fn json_request(method: &str, uri: &str, cookie: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::ACCEPT, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub fn html_request(method: &str, uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

pub fn form_request(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}
