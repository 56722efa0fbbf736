mod common;

use axum::http::{header, StatusCode};
use chrono::{Duration, Utc};

use common::{body_text, form_request, html_request, TestApp, PASSWORD};
use halluapp::{
    models::NewInvitation,
    store::{InvitationStore, RoleStore, UserStore},
};

const CODE: &str = "INVITE1234560ABCD";

fn registration_body(email: &str, code: Option<&str>) -> String {
    let mut body = format!(
        "name=New+Member&email={}&password=secret-pass&password_confirmation=secret-pass",
        urlencoding::encode(email)
    );
    if let Some(code) = code {
        body.push_str("&code=");
        body.push_str(code);
    }
    body
}

async fn seed_invitation(app: &TestApp, role_slug: &str, is_used: bool, expired: bool) {
    let admin = app.create_user("admin@example.com", &["admin"]).await;
    let invitation = app
        .store
        .insert_invitation(&NewInvitation {
            created_by: admin.id,
            code: CODE.to_string(),
            role_slug: role_slug.to_string(),
            redirect_url: None,
            expires_at: expired.then(|| Utc::now() - Duration::minutes(5)),
        })
        .await
        .unwrap();

    if is_used {
        let filler = halluapp::models::NewUser {
            name: "Earlier".to_string(),
            email: "earlier@example.com".to_string(),
            password_hash: "x".to_string(),
            firebase_uid: None,
        };
        let role = app.store.find_role_by_slug(role_slug).await.unwrap().unwrap();
        app.store
            .register_invited_user(&filler, invitation.id, role.id)
            .await
            .unwrap()
            .unwrap();
    }
}

#[tokio::test]
async fn open_registration_assigns_default_role() {
    let app = TestApp::new().await;

    let response = app
        .send(form_request("/register", &registration_body("new@example.com", None)))
        .await;
    assert!(response.status().is_redirection());
    assert_eq!(response.headers()[header::LOCATION], "/dashboard");
    assert!(response.headers().get(header::SET_COOKIE).is_some());

    let user = app.store.find_user_by_email("new@example.com").await.unwrap().unwrap();
    assert!(app.store.user_has_role(user.id, "customer").await.unwrap());
}

#[tokio::test]
async fn invitation_grants_its_role_and_is_consumed() {
    let app = TestApp::new().await;
    seed_invitation(&app, "service-provider", false, false).await;

    let response = app
        .send(form_request("/register", &registration_body("sp@example.com", Some(CODE))))
        .await;
    assert!(response.status().is_redirection());

    let user = app.store.find_user_by_email("sp@example.com").await.unwrap().unwrap();
    assert!(app.store.user_has_role(user.id, "service-provider").await.unwrap());
    assert!(!app.store.user_has_role(user.id, "customer").await.unwrap());

    let invitation = app.store.find_invitation_by_code(CODE).await.unwrap().unwrap();
    assert!(invitation.is_used);
}

#[tokio::test]
async fn used_code_is_refused_and_creates_no_user() {
    let app = TestApp::new().await;
    seed_invitation(&app, "customer", true, false).await;
    let users_before = app.store.user_count().await;

    let response = app
        .send(form_request("/register", &registration_body("late@example.com", Some(CODE))))
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body_text(response).await.contains("invalid or has expired"));
    assert_eq!(app.store.user_count().await, users_before);
}

#[tokio::test]
async fn expired_code_is_refused_and_creates_no_user() {
    let app = TestApp::new().await;
    seed_invitation(&app, "customer", false, true).await;
    let users_before = app.store.user_count().await;

    let response = app
        .send(form_request("/register", &registration_body("late@example.com", Some(CODE))))
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(app.store.user_count().await, users_before);

    let invitation = app.store.find_invitation_by_code(CODE).await.unwrap().unwrap();
    assert!(!invitation.is_used);
}

#[tokio::test]
async fn duplicate_email_is_a_validation_error() {
    let app = TestApp::new().await;
    app.create_user("taken@example.com", &[]).await;

    let response = app
        .send(form_request("/register", &registration_body("taken@example.com", None)))
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body_text(response).await.contains("already been taken"));
}

#[tokio::test]
async fn register_page_shows_invited_role() {
    let app = TestApp::new().await;
    seed_invitation(&app, "service-provider", false, false).await;

    let uri = format!("/register?code={}", CODE);
    let html = body_text(app.send(html_request("GET", &uri, None)).await).await;
    assert!(html.contains("Service Provider"));
    assert!(html.contains(CODE));
}

#[tokio::test]
async fn password_login_and_logout() {
    let app = TestApp::new().await;
    app.create_user("member@example.com", &["customer"]).await;

    let body = format!("email=member%40example.com&password={}", urlencoding::encode(PASSWORD));
    let response = app.send(form_request("/login", &body)).await;
    assert!(response.status().is_redirection());
    assert_eq!(response.headers()[header::LOCATION], "/dashboard");

    let response = app
        .send(form_request("/login", "email=member%40example.com&password=wrong-password"))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
