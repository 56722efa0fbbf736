mod common;

use axum::http::{header, StatusCode};
use chrono::{Duration, Utc};
use serde_json::json;

use common::{body_json, body_text, html_request, json_request, TestApp, APP_URL};
use halluapp::{
    models::{invitation::CODE_LENGTH, NewInvitation},
    store::InvitationStore,
};

#[tokio::test]
async fn admin_creates_invitation_with_register_link() {
    let app = TestApp::new().await;
    let admin = app.create_user("admin@example.com", &["admin"]).await;
    let cookie = app.session_cookie(&admin).await;

    let response = app
        .send(json_request(
            "POST",
            "/invitations",
            Some(&cookie),
            Some(json!({ "role_slug": "service-provider" })),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = body_json(response).await;
    let code = body["invitation"]["code"].as_str().unwrap().to_string();
    assert_eq!(code.len(), CODE_LENGTH);
    assert!(code.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    assert_eq!(body["invitation"]["role_slug"], "service-provider");
    assert_eq!(body["invitation"]["is_used"], false);
    assert_eq!(
        body["invite_url"],
        format!("{}/register?code={}", APP_URL, code)
    );
    assert!(!body["qr_code"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn redirect_url_replaces_register_page() {
    let app = TestApp::new().await;
    let admin = app.create_user("admin@example.com", &["admin"]).await;
    let cookie = app.session_cookie(&admin).await;

    let response = app
        .send(json_request(
            "POST",
            "/invitations",
            Some(&cookie),
            Some(json!({
                "role_slug": "customer",
                "redirect_url": "https://partner.example.com/join",
            })),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = body_json(response).await;
    let code = body["invitation"]["code"].as_str().unwrap();
    assert_eq!(
        body["invite_url"],
        format!("https://partner.example.com/join?code={}", code)
    );
}

#[tokio::test]
async fn invalid_role_and_past_expiry_are_rejected() {
    let app = TestApp::new().await;
    let admin = app.create_user("admin@example.com", &["admin"]).await;
    let cookie = app.session_cookie(&admin).await;

    let response = app
        .send(json_request(
            "POST",
            "/invitations",
            Some(&cookie),
            Some(json!({ "role_slug": "admin" })),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    assert!(body["errors"]["role_slug"].is_array());

    let yesterday = (Utc::now() - Duration::days(1)).to_rfc3339();
    let response = app
        .send(json_request(
            "POST",
            "/invitations",
            Some(&cookie),
            Some(json!({ "role_slug": "customer", "expires_at": yesterday })),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    assert!(body["errors"]["expires_at"].is_array());
}

#[tokio::test]
async fn non_admin_is_forbidden() {
    let app = TestApp::new().await;
    let customer = app.create_user("customer@example.com", &["customer"]).await;
    let cookie = app.session_cookie(&customer).await;

    let response = app
        .send(json_request(
            "POST",
            "/invitations",
            Some(&cookie),
            Some(json!({ "role_slug": "customer" })),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = body_json(response).await;
    assert_eq!(body["message"], "Unauthorized. Admin access required.");

    let response = app.send(html_request("GET", "/invitations", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn anonymous_requests_are_refused() {
    let app = TestApp::new().await;

    let response = app.send(json_request("GET", "/invitations", None, None)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app.send(html_request("GET", "/invitations", None)).await;
    assert!(response.status().is_redirection());
    assert_eq!(response.headers()[header::LOCATION], "/login");
}

#[tokio::test]
async fn list_is_paginated_newest_first_with_creator() {
    let app = TestApp::new().await;
    let admin = app.create_user("admin@example.com", &["admin"]).await;
    let cookie = app.session_cookie(&admin).await;

    for _ in 0..12 {
        let response = app
            .send(json_request(
                "POST",
                "/invitations",
                Some(&cookie),
                Some(json!({ "role_slug": "customer" })),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let body = body_json(app.send(json_request("GET", "/invitations", Some(&cookie), None)).await).await;
    let page = &body["invitations"];
    assert_eq!(page["total"], 12);
    assert_eq!(page["per_page"], 10);
    assert_eq!(page["last_page"], 2);
    assert_eq!(page["data"].as_array().unwrap().len(), 10);
    assert_eq!(page["data"][0]["creator"]["email"], "admin@example.com");

    let ids: Vec<i64> = page["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|row| row["id"].as_i64().unwrap())
        .collect();
    assert!(ids.windows(2).all(|pair| pair[0] > pair[1]));

    let body = body_json(
        app.send(json_request("GET", "/invitations?page=2", Some(&cookie), None))
            .await,
    )
    .await;
    assert_eq!(body["invitations"]["data"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn index_renders_html_for_browsers() {
    let app = TestApp::new().await;
    let admin = app.create_user("admin@example.com", &["admin"]).await;
    let cookie = app.session_cookie(&admin).await;

    let response = app.send(html_request("GET", "/invitations", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("Service Provider"));
}

#[tokio::test]
async fn delete_removes_invitation() {
    let app = TestApp::new().await;
    let admin = app.create_user("admin@example.com", &["admin"]).await;
    let cookie = app.session_cookie(&admin).await;

    let invitation = app
        .store
        .insert_invitation(&NewInvitation {
            created_by: admin.id,
            code: "ABCDEFGHIJKL00001".to_string(),
            role_slug: "customer".to_string(),
            redirect_url: None,
            expires_at: None,
        })
        .await
        .unwrap();

    let uri = format!("/invitations/{}", invitation.id);
    let response = app.send(json_request("DELETE", &uri, Some(&cookie), None)).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(app.store.find_invitation(invitation.id).await.unwrap().is_none());

    let response = app.send(json_request("DELETE", &uri, Some(&cookie), None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn code_check_reports_validity() {
    let app = TestApp::new().await;
    let admin = app.create_user("admin@example.com", &["admin"]).await;

    app.store
        .insert_invitation(&NewInvitation {
            created_by: admin.id,
            code: "ABCDEFGHIJKL00001".to_string(),
            role_slug: "service-provider".to_string(),
            redirect_url: None,
            expires_at: Some(Utc::now() - Duration::hours(1)),
        })
        .await
        .unwrap();

    let response = app
        .send(json_request("GET", "/invite/ABCDEFGHIJKL00001", None, None))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["valid"], false);
    assert_eq!(body["role_slug"], "service-provider");

    let response = app
        .send(json_request("GET", "/invite/NOPE", None, None))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn huge_page_number_returns_an_empty_page() {
    let app = TestApp::new().await;
    let admin = app.create_user("admin@example.com", &["admin"]).await;
    let cookie = app.session_cookie(&admin).await;

    let response = app
        .send(json_request(
            "GET",
            "/invitations?page=9223372036854775807",
            Some(&cookie),
            None,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert!(body["invitations"]["data"].as_array().unwrap().is_empty());
    assert_eq!(body["invitations"]["total"], 0);
}

#[tokio::test]
async fn browser_delete_redirects_and_unknown_id_is_not_found() {
    let app = TestApp::new().await;
    let admin = app.create_user("admin@example.com", &["admin"]).await;
    let cookie = app.session_cookie(&admin).await;

    let response = app
        .send(json_request("DELETE", "/invitations/4242", Some(&cookie), None))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["message"], "Invitation not found");

    let invitation = app
        .store
        .insert_invitation(&NewInvitation {
            created_by: admin.id,
            code: "ABCDEFGHIJKL00002".to_string(),
            role_slug: "customer".to_string(),
            redirect_url: None,
            expires_at: None,
        })
        .await
        .unwrap();

    let uri = format!("/invitations/{}", invitation.id);
    let response = app.send(html_request("DELETE", &uri, Some(&cookie))).await;
    assert!(response.status().is_redirection());
    assert_eq!(response.headers()[header::LOCATION], "/invitations");
    assert!(app.store.find_invitation(invitation.id).await.unwrap().is_none());
}
