mod common;

use actix_web::{http::StatusCode, test};
use serde_json::{json, Value};
use wanderlog::config::GoogleConfig;
use wanderlog::oauth::GoogleOAuth;
use wanderlog::repo::AccountRepo;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::Harness;

fn google_at(server: &MockServer) -> GoogleOAuth {
    GoogleOAuth::new(GoogleConfig {
        client_id: "client-123".into(),
        client_secret: "shh".into(),
        redirect_uri: "http://localhost:4000/auth/google/callback".into(),
        auth_url: format!("{}/o/oauth2/v2/auth", server.uri()),
        token_url: format!("{}/token", server.uri()),
        userinfo_url: format!("{}/userinfo", server.uri()),
    })
}

async fn mount_provider(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("code=good-code"))
        .and(body_string_contains("grant_type=authorization_code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access_token": "at-1", "token_type": "Bearer" })))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({ "error": "invalid_grant" })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/userinfo"))
        .and(header("authorization", "Bearer at-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "email": "ana@example.com", "name": "Ana Lee" })))
        .mount(server)
        .await;
}

#[actix_web::test]
async fn login_redirects_to_the_consent_screen() {
    let server = MockServer::start().await;
    let h = Harness::new();
    let app = app!(h.state.clone().with_google(google_at(&server)));

    let req = test::TestRequest::get().uri("/auth/google").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    let location = resp.headers().get("location").unwrap().to_str().unwrap();
    assert!(location.starts_with(&format!("{}/o/oauth2/v2/auth?client_id=client-123", server.uri())));
    assert!(location.contains("response_type=code"));
}

#[actix_web::test]
async fn callback_links_one_account_per_email() {
    let server = MockServer::start().await;
    mount_provider(&server).await;
    let h = Harness::new();
    let app = app!(h.state.clone().with_google(google_at(&server)));

    let mut ids = Vec::new();
    for _ in 0..2 {
        let req = test::TestRequest::get().uri("/auth/google/callback?code=good-code").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["message"], "Google login successful");
        assert_eq!(body["user"]["provider"], "google");
        assert_eq!(body["user"]["name"], "Ana Lee");
        let token = body["token"].as_str().unwrap();
        ids.push(h.state.identity.verify_token(token).unwrap());
    }
    assert_eq!(ids[0], ids[1]);

    let account = h.repo.find_account_by_email("ana@example.com").await.unwrap().unwrap();
    assert_eq!(account.id, ids[0]);
    assert!(!account.has_local_secret());
}

#[actix_web::test]
async fn provider_rejection_is_a_bad_gateway() {
    let server = MockServer::start().await;
    mount_provider(&server).await;
    let h = Harness::new();
    let app = app!(h.state.clone().with_google(google_at(&server)));

    let req = test::TestRequest::get().uri("/auth/google/callback?code=stale").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Google login failed");

    let req = test::TestRequest::get().uri("/auth/google/callback").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn unconfigured_google_answers_503() {
    let h = Harness::new();
    let app = app!(h.state.clone());
    for uri in ["/auth/google", "/auth/google/callback?code=x"] {
        let req = test::TestRequest::get().uri(uri).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::SERVICE_UNAVAILABLE, "{uri}");
    }
}
