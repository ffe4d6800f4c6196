mod common;

use actix_web::{http::StatusCode, test};
use serde_json::{json, Value};

use wanderlog::auth::TokenService;

use common::{bearer, Harness, SECRET};

fn signup_body(username: &str) -> Value {
    json!({ "name": "Ana", "surname": "Lee", "username": username, "password": "password1" })
}

#[actix_web::test]
async fn signup_then_login_returns_token_without_hash() {
    let h = Harness::new();
    let app = app!(h.state.clone());

    let req = test::TestRequest::post().uri("/auth/signup").set_json(signup_body("ana")).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["ok"], true);
    let id = body["_id"].as_str().unwrap().to_string();

    let req = test::TestRequest::post()
        .uri("/auth/login")
        .set_json(json!({ "username": "ana", "password": "password1" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["user"]["id"], id.as_str());
    assert!(body["user"].get("passwordHash").is_none());
    let token = body["token"].as_str().unwrap();
    assert_eq!(h.state.identity.verify_token(token).unwrap().to_string(), id);
}

#[actix_web::test]
async fn signup_rejects_duplicates_and_weak_input() {
    let h = Harness::new();
    let app = app!(h.state.clone());

    let req = test::TestRequest::post().uri("/auth/signup").set_json(signup_body("ana")).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);

    let req = test::TestRequest::post().uri("/auth/signup").set_json(signup_body("ana")).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Username already exists");

    let req = test::TestRequest::post()
        .uri("/auth/signup")
        .set_json(json!({ "name": "Bo", "surname": "Ng", "username": "bo", "password": "short" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::post()
        .uri("/auth/signup")
        .set_json(json!({ "name": "Bo", "username": "bo", "password": "password1" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "All fields are required");
}

#[actix_web::test]
async fn login_failures_are_unauthorized() {
    let h = Harness::new();
    h.account("ana").await;
    let app = app!(h.state.clone());

    for (username, password, message) in [
        ("ana", "wrong-password", "Invalid credentials"),
        ("nobody", "password1", "User is not found"),
        ("", "", "Password and Username are required"),
    ] {
        let req = test::TestRequest::post()
            .uri("/auth/login")
            .set_json(json!({ "username": username, "password": password }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "{username}");
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["message"], message);
    }
}

#[actix_web::test]
async fn protected_routes_need_a_valid_bearer() {
    let h = Harness::new();
    let app = app!(h.state.clone());

    let req = test::TestRequest::get().uri("/trips/allTrips").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::get().uri("/trips/allTrips").insert_header(bearer("not-a-jwt")).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Invalid token");
}

#[actix_web::test]
async fn expired_bearer_is_told_apart_from_a_forged_one() {
    let h = Harness::new();
    let (ana, _) = h.account("ana").await;
    let app = app!(h.state.clone());

    let stale = TokenService::with_ttl(SECRET, chrono::Duration::seconds(-10)).issue(ana).unwrap();
    let req = test::TestRequest::get().uri("/trips/allTrips").insert_header(bearer(&stale)).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Token expired");

    let forged = TokenService::new(b"another-secret-that-is-32-bytes-long").issue(ana).unwrap();
    let req = test::TestRequest::get().uri("/trips/allTrips").insert_header(bearer(&forged)).to_request();
    let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(body["message"], "Invalid token");
}

#[actix_web::test]
async fn only_the_holder_may_update_an_account() {
    let h = Harness::new();
    let (ana, ana_token) = h.account("ana").await;
    let (bo, _) = h.account("bo").await;
    let app = app!(h.state.clone());

    let req = test::TestRequest::patch()
        .uri(&format!("/auth/update/{bo}"))
        .insert_header(bearer(&ana_token))
        .set_json(json!({ "name": "Mallory" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

    let req = test::TestRequest::patch()
        .uri(&format!("/auth/update/{ana}"))
        .insert_header(bearer(&ana_token))
        .set_json(json!({ "name": "Anna", "password": "new-password" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["user"]["name"], "Anna");

    // the new secret works, the old one no longer does
    assert!(h.state.identity.authenticate("ana", "new-password").await.is_ok());
    assert!(h.state.identity.authenticate("ana", "password1").await.is_err());

    // taking someone else's handle collides
    let req = test::TestRequest::patch()
        .uri(&format!("/auth/update/{ana}"))
        .insert_header(bearer(&ana_token))
        .set_json(json!({ "username": "bo" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CONFLICT);
}

#[actix_web::test]
async fn search_is_case_insensitive_capped_and_needs_a_query() {
    let h = Harness::new();
    for i in 0..7 {
        h.account(&format!("traveller{i}")).await;
    }
    h.account("homebody").await;
    let app = app!(h.state.clone());

    let req = test::TestRequest::get().uri("/auth/search-users?q=TRAVEL").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    let users = body["users"].as_array().unwrap();
    assert_eq!(users.len(), 5);
    assert!(users.iter().all(|u| u["username"].as_str().unwrap().starts_with("traveller")));

    let req = test::TestRequest::get().uri("/auth/search-users?q=").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Query parameter required");
}

#[actix_web::test]
async fn profile_lists_both_follow_directions() {
    let h = Harness::new();
    let (ana, ana_token) = h.account("ana").await;
    let (bo, _) = h.account("bo").await;
    let app = app!(h.state.clone());

    let req = test::TestRequest::post()
        .uri(&format!("/follow/{bo}"))
        .insert_header(bearer(&ana_token))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let req = test::TestRequest::get().uri(&format!("/auth/user/{bo}")).to_request();
    let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(body["user"]["username"], "bo");
    assert_eq!(body["user"]["followers"], json!([ana]));
    assert_eq!(body["user"]["following"], json!([]));

    let req = test::TestRequest::get().uri(&format!("/auth/user/{ana}")).to_request();
    let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(body["user"]["following"], json!([bo]));

    let req = test::TestRequest::get().uri(&format!("/auth/user/{}", uuid::Uuid::new_v4())).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "User not found");
}
