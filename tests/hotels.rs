mod common;

use std::sync::Arc;

use actix_web::{http::StatusCode, test};
use serde_json::{json, Value};
use wanderlog::hotels::{RapidApiHotels, NO_ADDRESS, NO_RATING, PLACEHOLDER_PHOTO};
use wanderlog::retry::RetryPolicy;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::Harness;

fn upstream_body() -> Value {
    json!({
        "data": [
            {
                "result_type": "lodging",
                "result_object": {
                    "name": "Hotel Artemide",
                    "address": "Via Nazionale 22, Rome",
                    "rating": "4.5",
                    "latitude": "41.9",
                    "longitude": 12.49,
                    "photo": { "images": { "large": { "url": "https://img.example/artemide.jpg" } } }
                }
            },
            { "result_type": "geos", "result_object": { "name": "Rome" } },
            { "result_type": "lodging", "result_object": { "name": "Bare Inn" } }
        ]
    })
}

fn harness_with(server: &MockServer) -> Harness {
    let mut h = Harness::new();
    let hotels = RapidApiHotels::new(server.uri(), "travel-advisor.test", "test-key", RetryPolicy::no_delay(3));
    h.state = h.state.clone().with_hotels(Arc::new(hotels));
    h
}

#[actix_web::test]
async fn keeps_only_lodging_and_fills_defaults() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/locations/search"))
        .and(query_param("query", "Rome"))
        .and(header("x-rapidapi-key", "test-key"))
        .and(header("x-rapidapi-host", "travel-advisor.test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(upstream_body()))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness_with(&server);
    let app = app!(h.state.clone());
    let req = test::TestRequest::get().uri("/api/hotels?city=Rome").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    let hotels = body["hotels"].as_array().unwrap();
    assert_eq!(hotels.len(), 2);

    assert_eq!(hotels[0]["name"], "Hotel Artemide");
    assert_eq!(hotels[0]["rating"], "4.5");
    assert_eq!(hotels[0]["photoUrl"], "https://img.example/artemide.jpg");
    assert_eq!(hotels[0]["lat"], 41.9);
    assert_eq!(hotels[0]["lng"], 12.49);

    assert_eq!(hotels[1]["address"], NO_ADDRESS);
    assert_eq!(hotels[1]["rating"], NO_RATING);
    assert_eq!(hotels[1]["photoUrl"], PLACEHOLDER_PHOTO);
    assert!(hotels[1]["lat"].is_null());
}

#[actix_web::test]
async fn transient_upstream_failure_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/locations/search"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/locations/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(upstream_body()))
        .mount(&server)
        .await;

    let h = harness_with(&server);
    let app = app!(h.state.clone());
    let req = test::TestRequest::get().uri("/api/hotels?city=Rome").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["hotels"].as_array().unwrap().len(), 2);
}

#[actix_web::test]
async fn client_errors_are_not_retried_and_surface_as_502() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/locations/search"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness_with(&server);
    let app = app!(h.state.clone());
    let req = test::TestRequest::get().uri("/api/hotels?city=Rome").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Failed to fetch hotels");
}

#[actix_web::test]
async fn persistent_outage_gives_up_after_three_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/locations/search"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let h = harness_with(&server);
    let app = app!(h.state.clone());
    let req = test::TestRequest::get().uri("/api/hotels?city=Rome").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_GATEWAY);
}

#[actix_web::test]
async fn city_is_required_and_missing_key_means_503() {
    let server = MockServer::start().await;
    let h = harness_with(&server);
    let app = app!(h.state.clone());
    for uri in ["/api/hotels", "/api/hotels?city=", "/api/hotels?city=%20"] {
        let req = test::TestRequest::get().uri(uri).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{uri}");
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["message"], "City is required");
    }

    let unconfigured = Harness::new();
    let app = app!(unconfigured.state.clone());
    let req = test::TestRequest::get().uri("/api/hotels?city=Rome").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::SERVICE_UNAVAILABLE);
}
