use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use convoy::api::{create_router, AppState};
use convoy::config::AppConfig;
use convoy::coordinator::LocationCoordinator;
use convoy::directory::InMemoryDirectory;
use convoy::domain::Group;
use serde_json::{json, Value};
use tower::ServiceExt;

struct Harness {
    router: Router,
    group: Group,
    token: String,
    other_token: String,
}

fn harness() -> Harness {
    let directory = Arc::new(InMemoryDirectory::new());
    let (lead, token) = directory.register_member("Lead");
    let (other, other_token) = directory.register_member("Other");
    let group = directory.create_group("road trip", &lead.id);
    directory.join_group(&group.code, &other.id).unwrap();

    let coordinator = LocationCoordinator::new(AppConfig::default_config(), directory.clone());
    let router = create_router(AppState::new(coordinator, directory));
    Harness {
        router,
        group,
        token,
        other_token,
    }
}

async fn call(
    router: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn health_is_public() {
    let h = harness();
    let (status, body) = call(&h.router, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn requests_without_valid_token_are_unauthorized() {
    let h = harness();
    let uri = format!("/api/groups/{}/locations", h.group.id);

    let (status, body) = call(&h.router, Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());

    let (status, _) = call(&h.router, Method::GET, &uri, Some("forged"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn location_update_then_list_and_nearest() {
    let h = harness();
    let group_id = h.group.id.to_string();

    let (status, body) = call(
        &h.router,
        Method::POST,
        "/api/location/update",
        Some(&h.token),
        Some(json!({"groupId": group_id, "lat": 9.92, "lng": 78.12, "speed": 12.0})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["displayName"], "Lead");
    assert_eq!(body["speedKmh"], 12.0);

    call(
        &h.router,
        Method::POST,
        "/api/location/update",
        Some(&h.other_token),
        Some(json!({"groupId": group_id, "lat": 9.95, "lng": 78.12})),
    )
    .await;

    let (status, body) = call(
        &h.router,
        Method::GET,
        &format!("/api/groups/{group_id}/locations"),
        Some(&h.token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().map(Vec::len), Some(2));

    let (status, body) = call(
        &h.router,
        Method::GET,
        &format!("/api/groups/{group_id}/nearest?lat=9.949&lng=78.12"),
        Some(&h.token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["displayName"], "Other");
    assert!(body["distanceKm"].as_f64().unwrap() < 0.2);

    let (status, body) = call(
        &h.router,
        Method::GET,
        "/api/friends/nearby?lat=9.92&lng=78.12&maxDistanceKm=1",
        Some(&h.token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn errors_map_to_status_codes() {
    let h = harness();
    let group_id = h.group.id.to_string();

    // Bad coordinates
    let (status, body) = call(
        &h.router,
        Method::POST,
        "/api/location/update",
        Some(&h.token),
        Some(json!({"groupId": group_id, "lat": 123.0, "lng": 0.0})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "invalid_argument");

    // Missing field
    let (status, body) = call(
        &h.router,
        Method::POST,
        "/api/group/set-destination",
        Some(&h.token),
        Some(json!({"groupId": group_id, "lat": 1.0})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("lng"));

    // Unknown group
    let (status, _) = call(
        &h.router,
        Method::POST,
        "/api/group/confirm-destination",
        Some(&h.token),
        Some(json!({"groupId": "nope"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Confirm before any proposal
    let (status, body) = call(
        &h.router,
        Method::POST,
        "/api/group/confirm-destination",
        Some(&h.token),
        Some(json!({"groupId": group_id})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "invalid_state");

    // Non-positive radius
    let (status, _) = call(
        &h.router,
        Method::POST,
        "/api/group/geofence-radius",
        Some(&h.token),
        Some(json!({"groupId": group_id, "radiusKm": 0})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn destination_flow_over_http() {
    let h = harness();
    let group_id = h.group.id.to_string();
    let uri = format!("/api/groups/{group_id}/destination");

    let (_, body) = call(&h.router, Method::GET, &uri, Some(&h.token), None).await;
    assert_eq!(body["state"], "none");
    assert!(body["destination"].is_null());

    let (status, body) = call(
        &h.router,
        Method::POST,
        "/api/group/set-destination",
        Some(&h.token),
        Some(json!({"groupId": group_id, "lat": 9.93, "lng": 78.12})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["confirmed"], false);

    let (status, body) = call(
        &h.router,
        Method::POST,
        "/api/group/confirm-destination",
        Some(&h.other_token),
        Some(json!({"groupId": group_id})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["confirmed"], true);

    let (_, body) = call(&h.router, Method::GET, &uri, Some(&h.token), None).await;
    assert_eq!(body["state"], "confirmed");
    assert_eq!(body["destination"]["lat"], 9.93);
}

#[tokio::test]
async fn join_code_resolves_case_insensitively() {
    let h = harness();
    let uri = format!("/api/groups/resolve/{}", h.group.code.to_lowercase());

    let (status, body) = call(&h.router, Method::GET, &uri, Some(&h.token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["groupId"], h.group.id.to_string());
    assert_eq!(body["name"], "road trip");

    let (status, _) = call(
        &h.router,
        Method::GET,
        "/api/groups/resolve/000000",
        Some(&h.token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn websocket_requires_token() {
    let h = harness();
    let (status, _) = call(&h.router, Method::GET, "/ws", None, None).await;
    // Token is checked after the upgrade headers, plain GETs are rejected either way
    assert!(status.is_client_error());
}
