//! End-to-end REST tests driven through the router with
//! `tower::ServiceExt::oneshot` and an in-memory database.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use quad_api::auth::{AppState, AppStateInner};
use quad_db::Database;
use quad_gateway::dispatcher::Dispatcher;
use quad_gateway::notify::Notifier;
use serde_json::{Value, json};
use tower::ServiceExt;

fn test_app() -> (Router, AppState) {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let dispatcher = Dispatcher::new();
    let notifier = Notifier::new(db.clone(), dispatcher);
    let state: AppState = Arc::new(AppStateInner {
        db,
        jwt_secret: "test-secret".into(),
        notifier,
    });
    (quad_api::router(state.clone()), state)
}

async fn request(
    app: &Router,
    method: &str,
    path: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(path);
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

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

/// Registers a user and returns (user_id, token).
async fn signup(app: &Router, username: &str) -> (String, String) {
    let (status, body) = request(
        app,
        "POST",
        "/auth/register",
        None,
        Some(json!({
            "username": username,
            "password": "hunter2hunter2",
            "display_name": username,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "signup failed: {body}");
    (
        body["user_id"].as_str().unwrap().to_string(),
        body["token"].as_str().unwrap().to_string(),
    )
}

async fn login(app: &Router, username: &str) -> (StatusCode, Value) {
    request(
        app,
        "POST",
        "/auth/login",
        None,
        Some(json!({ "username": username, "password": "hunter2hunter2" })),
    )
    .await
}

#[tokio::test]
async fn auth_round_trip() {
    let (app, _state) = test_app();
    signup(&app, "alice").await;

    let (status, body) = login(&app, "alice").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "alice");
    assert_eq!(body["role"], "member");
    assert!(body["token"].as_str().is_some());

    // Duplicate username
    let (status, body) = request(
        &app,
        "POST",
        "/auth/register",
        None,
        Some(json!({ "username": "alice", "password": "hunter2hunter2", "display_name": "A" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Username is taken");

    // Wrong password
    let (status, _) = request(
        &app,
        "POST",
        "/auth/login",
        None,
        Some(json!({ "username": "alice", "password": "wrong-password" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn protected_routes_require_a_valid_token() {
    let (app, _state) = test_app();

    let (status, _) = request(&app, "GET", "/notifications", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = request(&app, "GET", "/notifications", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn event_registration_end_to_end() {
    let (app, state) = test_app();

    // Bootstrap an admin the way the server binary does
    signup(&app, "root").await;
    assert!(state.db.set_role("root", "admin").unwrap());
    let (_, body) = login(&app, "root").await;
    assert_eq!(body["role"], "admin");
    let admin_token = body["token"].as_str().unwrap().to_string();

    let (head_id, head_token) = signup(&app, "head").await;
    let (_ana_id, ana_token) = signup(&app, "ana").await;
    let (_ben_id, ben_token) = signup(&app, "ben").await;

    // Only an admin may create an organization
    let (status, _) = request(
        &app,
        "POST",
        "/organizations",
        Some(&head_token),
        Some(json!({ "name": "Chess Club", "head_ids": [head_id] })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, org) = request(
        &app,
        "POST",
        "/organizations",
        Some(&admin_token),
        Some(json!({ "name": "Chess Club", "head_ids": [head_id] })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let org_id = org["id"].as_str().unwrap().to_string();

    // The head opens an event with a single seat
    let (status, event) = request(
        &app,
        "POST",
        "/events",
        Some(&head_token),
        Some(json!({
            "org_id": org_id,
            "title": "Blitz Night",
            "starts_at": "2026-09-01T18:00:00Z",
            "capacity": 1,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(event["status"], "pending");
    let event_id = event["id"].as_str().unwrap().to_string();

    // A plain member cannot create events for the org
    let (status, _) = request(
        &app,
        "POST",
        "/events",
        Some(&ana_token),
        Some(json!({ "org_id": org["id"], "title": "Rogue Event", "starts_at": "2026-09-01T18:00:00Z" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Registration is closed while pending
    let (status, _) = request(
        &app,
        "POST",
        &format!("/events/{event_id}/register"),
        Some(&ana_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Approval is admin-only
    let (status, _) = request(
        &app,
        "POST",
        &format!("/events/{event_id}/approve"),
        Some(&head_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, approved) = request(
        &app,
        "POST",
        &format!("/events/{event_id}/approve"),
        Some(&admin_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(approved["status"], "approved");

    // Ana takes the seat
    let (status, registration) = request(
        &app,
        "POST",
        &format!("/events/{event_id}/register"),
        Some(&ana_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(registration["status"], "registered");

    // Registering twice is rejected, not re-counted
    let (status, body) = request(
        &app,
        "POST",
        &format!("/events/{event_id}/register"),
        Some(&ana_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Already registered for this event");

    // Ben bounces off the full event
    let (status, body) = request(
        &app,
        "POST",
        &format!("/events/{event_id}/register"),
        Some(&ben_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Event is at full capacity");

    // Attendee list: students are refused, the head sees one row
    let (status, body) = request(
        &app,
        "GET",
        &format!("/events/{event_id}/attendees"),
        Some(&ana_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["error"].as_str().is_some());

    let (status, attendees) = request(
        &app,
        "GET",
        &format!("/events/{event_id}/attendees"),
        Some(&head_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let attendees = attendees.as_array().unwrap().clone();
    assert_eq!(attendees.len(), 1);
    assert_eq!(attendees[0]["username"], "ana");

    // Seat hand-off: Ana out, Ben in
    let (status, _) = request(
        &app,
        "POST",
        &format!("/events/{event_id}/unregister"),
        Some(&ana_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = request(
        &app,
        "POST",
        &format!("/events/{event_id}/register"),
        Some(&ben_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    // The head was told about the approval (as creator) and both
    // registrations. Fan-out is fire-and-forget, so poll the list endpoint.
    let mut kinds: Vec<String> = Vec::new();
    for _ in 0..200 {
        let (status, body) = request(&app, "GET", "/notifications", Some(&head_token), None).await;
        assert_eq!(status, StatusCode::OK);
        if body["unread"].as_u64().unwrap_or(0) >= 3 {
            kinds = body["notifications"]
                .as_array()
                .unwrap()
                .iter()
                .map(|n| n["kind"].as_str().unwrap().to_string())
                .collect();
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(kinds.len(), 3, "kinds: {kinds:?}");
    assert_eq!(kinds.iter().filter(|k| *k == "event_registration").count(), 2);
    assert_eq!(kinds.iter().filter(|k| *k == "event_approved").count(), 1);
}

#[tokio::test]
async fn conversation_history_requires_participation() {
    let (app, state) = test_app();
    let (_alice_id, alice_token) = signup(&app, "alice").await;
    let (bob_id, _bob_token) = signup(&app, "bob").await;
    let (_mallory_id, mallory_token) = signup(&app, "mallory").await;

    let (status, conversation) = request(
        &app,
        "POST",
        "/conversations",
        Some(&alice_token),
        Some(json!({ "participant_ids": [bob_id] })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let conversation_id = conversation["id"].as_str().unwrap().to_string();

    // History written over the gateway path lands in the same store
    state
        .db
        .insert_message(
            &uuid::Uuid::new_v4().to_string(),
            &conversation_id,
            conversation["participant_ids"][0].as_str().unwrap(),
            "hello",
            "[]",
        )
        .unwrap();

    let (status, history) = request(
        &app,
        "GET",
        &format!("/conversations/{conversation_id}/messages"),
        Some(&alice_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history["messages"].as_array().unwrap().len(), 1);

    let (status, body) = request(
        &app,
        "GET",
        &format!("/conversations/{conversation_id}/messages"),
        Some(&mallory_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Not a participant in this conversation");
}

#[tokio::test]
async fn connection_invite_and_accept_notify_both_sides() {
    let (app, state) = test_app();
    let (alice_id, alice_token) = signup(&app, "alice").await;
    let (bob_id, bob_token) = signup(&app, "bob").await;

    let (status, _) = request(
        &app,
        "POST",
        &format!("/connections/{bob_id}/invite"),
        Some(&alice_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    // Duplicate (either direction) is rejected
    let (status, _) = request(
        &app,
        "POST",
        &format!("/connections/{alice_id}/invite"),
        Some(&bob_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, accepted) = request(
        &app,
        "POST",
        &format!("/connections/{alice_id}/accept"),
        Some(&bob_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(accepted["status"], "accepted");

    // Both sides end up with one notification each
    for (user, expected_kind) in [(&bob_id, "invite"), (&alice_id, "invite_accepted")] {
        let mut found = false;
        for _ in 0..200 {
            let rows = state.db.recent_notifications(user, 10).unwrap();
            if rows.len() == 1 {
                assert_eq!(rows[0].kind, expected_kind);
                found = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(found, "no {expected_kind} notification for {user}");
    }
}

#[tokio::test]
async fn notifications_mark_read_is_scoped_and_idempotent() {
    let (app, state) = test_app();
    let (carol_id, carol_token) = signup(&app, "carol").await;

    let notification_id = uuid::Uuid::new_v4().to_string();
    state
        .db
        .insert_notification(
            &notification_id,
            &carol_id,
            "announcement",
            "Club fair",
            "",
            "{}",
            "",
        )
        .unwrap();

    let (status, body) = request(&app, "GET", "/notifications", Some(&carol_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["unread"], 1);
    assert_eq!(body["notifications"][0]["kind"], "announcement");

    let (status, body) = request(
        &app,
        "POST",
        "/notifications/mark-read",
        Some(&carol_token),
        Some(json!({ "ids": [notification_id] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["marked"], 1);

    // Second pass flips nothing
    let (status, body) = request(
        &app,
        "POST",
        "/notifications/mark-read",
        Some(&carol_token),
        Some(json!({ "ids": [notification_id] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["marked"], 0);

    let (_, body) = request(&app, "GET", "/notifications", Some(&carol_token), None).await;
    assert_eq!(body["unread"], 0);
}
