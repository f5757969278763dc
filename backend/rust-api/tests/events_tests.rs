mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::json;
use tablebot_api::services::store::Store;
use tower::util::ServiceExt;

fn event_request(payload: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/v1/events")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap()
}

fn command(chat_id: i64, user_id: i64, name: &str, args: &[&str]) -> serde_json::Value {
    json!({
        "chat_id": chat_id,
        "from": { "user_id": user_id, "username": "tester", "first_name": "Tess" },
        "event": { "type": "command", "name": name, "args": args }
    })
}

fn callback(chat_id: i64, user_id: i64, token: &str) -> serde_json::Value {
    json!({
        "chat_id": chat_id,
        "from": { "user_id": user_id, "username": "tester", "first_name": "Tess" },
        "event": { "type": "callback", "token": token }
    })
}

#[tokio::test]
async fn start_without_access_shows_payment_notice() {
    let (app, ctx) = common::create_test_app();

    let response = app
        .oneshot(event_request(command(5, 5, "start", &[])))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let text = ctx.outbound.last_text(5).unwrap();
    assert!(text.contains("subscription"));
    assert!(text.contains('5'));
    // The user row exists so the admin has a grant target.
    assert!(ctx.store.get_user(5).await.unwrap().is_some());
}

#[tokio::test]
async fn whitelisted_user_gets_the_welcome_menu() {
    let (app, ctx) = common::create_test_app();
    ctx.store.get_or_create_user(5, "tester", "Tess").await.unwrap();
    ctx.store.set_whitelisted(5, true).await.unwrap();

    let response = app
        .oneshot(event_request(command(5, 5, "start", &[])))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let messages = ctx.outbound.sent_to(5);
    let welcome = messages.last().unwrap();
    assert!(welcome.text.contains("Welcome to the multiplication trainer"));
    assert!(welcome.menu.iter().any(|c| c.token == "start_quiz"));
    assert!(welcome.menu.iter().any(|c| c.token == "lightning_mode"));
}

#[tokio::test]
async fn admin_grant_then_access_check_passes() {
    let (app, ctx) = common::create_test_app();
    ctx.store.get_or_create_user(5, "tester", "Tess").await.unwrap();

    let response = app
        .clone()
        .oneshot(event_request(command(
            common::ADMIN_ID,
            common::ADMIN_ID,
            "addwhite",
            &["5"],
        )))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(ctx.store.get_user(5).await.unwrap().unwrap().is_whitelisted);
    // The user was told about the grant.
    assert!(ctx
        .outbound
        .last_text(5)
        .unwrap()
        .contains("ACCESS GRANTED"));

    let response = app
        .oneshot(event_request(callback(5, 5, "check_access")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(ctx
        .outbound
        .last_text(5)
        .unwrap()
        .contains("Welcome to the multiplication trainer"));
}

#[tokio::test]
async fn privileged_command_from_regular_user_is_denied() {
    let (app, ctx) = common::create_test_app();
    ctx.store.get_or_create_user(5, "tester", "Tess").await.unwrap();

    let response = app
        .oneshot(event_request(command(5, 5, "addwhite", &["7"])))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    assert_eq!(ctx.outbound.last_text(5).unwrap(), "❌ Admin only!");
    // No state change.
    assert!(ctx.store.get_user(7).await.unwrap().is_none());
}

#[tokio::test]
async fn mode_navigation_reaches_a_question() {
    let (app, ctx) = common::create_test_app();
    ctx.store.get_or_create_user(5, "tester", "Tess").await.unwrap();

    for token in ["start_quiz", "mode_random", "level_1"] {
        let response = app
            .clone()
            .oneshot(event_request(callback(5, 5, token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let question = ctx.outbound.last_text(5).unwrap();
    assert!(question.contains("QUESTION #1"));
    assert!(question.contains("= ?"));
}

#[tokio::test]
async fn free_text_answer_resolves_through_the_gateway() {
    let (app, ctx) = common::create_test_app();
    ctx.store.get_or_create_user(5, "tester", "Tess").await.unwrap();

    for token in ["find_x_mode", "level_1"] {
        app.clone()
            .oneshot(event_request(callback(5, 5, token)))
            .await
            .unwrap();
    }
    let question = ctx.outbound.last_text(5).unwrap();
    assert!(question.contains("Type the value of x"));

    let response = app
        .oneshot(event_request(json!({
            "chat_id": 5,
            "from": { "user_id": 5, "username": "tester", "first_name": "Tess" },
            "event": { "type": "answer", "text": "9999" }
        })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    assert_eq!(ctx.store.history_len(), 1);
    assert_eq!(ctx.store.history()[0].mode, "find_unknown");
}

#[tokio::test]
async fn oversized_first_name_is_rejected() {
    let (app, _ctx) = common::create_test_app();

    let response = app
        .oneshot(event_request(json!({
            "chat_id": 5,
            "from": {
                "user_id": 5,
                "username": "tester",
                "first_name": "x".repeat(200)
            },
            "event": { "type": "command", "name": "start", "args": [] }
        })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn malformed_payload_is_a_client_error() {
    let (app, _ctx) = common::create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/events")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{\"chat_id\": \"not-a-number\"}"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn health_endpoint_reports_the_store() {
    let (app, _ctx) = common::create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn metrics_endpoint_requires_basic_auth() {
    let (app, _ctx) = common::create_test_app();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    use base64::{engine::general_purpose, Engine as _};
    let credentials = general_purpose::STANDARD.encode("admin:changeme");
    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/metrics")
                .header(header::AUTHORIZATION, format!("Basic {}", credentials))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn broadcast_fans_out_and_reports() {
    let (app, ctx) = common::create_test_app();
    for id in [1, 2, 3] {
        ctx.store.get_or_create_user(id, "u", "U").await.unwrap();
        ctx.store.set_whitelisted(id, true).await.unwrap();
    }
    ctx.store.get_or_create_user(4, "u", "U").await.unwrap();

    let response = app
        .oneshot(event_request(command(
            common::ADMIN_ID,
            common::ADMIN_ID,
            "broadcast",
            &["whitelist", "Server", "maintenance", "tonight!"],
        )))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    for id in [1, 2, 3] {
        assert_eq!(
            ctx.outbound.last_text(id).unwrap(),
            "Server maintenance tonight!"
        );
    }
    // Outside the audience.
    assert!(ctx.outbound.sent_to(4).is_empty());

    let report = ctx.outbound.last_text(common::ADMIN_ID).unwrap();
    assert!(report.contains("Sent: 3"));
}
