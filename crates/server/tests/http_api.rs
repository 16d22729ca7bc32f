use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use chatline::config::{AppState, ServerConfig};
use serde_json::{json, Value};
use tempfile::{tempdir, TempDir};
use tower::ServiceExt;

async fn test_app() -> (TempDir, Router) {
    let dir = tempdir().unwrap();
    let state = AppState::open(ServerConfig::with_base_dir(dir.path()))
        .await
        .unwrap();
    (dir, chatline::app(state))
}

async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, value)
}

#[tokio::test]
async fn test_health() {
    let (_dir, app) = test_app().await;
    let (status, body) = call(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("OK - Chatline Server".into()));
}

#[tokio::test]
async fn test_register_login_and_list() {
    let (_dir, app) = test_app().await;

    let (status, profile) = call(
        &app,
        Method::POST,
        "/api/register",
        Some(json!({ "phone_number": "+14155550001", "display_name": "Ana" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(profile["identity"], "+14155550001");
    assert_eq!(profile["is_online"], false);

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/register",
        Some(json!({ "phone_number": "+14155550001", "display_name": "Ana again" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["message"], "Phone number already registered");

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/register",
        Some(json!({ "phone_number": "555-0001", "display_name": "Bad" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, profile) = call(
        &app,
        Method::POST,
        "/api/login",
        Some(json!({ "phone_number": "+14155550001" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["display_name"], "Ana");

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/login",
        Some(json!({ "phone_number": "+14155550999" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["message"], "User not found");

    let (status, users) = call(&app, Method::GET, "/api/users", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(users.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_direct_message_lifecycle() {
    let (_dir, app) = test_app().await;

    let (status, sent) = call(
        &app,
        Method::POST,
        "/api/messages",
        Some(json!({ "sender": "+15550001", "receiver": "+15550002", "body": "hello there" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(sent["status"], "sent");
    let id = sent["id"].as_str().unwrap().to_string();

    // sender's view does not mark anything read
    let (_, history) = call(&app, Method::GET, "/api/messages/+15550001/+15550002", None).await;
    assert_eq!(history[0]["status"], "sent");

    let (status, history) =
        call(&app, Method::GET, "/api/messages/+15550002/+15550001?limit=10", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history.as_array().unwrap().len(), 1);
    assert_eq!(history[0]["status"], "read");

    let (status, found) = call(&app, Method::GET, "/api/search-messages/+15550002/HELLO", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(found[0]["id"], id.as_str());

    let (status, _) = call(
        &app,
        Method::POST,
        &format!("/api/messages/{}/hide", id),
        Some(json!({ "identity": "+15550002" })),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, history) = call(&app, Method::GET, "/api/messages/+15550002/+15550001", None).await;
    assert!(history.as_array().unwrap().is_empty());
    let (_, history) = call(&app, Method::GET, "/api/messages/+15550001/+15550002", None).await;
    assert_eq!(history.as_array().unwrap().len(), 1);

    let (status, body) = call(&app, Method::DELETE, &format!("/api/messages/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], id.as_str());
    let (status, _) = call(&app, Method::DELETE, &format!("/api/messages/{}", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_send_validation() {
    let (_dir, app) = test_app().await;

    let cases = [
        json!({ "sender": "+15550001", "body": "nowhere" }),
        json!({ "sender": "+15550001", "receiver": "+15550002", "group_id": "g", "body": "both" }),
        json!({ "sender": "+15550001", "receiver": "+15550002", "body": "   " }),
        json!({ "sender": "not-a-number", "receiver": "+15550002", "body": "hi" }),
        json!({
            "sender": "+15550001",
            "receiver": "+15550002",
            "attachment": { "url": "", "content_type": "", "size": 0 }
        }),
        json!({
            "sender": "+15550001",
            "receiver": "+15550002",
            "attachment": { "url": "/uploads/x.gif", "content_type": "image/gif", "size": 10 }
        }),
    ];
    for case in cases {
        let (status, body) = call(&app, Method::POST, "/api/messages", Some(case.clone())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{} -> {}", case, body);
        assert!(body["error"]["message"].is_string());
    }

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/messages",
        Some(json!({ "sender": "+15550001", "group_id": "missing", "body": "hi" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_group_conversation() {
    let (_dir, app) = test_app().await;

    let (status, group) = call(
        &app,
        Method::POST,
        "/api/groups",
        Some(json!({
            "name": "Climbing",
            "members": ["+15550002", "+15550003"],
            "created_by": "+15550001"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let group_id = group["id"].as_str().unwrap().to_string();
    assert_eq!(group["members"].as_array().unwrap().len(), 3);

    let (_, groups) = call(&app, Method::GET, "/api/groups/+15550003", None).await;
    assert_eq!(groups[0]["id"], group_id.as_str());

    let (status, sent) = call(
        &app,
        Method::POST,
        "/api/messages",
        Some(json!({
            "sender": "+15550002",
            "group_id": group_id,
            "attachment": { "url": "https://files.example/route.png", "content_type": "image/png", "size": 2048 }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(sent["group_id"], group_id.as_str());
    assert_eq!(sent["status"], "sent");

    let (status, history) = call(
        &app,
        Method::GET,
        &format!("/api/group-messages/{}?viewer=%2B15550001", group_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history.as_array().unwrap().len(), 1);
    assert_eq!(history[0]["attachment"]["size"], 2048);

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/messages",
        Some(json!({ "sender": "+15550009", "group_id": group_id, "body": "hi all" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(&app, Method::GET, "/api/group-messages/unknown", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
