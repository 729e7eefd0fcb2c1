//! Message API Tests

use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use test_case::test_case;

use crate::common::TestApp;

async fn chat_oid(app: &TestApp) -> String {
    let chat = app.post_chat("General").await;
    chat["oid"].as_str().unwrap().to_owned()
}

#[tokio::test]
async fn send_message_returns_created_message_and_publishes_it() {
    let app = TestApp::spawn().await;
    let oid = chat_oid(&app).await;

    let response = app
        .server
        .post(&format!("/chats/{oid}/messages"))
        .json(&json!({ "text": "hi" }))
        .await;

    response.assert_status(StatusCode::CREATED);
    let body = response.json::<Value>();
    assert_eq!(body["text"], "hi");
    assert_eq!(body["chat_oid"], oid.as_str());

    let records = app.broker.produced_to(&app.state.settings.topics.room_topic(&oid));
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].key, oid);
    let payload: Value = serde_json::from_slice(&records[0].payload).unwrap();
    assert_eq!(payload["message_text"], "hi");
    assert_eq!(payload["message_oid"], body["oid"]);
}

#[tokio::test]
async fn messages_are_listed_in_posting_order() {
    let app = TestApp::spawn().await;
    let oid = chat_oid(&app).await;
    let path = format!("/chats/{oid}/messages");
    for text in ["one", "two", "three"] {
        app.server.post(&path).json(&json!({ "text": text })).await;
    }

    let body = app
        .server
        .get(&path)
        .add_query_param("limit", 2)
        .await
        .json::<Value>();

    assert_eq!(body["count"], 3);
    let texts: Vec<&str> = body["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|message| message["text"].as_str().unwrap())
        .collect();
    assert_eq!(texts, vec!["one", "two"]);
}

#[tokio::test]
async fn message_to_unknown_chat_is_not_found() {
    let app = TestApp::spawn().await;
    let oid = uuid::Uuid::new_v4();

    app.server
        .post(&format!("/chats/{oid}/messages"))
        .json(&json!({ "text": "hi" }))
        .await
        .assert_status(StatusCode::NOT_FOUND);
    assert!(app.broker.produced_to(&app.state.settings.topics.room_topic(&oid.to_string())).is_empty());
}

#[test_case(""; "empty")]
#[test_case(&"x".repeat(4001); "too long")]
fn invalid_text_is_rejected(text: &str) {
    tokio_test::block_on(async {
        let app = TestApp::spawn().await;
        let oid = chat_oid(&app).await;

        app.server
            .post(&format!("/chats/{oid}/messages"))
            .json(&json!({ "text": text }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    });
}
