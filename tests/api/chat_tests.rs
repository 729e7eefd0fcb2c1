//! Chat API Tests

use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use test_case::test_case;

use crate::common::{unique_title, TestApp};

#[tokio::test]
async fn create_chat_returns_created_chat() {
    let app = TestApp::spawn().await;
    let title = unique_title();

    let body = app.post_chat(&title).await;

    assert_eq!(body["title"], title.as_str());
    assert!(uuid::Uuid::parse_str(body["oid"].as_str().unwrap()).is_ok());
}

#[tokio::test]
async fn duplicate_title_is_conflict_and_not_stored_twice() {
    let app = TestApp::spawn().await;
    app.post_chat("General").await;

    let response = app
        .server
        .post("/chats")
        .json(&json!({ "title": "General" }))
        .await;

    response.assert_status(StatusCode::CONFLICT);
    let list = app.server.get("/chats").await.json::<Value>();
    assert_eq!(list["count"], 1);
}

#[test_case(""; "empty")]
#[test_case(&"x".repeat(256); "too long")]
fn invalid_title_is_rejected(title: &str) {
    tokio_test::block_on(async {
        let app = TestApp::spawn().await;

        let response = app
            .server
            .post("/chats")
            .json(&json!({ "title": title }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
    });
}

#[tokio::test]
async fn malformed_body_is_bad_request() {
    let app = TestApp::spawn().await;

    let response = app
        .server
        .post("/chats")
        .json(&json!({ "name": "General" }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn list_chats_is_paginated_in_creation_order() {
    let app = TestApp::spawn().await;
    let titles: Vec<String> = (0..3).map(|_| unique_title()).collect();
    for title in &titles {
        app.post_chat(title).await;
    }

    let body = app
        .server
        .get("/chats")
        .add_query_param("limit", 2)
        .add_query_param("offset", 1)
        .await
        .json::<Value>();

    assert_eq!(body["count"], 3);
    assert_eq!(body["limit"], 2);
    assert_eq!(body["offset"], 1);
    let listed: Vec<&str> = body["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|chat| chat["title"].as_str().unwrap())
        .collect();
    assert_eq!(listed, vec![titles[1].as_str(), titles[2].as_str()]);
}

#[tokio::test]
async fn limit_out_of_range_is_rejected() {
    let app = TestApp::spawn().await;

    let response = app.server.get("/chats").add_query_param("limit", 500).await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn get_chat_returns_detail() {
    let app = TestApp::spawn().await;
    let chat = app.post_chat("General").await;
    let oid = chat["oid"].as_str().unwrap();

    let response = app.server.get(&format!("/chats/{oid}")).await;

    response.assert_status_ok();
    let body = response.json::<Value>();
    assert_eq!(body["title"], "General");
    assert_eq!(body["messages"], json!([]));
    assert_eq!(body["listeners"], json!([]));
}

#[tokio::test]
async fn unknown_chat_is_not_found() {
    let app = TestApp::spawn().await;
    let oid = uuid::Uuid::new_v4();

    app.server
        .get(&format!("/chats/{oid}"))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_chat_id_is_bad_request() {
    let app = TestApp::spawn().await;

    app.server
        .get("/chats/not-a-uuid")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn delete_chat_removes_it_and_publishes_deletion() {
    let app = TestApp::spawn().await;
    let chat = app.post_chat("General").await;
    let oid = chat["oid"].as_str().unwrap();

    app.server
        .delete(&format!("/chats/{oid}"))
        .await
        .assert_status(StatusCode::NO_CONTENT);

    app.server
        .get(&format!("/chats/{oid}"))
        .await
        .assert_status(StatusCode::NOT_FOUND);
    let room_topic = app.state.settings.topics.room_topic(oid);
    let records = app.broker.produced_to(&room_topic);
    assert_eq!(records.len(), 1);
    let payload: Value = serde_json::from_slice(&records[0].payload).unwrap();
    assert_eq!(payload["event_title"], "Chat has been deleted");
}

#[tokio::test]
async fn listeners_can_be_added_once_and_listed() {
    let app = TestApp::spawn().await;
    let chat = app.post_chat("General").await;
    let oid = chat["oid"].as_str().unwrap();
    let path = format!("/chats/{oid}/listeners");

    let response = app
        .server
        .post(&path)
        .json(&json!({ "telegram_chat_id": "12345" }))
        .await;
    response.assert_status(StatusCode::CREATED);
    assert_eq!(response.json::<Value>(), json!({ "oid": "12345" }));

    app.server
        .post(&path)
        .json(&json!({ "telegram_chat_id": "12345" }))
        .await
        .assert_status(StatusCode::CONFLICT);

    let listeners = app.server.get(&path).await.json::<Value>();
    assert_eq!(listeners, json!([{ "oid": "12345" }]));
    let records = app.broker.produced_to(&app.state.settings.topics.listeners);
    assert_eq!(records.len(), 1);
}

#[tokio::test]
async fn new_chat_is_announced_on_new_chats_topic() {
    let app = TestApp::spawn().await;

    app.post_chat("General").await;

    let records = app.broker.produced_to(&app.state.settings.topics.new_chats);
    assert_eq!(records.len(), 1);
    let payload: Value = serde_json::from_slice(&records[0].payload).unwrap();
    assert_eq!(payload["chat_title"], "General");
}
