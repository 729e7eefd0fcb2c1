//! Mediator flow tests: command, event dispatch and broker records.

use chat_relay::application::commands::{CreateChat, CreateMessage};
use chat_relay::application::queries::GetChatDetail;
use chat_relay::domain::{AggregateRoot, EventKind};
use chat_relay::shared::error::AppError;
use pretty_assertions::assert_eq;
use serde_json::Value;

use crate::common::TestApp;

#[tokio::test]
async fn command_result_has_no_pending_events() {
    let app = TestApp::spawn().await;

    let mut chat = app
        .state
        .mediator
        .handle_command(CreateChat {
            title: "General".into(),
        })
        .await
        .unwrap();

    assert!(chat.pull_events().is_empty());
}

#[tokio::test]
async fn create_chat_twice_with_same_title_fails() {
    let app = TestApp::spawn().await;
    let mediator = &app.state.mediator;

    let chat = mediator
        .handle_command(CreateChat {
            title: "General".into(),
        })
        .await
        .unwrap();
    let err = mediator
        .handle_command(CreateChat {
            title: "General".into(),
        })
        .await
        .unwrap_err();

    assert_eq!(chat.title.to_string(), "General");
    assert!(chat.messages.is_empty());
    assert!(matches!(err, AppError::Conflict(_)));
    let new_chats = app.broker.produced_to(&app.state.settings.topics.new_chats);
    assert_eq!(new_chats.len(), 1);
}

#[tokio::test]
async fn create_message_dispatches_one_event_to_room_topic() {
    let app = TestApp::spawn().await;
    let chat = app.create_chat().await;
    let room_topic = app.state.settings.topics.room_topic(&chat.room());

    let message = app
        .state
        .mediator
        .handle_command(CreateMessage {
            chat_oid: chat.oid.to_string(),
            text: "hi".into(),
        })
        .await
        .unwrap();

    assert_eq!(message.text.to_string(), "hi");
    assert_eq!(message.chat_oid, chat.oid);
    assert_eq!(
        app.state
            .mediator
            .event_handler_count(EventKind::NewMessageReceived),
        1
    );

    let records = app.broker.produced_to(&room_topic);
    assert_eq!(records.len(), 1);
    let payload: Value = serde_json::from_slice(&records[0].payload).unwrap();
    assert_eq!(payload["event_title"], "New message received");
    assert_eq!(payload["message_text"], "hi");
    assert_eq!(payload["message_oid"], message.oid.to_string());
    assert_eq!(payload["chat_oid"], chat.oid.to_string());
}

#[tokio::test]
async fn message_is_visible_in_chat_detail() {
    let app = TestApp::spawn().await;
    let chat = app.create_chat().await;
    app.state
        .mediator
        .handle_command(CreateMessage {
            chat_oid: chat.oid.to_string(),
            text: "hi".into(),
        })
        .await
        .unwrap();

    let detail = app
        .state
        .mediator
        .handle_query(GetChatDetail {
            chat_oid: chat.oid.to_string(),
        })
        .await
        .unwrap();

    assert_eq!(detail.messages.len(), 1);
    assert_eq!(detail.messages[0].text.to_string(), "hi");
}

#[tokio::test]
async fn stopped_broker_does_not_fail_the_command() {
    use chat_relay::infrastructure::broker::MessageBroker;

    let app = TestApp::spawn().await;
    let chat = app.create_chat().await;
    app.broker.stop().await.unwrap();

    let result = app
        .state
        .mediator
        .handle_command(CreateMessage {
            chat_oid: chat.oid.to_string(),
            text: "hi".into(),
        })
        .await;

    assert!(result.is_ok());
    assert!(app
        .broker
        .produced_to(&app.state.settings.topics.room_topic(&chat.room()))
        .is_empty());
}
