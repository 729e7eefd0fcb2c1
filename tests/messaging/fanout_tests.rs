//! Room fan-out tests: a posted message reaches every socket watching the
//! chat, on this instance and on others sharing the broker.

use chat_relay::application::commands::CreateMessage;
use chat_relay::domain::Chat;
use chat_relay::presentation::websocket::ConnectionHandle;

use crate::common::{recv_payload, stays_silent, TestApp};

async fn post(app: &TestApp, chat: &Chat, text: &str) {
    app.state
        .mediator
        .handle_command(CreateMessage {
            chat_oid: chat.oid.to_string(),
            text: text.into(),
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn every_member_of_the_room_receives_the_message() {
    let app = TestApp::spawn().await;
    let chat = app.create_chat().await;
    let room = chat.room();
    let bridge = &app.state.bridge;

    let (c1, mut rx1) = ConnectionHandle::channel();
    let (c2, mut rx2) = ConnectionHandle::channel();
    let (c3, mut rx3) = ConnectionHandle::channel();
    bridge.connect(&room, c1).unwrap();
    bridge.connect(&room, c2).unwrap();
    bridge.connect(&room, c3.clone()).unwrap();
    bridge.disconnect(&room, c3.id());
    assert!(bridge.wait_subscribed(&room).await);

    post(&app, &chat, "hi").await;

    for rx in [&mut rx1, &mut rx2] {
        let payload = recv_payload(rx).await.expect("payload relayed");
        assert_eq!(payload["message_text"], "hi");
    }
    assert!(stays_silent(&mut rx3).await);
}

#[tokio::test]
async fn other_rooms_do_not_receive_the_message() {
    let app = TestApp::spawn().await;
    let watched = app.create_chat().await;
    let other = app.create_chat().await;
    let bridge = &app.state.bridge;

    let (conn, mut rx) = ConnectionHandle::channel();
    bridge.connect(&watched.room(), conn).unwrap();
    assert!(bridge.wait_subscribed(&watched.room()).await);

    post(&app, &other, "not for you").await;
    post(&app, &watched, "for you").await;

    let payload = recv_payload(&mut rx).await.expect("payload relayed");
    assert_eq!(payload["message_text"], "for you");
}

#[tokio::test]
async fn messages_arrive_in_posting_order() {
    let app = TestApp::spawn().await;
    let chat = app.create_chat().await;
    let (conn, mut rx) = ConnectionHandle::channel();
    app.state.bridge.connect(&chat.room(), conn).unwrap();
    assert!(app.state.bridge.wait_subscribed(&chat.room()).await);

    for i in 0..10 {
        post(&app, &chat, &format!("m{i}")).await;
    }

    for i in 0..10 {
        let payload = recv_payload(&mut rx).await.expect("payload relayed");
        assert_eq!(payload["message_text"], format!("m{i}"));
    }
}

#[tokio::test]
async fn deleting_a_chat_notifies_its_room() {
    use chat_relay::application::commands::DeleteChat;

    let app = TestApp::spawn().await;
    let chat = app.create_chat().await;
    let (conn, mut rx) = ConnectionHandle::channel();
    app.state.bridge.connect(&chat.room(), conn).unwrap();
    assert!(app.state.bridge.wait_subscribed(&chat.room()).await);

    app.state
        .mediator
        .handle_command(DeleteChat {
            chat_oid: chat.oid.to_string(),
        })
        .await
        .unwrap();

    let payload = recv_payload(&mut rx).await.expect("payload relayed");
    assert_eq!(payload["event_title"], "Chat has been deleted");
}

#[tokio::test]
async fn instances_sharing_a_broker_fan_out_to_each_other() {
    let writer = TestApp::spawn().await;
    let reader = TestApp::with_broker(writer.broker.clone());
    let chat = writer.create_chat().await;
    let room = chat.room();

    let (local, mut local_rx) = ConnectionHandle::channel();
    let (remote, mut remote_rx) = ConnectionHandle::channel();
    writer.state.bridge.connect(&room, local).unwrap();
    reader.state.bridge.connect(&room, remote).unwrap();
    assert!(writer.state.bridge.wait_subscribed(&room).await);
    assert!(reader.state.bridge.wait_subscribed(&room).await);

    post(&writer, &chat, "hi").await;

    for rx in [&mut local_rx, &mut remote_rx] {
        let payload = recv_payload(rx).await.expect("payload relayed");
        assert_eq!(payload["message_text"], "hi");
    }
}

#[tokio::test]
async fn last_leave_stops_the_room_bridge() {
    let app = TestApp::spawn().await;
    let chat = app.create_chat().await;
    let room = chat.room();
    let topic = app.state.settings.topics.room_topic(&room);
    let (conn, _rx) = ConnectionHandle::channel();

    app.state.bridge.connect(&room, conn.clone()).unwrap();
    assert!(app.state.bridge.wait_subscribed(&room).await);
    assert_eq!(app.broker.subscriber_count(&topic), 1);

    app.state.bridge.disconnect(&room, conn.id());
    assert_eq!(app.state.bridge.active_rooms(), 0);

    let released = async {
        while app.broker.subscriber_count(&topic) > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
    };
    tokio::time::timeout(std::time::Duration::from_secs(2), released)
        .await
        .expect("subscription released");
}
