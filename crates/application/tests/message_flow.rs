use std::{sync::Arc, time::Duration};

use application::{
    ApplicationError, MessageService, MessageServiceDependencies, RegisterRequest,
    SendMessageRequest, SessionManager, SessionManagerDependencies, SystemClock,
};
use domain::{RoomId, UserId};
use futures::StreamExt;
use infrastructure::{BcryptPasswordHasher, InMemoryCredentialRepository, InMemoryMessageRepository};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

struct Harness {
    sessions: Arc<SessionManager>,
    messages: MessageService,
    store: InMemoryMessageRepository,
}

fn harness() -> Harness {
    let sessions = Arc::new(SessionManager::new(SessionManagerDependencies {
        credential_repository: Arc::new(InMemoryCredentialRepository::new()),
        password_hasher: Arc::new(BcryptPasswordHasher::new(Some(4))),
        clock: Arc::new(SystemClock),
    }));
    let store = InMemoryMessageRepository::default();
    let messages = MessageService::new(MessageServiceDependencies {
        message_repository: Arc::new(store.clone()),
        token_validator: sessions.clone(),
    });
    Harness {
        sessions,
        messages,
        store,
    }
}

fn send(room: &str, content: &str) -> SendMessageRequest {
    SendMessageRequest {
        user_id: UserId::from("u1"),
        username: "alice".into(),
        content: content.into(),
        room_id: RoomId::from(room),
    }
}

#[tokio::test]
async fn sent_message_appears_in_history() {
    let h = harness();
    let cancel = CancellationToken::new();

    h.messages.send_message(send("lobby", "hello"), &cancel).await.unwrap();

    let history = h
        .messages
        .get_message_history(&RoomId::from("lobby"), 10, &cancel)
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].content, "hello");
    assert_eq!(history[0].room_id.as_str(), "lobby");
    assert!(!history[0].id.is_empty());
}

#[tokio::test]
async fn history_is_ascending_by_timestamp() {
    let h = harness();
    let cancel = CancellationToken::new();
    for i in 0..20 {
        h.messages
            .send_message(send("lobby", &format!("m{i}")), &cancel)
            .await
            .unwrap();
    }

    let history = h
        .messages
        .get_message_history(&RoomId::from("lobby"), 20, &cancel)
        .await
        .unwrap();
    assert_eq!(history.len(), 20);
    assert!(history.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    assert_eq!(history[0].content, "m0");
    assert_eq!(history[19].content, "m19");
}

#[tokio::test]
async fn stream_delivers_only_its_room() {
    let h = harness();
    let cancel = CancellationToken::new();
    let mut stream = h
        .messages
        .stream_messages(RoomId::from("lobby"), &cancel)
        .await
        .unwrap();

    h.messages.send_message(send("other", "nope"), &cancel).await.unwrap();
    let sent = h.messages.send_message(send("lobby", "hi"), &cancel).await.unwrap();

    let delivered = timeout(Duration::from_secs(2), stream.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(delivered, sent);

    let nothing_else = timeout(Duration::from_millis(100), stream.next()).await;
    assert!(nothing_else.is_err());
}

#[tokio::test]
async fn cancel_ends_stream_without_leaking_subscriptions() {
    let h = harness();

    for _ in 0..50 {
        let cancel = CancellationToken::new();
        let mut stream = h
            .messages
            .stream_messages(RoomId::from("lobby"), &cancel)
            .await
            .unwrap();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            trigger.cancel();
        });

        let item = timeout(Duration::from_secs(2), stream.next()).await.unwrap();
        assert!(matches!(item, Some(Err(ApplicationError::Canceled))));
        assert!(stream.next().await.is_none());
    }

    timeout(Duration::from_secs(2), async {
        while h.store.subscriber_count() > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("all subscriptions released");
}

#[tokio::test]
async fn authenticated_flow_resolves_display_names() {
    let h = harness();
    let cancel = CancellationToken::new();
    let session = h
        .sessions
        .register(
            RegisterRequest {
                username: "mariem".into(),
                password: "password123".into(),
            },
            &cancel,
        )
        .await
        .unwrap();

    let mut stream = h
        .messages
        .stream_messages_with_auth(Some(session.token.clone()), RoomId::from("lobby"), &cancel)
        .await
        .unwrap();

    let sent = h
        .messages
        .send_message_with_auth(&session.token, "hello".into(), RoomId::from("lobby"), &cancel)
        .await
        .unwrap();
    assert_eq!(sent.username, "mariem");

    let view = timeout(Duration::from_secs(2), stream.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(view.message.id, sent.id);
    assert_eq!(view.display_name, "mariem");

    // 注销后历史仍需校验令牌，匿名访问放行
    h.sessions.logout(&session.token, &cancel).await.unwrap();
    let rejected = h
        .messages
        .get_message_history_with_auth(Some(&session.token), &RoomId::from("lobby"), 10, &cancel)
        .await;
    assert!(matches!(rejected, Err(ApplicationError::Unauthorized(_))));

    let anonymous = h
        .messages
        .get_message_history_with_auth(None, &RoomId::from("lobby"), 10, &cancel)
        .await
        .unwrap();
    assert_eq!(anonymous[0].display_name, "mariem");
}
