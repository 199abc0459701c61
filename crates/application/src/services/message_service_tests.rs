//! 消息路由服务单元测试
//!
//! 覆盖负载校验、持久化提交点、在线推送与离线落库等核心行为。

use std::sync::Arc;

use domain::{DomainError, ServerEvent, User, UserEmail, UserId, Username};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use uuid::Uuid;

use crate::clock::SystemClock;
use crate::error::ApplicationError;
use crate::media::memory::InMemoryMediaStore;
use crate::registry::{ConnectionHandle, ConnectionRegistry};
use crate::repository::memory::{InMemoryMessageRepository, InMemoryUserRepository};
use crate::repository::{MessageRepository, UserRepository};
use crate::services::{MessageService, MessageServiceDependencies, SendMessageRequest};

struct TestContext {
    service: MessageService,
    registry: Arc<ConnectionRegistry>,
    media_store: Arc<InMemoryMediaStore>,
    message_repository: Arc<InMemoryMessageRepository>,
    user_repository: Arc<InMemoryUserRepository>,
}

fn build_context() -> TestContext {
    let message_repository = Arc::new(InMemoryMessageRepository::new());
    let user_repository = Arc::new(InMemoryUserRepository::new());
    let media_store = Arc::new(InMemoryMediaStore::new());
    let registry = Arc::new(ConnectionRegistry::new());

    let service = MessageService::new(MessageServiceDependencies {
        message_repository: message_repository.clone(),
        user_repository: user_repository.clone(),
        media_store: media_store.clone(),
        registry: registry.clone(),
        clock: Arc::new(SystemClock),
    });

    TestContext {
        service,
        registry,
        media_store,
        message_repository,
        user_repository,
    }
}

async fn add_user(ctx: &TestContext, name: &str) -> Uuid {
    let id = Uuid::new_v4();
    let user = User::register(
        UserId::from(id),
        Username::parse(name).unwrap(),
        UserEmail::parse(format!("{name}@example.com")).unwrap(),
        domain::PasswordHash::new("hashed").unwrap(),
        chrono::Utc::now(),
    );
    ctx.user_repository.create(user).await.unwrap();
    id
}

/// 把收件人接入注册表，返回它的事件接收端
async fn connect(ctx: &TestContext, user_id: Uuid) -> UnboundedReceiver<ServerEvent> {
    let (tx, rx) = unbounded_channel();
    ctx.registry
        .register(ConnectionHandle::new(UserId::from(user_id), tx))
        .await;
    rx
}

fn next_new_message(rx: &mut UnboundedReceiver<ServerEvent>) -> Option<domain::Message> {
    while let Ok(event) = rx.try_recv() {
        if let ServerEvent::NewMessage { message } = event {
            return Some(message);
        }
    }
    None
}

#[tokio::test]
async fn send_with_both_parts_fails_without_side_effects() {
    let ctx = build_context();
    let sender = add_user(&ctx, "sender1").await;
    let recipient = add_user(&ctx, "recipient1").await;

    let result = ctx
        .service
        .send(SendMessageRequest {
            sender_id: sender,
            recipient_id: recipient,
            text: Some("hi".into()),
            image: Some("data:image/png;base64,xxxx".into()),
        })
        .await;

    assert!(matches!(
        result,
        Err(ApplicationError::Domain(DomainError::InvalidPayload))
    ));

    // 没有持久化，也没有媒体上传
    let stored = ctx
        .message_repository
        .list_between(UserId::from(sender), UserId::from(recipient))
        .await
        .unwrap();
    assert!(stored.is_empty());
    assert_eq!(ctx.media_store.upload_count(), 0);
}

#[tokio::test]
async fn send_with_no_parts_fails() {
    let ctx = build_context();
    let sender = add_user(&ctx, "sender2").await;
    let recipient = add_user(&ctx, "recipient2").await;

    let result = ctx
        .service
        .send(SendMessageRequest {
            sender_id: sender,
            recipient_id: recipient,
            text: None,
            image: None,
        })
        .await;

    assert!(matches!(
        result,
        Err(ApplicationError::Domain(DomainError::InvalidPayload))
    ));
}

#[tokio::test]
async fn send_to_unknown_recipient_fails() {
    let ctx = build_context();
    let sender = add_user(&ctx, "sender3").await;

    let result = ctx
        .service
        .send(SendMessageRequest {
            sender_id: sender,
            recipient_id: Uuid::new_v4(),
            text: Some("hi".into()),
            image: None,
        })
        .await;

    assert!(matches!(
        result,
        Err(ApplicationError::Domain(DomainError::UserNotFound))
    ));
}

#[tokio::test]
async fn online_recipient_receives_live_push() {
    let ctx = build_context();
    let sender = add_user(&ctx, "sender4").await;
    let recipient = add_user(&ctx, "recipient4").await;
    let mut recipient_rx = connect(&ctx, recipient).await;

    let stored = ctx
        .service
        .send(SendMessageRequest {
            sender_id: sender,
            recipient_id: recipient,
            text: Some("hello there".into()),
            image: None,
        })
        .await
        .unwrap();

    let pushed = next_new_message(&mut recipient_rx).expect("收件人在线应收到实时推送");
    assert_eq!(pushed.id, stored.id);
    assert_eq!(pushed.body.text(), Some("hello there"));
    assert!(!pushed.seen);
}

#[tokio::test]
async fn push_goes_only_to_the_recipient() {
    let ctx = build_context();
    let sender = add_user(&ctx, "sender5").await;
    let recipient = add_user(&ctx, "recipient5").await;
    let bystander = add_user(&ctx, "bystander5").await;

    let mut sender_rx = connect(&ctx, sender).await;
    let mut recipient_rx = connect(&ctx, recipient).await;
    let mut bystander_rx = connect(&ctx, bystander).await;

    ctx.service
        .send(SendMessageRequest {
            sender_id: sender,
            recipient_id: recipient,
            text: Some("private".into()),
            image: None,
        })
        .await
        .unwrap();

    assert!(next_new_message(&mut recipient_rx).is_some());
    assert!(next_new_message(&mut sender_rx).is_none());
    assert!(next_new_message(&mut bystander_rx).is_none());
}

#[tokio::test]
async fn offline_recipient_still_gets_durable_message() {
    let ctx = build_context();
    let sender = add_user(&ctx, "sender6").await;
    let recipient = add_user(&ctx, "recipient6").await;

    let stored = ctx
        .service
        .send(SendMessageRequest {
            sender_id: sender,
            recipient_id: recipient,
            text: Some("see you later".into()),
            image: None,
        })
        .await
        .unwrap();

    // 没有连接可推送，但消息已经落库，之后可以拉取到
    let history = ctx
        .service
        .conversation(recipient, sender)
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].id, stored.id);
}

#[tokio::test]
async fn push_failure_does_not_fail_the_send() {
    let ctx = build_context();
    let sender = add_user(&ctx, "sender7").await;
    let recipient = add_user(&ctx, "recipient7").await;

    // 接收端直接丢弃，模拟推送时连接刚好断开
    let (tx, rx) = unbounded_channel();
    drop(rx);
    ctx.registry
        .register(ConnectionHandle::new(UserId::from(recipient), tx))
        .await;

    let result = ctx
        .service
        .send(SendMessageRequest {
            sender_id: sender,
            recipient_id: recipient,
            text: Some("still stored".into()),
            image: None,
        })
        .await;

    assert!(result.is_ok(), "推送失败不应让发送操作失败");
    let history = ctx.service.conversation(recipient, sender).await.unwrap();
    assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn image_message_is_exchanged_for_hosted_url() {
    let ctx = build_context();
    let sender = add_user(&ctx, "sender8").await;
    let recipient = add_user(&ctx, "recipient8").await;

    let stored = ctx
        .service
        .send(SendMessageRequest {
            sender_id: sender,
            recipient_id: recipient,
            text: None,
            image: Some("data:image/png;base64,iVBORw0KGgo=".into()),
        })
        .await
        .unwrap();

    assert_eq!(ctx.media_store.upload_count(), 1);
    assert_eq!(stored.body.image_url(), Some("mem://media/1"));
    assert_eq!(stored.body.text(), None);
}

#[tokio::test]
async fn messages_keep_send_order_per_pair() {
    let ctx = build_context();
    let sender = add_user(&ctx, "sender9").await;
    let recipient = add_user(&ctx, "recipient9").await;

    for text in ["first", "second", "third"] {
        ctx.service
            .send(SendMessageRequest {
                sender_id: sender,
                recipient_id: recipient,
                text: Some(text.into()),
                image: None,
            })
            .await
            .unwrap();
    }

    let history = ctx.service.conversation(recipient, sender).await.unwrap();
    let texts: Vec<_> = history.iter().filter_map(|m| m.body.text()).collect();
    assert_eq!(texts, vec!["first", "second", "third"]);
}

#[tokio::test]
async fn opening_conversation_marks_peer_messages_seen() {
    let ctx = build_context();
    let sender = add_user(&ctx, "sender10").await;
    let recipient = add_user(&ctx, "recipient10").await;

    ctx.service
        .send(SendMessageRequest {
            sender_id: sender,
            recipient_id: recipient,
            text: Some("unread".into()),
            image: None,
        })
        .await
        .unwrap();

    // 收件人打开会话：对方发来的消息被标记已读
    let history = ctx.service.conversation(recipient, sender).await.unwrap();
    assert!(history.iter().all(|m| m.seen));

    // 再次显式标记不再有未读
    let updated = ctx.service.mark_seen(recipient, sender).await.unwrap();
    assert_eq!(updated, 0);
}
