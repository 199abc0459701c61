use std::sync::Arc;

use domain::{DomainError, Message, MessageBody, MessageId, ServerEvent, UserId};
use uuid::Uuid;

use crate::{
    clock::Clock,
    error::ApplicationError,
    media::MediaStore,
    registry::ConnectionRegistry,
    repository::{MessageRepository, UserRepository},
};

#[derive(Debug, Clone)]
pub struct SendMessageRequest {
    pub sender_id: Uuid,
    pub recipient_id: Uuid,
    pub text: Option<String>,
    /// 内联图片数据（base64 data URI），持久化前先换取托管 URL
    pub image: Option<String>,
}

pub struct MessageServiceDependencies {
    pub message_repository: Arc<dyn MessageRepository>,
    pub user_repository: Arc<dyn UserRepository>,
    pub media_store: Arc<dyn MediaStore>,
    pub registry: Arc<ConnectionRegistry>,
    pub clock: Arc<dyn Clock>,
}

/// 消息路由服务
///
/// 每次发送：校验 -> 持久化 -> 在线则实时推送。
/// 持久化是唯一的提交点；推送纯属尽力而为，失败不回滚也不重试，
/// 收件人下次拉取历史时自然能看到这条消息。
pub struct MessageService {
    deps: MessageServiceDependencies,
}

impl MessageService {
    pub fn new(deps: MessageServiceDependencies) -> Self {
        Self { deps }
    }

    pub async fn send(&self, request: SendMessageRequest) -> Result<Message, ApplicationError> {
        let sender_id = UserId::from(request.sender_id);
        let recipient_id = UserId::from(request.recipient_id);

        // 负载校验先行：零个或两个负载直接拒绝，不产生任何副作用
        if request.text.is_some() == request.image.is_some() {
            return Err(DomainError::InvalidPayload.into());
        }

        self.deps
            .user_repository
            .find_by_id(recipient_id)
            .await?
            .ok_or(DomainError::UserNotFound)?;

        // 图片先交给媒体存储换取 URL，核心只保存不透明字符串
        let image_url = match &request.image {
            Some(data_uri) => Some(self.deps.media_store.upload_image(data_uri).await?),
            None => None,
        };
        let body = MessageBody::from_parts(request.text, image_url)?;

        // 持久化提交点：失败则整个发送失败，不尝试实时投递
        let message = Message::new(
            MessageId::from(Uuid::new_v4()),
            sender_id,
            recipient_id,
            body,
            self.deps.clock.now(),
        );
        let stored = self.deps.message_repository.create(message).await?;

        // 收件人在线则推送到且仅到它的连接；失败无害，消息已落库
        let delivered = self
            .deps
            .registry
            .push_to_user(
                recipient_id,
                ServerEvent::NewMessage {
                    message: stored.clone(),
                },
            )
            .await;
        if delivered {
            tracing::debug!(message_id = %stored.id, recipient_id = %recipient_id, "message pushed live");
        } else {
            tracing::debug!(
                message_id = %stored.id,
                recipient_id = %recipient_id,
                "recipient offline, message waits in store"
            );
        }

        Ok(stored)
    }

    /// 拉取与某个用户的完整双向历史。
    ///
    /// 打开会话即视为阅读：先把对方发来的未读消息标记已读再返回。
    pub async fn conversation(
        &self,
        viewer_id: Uuid,
        peer_id: Uuid,
    ) -> Result<Vec<Message>, ApplicationError> {
        let viewer = UserId::from(viewer_id);
        let peer = UserId::from(peer_id);

        self.deps
            .message_repository
            .mark_conversation_seen(viewer, peer)
            .await?;

        let messages = self.deps.message_repository.list_between(viewer, peer).await?;
        Ok(messages)
    }

    /// 显式把某个会话中对方发来的消息标记已读，返回受影响条数。
    pub async fn mark_seen(&self, viewer_id: Uuid, peer_id: Uuid) -> Result<u64, ApplicationError> {
        let updated = self
            .deps
            .message_repository
            .mark_conversation_seen(UserId::from(viewer_id), UserId::from(peer_id))
            .await?;
        Ok(updated)
    }
}
