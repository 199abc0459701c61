use crate::value_objects::{MessageBody, MessageId, Timestamp, UserId};

/// 一条私信。持久化之后除 `seen` 标记外不可变。
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub sender_id: UserId,
    pub recipient_id: UserId,
    #[serde(flatten)]
    pub body: MessageBody,
    pub created_at: Timestamp,
    pub seen: bool,
}

impl Message {
    pub fn new(
        id: MessageId,
        sender_id: UserId,
        recipient_id: UserId,
        body: MessageBody,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id,
            sender_id,
            recipient_id,
            body,
            created_at,
            seen: false,
        }
    }

    /// seen 只允许 false -> true 单向迁移，重复调用无效果。
    pub fn mark_seen(&mut self) {
        self.seen = true;
    }
}
