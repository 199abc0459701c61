//! 服务端推送协议
//!
//! 服务器主动推送给客户端的事件，以 JSON 文本帧传输。
//! 在线用户列表始终是全量快照而不是增量，客户端整体替换本地集合。

use serde::{Deserialize, Serialize};

use crate::message::Message;
use crate::value_objects::UserId;

/// 服务器发送的消息类型
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// 在线用户全量快照，注册表每次变化后广播给所有连接
    OnlineUsers { users: Vec<UserId> },
    /// 新消息实时投递，仅推送给收件人的连接
    NewMessage { message: Message },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value_objects::MessageBody;
    use crate::MessageId;
    use chrono::Utc;
    use uuid::Uuid;

    #[test]
    fn server_event_round_trips_as_tagged_json() {
        let event = ServerEvent::OnlineUsers {
            users: vec![UserId::from(Uuid::new_v4())],
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"online_users\""));

        let parsed: ServerEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, event);
    }

    #[test]
    fn new_message_event_carries_flattened_body() {
        let message = Message::new(
            MessageId::from(Uuid::new_v4()),
            UserId::from(Uuid::new_v4()),
            UserId::from(Uuid::new_v4()),
            MessageBody::from_parts(Some("hi".into()), None).unwrap(),
            Utc::now(),
        );
        let json = serde_json::to_string(&ServerEvent::NewMessage { message }).unwrap();
        assert!(json.contains("\"type\":\"new_message\""));
        assert!(json.contains("\"kind\":\"text\""));
    }
}
