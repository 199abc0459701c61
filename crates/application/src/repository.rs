use async_trait::async_trait;
use domain::{Message, MessageId, RepositoryError, User, UserEmail, UserId};

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, user: User) -> Result<User, RepositoryError>;
    async fn update(&self, user: User) -> Result<User, RepositoryError>;
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError>;
    async fn find_by_email(&self, email: UserEmail) -> Result<Option<User>, RepositoryError>;
    /// 侧边栏用户列表：除指定用户外的全部用户
    async fn list_except(&self, excluded: UserId) -> Result<Vec<User>, RepositoryError>;
}

#[async_trait]
pub trait MessageRepository: Send + Sync {
    // 追加一条消息，这是投递流程的持久化提交点
    async fn create(&self, message: Message) -> Result<Message, RepositoryError>;

    // 根据ID查找消息
    async fn find_by_id(&self, id: MessageId) -> Result<Option<Message>, RepositoryError>;

    // 一对用户之间的双向历史，按 created_at 升序
    async fn list_between(&self, a: UserId, b: UserId) -> Result<Vec<Message>, RepositoryError>;

    // 把 peer 发给 viewer 的未读消息全部标记已读，返回受影响条数
    async fn mark_conversation_seen(
        &self,
        viewer: UserId,
        peer: UserId,
    ) -> Result<u64, RepositoryError>;
}

/// 内存实现的仓储（用于测试）
pub mod memory {
    use super::*;
    use std::collections::HashMap;
    use tokio::sync::RwLock;

    #[derive(Default)]
    pub struct InMemoryUserRepository {
        users: RwLock<HashMap<UserId, User>>,
    }

    impl InMemoryUserRepository {
        pub fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl UserRepository for InMemoryUserRepository {
        async fn create(&self, user: User) -> Result<User, RepositoryError> {
            let mut users = self.users.write().await;
            if users.contains_key(&user.id) {
                return Err(RepositoryError::Conflict);
            }
            if users.values().any(|u| u.email == user.email) {
                return Err(RepositoryError::Conflict);
            }
            users.insert(user.id, user.clone());
            Ok(user)
        }

        async fn update(&self, user: User) -> Result<User, RepositoryError> {
            let mut users = self.users.write().await;
            if !users.contains_key(&user.id) {
                return Err(RepositoryError::NotFound);
            }
            users.insert(user.id, user.clone());
            Ok(user)
        }

        async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
            let users = self.users.read().await;
            Ok(users.get(&id).cloned())
        }

        async fn find_by_email(&self, email: UserEmail) -> Result<Option<User>, RepositoryError> {
            let users = self.users.read().await;
            Ok(users.values().find(|u| u.email == email).cloned())
        }

        async fn list_except(&self, excluded: UserId) -> Result<Vec<User>, RepositoryError> {
            let users = self.users.read().await;
            let mut result: Vec<User> = users
                .values()
                .filter(|u| u.id != excluded)
                .cloned()
                .collect();
            result.sort_by(|a, b| a.created_at.cmp(&b.created_at));
            Ok(result)
        }
    }

    #[derive(Default)]
    pub struct InMemoryMessageRepository {
        messages: RwLock<Vec<Message>>,
    }

    impl InMemoryMessageRepository {
        pub fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl MessageRepository for InMemoryMessageRepository {
        async fn create(&self, message: Message) -> Result<Message, RepositoryError> {
            let mut messages = self.messages.write().await;
            messages.push(message.clone());
            Ok(message)
        }

        async fn find_by_id(&self, id: MessageId) -> Result<Option<Message>, RepositoryError> {
            let messages = self.messages.read().await;
            Ok(messages.iter().find(|m| m.id == id).cloned())
        }

        async fn list_between(
            &self,
            a: UserId,
            b: UserId,
        ) -> Result<Vec<Message>, RepositoryError> {
            let messages = self.messages.read().await;
            let mut result: Vec<Message> = messages
                .iter()
                .filter(|m| {
                    (m.sender_id == a && m.recipient_id == b)
                        || (m.sender_id == b && m.recipient_id == a)
                })
                .cloned()
                .collect();
            result.sort_by(|x, y| x.created_at.cmp(&y.created_at));
            Ok(result)
        }

        async fn mark_conversation_seen(
            &self,
            viewer: UserId,
            peer: UserId,
        ) -> Result<u64, RepositoryError> {
            let mut messages = self.messages.write().await;
            let mut updated = 0u64;
            for message in messages.iter_mut() {
                if message.sender_id == peer && message.recipient_id == viewer && !message.seen {
                    message.mark_seen();
                    updated += 1;
                }
            }
            Ok(updated)
        }
    }
}
