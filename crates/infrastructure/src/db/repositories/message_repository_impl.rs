//! 消息Repository实现

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use application::repository::MessageRepository;
use domain::{Message, MessageBody, MessageId, RepositoryError, UserId};

use super::map_sqlx_error;
use crate::db::DbPool;

/// 数据库消息模型
///
/// text / image_url 在库里是两个可空列，CHECK 约束保证恰好一个非空。
#[derive(Debug, Clone, FromRow)]
struct DbMessage {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub recipient_id: Uuid,
    pub text: Option<String>,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub seen: bool,
}

impl DbMessage {
    fn into_domain(self) -> Result<Message, RepositoryError> {
        let body = MessageBody::from_parts(self.text, self.image_url)
            .map_err(|err| RepositoryError::storage(format!("corrupt message row {}: {err}", self.id)))?;

        let mut message = Message::new(
            MessageId::from(self.id),
            UserId::from(self.sender_id),
            UserId::from(self.recipient_id),
            body,
            self.created_at,
        );
        if self.seen {
            message.mark_seen();
        }
        Ok(message)
    }
}

/// 消息Repository实现
pub struct PgMessageRepository {
    pool: DbPool,
}

impl PgMessageRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageRepository for PgMessageRepository {
    async fn create(&self, message: Message) -> Result<Message, RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO messages (id, sender_id, recipient_id, text, image_url, created_at, seen)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(Uuid::from(message.id))
        .bind(Uuid::from(message.sender_id))
        .bind(Uuid::from(message.recipient_id))
        .bind(message.body.text())
        .bind(message.body.image_url())
        .bind(message.created_at)
        .bind(message.seen)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(message)
    }

    async fn find_by_id(&self, id: MessageId) -> Result<Option<Message>, RepositoryError> {
        let row: Option<DbMessage> = sqlx::query_as(
            r#"
            SELECT id, sender_id, recipient_id, text, image_url, created_at, seen
            FROM messages
            WHERE id = $1
            "#,
        )
        .bind(Uuid::from(id))
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(DbMessage::into_domain).transpose()
    }

    async fn list_between(&self, a: UserId, b: UserId) -> Result<Vec<Message>, RepositoryError> {
        let rows: Vec<DbMessage> = sqlx::query_as(
            r#"
            SELECT id, sender_id, recipient_id, text, image_url, created_at, seen
            FROM messages
            WHERE (sender_id = $1 AND recipient_id = $2)
               OR (sender_id = $2 AND recipient_id = $1)
            ORDER BY created_at ASC
            "#,
        )
        .bind(Uuid::from(a))
        .bind(Uuid::from(b))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(DbMessage::into_domain).collect()
    }

    async fn mark_conversation_seen(
        &self,
        viewer: UserId,
        peer: UserId,
    ) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE messages
            SET seen = TRUE
            WHERE recipient_id = $1 AND sender_id = $2 AND seen = FALSE
            "#,
        )
        .bind(Uuid::from(viewer))
        .bind(Uuid::from(peer))
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }
}
