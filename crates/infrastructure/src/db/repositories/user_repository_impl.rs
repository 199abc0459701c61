//! 用户Repository实现

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use application::repository::UserRepository;
use domain::{PasswordHash, RepositoryError, User, UserEmail, UserId, Username};

use super::map_sqlx_error;
use crate::db::DbPool;

/// 数据库用户模型
#[derive(Debug, Clone, FromRow)]
struct DbUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub bio: Option<String>,
    pub profile_pic: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DbUser {
    fn into_domain(self) -> Result<User, RepositoryError> {
        let row_id = self.id;
        let corrupt =
            |err: domain::DomainError| RepositoryError::storage(format!("corrupt user row {row_id}: {err}"));

        Ok(User {
            id: UserId::from(self.id),
            username: Username::parse(self.username).map_err(corrupt)?,
            email: UserEmail::parse(self.email).map_err(corrupt)?,
            password: PasswordHash::new(self.password_hash).map_err(corrupt)?,
            bio: self.bio,
            profile_pic: self.profile_pic,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const SELECT_COLUMNS: &str =
    "id, username, email, password_hash, bio, profile_pic, created_at, updated_at";

/// 用户Repository实现
pub struct PgUserRepository {
    pool: DbPool,
}

impl PgUserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn create(&self, user: User) -> Result<User, RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, username, email, password_hash, bio, profile_pic, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(Uuid::from(user.id))
        .bind(user.username.as_str())
        .bind(user.email.as_str())
        .bind(user.password.as_str())
        .bind(user.bio.as_deref())
        .bind(user.profile_pic.as_deref())
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(user)
    }

    async fn update(&self, user: User) -> Result<User, RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET username = $2, email = $3, password_hash = $4, bio = $5,
                profile_pic = $6, updated_at = $7
            WHERE id = $1
            "#,
        )
        .bind(Uuid::from(user.id))
        .bind(user.username.as_str())
        .bind(user.email.as_str())
        .bind(user.password.as_str())
        .bind(user.bio.as_deref())
        .bind(user.profile_pic.as_deref())
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(user)
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row: Option<DbUser> = sqlx::query_as(&format!(
            "SELECT {SELECT_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(Uuid::from(id))
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(DbUser::into_domain).transpose()
    }

    async fn find_by_email(&self, email: UserEmail) -> Result<Option<User>, RepositoryError> {
        let row: Option<DbUser> = sqlx::query_as(&format!(
            "SELECT {SELECT_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(DbUser::into_domain).transpose()
    }

    async fn list_except(&self, excluded: UserId) -> Result<Vec<User>, RepositoryError> {
        let rows: Vec<DbUser> = sqlx::query_as(&format!(
            "SELECT {SELECT_COLUMNS} FROM users WHERE id <> $1 ORDER BY created_at ASC"
        ))
        .bind(Uuid::from(excluded))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(DbUser::into_domain).collect()
    }
}
