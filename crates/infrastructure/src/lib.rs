//! 基础设施层
//!
//! 应用层各抽象端口的具体实现：PostgreSQL 仓储、bcrypt 密码哈希、
//! 以及 Cloudinary 风格的媒体上传适配器。

pub mod db;
pub mod media;
pub mod password;

pub use db::{create_pg_pool, DbPool, PgMessageRepository, PgUserRepository};
pub use media::CloudinaryMediaStore;
pub use password::BcryptPasswordHasher;
