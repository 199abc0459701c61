//! 私聊系统核心领域模型
//!
//! 包含用户、私信消息等核心实体，以及在线状态推送协议和相关业务规则。

pub mod errors;
pub mod events;
pub mod message;
pub mod user;
pub mod value_objects;

// 重新导出常用类型
pub use errors::*;
pub use events::*;
pub use message::*;
pub use user::*;
pub use value_objects::*;
