//! 应用层实现。
//!
//! 这里提供围绕领域模型的用例服务，处理输入校验、持久化边界、
//! 以及对外部适配器（例如密码哈希、媒体存储、会话验证）的抽象。
//! 连接注册表和在线状态广播器也定义在这一层：它们是纯内存结构，
//! 不依赖任何基础设施。

pub mod broadcaster;
pub mod clock;
pub mod error;
pub mod media;
pub mod password;
pub mod registry;
pub mod repository;
pub mod services;
pub mod session;

pub use broadcaster::PresenceBroadcaster;
pub use clock::{Clock, SystemClock};
pub use error::ApplicationError;
pub use media::{MediaStore, MediaStoreError};
pub use password::{PasswordHasher, PasswordHasherError};
pub use registry::{ConnectionHandle, ConnectionRegistry, PushError};
pub use repository::{MessageRepository, UserRepository};
pub use services::{
    AuthenticateUserRequest, MessageService, MessageServiceDependencies, RegisterUserRequest,
    SendMessageRequest, UpdateProfileRequest, UserService, UserServiceDependencies,
};
pub use session::{SessionGate, SessionGateError};
