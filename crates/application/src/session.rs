//! 会话准入
//!
//! 连接请求携带的凭证在进入注册表之前必须通过这里验证。
//! 凭证无法解析出用户身份时整个连接被拒绝，不保留匿名通道。

use async_trait::async_trait;
use domain::UserId;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionGateError {
    /// 凭证缺失、过期或无法验证
    #[error("credential rejected")]
    Rejected,
}

#[async_trait]
pub trait SessionGate: Send + Sync {
    /// 验证凭证并解析出用户身份，失败即拒绝准入。
    async fn admit(&self, credential: &str) -> Result<UserId, SessionGateError>;
}
