//! 在线状态广播器
//!
//! 注册表每次成功变更后调用，把**全量**在线用户集合推送给**所有**
//! 已注册的连接，而不是只通知发生变化的那一个。客户端需要完整集合
//! 来渲染所有可见用户的状态，增量协调在这个规模下是不必要的复杂度。

use std::collections::HashMap;

use tracing::{debug, warn};

use domain::{ServerEvent, UserId};

use crate::registry::ConnectionHandle;

/// 全量在线状态广播器
#[derive(Debug, Default)]
pub struct PresenceBroadcaster;

impl PresenceBroadcaster {
    pub fn new() -> Self {
        Self
    }

    /// 把当前在线集合推送给每一条连接。
    ///
    /// 调用方持有注册表写锁，传入的映射就是一致的时点快照。
    /// 单条连接推送失败只记日志并跳过，绝不阻断对其余连接的投递。
    pub fn presence_changed(&self, connections: &HashMap<UserId, ConnectionHandle>) {
        let online: Vec<UserId> = connections.keys().copied().collect();
        let event = ServerEvent::OnlineUsers {
            users: online.clone(),
        };

        let mut failed = 0usize;
        for (user_id, handle) in connections {
            if handle.push(event.clone()).is_err() {
                failed += 1;
                warn!(user_id = %user_id, "presence push to stale connection failed, skipped");
            }
        }

        debug!(
            online = online.len(),
            failed, "presence snapshot broadcast"
        );
    }
}
