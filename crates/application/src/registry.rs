//! 连接注册表
//!
//! "谁在线"的唯一事实来源：user_id -> 活跃连接句柄的内存映射。
//! 进程启动时创建一个实例，进程结束随之销毁，没有任何全局可变状态。
//!
//! 不变量：
//! - 每个用户同一时刻至多一条注册的连接，新连接替换旧连接（后连接获胜）；
//! - 被替换的句柄随替换一起关闭，不产生独立的下线事件；
//! - 过期的断开通知（句柄身份不匹配）不会移除当前注册的连接；
//! - 每次成功的注册/注销触发恰好一次在线状态广播。

use std::collections::HashMap;

use thiserror::Error;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info};

use domain::{ConnectionId, ServerEvent, UserId};

use crate::broadcaster::PresenceBroadcaster;

/// 单条活跃连接的服务端句柄
///
/// 句柄在注册表中的生命周期内由注册表独占持有。发送端是转发任务
/// 接收队列的唯一入口，句柄被丢弃时队列关闭，连接的转发循环随之结束。
#[derive(Debug)]
pub struct ConnectionHandle {
    user_id: UserId,
    connection_id: ConnectionId,
    sender: mpsc::UnboundedSender<ServerEvent>,
}

#[derive(Debug, Error)]
#[error("connection closed")]
pub struct PushError;

impl ConnectionHandle {
    pub fn new(user_id: UserId, sender: mpsc::UnboundedSender<ServerEvent>) -> Self {
        Self {
            user_id,
            connection_id: ConnectionId::generate(),
            sender,
        }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    /// 向这条连接投递一个事件。接收任务已退出时失败。
    pub fn push(&self, event: ServerEvent) -> Result<(), PushError> {
        self.sender.send(event).map_err(|_| PushError)
    }
}

/// 连接注册表
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<UserId, ConnectionHandle>>,
    broadcaster: PresenceBroadcaster,
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            broadcaster: PresenceBroadcaster::new(),
        }
    }

    /// 注册一条连接。
    ///
    /// 同一用户已有连接时旧句柄被替换并随之关闭（后连接获胜）。
    /// 广播在写锁内完成：推送走无界队列不会阻塞，同时保证
    /// 广播顺序与注册表变更顺序一致、快照不会被并发修改撕裂。
    pub async fn register(&self, handle: ConnectionHandle) {
        let user_id = handle.user_id();
        let connection_id = handle.connection_id();

        let mut connections = self.connections.write().await;
        if let Some(replaced) = connections.insert(user_id, handle) {
            // 旧句柄在此处被丢弃，对应连接的转发任务随队列关闭而结束
            info!(
                user_id = %user_id,
                old_connection = %replaced.connection_id(),
                new_connection = %connection_id,
                "duplicate connection, last one wins"
            );
        } else {
            info!(user_id = %user_id, connection_id = %connection_id, "connection registered");
        }

        self.broadcaster.presence_changed(&connections);
    }

    /// 注销一条连接。
    ///
    /// 仅当注册表中存着的正是这条连接（connection_id 相同）时才移除，
    /// 防止过期的断开通知与同一用户的新连接竞争。
    pub async fn unregister(&self, user_id: UserId, connection_id: ConnectionId) {
        let mut connections = self.connections.write().await;

        let matches = match connections.get(&user_id) {
            Some(current) if current.connection_id() == connection_id => true,
            Some(current) => {
                // 过期断开：当前注册的已经是更新的连接，忽略
                debug!(
                    user_id = %user_id,
                    stale_connection = %connection_id,
                    current_connection = %current.connection_id(),
                    "stale disconnect ignored"
                );
                false
            }
            None => {
                debug!(user_id = %user_id, connection_id = %connection_id, "disconnect for unknown user ignored");
                false
            }
        };

        if matches {
            connections.remove(&user_id);
            info!(user_id = %user_id, connection_id = %connection_id, "connection unregistered");
            self.broadcaster.presence_changed(&connections);
        }
    }

    /// 当前在线用户集合的快照。顺序无保证，调用方按集合处理。
    pub async fn snapshot(&self) -> Vec<UserId> {
        let connections = self.connections.read().await;
        connections.keys().copied().collect()
    }

    pub async fn is_online(&self, user_id: UserId) -> bool {
        let connections = self.connections.read().await;
        connections.contains_key(&user_id)
    }

    /// 向指定用户的连接投递事件（在线时）。
    ///
    /// 返回是否投递成功；用户不在线或句柄已关闭都返回 false，
    /// 投递失败不影响调用方——正确性只依赖持久化存储。
    pub async fn push_to_user(&self, user_id: UserId, event: ServerEvent) -> bool {
        let connections = self.connections.read().await;
        match connections.get(&user_id) {
            Some(handle) => match handle.push(event) {
                Ok(()) => true,
                Err(err) => {
                    tracing::warn!(user_id = %user_id, error = %err, "live push failed, message stays in store");
                    false
                }
            },
            None => false,
        }
    }
}
