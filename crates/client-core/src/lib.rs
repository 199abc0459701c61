//! 客户端在线状态镜像
//!
//! 服务端在线协议在单个客户端进程里的消费侧实现：持有当前连接句柄
//! 和在线用户集合，响应服务器推送，并负责连接的建立与拆除。
//! 与任何渲染机制解耦，表现层通过订阅事件流和状态访问器消费。

mod view;

pub use view::{ClientError, ClientPresenceView, ViewEvent};
