use axum::extract::ws::{Message as WsMessage, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use application::ConnectionHandle;
use domain::UserId;

use crate::state::AppState;

/// WebSocket 连接管理器
///
/// 封装单个 WebSocket 连接的完整生命周期：
/// - 进入注册表（触发在线状态广播）
/// - 把注册表推来的事件转发到对端
/// - 断开时带着句柄身份注销（过期断开在注册表内被忽略）
pub struct WebSocketConnection {
    socket: WebSocket,
    state: AppState,
    user_id: UserId,
}

impl WebSocketConnection {
    pub fn new(socket: WebSocket, state: AppState, user_id: UserId) -> Self {
        Self {
            socket,
            state,
            user_id,
        }
    }

    /// 运行 WebSocket 连接的主循环。
    ///
    /// 注册表持有本连接句柄的唯一发送端：句柄被新连接替换时队列关闭，
    /// 转发任务随之结束，旧连接自动断开——"后连接获胜"不需要额外信令。
    pub async fn run(self) {
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let handle = ConnectionHandle::new(self.user_id, event_tx);
        let connection_id = handle.connection_id();

        tracing::info!(user_id = %self.user_id, connection_id = %connection_id, "WebSocket 连接已建立");

        self.state.registry.register(handle).await;

        let (mut sender, mut incoming) = self.socket.split();

        // 发送任务：把注册表投递的事件序列化成文本帧
        let mut send_task = tokio::spawn(async move {
            while let Some(event) = event_rx.recv().await {
                let payload = match serde_json::to_string(&event) {
                    Ok(json) => json,
                    Err(err) => {
                        tracing::warn!(error = %err, "failed to serialize websocket payload");
                        continue;
                    }
                };
                if sender.send(WsMessage::Text(payload.into())).await.is_err() {
                    tracing::debug!("websocket send failed, closing forward loop");
                    break;
                }
            }
            tracing::debug!("WebSocket发送任务结束");
        });

        // 接收任务：客户端不经 WebSocket 发消息（发送走 REST），
        // 这里只等待关闭或错误；心跳由底层协议栈自动应答
        let mut recv_task = tokio::spawn(async move {
            while let Some(result) = incoming.next().await {
                match result {
                    Ok(WsMessage::Close(_)) => {
                        tracing::debug!("WebSocket收到关闭消息");
                        break;
                    }
                    Ok(_) => {}
                    Err(err) => {
                        tracing::debug!(error = %err, "websocket receive error");
                        break;
                    }
                }
            }
            tracing::debug!("WebSocket接收任务结束");
        });

        // 等待任意一个任务完成（连接断开或句柄被替换），
        // 另一个任务随即终止，两个半边都释放后底层连接才会真正关闭
        tokio::select! {
            _ = &mut send_task => recv_task.abort(),
            _ = &mut recv_task => send_task.abort(),
        }

        // 带着句柄身份注销：只会移除仍然注册着的这条连接
        self.state
            .registry
            .unregister(self.user_id, connection_id)
            .await;

        tracing::info!(user_id = %self.user_id, connection_id = %connection_id, "WebSocket连接已断开，在线状态已清理");
    }
}
