use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures_util::StreamExt;
use thiserror::Error;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};
use tracing::{debug, warn};

use domain::{Message, ServerEvent, UserId};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("connect failed: {0}")]
    Connect(String),
}

/// 推给表现层的状态变化事件
#[derive(Debug, Clone, PartialEq)]
pub enum ViewEvent {
    /// 在线集合被新快照整体替换
    PresenceChanged { online: Vec<UserId> },
    /// 当前打开的会话新增了一条消息
    ConversationUpdated { peer: UserId },
    /// 非活跃会话收到消息，未读计数 +1
    MessageReceived { from: UserId },
    /// 连接已拆除（登出或传输层断开）
    Disconnected,
}

#[derive(Default)]
struct ViewState {
    authenticated: Option<UserId>,
    online: HashSet<UserId>,
    active_peer: Option<UserId>,
    active_messages: Vec<Message>,
    unseen: HashMap<UserId, u32>,
}

struct Inner {
    state: RwLock<ViewState>,
    connection: RwLock<Option<JoinHandle<()>>>,
    events: broadcast::Sender<ViewEvent>,
}

/// 客户端在线状态镜像
///
/// 每次 `connect` 先关闭已有连接，保证单个客户端进程至多一条连接。
/// 服务器推送的在线快照整体替换本地集合（last-write-wins，不做增量合并），
/// 收到的消息按"是否当前会话"决定追加还是累计未读。
#[derive(Clone)]
pub struct ClientPresenceView {
    inner: Arc<Inner>,
}

impl Default for ClientPresenceView {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientPresenceView {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            inner: Arc::new(Inner {
                state: RwLock::new(ViewState::default()),
                connection: RwLock::new(None),
                events,
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ViewEvent> {
        self.inner.events.subscribe()
    }

    /// 建立到服务器的长连接并开始消费推送。
    ///
    /// URL 携带凭证（`/ws?token=...`）。已有连接会先被关闭，
    /// 不会留下悬挂的重复连接。
    pub async fn connect(&self, ws_url: &str, user_id: UserId) -> Result<(), ClientError> {
        self.disconnect().await;

        let (stream, _response) = connect_async(ws_url)
            .await
            .map_err(|err| ClientError::Connect(err.to_string()))?;

        {
            let mut state = self.inner.state.write().await;
            state.authenticated = Some(user_id);
        }

        let (_write, mut read) = stream.split();
        let view = self.clone();
        let reader = tokio::spawn(async move {
            while let Some(frame) = read.next().await {
                match frame {
                    Ok(WsMessage::Text(text)) => match serde_json::from_str::<ServerEvent>(&text) {
                        Ok(event) => view.apply(event).await,
                        Err(err) => {
                            warn!(error = %err, "unrecognized server push, ignored");
                        }
                    },
                    Ok(WsMessage::Close(_)) => {
                        debug!("server closed the connection");
                        break;
                    }
                    Ok(_) => {}
                    Err(err) => {
                        debug!(error = %err, "websocket stream error");
                        break;
                    }
                }
            }
            // 传输层断开视同强制拆除：清状态，表现层收到通知后走重新登录流程
            view.finalize_closed().await;
        });

        let mut connection = self.inner.connection.write().await;
        *connection = Some(reader);
        Ok(())
    }

    /// 处理一条服务器推送。
    pub async fn apply(&self, event: ServerEvent) {
        match event {
            ServerEvent::OnlineUsers { users } => {
                let mut state = self.inner.state.write().await;
                // 全量快照整体替换，不做增量合并
                state.online = users.iter().copied().collect();
                drop(state);
                let _ = self
                    .inner
                    .events
                    .send(ViewEvent::PresenceChanged { online: users });
            }
            ServerEvent::NewMessage { message } => {
                let sender = message.sender_id;
                let mut state = self.inner.state.write().await;
                if state.active_peer == Some(sender) {
                    state.active_messages.push(message);
                    drop(state);
                    let _ = self
                        .inner
                        .events
                        .send(ViewEvent::ConversationUpdated { peer: sender });
                } else {
                    *state.unseen.entry(sender).or_insert(0) += 1;
                    drop(state);
                    let _ = self
                        .inner
                        .events
                        .send(ViewEvent::MessageReceived { from: sender });
                }
            }
        }
    }

    /// 打开与某个用户的会话：载入历史并把该用户的未读清零。
    pub async fn open_conversation(&self, peer: UserId, history: Vec<Message>) {
        let mut state = self.inner.state.write().await;
        state.active_peer = Some(peer);
        state.active_messages = history;
        state.unseen.remove(&peer);
    }

    /// 发送方本地乐观追加：自己发出的消息在响应返回后进入当前会话。
    pub async fn append_own_message(&self, message: Message) {
        let mut state = self.inner.state.write().await;
        if state.active_peer == Some(message.recipient_id) {
            state.active_messages.push(message);
        }
    }

    /// 登出或强制拆除：关闭连接（若有）、清空在线集合和身份标记。
    /// 对已关闭或不存在的连接重复调用是无害的空操作。
    pub async fn disconnect(&self) {
        let task = {
            let mut connection = self.inner.connection.write().await;
            connection.take()
        };
        let had_connection = task.is_some();
        if let Some(task) = task {
            // 读取任务被终止后流随之丢弃，底层连接关闭
            task.abort();
        }

        let was_authenticated = self.clear_state().await;
        // 本来就没有连接也没有身份时保持安静，不发多余事件
        if had_connection || was_authenticated {
            let _ = self.inner.events.send(ViewEvent::Disconnected);
        }
    }

    /// 读取任务在流结束时调用：此时不能 abort 自己，只收拾状态
    async fn finalize_closed(&self) {
        {
            let mut connection = self.inner.connection.write().await;
            connection.take();
        }
        self.clear_state().await;
        let _ = self.inner.events.send(ViewEvent::Disconnected);
    }

    async fn clear_state(&self) -> bool {
        let mut state = self.inner.state.write().await;
        let was_authenticated = state.authenticated.is_some();
        state.authenticated = None;
        state.online.clear();
        state.active_peer = None;
        state.active_messages.clear();
        was_authenticated
    }

    // ---- 状态访问器（表现层使用） ----

    pub async fn is_authenticated(&self) -> bool {
        self.inner.state.read().await.authenticated.is_some()
    }

    pub async fn online_users(&self) -> Vec<UserId> {
        self.inner
            .state
            .read()
            .await
            .online
            .iter()
            .copied()
            .collect()
    }

    pub async fn is_online(&self, user_id: UserId) -> bool {
        self.inner.state.read().await.online.contains(&user_id)
    }

    pub async fn unseen_count(&self, peer: UserId) -> u32 {
        self.inner
            .state
            .read()
            .await
            .unseen
            .get(&peer)
            .copied()
            .unwrap_or(0)
    }

    pub async fn active_messages(&self) -> Vec<Message> {
        self.inner.state.read().await.active_messages.clone()
    }
}
