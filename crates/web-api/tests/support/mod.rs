#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use reqwest::Client;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::time::timeout;
use uuid::Uuid;

use application::media::memory::InMemoryMediaStore;
use application::repository::memory::{InMemoryMessageRepository, InMemoryUserRepository};
use application::{
    Clock, ConnectionRegistry, MessageService, MessageServiceDependencies, PasswordHasher,
    SystemClock, UserService, UserServiceDependencies,
};
use domain::PasswordHash;
use web_api::{router, AppState, JwtConfig, JwtService};

/// 明文直存的哈希器（用于测试），避免 bcrypt 拖慢集成测试
struct PlainTextHasher;

#[async_trait]
impl PasswordHasher for PlainTextHasher {
    async fn hash(
        &self,
        plaintext: &str,
    ) -> Result<PasswordHash, application::PasswordHasherError> {
        PasswordHash::new(format!("plain:{plaintext}"))
            .map_err(|err| application::PasswordHasherError::hash_error(err.to_string()))
    }

    async fn verify(
        &self,
        plaintext: &str,
        hashed: &PasswordHash,
    ) -> Result<bool, application::PasswordHasherError> {
        Ok(hashed.as_str() == format!("plain:{plaintext}"))
    }
}

/// 用内存适配器组装完整路由，测试不依赖外部服务
pub fn build_router() -> Router {
    let user_repository = Arc::new(InMemoryUserRepository::new());
    let message_repository = Arc::new(InMemoryMessageRepository::new());
    let media_store = Arc::new(InMemoryMediaStore::new());
    let password_hasher: Arc<dyn PasswordHasher> = Arc::new(PlainTextHasher);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let registry = Arc::new(ConnectionRegistry::new());

    let user_service = UserService::new(UserServiceDependencies {
        user_repository: user_repository.clone(),
        password_hasher,
        media_store: media_store.clone(),
        clock: clock.clone(),
    });

    let message_service = MessageService::new(MessageServiceDependencies {
        message_repository,
        user_repository,
        media_store,
        registry: registry.clone(),
        clock,
    });

    let jwt_service = Arc::new(JwtService::new(JwtConfig {
        secret: "integration-test-secret-key-0123456789".to_string(),
        expiration_hours: 24,
    }));

    let state = AppState::new(
        Arc::new(user_service),
        Arc::new(message_service),
        registry,
        jwt_service.clone(),
        jwt_service,
    );

    router(state)
}

/// 启动测试服务器，返回地址和优雅停机信号
pub async fn spawn_server() -> (SocketAddr, oneshot::Sender<()>) {
    let router = build_router();
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        axum::serve(listener, router.into_make_service())
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
            .ok();
    });

    (addr, shutdown_tx)
}

/// 注册并登录一个用户，返回 (user_id, token)
pub async fn register_and_login(client: &Client, base_http: &str, name: &str) -> (Uuid, String) {
    let user = client
        .post(format!("{}/api/v1/auth/register", base_http))
        .json(&json!({
            "username": name,
            "email": format!("{name}@example.com"),
            "password": "secret"
        }))
        .send()
        .await
        .expect("register")
        .json::<serde_json::Value>()
        .await
        .expect("register json");
    let user_id = user["id"].as_str().unwrap().parse::<Uuid>().unwrap();

    let login = client
        .post(format!("{}/api/v1/auth/login", base_http))
        .json(&json!({
            "email": format!("{name}@example.com"),
            "password": "secret"
        }))
        .send()
        .await
        .expect("login")
        .json::<serde_json::Value>()
        .await
        .expect("login json");
    let token = login["token"].as_str().unwrap().to_string();

    (user_id, token)
}

pub type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// 打开带凭证的 WebSocket 连接
pub async fn connect_ws(addr: SocketAddr, token: &str) -> WsStream {
    let ws_url = format!("ws://{}/api/v1/ws?token={}", addr, token);
    let (stream, _) = tokio_tungstenite::connect_async(ws_url)
        .await
        .expect("ws connect");
    stream
}

/// 读取下一条指定类型的服务器推送（2 秒超时）
pub async fn next_event_of(ws: &mut WsStream, event_type: &str) -> serde_json::Value {
    use futures::StreamExt;
    use tokio_tungstenite::tungstenite::Message;

    loop {
        let frame = timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("等待服务器推送超时")
            .expect("websocket stream ended")
            .expect("websocket error");

        if let Message::Text(text) = frame {
            let value: serde_json::Value = serde_json::from_str(&text).expect("push json");
            if value["type"] == event_type {
                return value;
            }
        }
    }
}

/// 断言一小段时间内没有任何文本推送到达
pub async fn assert_no_push(ws: &mut WsStream) {
    use futures::StreamExt;
    use tokio_tungstenite::tungstenite::Message;

    let result = timeout(Duration::from_millis(300), ws.next()).await;
    if let Ok(Some(Ok(Message::Text(text)))) = result {
        panic!("不应收到推送，却收到了: {text}");
    }
}

/// 把在线快照解析成 UserId 列表
pub fn online_set(event: &serde_json::Value) -> Vec<Uuid> {
    event["users"]
        .as_array()
        .expect("users array")
        .iter()
        .map(|u| u.as_str().unwrap().parse::<Uuid>().unwrap())
        .collect()
}
