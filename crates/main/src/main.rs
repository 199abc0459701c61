//! 主应用程序入口
//!
//! 启动 Axum Web API 服务。

use std::sync::Arc;

use application::{
    ConnectionRegistry, MessageService, MessageServiceDependencies, SystemClock, UserService,
    UserServiceDependencies,
};
use config::AppConfig;
use infrastructure::{
    create_pg_pool, BcryptPasswordHasher, CloudinaryMediaStore, PgMessageRepository,
    PgUserRepository,
};
use tracing_subscriber::EnvFilter;
use web_api::{router, AppState, JwtService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // 读取环境变量配置
    let config = AppConfig::from_env_with_defaults();
    if let Err(err) = config.validate() {
        tracing::warn!(error = %err, "配置未通过生产环境校验，仅适用于开发环境");
    }

    tracing::info!(
        "连接数据库: {}",
        config.database.url.split('@').next_back().unwrap_or("unknown")
    );

    // 创建 PostgreSQL 连接池并运行迁移
    let pg_pool = create_pg_pool(&config.database.url, config.database.max_connections).await?;
    sqlx::migrate!("../../migrations").run(&pg_pool).await?;

    // 创建具体的 repository 实例
    let user_repository = Arc::new(PgUserRepository::new(pg_pool.clone()));
    let message_repository = Arc::new(PgMessageRepository::new(pg_pool));

    // 外部适配器
    let password_hasher: Arc<dyn application::PasswordHasher> =
        Arc::new(BcryptPasswordHasher::new(config.server.bcrypt_cost));
    let media_store: Arc<dyn application::MediaStore> =
        Arc::new(CloudinaryMediaStore::new(config.media.clone()));
    let clock: Arc<dyn application::Clock> = Arc::new(SystemClock);

    // 连接注册表：进程内唯一的"谁在线"事实来源
    let registry = Arc::new(ConnectionRegistry::new());

    // 创建应用层服务
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

    // JWT 会话服务，同时充当 WebSocket 准入闸门
    let jwt_service = Arc::new(JwtService::new(config.jwt.clone()));

    // 创建应用状态
    let state = AppState::new(
        Arc::new(user_service),
        Arc::new(message_service),
        registry,
        jwt_service.clone(),
        jwt_service,
    );

    // 启动 Web 服务器
    let app = router(state);
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("私聊服务器启动在 http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
