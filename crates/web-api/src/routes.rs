use axum::{
    extract::{Path, Query, State, WebSocketUpgrade},
    http::{HeaderMap, StatusCode},
    response::Response,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;

use application::services::{
    AuthenticateUserRequest, RegisterUserRequest, SendMessageRequest, UpdateProfileRequest,
};
use domain::{Message, User};

use crate::{auth::LoginResponse, error::ApiError, state::AppState, ws_connection::WebSocketConnection};

#[derive(Debug, Deserialize)]
struct RegisterPayload {
    username: String,
    email: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct LoginPayload {
    email: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct UpdateProfilePayload {
    username: Option<String>,
    bio: Option<String>,
    /// 内联头像数据（base64 data URI）
    profile_pic: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SendMessagePayload {
    text: Option<String>,
    /// 内联图片数据（base64 data URI）
    image: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WsQuery {
    #[serde(default)]
    token: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register_user))
        .route("/auth/login", post(login_user))
        .route("/auth/check", get(auth_check))
        .route("/auth/profile", put(update_profile))
        .route("/users", get(list_users))
        .route(
            "/messages/{peer_id}",
            get(get_conversation).post(send_message),
        )
        .route("/messages/{peer_id}/seen", put(mark_seen))
        .route("/ws", get(websocket_upgrade))
}

async fn health() -> StatusCode {
    StatusCode::OK
}

async fn register_user(
    State(state): State<AppState>,
    Json(payload): Json<RegisterPayload>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    let user = state
        .user_service
        .register(RegisterUserRequest {
            username: payload.username,
            email: payload.email,
            password: payload.password,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(user)))
}

async fn login_user(
    State(state): State<AppState>,
    Json(payload): Json<LoginPayload>,
) -> Result<Json<LoginResponse>, ApiError> {
    let user = state
        .user_service
        .authenticate(AuthenticateUserRequest {
            email: payload.email,
            password: payload.password,
        })
        .await?;

    let token = state.jwt_service.generate_token(Uuid::from(user.id))?;

    Ok(Json(LoginResponse { user, token }))
}

async fn auth_check(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<User>, ApiError> {
    let user_id = state.jwt_service.extract_user_from_headers(&headers)?;
    let user = state.user_service.get_user(user_id).await?;
    Ok(Json(user))
}

async fn update_profile(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<UpdateProfilePayload>,
) -> Result<Json<User>, ApiError> {
    let user_id = state.jwt_service.extract_user_from_headers(&headers)?;
    let user = state
        .user_service
        .update_profile(UpdateProfileRequest {
            user_id,
            username: payload.username,
            bio: payload.bio,
            profile_pic: payload.profile_pic,
        })
        .await?;
    Ok(Json(user))
}

/// 侧边栏用户列表：除自己之外的所有用户
async fn list_users(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<User>>, ApiError> {
    let user_id = state.jwt_service.extract_user_from_headers(&headers)?;
    let peers = state.user_service.list_peers(user_id).await?;
    Ok(Json(peers))
}

/// 拉取与某个用户的会话历史，同时把对方发来的消息标记已读
async fn get_conversation(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(peer_id): Path<Uuid>,
) -> Result<Json<Vec<Message>>, ApiError> {
    let user_id = state.jwt_service.extract_user_from_headers(&headers)?;
    let messages = state.message_service.conversation(user_id, peer_id).await?;
    Ok(Json(messages))
}

async fn send_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(peer_id): Path<Uuid>,
    Json(payload): Json<SendMessagePayload>,
) -> Result<(StatusCode, Json<Message>), ApiError> {
    let user_id = state.jwt_service.extract_user_from_headers(&headers)?;
    let message = state
        .message_service
        .send(SendMessageRequest {
            sender_id: user_id,
            recipient_id: peer_id,
            text: payload.text,
            image: payload.image,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

async fn mark_seen(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(peer_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user_id = state.jwt_service.extract_user_from_headers(&headers)?;
    let updated = state.message_service.mark_seen(user_id, peer_id).await?;
    Ok(Json(json!({ "updated": updated })))
}

/// WebSocket 升级入口。
///
/// 凭证先过会话闸门：解析不出用户身份的连接直接拒绝（401），
/// 不保留匿名通道。通过后升级为长连接并进入注册表。
async fn websocket_upgrade(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let user_id = state
        .session_gate
        .admit(&query.token)
        .await
        .map_err(|_| ApiError::auth_rejected("invalid or missing credential"))?;

    tracing::info!(user_id = %user_id, "WebSocket upgrade admitted");

    Ok(ws.on_upgrade(move |socket| async move {
        WebSocketConnection::new(socket, state, user_id).run().await;
    }))
}
