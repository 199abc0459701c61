//! 用户服务单元测试

use std::sync::Arc;

use async_trait::async_trait;
use domain::PasswordHash;
use uuid::Uuid;

use crate::clock::SystemClock;
use crate::error::ApplicationError;
use crate::media::memory::InMemoryMediaStore;
use crate::password::{PasswordHasher, PasswordHasherError};
use crate::repository::memory::InMemoryUserRepository;
use crate::services::{
    AuthenticateUserRequest, RegisterUserRequest, UpdateProfileRequest, UserService,
    UserServiceDependencies,
};

/// 明文直存的哈希器（用于测试），避免 bcrypt 拖慢单元测试
struct PlainTextHasher;

#[async_trait]
impl PasswordHasher for PlainTextHasher {
    async fn hash(&self, plaintext: &str) -> Result<PasswordHash, PasswordHasherError> {
        PasswordHash::new(format!("plain:{plaintext}"))
            .map_err(|err| PasswordHasherError::hash_error(err.to_string()))
    }

    async fn verify(
        &self,
        plaintext: &str,
        hashed: &PasswordHash,
    ) -> Result<bool, PasswordHasherError> {
        Ok(hashed.as_str() == format!("plain:{plaintext}"))
    }
}

fn build_service() -> (UserService, Arc<InMemoryMediaStore>) {
    let media_store = Arc::new(InMemoryMediaStore::new());
    let service = UserService::new(UserServiceDependencies {
        user_repository: Arc::new(InMemoryUserRepository::new()),
        password_hasher: Arc::new(PlainTextHasher),
        media_store: media_store.clone(),
        clock: Arc::new(SystemClock),
    });
    (service, media_store)
}

fn register_request(name: &str) -> RegisterUserRequest {
    RegisterUserRequest {
        username: name.to_string(),
        email: format!("{name}@example.com"),
        password: "secret".to_string(),
    }
}

#[tokio::test]
async fn register_then_authenticate() {
    let (service, _) = build_service();

    let user = service.register(register_request("alice")).await.unwrap();
    assert_eq!(user.username.as_str(), "alice");

    let authenticated = service
        .authenticate(AuthenticateUserRequest {
            email: "alice@example.com".to_string(),
            password: "secret".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(authenticated.id, user.id);
}

#[tokio::test]
async fn duplicate_email_is_rejected() {
    let (service, _) = build_service();

    service.register(register_request("bob")).await.unwrap();
    let result = service.register(register_request("bob")).await;

    assert!(matches!(
        result,
        Err(ApplicationError::Domain(domain::DomainError::UserAlreadyExists))
    ));
}

#[tokio::test]
async fn wrong_password_is_rejected() {
    let (service, _) = build_service();

    service.register(register_request("carol")).await.unwrap();
    let result = service
        .authenticate(AuthenticateUserRequest {
            email: "carol@example.com".to_string(),
            password: "wrong".to_string(),
        })
        .await;

    assert!(matches!(result, Err(ApplicationError::Authentication)));
}

#[tokio::test]
async fn unknown_email_is_rejected() {
    let (service, _) = build_service();

    let result = service
        .authenticate(AuthenticateUserRequest {
            email: "nobody@example.com".to_string(),
            password: "secret".to_string(),
        })
        .await;

    assert!(matches!(result, Err(ApplicationError::Authentication)));
}

#[tokio::test]
async fn update_profile_uploads_avatar_and_keeps_rest() {
    let (service, media_store) = build_service();

    let user = service.register(register_request("dave")).await.unwrap();
    let updated = service
        .update_profile(UpdateProfileRequest {
            user_id: Uuid::from(user.id),
            username: None,
            bio: Some("hello world".to_string()),
            profile_pic: Some("data:image/png;base64,iVBORw0KGgo=".to_string()),
        })
        .await
        .unwrap();

    assert_eq!(media_store.upload_count(), 1);
    assert_eq!(updated.profile_pic.as_deref(), Some("mem://media/1"));
    assert_eq!(updated.bio.as_deref(), Some("hello world"));
    // 未提供的字段保持不变
    assert_eq!(updated.username.as_str(), "dave");
}

#[tokio::test]
async fn list_peers_excludes_self() {
    let (service, _) = build_service();

    let alice = service.register(register_request("alice2")).await.unwrap();
    let bob = service.register(register_request("bob2")).await.unwrap();

    let peers = service.list_peers(Uuid::from(alice.id)).await.unwrap();
    assert_eq!(peers.len(), 1);
    assert_eq!(peers[0].id, bob.id);
}
