use std::sync::Arc;

use domain::{DomainError, User, UserEmail, UserId, Username};
use uuid::Uuid;

use crate::{
    clock::Clock, error::ApplicationError, media::MediaStore, password::PasswordHasher,
    repository::UserRepository,
};

#[derive(Debug, Clone)]
pub struct RegisterUserRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct AuthenticateUserRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct UpdateProfileRequest {
    pub user_id: Uuid,
    pub username: Option<String>,
    pub bio: Option<String>,
    /// 内联头像数据（base64 data URI），上传后只保存 URL
    pub profile_pic: Option<String>,
}

pub struct UserServiceDependencies {
    pub user_repository: Arc<dyn UserRepository>,
    pub password_hasher: Arc<dyn PasswordHasher>,
    pub media_store: Arc<dyn MediaStore>,
    pub clock: Arc<dyn Clock>,
}

pub struct UserService {
    deps: UserServiceDependencies,
}

impl UserService {
    pub fn new(deps: UserServiceDependencies) -> Self {
        Self { deps }
    }

    pub async fn register(&self, request: RegisterUserRequest) -> Result<User, ApplicationError> {
        let username = Username::parse(request.username)?;
        let email = UserEmail::parse(request.email)?;

        if self
            .deps
            .user_repository
            .find_by_email(email.clone())
            .await?
            .is_some()
        {
            return Err(ApplicationError::Domain(DomainError::UserAlreadyExists));
        }

        let password_hash = self.deps.password_hasher.hash(&request.password).await?;

        let now = self.deps.clock.now();
        let user = User::register(
            UserId::from(Uuid::new_v4()),
            username,
            email,
            password_hash,
            now,
        );

        let stored = self.deps.user_repository.create(user).await?;
        Ok(stored)
    }

    pub async fn authenticate(
        &self,
        request: AuthenticateUserRequest,
    ) -> Result<User, ApplicationError> {
        let email = UserEmail::parse(request.email)?;
        let user = self
            .deps
            .user_repository
            .find_by_email(email)
            .await?
            .ok_or(ApplicationError::Authentication)?;

        let password_ok = self
            .deps
            .password_hasher
            .verify(&request.password, &user.password)
            .await?;
        if !password_ok {
            return Err(ApplicationError::Authentication);
        }

        Ok(user)
    }

    pub async fn get_user(&self, user_id: Uuid) -> Result<User, ApplicationError> {
        let user = self
            .deps
            .user_repository
            .find_by_id(UserId::from(user_id))
            .await?
            .ok_or(DomainError::UserNotFound)?;
        Ok(user)
    }

    /// 侧边栏数据：除自己之外的所有用户。
    pub async fn list_peers(&self, user_id: Uuid) -> Result<Vec<User>, ApplicationError> {
        let peers = self
            .deps
            .user_repository
            .list_except(UserId::from(user_id))
            .await?;
        Ok(peers)
    }

    pub async fn update_profile(
        &self,
        request: UpdateProfileRequest,
    ) -> Result<User, ApplicationError> {
        let mut user = self.get_user(request.user_id).await?;

        let username = match request.username {
            Some(value) => Some(Username::parse(value)?),
            None => None,
        };

        // 头像是内联数据，先换取托管 URL 再落库
        let profile_pic = match &request.profile_pic {
            Some(data_uri) => Some(self.deps.media_store.upload_image(data_uri).await?),
            None => None,
        };

        user.update_profile(username, request.bio, profile_pic, self.deps.clock.now());
        let stored = self.deps.user_repository.update(user).await?;
        Ok(stored)
    }
}
