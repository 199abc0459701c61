use crate::value_objects::{PasswordHash, Timestamp, UserEmail, UserId, Username};

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: Username,
    pub email: UserEmail,
    #[serde(skip_serializing)] // 密码字段不暴露给客户端
    pub password: PasswordHash,
    pub bio: Option<String>,
    pub profile_pic: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl User {
    pub fn register(
        id: UserId,
        username: Username,
        email: UserEmail,
        password: PasswordHash,
        now: Timestamp,
    ) -> Self {
        Self {
            id,
            username,
            email,
            password,
            bio: None,
            profile_pic: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn update_profile(
        &mut self,
        username: Option<Username>,
        bio: Option<String>,
        profile_pic: Option<String>,
        now: Timestamp,
    ) {
        if let Some(new_username) = username {
            self.username = new_username;
        }
        if let Some(new_bio) = bio {
            self.bio = Some(new_bio);
        }
        if let Some(new_pic) = profile_pic {
            self.profile_pic = Some(new_pic);
        }
        self.updated_at = now;
    }

    pub fn set_password(&mut self, password: PasswordHash, now: Timestamp) {
        self.password = password;
        self.updated_at = now;
    }
}
