mod message_service;
mod user_service;

#[cfg(test)]
mod message_service_tests;
#[cfg(test)]
mod user_service_tests;

pub use message_service::{MessageService, MessageServiceDependencies, SendMessageRequest};
pub use user_service::{
    AuthenticateUserRequest, RegisterUserRequest, UpdateProfileRequest, UserService,
    UserServiceDependencies,
};
