use std::sync::Arc;

use application::{ConnectionRegistry, MessageService, SessionGate, UserService};

use crate::JwtService;

#[derive(Clone)]
pub struct AppState {
    pub user_service: Arc<UserService>,
    pub message_service: Arc<MessageService>,
    pub registry: Arc<ConnectionRegistry>,
    pub session_gate: Arc<dyn SessionGate>,
    pub jwt_service: Arc<JwtService>,
}

impl AppState {
    pub fn new(
        user_service: Arc<UserService>,
        message_service: Arc<MessageService>,
        registry: Arc<ConnectionRegistry>,
        session_gate: Arc<dyn SessionGate>,
        jwt_service: Arc<JwtService>,
    ) -> Self {
        Self {
            user_service,
            message_service,
            registry,
            session_gate,
            jwt_service,
        }
    }
}
