mod message_service;
mod session_manager;

pub use message_service::{
    HistorySettings, MessageService, MessageServiceDependencies, MessageView, MessageViewStream,
    SendMessageRequest,
};
pub use session_manager::{
    LoginRequest, RegisterRequest, SessionManager, SessionManagerDependencies, SessionSettings,
    TokenValidator, PASSWORD_MIN_LEN,
};
