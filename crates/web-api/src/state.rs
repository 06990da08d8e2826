use std::sync::Arc;

use application::{MessageService, SessionManager};
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
pub struct AppState {
    pub session_manager: Arc<SessionManager>,
    pub message_service: Arc<MessageService>,
    /// 进程级取消令牌，每个请求派生子令牌；关闭服务时触发以结束长连接
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        session_manager: Arc<SessionManager>,
        message_service: Arc<MessageService>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            session_manager,
            message_service,
            shutdown,
        }
    }

    pub fn request_token(&self) -> CancellationToken {
        self.shutdown.child_token()
    }
}
