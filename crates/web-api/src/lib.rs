//! Web API 层。
//!
//! 提供 Axum 路由，将 HTTP / WebSocket 请求委托给应用层的会话与消息服务，
//! 负责 Bearer 令牌提取、JSON 序列化与错误到状态码的映射。

mod auth;
mod error;
mod routes;
mod state;
mod ws_connection;

pub use auth::SessionResponse;
pub use error::{ApiError, ErrorBody};
pub use routes::router;
pub use state::AppState;
