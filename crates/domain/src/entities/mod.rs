//! 领域实体定义
//!
//! 包含系统的核心实体：用户、会话令牌、消息。

pub mod message;
pub mod session;
pub mod user;

// 重新导出核心实体
pub use message::{ChangeEvent, ChangeKind, Message, NewMessage};
pub use session::SessionToken;
pub use user::User;
