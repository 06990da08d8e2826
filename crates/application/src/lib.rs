//! 应用层实现。
//!
//! 这里提供围绕领域模型的用例服务：会话令牌的签发与校验、消息的写入、
//! 历史回溯与实时订阅，以及对外部适配器（密码哈希、时钟）的抽象。

mod cancel;
pub mod clock;
pub mod error;
pub mod password;
pub mod services;
pub mod stream;
pub mod tokens;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::ApplicationError;
pub use password::{PasswordHasher, PasswordHasherError};
pub use services::{
    HistorySettings, LoginRequest, MessageService, MessageServiceDependencies, MessageView,
    MessageViewStream, RegisterRequest, SendMessageRequest, SessionManager,
    SessionManagerDependencies, SessionSettings, TokenValidator,
};
pub use stream::MessageStream;
