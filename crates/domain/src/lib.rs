//! 房间消息分发系统核心领域模型
//!
//! 包含用户、会话令牌、消息等核心实体，以及存储适配器的抽象接口。

pub mod entities;
pub mod errors;
pub mod repositories;
pub mod value_objects;

// 重新导出常用类型
pub use entities::*;
pub use errors::*;
pub use repositories::*;
pub use value_objects::*;
