//! Repository接口定义
//!
//! 定义存储适配器的抽象接口，遵循清洁架构原则，内层定义接口，外层实现接口。
//! 每个接口有一个生产实现（PostgreSQL）和一个内存实现。

pub mod credential_repository;
pub mod message_repository;

pub use credential_repository::CredentialRepository;
pub use message_repository::{ChangeFeed, MessageRepository};

#[cfg(feature = "testing")]
pub use credential_repository::MockCredentialRepository;
#[cfg(feature = "testing")]
pub use message_repository::MockMessageRepository;
