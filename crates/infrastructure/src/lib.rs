//! 基础设施层实现。
//!
//! 提供凭据与消息存储适配器（PostgreSQL 与进程内两种）、密码哈希，
//! 实现领域层与应用层定义的接口。

pub mod builder;
pub mod memory;
pub mod migrations;
pub mod password;
pub mod repository;

pub use builder::{Infrastructure, InfrastructureConfig, InfrastructureError};
pub use memory::{InMemoryCredentialRepository, InMemoryMessageRepository, DEFAULT_FEED_CAPACITY};
pub use migrations::MIGRATOR;
pub use password::{BcryptPasswordHasher, DEFAULT_BCRYPT_COST};
pub use repository::{
    create_pg_pool, PgCredentialRepository, PgMessageRepository, PgStorage, MESSAGE_CHANNEL,
};
