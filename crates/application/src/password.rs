//! 密码哈希端口
//!
//! 会话管理只依赖这里的 trait；bcrypt 实现位于基础设施层。

use async_trait::async_trait;
use domain::PasswordHash;
use thiserror::Error;

/// 慢速、加盐、可调代价的密码哈希。
///
/// 实现应把计算移出异步运行时线程，一次校验耗时在几十毫秒量级。
/// 登录时用户不存在也会做一次校验，因此 `verify` 的耗时不应依赖口令是否匹配。
#[async_trait]
pub trait PasswordHasher: Send + Sync {
    async fn hash(&self, plaintext: &str) -> Result<PasswordHash, PasswordHasherError>;

    /// 哈希不匹配返回 `Ok(false)`，哈希本身损坏才返回错误。
    async fn verify(
        &self,
        plaintext: &str,
        hashed: &PasswordHash,
    ) -> Result<bool, PasswordHasherError>;
}

/// 哈希实现的失败，对外统一映射为 500
#[derive(Debug, Error)]
pub enum PasswordHasherError {
    /// 生成哈希失败（代价非法、阻塞任务被取消等）
    #[error("hash error: {0}")]
    Hash(String),
    /// 存储的哈希无法解析
    #[error("verify error: {0}")]
    Verify(String),
}

impl PasswordHasherError {
    pub fn hash_error(message: impl Into<String>) -> Self {
        Self::Hash(message.into())
    }

    pub fn verify_error(message: impl Into<String>) -> Self {
        Self::Verify(message.into())
    }
}
