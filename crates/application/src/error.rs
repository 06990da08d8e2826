use domain::{DomainError, RepositoryError};
use thiserror::Error;

use crate::{password::PasswordHasherError, tokens::RandomSourceError};

/// 用例层错误分类，调度层据此映射为传输层状态码。
#[derive(Debug, Error)]
pub enum ApplicationError {
    /// 请求格式不合法，不重试
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// 凭据错误或令牌缺失/过期/无效，用户名错误与密码错误使用同一消息
    #[error("{0}")]
    Unauthorized(&'static str),
    #[error("conflict: {0}")]
    Conflict(String),
    /// 存储适配器失败，原样透传，本层不重试
    #[error("store error: {0}")]
    Store(RepositoryError),
    #[error("password error: {0}")]
    Password(#[from] PasswordHasherError),
    #[error("random source error: {0}")]
    Random(#[from] RandomSourceError),
    /// 调用方取消，与 `Store` 区分
    #[error("operation canceled")]
    Canceled,
}

impl ApplicationError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn invalid_credentials() -> Self {
        Self::Unauthorized("invalid credentials")
    }

    pub fn unauthorized() -> Self {
        Self::Unauthorized("unauthorized")
    }

    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled)
    }
}

impl From<DomainError> for ApplicationError {
    fn from(value: DomainError) -> Self {
        ApplicationError::InvalidInput(value.to_string())
    }
}

impl From<RepositoryError> for ApplicationError {
    fn from(value: RepositoryError) -> Self {
        ApplicationError::Store(value)
    }
}
