//! 凭据存储接口：用户名 → 用户、令牌 → 会话

use async_trait::async_trait;

use crate::entities::{SessionToken, User};
use crate::errors::RepositoryResult;
use crate::value_objects::UserId;

#[cfg_attr(feature = "testing", mockall::automock)]
#[async_trait]
pub trait CredentialRepository: Send + Sync {
    /// 以用户名为键原子地创建用户。
    ///
    /// 用户名已存在时返回 `RepositoryError::Conflict`。并发注册同名用户时
    /// 至多一个成功，这一保证必须由实现提供（唯一约束或加锁的检查并写入）。
    async fn create_user_if_absent(&self, user: User) -> RepositoryResult<()>;

    async fn get_user_by_username(&self, username: &str) -> RepositoryResult<Option<User>>;

    async fn get_user_by_id(&self, id: &UserId) -> RepositoryResult<Option<User>>;

    async fn put_token(&self, token: SessionToken) -> RepositoryResult<()>;

    /// 原样返回已存储的令牌，不判断过期。
    async fn get_token(&self, token: &str) -> RepositoryResult<Option<SessionToken>>;

    /// 幂等删除，令牌不存在不算错误。
    async fn delete_token(&self, token: &str) -> RepositoryResult<()>;
}
