use serde::{Deserialize, Serialize};

use crate::value_objects::{PasswordHash, Timestamp, UserId, Username};

/// 注册用户。创建后不可变，用户名唯一性由凭据存储在创建时保证。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: Username,
    #[serde(skip_serializing)] // 密码字段不暴露给客户端
    pub password_hash: PasswordHash,
    pub created_at: Timestamp,
}

impl User {
    pub fn register(
        id: UserId,
        username: Username,
        password_hash: PasswordHash,
        now: Timestamp,
    ) -> Self {
        Self {
            id,
            username,
            password_hash,
            created_at: now,
        }
    }
}
