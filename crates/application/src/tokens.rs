//! 安全随机的用户 ID 与会话令牌生成
//!
//! 无状态，直接读取操作系统随机源。可预测的令牌等同于完全绕过认证。

use data_encoding::HEXLOWER;
use domain::UserId;
use rand::{rngs::OsRng, TryRngCore};
use thiserror::Error;

/// 会话令牌随机字节数（256 位）
pub const TOKEN_BYTES: usize = 32;
/// 用户 ID 随机字节数（128 位）
pub const USER_ID_BYTES: usize = 16;

#[derive(Debug, Error)]
#[error("secure random source unavailable: {0}")]
pub struct RandomSourceError(String);

fn random_hex(len: usize) -> Result<String, RandomSourceError> {
    let mut bytes = vec![0u8; len];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|err| RandomSourceError(err.to_string()))?;
    Ok(HEXLOWER.encode(&bytes))
}

pub fn generate_token() -> Result<String, RandomSourceError> {
    random_hex(TOKEN_BYTES)
}

pub fn generate_user_id() -> Result<UserId, RandomSourceError> {
    random_hex(USER_ID_BYTES).map(UserId::from)
}
