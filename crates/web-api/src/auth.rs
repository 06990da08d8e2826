//! Bearer 令牌提取与认证相关响应体

use axum::http::{header::AUTHORIZATION, HeaderMap};
use domain::{SessionToken, Timestamp, UserId};
use serde::Serialize;

use crate::error::ApiError;

/// 注册/登录响应
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub token: String,
    pub user_id: UserId,
    pub expires_at: Timestamp,
}

impl From<SessionToken> for SessionResponse {
    fn from(value: SessionToken) -> Self {
        Self {
            token: value.token,
            user_id: value.user_id,
            expires_at: value.expires_at,
        }
    }
}

/// 读取 `Authorization: Bearer <token>`，缺失时返回 `None`
pub fn optional_bearer_token(headers: &HeaderMap) -> Result<Option<&str>, ApiError> {
    let Some(value) = headers.get(AUTHORIZATION) else {
        return Ok(None);
    };

    let header = value
        .to_str()
        .map_err(|_| ApiError::unauthorized("Invalid authorization header"))?;
    let token = header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| ApiError::unauthorized("Invalid authorization header format"))?;

    Ok(Some(token))
}

pub fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    optional_bearer_token(headers)?
        .ok_or_else(|| ApiError::unauthorized("Missing authorization header"))
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn extracts_bearer_token() {
        let mut headers = HeaderMap::new();
        assert!(optional_bearer_token(&headers).unwrap().is_none());
        assert!(bearer_token(&headers).is_err());

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc123"));
        assert_eq!(bearer_token(&headers).unwrap(), "abc123");

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc123"));
        assert!(optional_bearer_token(&headers).is_err());

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert!(bearer_token(&headers).is_err());
    }
}
