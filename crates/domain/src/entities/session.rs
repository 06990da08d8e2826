use std::fmt;

use serde::{Deserialize, Serialize};

use crate::value_objects::{Timestamp, UserId};

/// 不透明会话令牌。
///
/// 状态迁移：`absent → active → (expired | revoked) → absent`。
/// 令牌离开 active 后不会复活，新令牌即新实体。
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionToken {
    pub token: String,
    pub user_id: UserId,
    pub expires_at: Timestamp,
}

impl SessionToken {
    pub fn new(token: String, user_id: UserId, expires_at: Timestamp) -> Self {
        Self {
            token,
            user_id,
            expires_at,
        }
    }

    /// 令牌有效当且仅当 `now < expires_at`。
    pub fn is_active_at(&self, now: Timestamp) -> bool {
        now < self.expires_at
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionToken")
            .field("token", &"***")
            .field("user_id", &self.user_id)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;

    #[test]
    fn token_expires_exactly_at_deadline() {
        let now = Utc::now();
        let token = SessionToken::new("abc".into(), UserId::from("u1"), now);
        assert!(!token.is_active_at(now));
        assert!(token.is_active_at(now - Duration::seconds(1)));
    }

    #[test]
    fn debug_output_hides_token_value() {
        let token = SessionToken::new("secret-value".into(), UserId::from("u1"), Utc::now());
        assert!(!format!("{token:?}").contains("secret-value"));
    }
}
