use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use domain::{
    CredentialRepository, PasswordHash, RepositoryError, SessionToken, User, UserId, Username,
};
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    cancel::cancellable,
    clock::Clock,
    error::ApplicationError,
    password::PasswordHasher,
    tokens::{generate_token, generate_user_id},
};

/// 密码最小长度（按字符计）
pub const PASSWORD_MIN_LEN: usize = 6;

/// 用户不存在时用于陪跑校验的口令，使登录耗时不随用户名是否存在而变化
const DUMMY_PASSWORD: &str = "roomchat-dummy-password";

#[derive(Debug, Clone)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub token_ttl: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            token_ttl: Duration::hours(24),
        }
    }
}

/// 令牌校验能力。消息服务只消费校验结果，不直接修改令牌。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenValidator: Send + Sync {
    async fn validate_token(
        &self,
        token: &str,
        cancel: &CancellationToken,
    ) -> Result<User, ApplicationError>;
}

pub struct SessionManagerDependencies {
    pub credential_repository: Arc<dyn CredentialRepository>,
    pub password_hasher: Arc<dyn PasswordHasher>,
    pub clock: Arc<dyn Clock>,
}

/// 会话管理：注册、登录、令牌校验与注销。
///
/// 令牌生命周期完全由本服务持有；过期令牌在下一次校验时被删除，
/// 不依赖后台清理任务。
pub struct SessionManager {
    deps: SessionManagerDependencies,
    settings: SessionSettings,
    dummy_hash: OnceCell<PasswordHash>,
}

impl SessionManager {
    pub fn new(deps: SessionManagerDependencies) -> Self {
        Self::with_settings(deps, SessionSettings::default())
    }

    pub fn with_settings(deps: SessionManagerDependencies, settings: SessionSettings) -> Self {
        Self {
            deps,
            settings,
            dummy_hash: OnceCell::new(),
        }
    }

    pub async fn register(
        &self,
        request: RegisterRequest,
        cancel: &CancellationToken,
    ) -> Result<SessionToken, ApplicationError> {
        let username = Username::parse(request.username)?;
        if request.password.chars().count() < PASSWORD_MIN_LEN {
            return Err(ApplicationError::invalid_input(format!(
                "password must be at least {PASSWORD_MIN_LEN} characters"
            )));
        }

        let password_hash =
            cancellable(cancel, self.deps.password_hasher.hash(&request.password)).await?;

        let user = User::register(
            generate_user_id()?,
            username,
            password_hash,
            self.deps.clock.now(),
        );
        let user_id = user.id.clone();
        let username = user.username.clone();

        // 唯一性由适配器的原子创建保证，这里不做先读后写
        cancellable(
            cancel,
            self.deps.credential_repository.create_user_if_absent(user),
        )
        .await
        .map_err(|err| match err {
            ApplicationError::Store(RepositoryError::Conflict) => {
                ApplicationError::Conflict(format!("username {username} already exists"))
            }
            other => other,
        })?;

        info!(user_id = %user_id, "user registered");
        self.mint_token(user_id, cancel).await
    }

    pub async fn login(
        &self,
        request: LoginRequest,
        cancel: &CancellationToken,
    ) -> Result<SessionToken, ApplicationError> {
        let user = cancellable(
            cancel,
            self.deps
                .credential_repository
                .get_user_by_username(&request.username),
        )
        .await?;
        let Some(user) = user else {
            self.verify_against_dummy(&request.password, cancel).await?;
            return Err(ApplicationError::invalid_credentials());
        };

        let password_ok = cancellable(
            cancel,
            self.deps
                .password_hasher
                .verify(&request.password, &user.password_hash),
        )
        .await?;
        if !password_ok {
            return Err(ApplicationError::invalid_credentials());
        }

        info!(user_id = %user.id, "user logged in");
        self.mint_token(user.id, cancel).await
    }

    pub async fn validate_token(
        &self,
        token: &str,
        cancel: &CancellationToken,
    ) -> Result<User, ApplicationError> {
        let record = cancellable(cancel, self.deps.credential_repository.get_token(token))
            .await?
            .ok_or_else(ApplicationError::unauthorized)?;

        if !record.is_active_at(self.deps.clock.now()) {
            // 惰性淘汰：删除失败也按未授权处理，下次校验会重试删除
            match cancellable(cancel, self.deps.credential_repository.delete_token(token)).await
            {
                Ok(()) => debug!(user_id = %record.user_id, "expired session token evicted"),
                Err(ApplicationError::Canceled) => return Err(ApplicationError::Canceled),
                Err(err) => {
                    warn!(user_id = %record.user_id, error = %err, "failed to evict expired token")
                }
            }
            return Err(ApplicationError::unauthorized());
        }

        cancellable(
            cancel,
            self.deps.credential_repository.get_user_by_id(&record.user_id),
        )
        .await?
        .ok_or(ApplicationError::Store(RepositoryError::NotFound))
    }

    pub async fn logout(
        &self,
        token: &str,
        cancel: &CancellationToken,
    ) -> Result<(), ApplicationError> {
        cancellable(cancel, self.deps.credential_repository.delete_token(token)).await
    }

    async fn mint_token(
        &self,
        user_id: UserId,
        cancel: &CancellationToken,
    ) -> Result<SessionToken, ApplicationError> {
        let expires_at = self
            .deps
            .clock
            .now()
            .checked_add_signed(self.settings.token_ttl)
            .ok_or_else(|| ApplicationError::invalid_input("token ttl out of range"))?;
        let session = SessionToken::new(generate_token()?, user_id, expires_at);

        cancellable(
            cancel,
            self.deps.credential_repository.put_token(session.clone()),
        )
        .await?;

        Ok(session)
    }

    /// 对固定哈希做一次完整校验，结果丢弃，只传递取消
    async fn verify_against_dummy(
        &self,
        password: &str,
        cancel: &CancellationToken,
    ) -> Result<(), ApplicationError> {
        let dummy = match cancellable(
            cancel,
            self.dummy_hash
                .get_or_try_init(|| self.deps.password_hasher.hash(DUMMY_PASSWORD)),
        )
        .await
        {
            Ok(hash) => hash,
            Err(ApplicationError::Canceled) => return Err(ApplicationError::Canceled),
            Err(err) => {
                warn!(error = %err, "failed to prepare dummy password hash");
                return Ok(());
            }
        };

        match cancellable(cancel, self.deps.password_hasher.verify(password, dummy)).await {
            Err(ApplicationError::Canceled) => Err(ApplicationError::Canceled),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl TokenValidator for SessionManager {
    async fn validate_token(
        &self,
        token: &str,
        cancel: &CancellationToken,
    ) -> Result<User, ApplicationError> {
        SessionManager::validate_token(self, token, cancel).await
    }
}
