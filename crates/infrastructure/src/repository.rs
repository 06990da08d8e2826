use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{
    ChangeEvent, ChangeFeed, CredentialRepository, Message, MessageId, MessageRepository,
    NewMessage, PasswordHash, RepositoryError, RepositoryResult, RoomId, SessionToken, User,
    UserId, Username,
};
use futures_util::StreamExt;
use serde::Deserialize;
use sqlx::{
    postgres::{PgListener, PgPoolOptions},
    FromRow, PgPool,
};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

/// 消息写入触发器使用的通知通道
pub const MESSAGE_CHANNEL: &str = "room_messages";

fn map_sqlx_err(err: sqlx::Error) -> RepositoryError {
    RepositoryError::storage(err.to_string())
}

fn invalid_data(message: impl Into<String>) -> RepositoryError {
    RepositoryError::storage(message)
}

#[derive(Debug, FromRow)]
struct UserRecord {
    id: String,
    username: String,
    password_hash: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRecord> for User {
    type Error = RepositoryError;

    fn try_from(value: UserRecord) -> Result<Self, Self::Error> {
        let username =
            Username::parse(value.username).map_err(|err| invalid_data(err.to_string()))?;
        let password_hash =
            PasswordHash::new(value.password_hash).map_err(|err| invalid_data(err.to_string()))?;

        Ok(User {
            id: UserId::from(value.id),
            username,
            password_hash,
            created_at: value.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct TokenRecord {
    token: String,
    user_id: String,
    expires_at: DateTime<Utc>,
}

impl From<TokenRecord> for SessionToken {
    fn from(value: TokenRecord) -> Self {
        SessionToken::new(value.token, UserId::from(value.user_id), value.expires_at)
    }
}

#[derive(Debug, FromRow)]
struct MessageRecord {
    id: String,
    user_id: String,
    username: String,
    content: String,
    room_id: String,
    timestamp: DateTime<Utc>,
}

impl From<MessageRecord> for Message {
    fn from(value: MessageRecord) -> Self {
        Message {
            id: MessageId::from(value.id),
            user_id: UserId::from(value.user_id),
            username: value.username,
            content: value.content,
            room_id: RoomId::from(value.room_id),
            timestamp: value.timestamp,
        }
    }
}

/// 触发器发出的通知负载
#[derive(Debug, Deserialize)]
struct MessageNotification {
    id: String,
    room_id: String,
}

pub struct PgCredentialRepository {
    pool: PgPool,
}

impl PgCredentialRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialRepository for PgCredentialRepository {
    async fn create_user_if_absent(&self, user: User) -> RepositoryResult<()> {
        // 唯一约束承担并发注册的判重
        let result = sqlx::query(
            r#"
            INSERT INTO users (id, username, password_hash, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(user.id.as_str())
        .bind(user.username.as_str())
        .bind(user.password_hash.as_str())
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::Conflict);
        }
        Ok(())
    }

    async fn get_user_by_username(&self, username: &str) -> RepositoryResult<Option<User>> {
        let record = sqlx::query_as::<_, UserRecord>(
            r#"SELECT id, username, password_hash, created_at FROM users WHERE username = $1"#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        record.map(User::try_from).transpose()
    }

    async fn get_user_by_id(&self, id: &UserId) -> RepositoryResult<Option<User>> {
        let record = sqlx::query_as::<_, UserRecord>(
            r#"SELECT id, username, password_hash, created_at FROM users WHERE id = $1"#,
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        record.map(User::try_from).transpose()
    }

    async fn put_token(&self, token: SessionToken) -> RepositoryResult<()> {
        sqlx::query(
            r#"
            INSERT INTO tokens (token, user_id, expires_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (token)
            DO UPDATE SET user_id = EXCLUDED.user_id, expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(&token.token)
        .bind(token.user_id.as_str())
        .bind(token.expires_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        Ok(())
    }

    async fn get_token(&self, token: &str) -> RepositoryResult<Option<SessionToken>> {
        let record = sqlx::query_as::<_, TokenRecord>(
            r#"SELECT token, user_id, expires_at FROM tokens WHERE token = $1"#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(record.map(SessionToken::from))
    }

    async fn delete_token(&self, token: &str) -> RepositoryResult<()> {
        sqlx::query(r#"DELETE FROM tokens WHERE token = $1"#)
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        Ok(())
    }
}

pub struct PgMessageRepository {
    pool: PgPool,
}

impl PgMessageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

async fn fetch_message(pool: &PgPool, id: &str) -> RepositoryResult<Option<Message>> {
    let record = sqlx::query_as::<_, MessageRecord>(
        r#"
        SELECT id, user_id, username, content, room_id, "timestamp"
        FROM messages
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(map_sqlx_err)?;

    Ok(record.map(Message::from))
}

#[async_trait]
impl MessageRepository for PgMessageRepository {
    async fn create(&self, message: NewMessage) -> RepositoryResult<Message> {
        let record = sqlx::query_as::<_, MessageRecord>(
            r#"
            INSERT INTO messages (id, user_id, username, content, room_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, user_id, username, content, room_id, "timestamp"
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(message.user_id.as_str())
        .bind(&message.username)
        .bind(&message.content)
        .bind(message.room_id.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(Message::from(record))
    }

    async fn query_ordered(&self, room_id: &RoomId, limit: usize) -> RepositoryResult<Vec<Message>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let records = sqlx::query_as::<_, MessageRecord>(
            r#"
            SELECT id, user_id, username, content, room_id, "timestamp"
            FROM messages
            WHERE room_id = $1
            ORDER BY "timestamp" ASC, seq ASC
            LIMIT $2
            "#,
        )
        .bind(room_id.as_str())
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(records.into_iter().map(Message::from).collect())
    }

    async fn subscribe(
        &self,
        room_id: &RoomId,
        cancel: CancellationToken,
    ) -> RepositoryResult<ChangeFeed> {
        // 每个订阅独占一条 LISTEN 连接，流结束时连接随之释放
        let mut listener = PgListener::connect_with(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        listener
            .listen(MESSAGE_CHANNEL)
            .await
            .map_err(map_sqlx_err)?;

        let pool = self.pool.clone();
        let room_id = room_id.clone();

        let feed = async_stream::stream! {
            loop {
                let received = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    received = listener.recv() => Some(received),
                };

                let notification = match received {
                    None => {
                        debug!(room_id = %room_id, "postgres change feed canceled");
                        break;
                    }
                    Some(Ok(notification)) => notification,
                    Some(Err(err)) => {
                        yield Err(map_sqlx_err(err));
                        break;
                    }
                };

                let payload: MessageNotification = match serde_json::from_str(notification.payload()) {
                    Ok(payload) => payload,
                    Err(err) => {
                        yield Err(invalid_data(format!("invalid notification payload: {err}")));
                        break;
                    }
                };
                if payload.room_id != room_id.as_str() {
                    continue;
                }

                match fetch_message(&pool, &payload.id).await {
                    Ok(Some(message)) => {
                        yield Ok(ChangeEvent::added(message));
                    }
                    Ok(None) => continue,
                    Err(err) => {
                        yield Err(err);
                        break;
                    }
                }
            }
        };

        Ok(feed.boxed())
    }
}

/// PostgreSQL 存储适配器集合
pub struct PgStorage {
    pub pool: PgPool,
    pub credential_repository: Arc<PgCredentialRepository>,
    pub message_repository: Arc<PgMessageRepository>,
}

impl PgStorage {
    pub fn new(pool: PgPool) -> Self {
        Self {
            credential_repository: Arc::new(PgCredentialRepository::new(pool.clone())),
            message_repository: Arc::new(PgMessageRepository::new(pool.clone())),
            pool,
        }
    }
}

pub async fn create_pg_pool(
    database_url: &str,
    max_connections: u32,
) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}
