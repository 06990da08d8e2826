//! 进程内存储适配器
//!
//! 用于测试与 `memory` 存储后端。凭据存储以单把写锁保证“不存在才创建”的原子性；
//! 消息存储分配 uuid 与单调不减的时间戳，并通过广播通道分发变更事件。

use std::{collections::HashMap, sync::Arc};

use application::{Clock, SystemClock};
use async_trait::async_trait;
use domain::{
    ChangeEvent, ChangeFeed, CredentialRepository, Message, MessageId, MessageRepository,
    NewMessage, RepositoryError, RepositoryResult, RoomId, SessionToken, Timestamp, User, UserId,
};
use futures_util::StreamExt;
use tokio::sync::{broadcast, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

/// 变更通知缓冲默认容量
pub const DEFAULT_FEED_CAPACITY: usize = 1024;

#[derive(Default)]
struct CredentialState {
    users: HashMap<UserId, User>,
    usernames: HashMap<String, UserId>,
    tokens: HashMap<String, SessionToken>,
}

#[derive(Clone, Default)]
pub struct InMemoryCredentialRepository {
    state: Arc<RwLock<CredentialState>>,
}

impl InMemoryCredentialRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn token_count(&self) -> usize {
        self.state.read().await.tokens.len()
    }
}

#[async_trait]
impl CredentialRepository for InMemoryCredentialRepository {
    async fn create_user_if_absent(&self, user: User) -> RepositoryResult<()> {
        let mut state = self.state.write().await;
        if state.usernames.contains_key(user.username.as_str()) {
            return Err(RepositoryError::Conflict);
        }
        if state.users.contains_key(&user.id) {
            return Err(RepositoryError::Conflict);
        }

        state
            .usernames
            .insert(user.username.as_str().to_owned(), user.id.clone());
        state.users.insert(user.id.clone(), user);
        Ok(())
    }

    async fn get_user_by_username(&self, username: &str) -> RepositoryResult<Option<User>> {
        let state = self.state.read().await;
        Ok(state
            .usernames
            .get(username)
            .and_then(|id| state.users.get(id))
            .cloned())
    }

    async fn get_user_by_id(&self, id: &UserId) -> RepositoryResult<Option<User>> {
        Ok(self.state.read().await.users.get(id).cloned())
    }

    async fn put_token(&self, token: SessionToken) -> RepositoryResult<()> {
        self.state
            .write()
            .await
            .tokens
            .insert(token.token.clone(), token);
        Ok(())
    }

    async fn get_token(&self, token: &str) -> RepositoryResult<Option<SessionToken>> {
        Ok(self.state.read().await.tokens.get(token).cloned())
    }

    async fn delete_token(&self, token: &str) -> RepositoryResult<()> {
        self.state.write().await.tokens.remove(token);
        Ok(())
    }
}

#[derive(Default)]
struct MessageLog {
    rooms: HashMap<RoomId, Vec<Message>>,
    last_timestamp: Option<Timestamp>,
}

#[derive(Clone)]
pub struct InMemoryMessageRepository {
    log: Arc<RwLock<MessageLog>>,
    changes: broadcast::Sender<ChangeEvent>,
    clock: Arc<dyn Clock>,
}

impl InMemoryMessageRepository {
    pub fn new(feed_capacity: usize) -> Self {
        Self::with_clock(feed_capacity, Arc::new(SystemClock))
    }

    pub fn with_clock(feed_capacity: usize, clock: Arc<dyn Clock>) -> Self {
        let (changes, _) = broadcast::channel(feed_capacity.max(1));
        Self {
            log: Arc::new(RwLock::new(MessageLog::default())),
            changes,
            clock,
        }
    }

    /// 当前仍存活的变更订阅数
    pub fn subscriber_count(&self) -> usize {
        self.changes.receiver_count()
    }
}

impl Default for InMemoryMessageRepository {
    fn default() -> Self {
        Self::new(DEFAULT_FEED_CAPACITY)
    }
}

#[async_trait]
impl MessageRepository for InMemoryMessageRepository {
    async fn create(&self, message: NewMessage) -> RepositoryResult<Message> {
        let mut log = self.log.write().await;

        // 时钟回拨时沿用上一条的时间戳，保证房间内顺序与插入顺序一致
        let now = self.clock.now();
        let timestamp = match log.last_timestamp {
            Some(last) if last > now => last,
            _ => now,
        };
        log.last_timestamp = Some(timestamp);

        let stored = message.materialize(MessageId::new(Uuid::new_v4().to_string()), timestamp);
        log.rooms
            .entry(stored.room_id.clone())
            .or_default()
            .push(stored.clone());

        // 持锁发送，变更通知顺序与写入顺序一致
        if self.changes.receiver_count() > 0 {
            let _ = self.changes.send(ChangeEvent::added(stored.clone()));
        }

        Ok(stored)
    }

    async fn query_ordered(&self, room_id: &RoomId, limit: usize) -> RepositoryResult<Vec<Message>> {
        let log = self.log.read().await;
        Ok(log
            .rooms
            .get(room_id)
            .map(|messages| messages.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn subscribe(
        &self,
        room_id: &RoomId,
        cancel: CancellationToken,
    ) -> RepositoryResult<ChangeFeed> {
        // 在返回前完成订阅，之后写入的消息都不会丢失
        let mut receiver = self.changes.subscribe();
        let room_id = room_id.clone();

        let feed = async_stream::stream! {
            loop {
                let received = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    received = receiver.recv() => Some(received),
                };

                match received {
                    None => {
                        debug!(room_id = %room_id, "in-memory change feed canceled");
                        break;
                    }
                    Some(Ok(event)) => {
                        if event.message.room_id == room_id {
                            yield Ok(event);
                        }
                    }
                    Some(Err(broadcast::error::RecvError::Lagged(skipped))) => {
                        warn!(room_id = %room_id, skipped, "in-memory change feed lagged");
                        yield Err(RepositoryError::storage(format!(
                            "change feed lagged by {skipped} events"
                        )));
                        break;
                    }
                    Some(Err(broadcast::error::RecvError::Closed)) => break,
                }
            }
        };

        Ok(feed.boxed())
    }
}
