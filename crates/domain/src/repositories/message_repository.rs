//! 消息存储接口：持久化、有序查询、变更订阅

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use tokio_util::sync::CancellationToken;

use crate::entities::{ChangeEvent, Message, NewMessage};
use crate::errors::RepositoryResult;
use crate::value_objects::RoomId;

/// 房间变更通知流。
///
/// 订阅的取消令牌触发后流正常结束（返回 `None`）；
/// 不可恢复的错误以 `Err` 产出，之后流不再产出任何元素。
pub type ChangeFeed = BoxStream<'static, RepositoryResult<ChangeEvent>>;

#[cfg_attr(feature = "testing", mockall::automock)]
#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// 写入消息，返回带有存储分配的 `id` 与 `timestamp` 的记录。
    async fn create(&self, message: NewMessage) -> RepositoryResult<Message>;

    /// 按 `timestamp` 升序（同时间戳按插入顺序）返回房间最早的至多 `limit` 条消息。
    async fn query_ordered(&self, room_id: &RoomId, limit: usize) -> RepositoryResult<Vec<Message>>;

    /// 订阅房间变更。只有订阅建立之后写入的消息才会出现在流中。
    async fn subscribe(
        &self,
        room_id: &RoomId,
        cancel: CancellationToken,
    ) -> RepositoryResult<ChangeFeed>;
}
