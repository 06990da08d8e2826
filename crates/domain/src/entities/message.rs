use serde::{Deserialize, Serialize};

use crate::value_objects::{MessageId, RoomId, Timestamp, UserId};

/// 调用方提交的消息请求。`id` 与 `timestamp` 由存储分配。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMessage {
    pub user_id: UserId,
    pub username: String,
    pub content: String,
    pub room_id: RoomId,
}

impl NewMessage {
    pub fn new(
        user_id: UserId,
        username: impl Into<String>,
        content: impl Into<String>,
        room_id: RoomId,
    ) -> Self {
        Self {
            user_id,
            username: username.into(),
            content: content.into(),
            room_id,
        }
    }

    /// 由存储调用，生成持久化后的消息记录。
    pub fn materialize(self, id: MessageId, timestamp: Timestamp) -> Message {
        Message {
            id,
            user_id: self.user_id,
            username: self.username,
            content: self.content,
            room_id: self.room_id,
            timestamp,
        }
    }
}

/// 已持久化的消息，不可变。
///
/// 同一房间内按 `timestamp` 升序全序，时间戳相同时按存储插入顺序。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub user_id: UserId,
    /// 反范式化的显示名
    pub username: String,
    pub content: String,
    pub room_id: RoomId,
    pub timestamp: Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
}

/// 存储变更通知中的单个事件。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub message: Message,
}

impl ChangeEvent {
    pub fn added(message: Message) -> Self {
        Self {
            kind: ChangeKind::Added,
            message,
        }
    }

    pub fn is_added(&self) -> bool {
        self.kind == ChangeKind::Added
    }
}
