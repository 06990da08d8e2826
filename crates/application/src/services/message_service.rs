use std::sync::Arc;

use domain::{Message, MessageRepository, NewMessage, RoomId, UserId};
use futures_util::{stream::BoxStream, StreamExt};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::session_manager::TokenValidator;
use crate::{cancel::cancellable, error::ApplicationError, stream::MessageStream};

/// 历史查询条数设置
#[derive(Debug, Clone)]
pub struct HistorySettings {
    /// `limit <= 0` 时使用
    pub default_limit: usize,
    pub max_limit: usize,
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            default_limit: 50,
            max_limit: 500,
        }
    }
}

impl HistorySettings {
    pub fn normalize(&self, limit: i64) -> usize {
        if limit <= 0 {
            return self.default_limit.min(self.max_limit);
        }
        usize::try_from(limit).map_or(self.max_limit, |limit| limit.min(self.max_limit))
    }
}

#[derive(Debug, Clone)]
pub struct SendMessageRequest {
    pub user_id: UserId,
    pub username: String,
    pub content: String,
    pub room_id: RoomId,
}

/// 附带展示名的消息
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageView {
    #[serde(flatten)]
    pub message: Message,
    pub display_name: String,
}

pub type MessageViewStream = BoxStream<'static, Result<MessageView, ApplicationError>>;

pub struct MessageServiceDependencies {
    pub message_repository: Arc<dyn MessageRepository>,
    pub token_validator: Arc<dyn TokenValidator>,
}

/// 消息服务：写入、历史回溯、实时订阅。
///
/// 本层不持有任何共享可变状态，也不做重试。
pub struct MessageService {
    deps: MessageServiceDependencies,
    settings: HistorySettings,
}

impl MessageService {
    pub fn new(deps: MessageServiceDependencies) -> Self {
        Self::with_settings(deps, HistorySettings::default())
    }

    pub fn with_settings(deps: MessageServiceDependencies, settings: HistorySettings) -> Self {
        Self { deps, settings }
    }

    /// 写入消息。内容不做空值校验，原样交给存储。
    pub async fn send_message(
        &self,
        request: SendMessageRequest,
        cancel: &CancellationToken,
    ) -> Result<Message, ApplicationError> {
        let new_message = NewMessage::new(
            request.user_id,
            request.username,
            request.content,
            request.room_id,
        );
        let message = cancellable(cancel, self.deps.message_repository.create(new_message)).await?;

        debug!(room_id = %message.room_id, message_id = %message.id, "message stored");
        Ok(message)
    }

    /// 按时间升序返回房间最早的至多 `limit` 条消息。需要“最新 N 条”的调用方自行反转。
    pub async fn get_message_history(
        &self,
        room_id: &RoomId,
        limit: i64,
        cancel: &CancellationToken,
    ) -> Result<Vec<Message>, ApplicationError> {
        let limit = self.settings.normalize(limit);
        cancellable(
            cancel,
            self.deps.message_repository.query_ordered(room_id, limit),
        )
        .await
    }

    /// 打开房间的实时消息流，只包含订阅建立后新增的消息。
    pub async fn stream_messages(
        &self,
        room_id: RoomId,
        cancel: &CancellationToken,
    ) -> Result<MessageStream, ApplicationError> {
        let subscription = cancel.child_token();
        let feed = cancellable(
            cancel,
            self.deps
                .message_repository
                .subscribe(&room_id, subscription.clone()),
        )
        .await?;

        info!(room_id = %room_id, "message stream opened");
        Ok(MessageStream::spawn(
            room_id,
            feed,
            cancel.clone(),
            subscription,
        ))
    }

    /// 校验令牌后以令牌所属用户的身份发送消息。
    pub async fn send_message_with_auth(
        &self,
        token: &str,
        content: String,
        room_id: RoomId,
        cancel: &CancellationToken,
    ) -> Result<Message, ApplicationError> {
        let user = self.deps.token_validator.validate_token(token, cancel).await?;

        self.send_message(
            SendMessageRequest {
                user_id: user.id,
                username: user.username.to_string(),
                content,
                room_id,
            },
            cancel,
        )
        .await
    }

    /// 带令牌时先校验，不带令牌时匿名放行。
    pub async fn get_message_history_with_auth(
        &self,
        token: Option<&str>,
        room_id: &RoomId,
        limit: i64,
        cancel: &CancellationToken,
    ) -> Result<Vec<MessageView>, ApplicationError> {
        if let Some(token) = token {
            self.deps.token_validator.validate_token(token, cancel).await?;
        }

        let messages = self.get_message_history(room_id, limit, cancel).await?;

        let mut views = Vec::with_capacity(messages.len());
        for message in messages {
            let display_name =
                display_name(self.deps.token_validator.as_ref(), token, &message, cancel).await?;
            views.push(MessageView {
                message,
                display_name,
            });
        }
        Ok(views)
    }

    /// 带令牌时先校验，不带令牌时匿名放行；每条消息的展示名在投递时重新解析。
    pub async fn stream_messages_with_auth(
        &self,
        token: Option<String>,
        room_id: RoomId,
        cancel: &CancellationToken,
    ) -> Result<MessageViewStream, ApplicationError> {
        if let Some(token) = token.as_deref() {
            self.deps.token_validator.validate_token(token, cancel).await?;
        }

        let mut messages = self.stream_messages(room_id, cancel).await?;
        let validator = Arc::clone(&self.deps.token_validator);
        let cancel = cancel.clone();

        let views = async_stream::stream! {
            while let Some(item) = messages.next().await {
                match item {
                    Ok(message) => {
                        match display_name(validator.as_ref(), token.as_deref(), &message, &cancel)
                            .await
                        {
                            Ok(display_name) => {
                                yield Ok(MessageView { message, display_name });
                            }
                            Err(err) => {
                                yield Err(err);
                                break;
                            }
                        }
                    }
                    Err(err) => {
                        yield Err(err);
                        break;
                    }
                }
            }
        };

        Ok(views.boxed())
    }
}

/// 有令牌时按令牌解析展示名，解析失败回落为占位名；无令牌时使用存储的用户名。
///
/// 只有取消会作为错误返回。
async fn display_name(
    validator: &dyn TokenValidator,
    token: Option<&str>,
    message: &Message,
    cancel: &CancellationToken,
) -> Result<String, ApplicationError> {
    let Some(token) = token else {
        return Ok(message.username.clone());
    };

    match validator.validate_token(token, cancel).await {
        Ok(user) => Ok(user.username.to_string()),
        Err(ApplicationError::Canceled) => Err(ApplicationError::Canceled),
        Err(err) => {
            debug!(message_id = %message.id, error = %err, "display name fallback");
            Ok(format!("user_{}", message.username))
        }
    }
}
