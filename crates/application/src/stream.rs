//! 房间消息实时流
//!
//! 每次订阅由一个生产者任务和一个面向消费者的惰性序列组成：
//! 生产者读取存储的变更通知，只转发新增消息，写入该订阅独占的无界队列；
//! 消费者从队列读取。两侧速率互不协调，消费者停滞时队列无限增长。
//!
//! 生命周期：
//! - 调用方取消：生产者停止、适配器订阅释放，流产出一次 `Canceled` 后结束
//! - 变更通知自行结束或出错：静默结束（错误只记日志）
//! - 消费者丢弃流：订阅令牌被触发，生产者随之退出

use std::{
    pin::Pin,
    task::{Context, Poll},
};

use domain::{ChangeFeed, Message, RoomId};
use futures_util::{stream::BoxStream, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, error};

use crate::error::ApplicationError;

pub struct MessageStream {
    inner: BoxStream<'static, Result<Message, ApplicationError>>,
    _subscription: DropGuard,
}

impl MessageStream {
    /// 启动生产者任务并返回消费端。
    ///
    /// `subscription` 必须是 `caller` 的子令牌，且已交给适配器用于终止 `feed`。
    pub(crate) fn spawn(
        room_id: RoomId,
        feed: ChangeFeed,
        caller: CancellationToken,
        subscription: CancellationToken,
    ) -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel();

        tokio::spawn(pump(room_id, feed, sender, subscription.clone()));

        let inner = async_stream::stream! {
            loop {
                let next = tokio::select! {
                    biased;
                    _ = caller.cancelled() => None,
                    next = receiver.recv() => Some(next),
                };

                match next {
                    None => {
                        yield Err(ApplicationError::Canceled);
                        break;
                    }
                    Some(Some(message)) => {
                        yield Ok(message);
                    }
                    Some(None) => break,
                }
            }
        };

        Self {
            inner: Box::pin(inner),
            _subscription: subscription.drop_guard(),
        }
    }
}

impl Stream for MessageStream {
    type Item = Result<Message, ApplicationError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

async fn pump(
    room_id: RoomId,
    mut feed: ChangeFeed,
    sender: mpsc::UnboundedSender<Message>,
    subscription: CancellationToken,
) {
    debug!(room_id = %room_id, "message subscription opened");

    loop {
        let next = tokio::select! {
            _ = subscription.cancelled() => {
                debug!(room_id = %room_id, "message subscription canceled");
                break;
            }
            _ = sender.closed() => break,
            next = feed.next() => next,
        };

        match next {
            Some(Ok(event)) => {
                if !event.is_added() || event.message.room_id != room_id {
                    continue;
                }
                if sender.send(event.message).is_err() {
                    break;
                }
            }
            Some(Err(err)) => {
                error!(room_id = %room_id, error = %err, "change feed failed, closing stream");
                break;
            }
            None => {
                debug!(room_id = %room_id, "change feed ended");
                break;
            }
        }
    }

    debug!(room_id = %room_id, "message subscription closed");
}
