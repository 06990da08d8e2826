use application::{ApplicationError, MessageViewStream};
use axum::extract::ws::{CloseFrame, Message as WsMessage, Utf8Bytes, WebSocket};
use domain::RoomId;
use futures_util::{SinkExt, StreamExt};
use tokio_util::sync::CancellationToken;

/// 服务关闭时发送的关闭码
const CLOSE_GOING_AWAY: u16 = 1001;

/// 单个房间订阅的 WebSocket 连接
///
/// 只向客户端推送消息；客户端发来的文本被忽略，关闭帧或断开即结束订阅。
pub struct WebSocketConnection {
    room_id: RoomId,
    messages: MessageViewStream,
    cancel: CancellationToken,
}

impl WebSocketConnection {
    pub fn new(room_id: RoomId, messages: MessageViewStream, cancel: CancellationToken) -> Self {
        Self {
            room_id,
            messages,
            cancel,
        }
    }

    pub async fn run(self, socket: WebSocket) {
        let Self {
            room_id,
            mut messages,
            cancel,
        } = self;
        // 连接结束时无论何种原因都释放订阅
        let _guard = cancel.drop_guard();

        tracing::info!(room_id = %room_id, "WebSocket 连接已建立");
        let (mut sender, mut incoming) = socket.split();

        loop {
            tokio::select! {
                item = messages.next() => {
                    match item {
                        Some(Ok(view)) => {
                            let payload = match serde_json::to_string(&view) {
                                Ok(json) => json,
                                Err(err) => {
                                    tracing::warn!(error = %err, "failed to serialize websocket payload");
                                    continue;
                                }
                            };
                            if sender.send(WsMessage::Text(payload.into())).await.is_err() {
                                tracing::debug!(room_id = %room_id, "websocket send failed");
                                break;
                            }
                        }
                        Some(Err(ApplicationError::Canceled)) => {
                            let _ = sender
                                .send(WsMessage::Close(Some(CloseFrame {
                                    code: CLOSE_GOING_AWAY,
                                    reason: Utf8Bytes::from_static("server shutting down"),
                                })))
                                .await;
                            break;
                        }
                        Some(Err(err)) => {
                            tracing::warn!(room_id = %room_id, error = %err, "message stream failed");
                            break;
                        }
                        None => {
                            let _ = sender.send(WsMessage::Close(None)).await;
                            break;
                        }
                    }
                }
                frame = incoming.next() => {
                    match frame {
                        Some(Ok(WsMessage::Close(_))) | None => break,
                        Some(Ok(_)) => {}
                        Some(Err(err)) => {
                            tracing::debug!(room_id = %room_id, error = %err, "websocket receive failed");
                            break;
                        }
                    }
                }
            }
        }

        tracing::info!(room_id = %room_id, "WebSocket 连接已关闭");
    }
}
