use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::error::ApplicationError;

/// 在调用方取消令牌的约束下执行一次适配器调用。
///
/// 令牌已触发时不发起调用；调用途中触发时丢弃该 future 并返回 `Canceled`。
pub(crate) async fn cancellable<T, E, F>(
    cancel: &CancellationToken,
    fut: F,
) -> Result<T, ApplicationError>
where
    F: Future<Output = Result<T, E>>,
    ApplicationError: From<E>,
{
    if cancel.is_cancelled() {
        return Err(ApplicationError::Canceled);
    }

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ApplicationError::Canceled),
        result = fut => result.map_err(ApplicationError::from),
    }
}
