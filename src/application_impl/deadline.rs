use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Outcome of a remote call raced against a deadline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Deadline<T, E> {
    Ok(T),
    Err(E),
    Timeout,
    Cancelled,
}

impl<T, E> Deadline<T, E> {
    pub fn from_result(result: Result<T, E>) -> Self {
        match result {
            Ok(v) => Deadline::Ok(v),
            Err(e) => Deadline::Err(e),
        }
    }
}

/// Run `fut` until it finishes, `limit` elapses, or `cancel` fires.
/// No limit means wait for the call or the cancellation only.
pub async fn with_deadline<F, T, E>(
    fut: F,
    limit: Option<Duration>,
    cancel: &CancellationToken,
) -> Deadline<T, E>
where
    F: Future<Output = Result<T, E>>,
{
    match limit {
        Some(limit) => {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => Deadline::Cancelled,
                res = tokio::time::timeout(limit, fut) => match res {
                    Ok(r) => Deadline::from_result(r),
                    Err(_) => Deadline::Timeout,
                },
            }
        }
        None => {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => Deadline::Cancelled,
                r = fut => Deadline::from_result(r),
            }
        }
    }
}
