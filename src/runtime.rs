use std::future::Future;
use std::time::Duration;

use crate::error::Error;

/// Runs `f`, bounded by `duration` when one is given
pub async fn with_timeout<F, T>(duration: Option<Duration>, f: F) -> Result<T, Error>
where
    F: Future<Output = Result<T, Error>>,
{
    match duration {
        Some(duration) => tokio::time::timeout(duration, f).await?,
        None => f.await,
    }
}
