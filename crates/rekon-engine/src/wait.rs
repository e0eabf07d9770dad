use std::time::{Duration, Instant};

/// Evaluate `predicate` until it returns true or `timeout` elapses.
///
/// The predicate runs immediately, then once per `interval`. No attempt
/// starts at or after the deadline, so a zero timeout means one attempt.
pub async fn poll_until<F>(mut predicate: F, timeout: Duration, interval: Duration) -> bool
where
    F: AsyncFnMut() -> bool,
{
    let started = Instant::now();
    loop {
        if predicate().await {
            return true;
        }
        if started.elapsed() + interval >= timeout {
            return false;
        }
        tokio::time::sleep(interval).await;
    }
}
