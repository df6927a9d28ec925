// Long-running operation polling
// Management calls acknowledged with 201/202 complete asynchronously; the
// poller re-checks a status source at a fixed interval until it reports a
// terminal state or the deadline passes. Failures are never retried here.

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use super::management::ManagementError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStatus<T> {
    Pending,
    Done(T),
}

#[derive(Debug, Clone)]
pub struct OperationPoller {
    interval: Duration,
    timeout: Duration,
}

impl OperationPoller {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run `check` until it yields `Done`, an error, or the timeout elapses
    pub async fn poll_until<T, F, Fut>(&self, operation: &str, mut check: F) -> Result<T, ManagementError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<PollStatus<T>, ManagementError>>,
    {
        let deadline = Instant::now() + self.timeout;
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;
            match check().await? {
                PollStatus::Done(value) => {
                    debug!(operation, attempts, "Long-running operation completed");
                    return Ok(value);
                }
                PollStatus::Pending => {
                    if Instant::now() + self.interval > deadline {
                        return Err(ManagementError::Timeout {
                            operation: operation.to_string(),
                            timeout_secs: self.timeout.as_secs(),
                        });
                    }
                    debug!(operation, attempts, "Operation still in progress");
                    tokio::time::sleep(self.interval).await;
                }
            }
        }
    }
}
