/// Admission control: a ceiling on executions running at once.
///
/// Requests beyond the ceiling wait up to `queue_timeout` for a slot and
/// are turned away with `RunnerError::Busy` after that.

use coderun_common::RunnerError;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::warn;

#[derive(Debug, Clone)]
pub struct Admission {
    permits: Arc<Semaphore>,
    capacity: usize,
    queue_timeout: Duration,
}

impl Admission {
    pub fn new(capacity: usize, queue_timeout: Duration) -> Self {
        let capacity = capacity.max(1);
        Self {
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
            queue_timeout,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn in_flight(&self) -> usize {
        self.capacity - self.permits.available_permits()
    }

    /// Wait for a slot; the slot is released when the permit drops
    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit, RunnerError> {
        match tokio::time::timeout(self.queue_timeout, self.permits.clone().acquire_owned()).await {
            Ok(Ok(permit)) => Ok(permit),
            Ok(Err(_closed)) => Err(RunnerError::Busy),
            Err(_) => {
                warn!(
                    capacity = self.capacity,
                    waited_ms = self.queue_timeout.as_millis() as u64,
                    "no execution slot became free"
                );
                Err(RunnerError::Busy)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_permits_released_on_drop() {
        let admission = Admission::new(2, Duration::from_millis(50));

        let a = admission.acquire().await.unwrap();
        let b = admission.acquire().await.unwrap();
        assert_eq!(admission.in_flight(), 2);

        drop(a);
        assert_eq!(admission.in_flight(), 1);
        let _c = admission.acquire().await.unwrap();
        drop(b);
        assert_eq!(admission.in_flight(), 1);
    }

    #[tokio::test]
    async fn test_saturated_admission_is_busy() {
        let admission = Admission::new(1, Duration::from_millis(20));
        let _held = admission.acquire().await.unwrap();

        let err = admission.acquire().await.unwrap_err();
        assert!(matches!(err, RunnerError::Busy));
        assert_eq!(err.status_code(), 503);
    }

    #[tokio::test]
    async fn test_waiter_gets_slot_when_freed() {
        let admission = Admission::new(1, Duration::from_secs(2));
        let held = admission.acquire().await.unwrap();

        let waiter = {
            let admission = admission.clone();
            tokio::spawn(async move { admission.acquire().await.map(|_| ()) })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(held);

        assert!(waiter.await.unwrap().is_ok());
    }

    #[test]
    fn test_zero_capacity_is_raised_to_one() {
        let admission = Admission::new(0, Duration::from_millis(1));
        assert_eq!(admission.capacity(), 1);
    }
}
