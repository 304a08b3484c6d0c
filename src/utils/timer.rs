//! Timer utilities
//!
//! Elapsed-time measurement and time-bounded collaborator calls.

use std::future::Future;
use std::time::{Duration, Instant};

use crate::error::{Result, RunError};

/// Simple timer for measuring elapsed time
#[derive(Debug)]
pub struct Timer {
    start: Instant,
    label: String,
}

impl Timer {
    /// Create and start a new timer
    pub fn start(label: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            label: label.into(),
        }
    }

    /// Get elapsed time
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stop timer and return elapsed time
    pub fn stop(self) -> Duration {
        let elapsed = self.elapsed();
        tracing::debug!("{}: {}ms", self.label, elapsed.as_millis());
        elapsed
    }
}

/// Await `fut`, failing with `RunError::Timeout` once `limit` has passed.
///
/// `None` waits without bound. Dropping the future on timeout cancels it,
/// so child processes must be spawned with `kill_on_drop`.
pub async fn bounded<T, F>(operation: &str, limit: Option<Duration>, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match limit {
        None => fut.await,
        Some(limit) => match tokio::time::timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => Err(RunError::Timeout {
                operation: operation.to_string(),
                limit,
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn test_timer() {
        let timer = Timer::start("test");
        sleep(Duration::from_millis(10));
        assert!(timer.elapsed() >= Duration::from_millis(10));
    }

    #[tokio::test]
    async fn test_bounded_passes_result_through() {
        let value = bounded("noop", Some(Duration::from_secs(5)), async { Ok(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);

        let err = bounded::<(), _>("fail", None, async {
            Err(RunError::Execution("boom".into()))
        })
        .await
        .unwrap_err();
        assert!(matches!(err, RunError::Execution(_)));
    }

    #[tokio::test]
    async fn test_bounded_times_out() {
        let err = bounded("clone", Some(Duration::from_millis(10)), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await
        .unwrap_err();

        match err {
            RunError::Timeout { operation, limit } => {
                assert_eq!(operation, "clone");
                assert_eq!(limit, Duration::from_millis(10));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
