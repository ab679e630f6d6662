use crate::config::OrchestratorConfig;
use std::time::Duration;
use tokio::sync::watch;

/// Bounded exponential backoff for provider attempts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&OrchestratorConfig::default())
    }
}

impl From<&OrchestratorConfig> for RetryPolicy {
    fn from(config: &OrchestratorConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
            max_delay: Duration::from_millis(config.retry_max_delay_ms),
        }
    }
}

impl RetryPolicy {
    /// No waiting between attempts
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay after the given (1-based) attempt failed: `base * 2^attempt`, capped at `max_delay`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    pub fn has_attempts_left(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Sleep out the backoff for `attempt`.
    ///
    /// Returns `false` without finishing the sleep once `shutdown` flips to `true`.
    pub async fn wait(&self, attempt: u32, shutdown: &mut watch::Receiver<bool>) -> bool {
        if *shutdown.borrow() {
            return false;
        }

        let delay = self.delay_for(attempt);
        if delay.is_zero() {
            return true;
        }

        let cancelled = async {
            if shutdown.wait_for(|stop| *stop).await.is_err() {
                // Sender gone: nobody can cancel any more
                std::future::pending::<()>().await;
            }
        };

        tokio::select! {
            _ = tokio::time::sleep(delay) => true,
            _ = cancelled => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy::default()
    }

    #[test]
    fn test_delay_doubles_per_attempt() {
        let policy = policy();
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(2), Duration::from_millis(400));
        assert_eq!(policy.delay_for(3), Duration::from_millis(800));
    }

    #[test]
    fn test_delay_is_capped() {
        let policy = policy();
        assert_eq!(policy.delay_for(10), Duration::from_secs(5));
        assert_eq!(policy.delay_for(64), Duration::from_secs(5));
    }

    #[test]
    fn test_attempt_budget() {
        let policy = policy();
        assert!(policy.has_attempts_left(1));
        assert!(policy.has_attempts_left(2));
        assert!(!policy.has_attempts_left(3));
    }

    #[test]
    fn test_zero_attempts_clamped_to_one() {
        assert_eq!(RetryPolicy::immediate(0).max_attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_completes_without_shutdown() {
        let (_tx, mut rx) = watch::channel(false);
        assert!(policy().wait(1, &mut rx).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_survives_dropped_sender() {
        let (tx, mut rx) = watch::channel(false);
        drop(tx);
        assert!(policy().wait(2, &mut rx).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_cancelled_by_shutdown() {
        let (tx, mut rx) = watch::channel(false);
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_secs(60),
            max_delay: Duration::from_secs(600),
        };

        let waiter = tokio::spawn(async move { policy.wait(1, &mut rx).await });
        tokio::task::yield_now().await;
        tx.send(true).unwrap();

        assert!(!waiter.await.unwrap());
    }

    #[tokio::test]
    async fn test_wait_returns_immediately_when_already_shut_down() {
        let (_tx, mut rx) = watch::channel(true);
        assert!(!policy().wait(1, &mut rx).await);
    }
}
