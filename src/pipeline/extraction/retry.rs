use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::config::ExtractionConfig;

/// Attempt budget and timing for one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    /// Watchdog applied to each strategy call.
    pub call_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            call_timeout: Duration::from_secs(45),
        }
    }
}

impl From<&ExtractionConfig> for RetryPolicy {
    fn from(config: &ExtractionConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: config.backoff_base,
            call_timeout: config.call_timeout,
        }
    }
}

impl RetryPolicy {
    /// Delay before the attempt following `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        backoff_delay(self.base_delay, attempt)
    }
}

/// `base * 2^(attempt-1)`, saturating instead of overflowing.
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(31);
    base.saturating_mul(1u32 << exponent)
}

/// Every delay the policy would wait through if all attempts fail.
pub fn backoff_schedule(policy: &RetryPolicy) -> Vec<Duration> {
    (1..policy.max_attempts).map(|a| policy.delay_after(a)).collect()
}

/// Suspends between attempts. Injected so tests run without real waiting.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Records requested delays and returns immediately.
#[cfg(test)]
#[derive(Default)]
pub struct RecordingSleeper {
    pub calls: std::sync::Mutex<Vec<Duration>>,
}

#[cfg(test)]
impl RecordingSleeper {
    pub fn recorded(&self) -> Vec<Duration> {
        self.calls.lock().unwrap().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.calls.lock().unwrap().push(duration);
    }
}

type ProgressCallback = Box<dyn Fn(u8) + Send + Sync>;

/// Progress sink that never moves backwards.
///
/// Values are clamped to 100 and any report below the highest value
/// already emitted is dropped.
pub struct ProgressReporter {
    callback: Option<ProgressCallback>,
    high_water: AtomicU8,
    started: AtomicBool,
}

impl ProgressReporter {
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(u8) + Send + Sync + 'static,
    {
        Self {
            callback: Some(Box::new(callback)),
            high_water: AtomicU8::new(0),
            started: AtomicBool::new(false),
        }
    }

    pub fn silent() -> Self {
        Self {
            callback: None,
            high_water: AtomicU8::new(0),
            started: AtomicBool::new(false),
        }
    }

    /// Highest value emitted so far.
    pub fn current(&self) -> u8 {
        self.high_water.load(Ordering::Relaxed)
    }

    pub fn report(&self, value: u8) {
        let value = value.min(100);
        let first = !self.started.swap(true, Ordering::Relaxed);
        let previous = self.high_water.fetch_max(value, Ordering::Relaxed);
        if value < previous || (value == previous && !first) {
            return;
        }
        if let Some(callback) = &self.callback {
            callback(value);
        }
    }
}

impl std::fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("current", &self.current())
            .finish()
    }
}
