use log::debug;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

use crate::core::config::ScrapeConfig;
use crate::core::types::{Extraction, Price};

/// Values that count as a successful extraction. Empty strings and zero
/// prices are failures that warrant another attempt.
pub trait Truthy {
    fn is_truthy(&self) -> bool;
}

impl Truthy for String {
    fn is_truthy(&self) -> bool {
        !self.trim().is_empty()
    }
}

impl Truthy for Price {
    fn is_truthy(&self) -> bool {
        self.value() > 0.0
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    pub fn from_config(config: &ScrapeConfig) -> Self {
        Self::new(config.retry_attempts, config.timings.attempt_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(2, Duration::from_secs(1))
    }
}

/// Calls `extract` up to `policy.max_attempts` times and returns the first
/// truthy value. Sleeps `policy.delay` between attempts, never after the last.
///
/// When every attempt fails the outcome of the final attempt is returned, with
/// a falsy `Found` downgraded to `Absent`.
pub async fn with_retries<T, F, Fut>(policy: &RetryPolicy, mut extract: F) -> Extraction<T>
where
    T: Truthy,
    F: FnMut() -> Fut,
    Fut: Future<Output = Extraction<T>>,
{
    let mut last = Extraction::Absent;

    for attempt in 0..policy.max_attempts {
        match extract().await {
            Extraction::Found(value) if value.is_truthy() => return Extraction::Found(value),
            Extraction::Found(_) => last = Extraction::Absent,
            other => last = other,
        }

        if attempt + 1 < policy.max_attempts {
            debug!(
                "Extraction attempt {}/{} failed, retrying in {:?}",
                attempt + 1,
                policy.max_attempts,
                policy.delay
            );
            sleep(policy.delay).await;
        }
    }

    last
}
