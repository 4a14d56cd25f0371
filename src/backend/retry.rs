use super::transport::HttpReply;
use crate::config::TimingConfig;
use crate::error::{Result, SpriteError};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

/// Clock used for backoff and polling waits.
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

/// Returns immediately and remembers every requested wait.
#[derive(Default)]
pub struct RecordingSleeper {
    waits: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn waits(&self) -> Vec<Duration> {
        self.waits.lock().map(|w| w.clone()).unwrap_or_default()
    }

    pub fn total(&self) -> Duration {
        self.waits().iter().sum()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        if let Ok(mut waits) = self.waits.lock() {
            waits.push(duration);
        }
    }
}

/// Fixed-backoff retry on rate limiting. Other statuses pass straight
/// through to the caller.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::single_retry(Duration::from_secs(30))
    }
}

impl RetryPolicy {
    pub fn single_retry(backoff: Duration) -> Self {
        Self {
            max_retries: 1,
            backoff,
        }
    }

    pub async fn send<F, Fut>(
        &self,
        service: &str,
        sleeper: &dyn Sleeper,
        mut attempt: F,
    ) -> Result<HttpReply>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<HttpReply>>,
    {
        let mut retries = 0;
        loop {
            let reply = attempt().await?;
            if !reply.is_rate_limited() {
                return Ok(reply);
            }
            if retries >= self.max_retries {
                return Err(SpriteError::RateLimited {
                    service: service.to_string(),
                    attempts: retries + 1,
                });
            }
            retries += 1;
            log::warn!(
                "{} rate limited, waiting {}s...",
                service,
                self.backoff.as_secs()
            );
            sleeper.sleep(self.backoff).await;
        }
    }
}

#[derive(Debug, Clone)]
pub struct PollPolicy {
    pub interval: Duration,
    pub budget: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            budget: Duration::from_secs(600),
        }
    }
}

impl From<&TimingConfig> for PollPolicy {
    fn from(timing: &TimingConfig) -> Self {
        Self {
            interval: timing.poll_interval,
            budget: timing.poll_budget,
        }
    }
}

impl From<&TimingConfig> for RetryPolicy {
    fn from(timing: &TimingConfig) -> Self {
        Self::single_retry(timing.rate_limit_backoff)
    }
}
