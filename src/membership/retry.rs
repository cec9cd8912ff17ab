// 带错误分类的重试策略
// 只有 Classify 判定为瞬时的错误才会重试，退避时间按指数增长

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use crate::config::Config;
use crate::error::Classify;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
        }
    }
}

impl From<&Config> for RetryPolicy {
    fn from(config: &Config) -> Self {
        Self {
            max_attempts: config.assign_max_attempts.max(1),
            base_delay: config.assign_backoff(),
            max_delay: config.assign_backoff_max(),
        }
    }
}

impl RetryPolicy {
    /// 第 attempt 次失败后的等待时间（attempt 从 1 开始）
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    pub async fn run<T, E, F, Fut>(&self, label: &str, mut op: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify + Display,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < max_attempts => {
                    let delay = self.backoff(attempt);
                    tracing::warn!(
                        op = label,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "transient failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    if e.is_transient() {
                        tracing::error!(op = label, attempt, error = %e, "retries exhausted");
                    }
                    return Err(e);
                }
            }
        }
    }
}
