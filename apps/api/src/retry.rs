//! Startup connect retry for the database and the queue broker, which may
//! still be coming up when the service starts.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::{info, warn};

/// Capped exponential backoff: `initial`, doubling up to `max` between tries.
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    pub initial: Duration,
    pub max: Duration,
    pub attempts: u32,
}

impl Default for Backoff {
    /// 1s, 2s, 4s, 8s, 16s, then 30s pauses; eight tries in all.
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(30),
            attempts: 8,
        }
    }
}

impl Backoff {
    /// Pause before try number `attempt + 1` (zero-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.initial.saturating_mul(factor).min(self.max)
    }
}

/// Calls `connect` until it succeeds or `backoff.attempts` are used up, and
/// returns the last error in that case.
pub async fn connect_with_retry<T, E, F, Fut>(
    service: &str,
    backoff: Backoff,
    mut connect: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut attempt = 0;
    loop {
        match connect().await {
            Ok(value) => {
                if attempt > 0 {
                    info!(service, attempts = attempt + 1, "connected after retrying");
                }
                return Ok(value);
            }
            Err(e) if attempt + 1 < backoff.attempts => {
                let delay = backoff.delay(attempt);
                warn!(
                    service,
                    attempt = attempt + 1,
                    "connect failed, retrying in {}s: {e}",
                    delay.as_secs_f32()
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
