//! Exponential backoff with jitter for polling remote state.

use std::time::Duration;

use rand::Rng;

/// Floor for every delay, so a zero interval cannot turn into a busy loop.
pub const MIN_DELAY: Duration = Duration::from_millis(10);

/// Growing delay between polls, capped at `max`.
#[derive(Debug, Clone)]
pub struct Backoff {
    current: Duration,
    max: Duration,
    multiplier: f64,
    jitter: bool,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration, multiplier: f64) -> Self {
        let max = max.max(MIN_DELAY);
        Self {
            current: initial.clamp(MIN_DELAY, max),
            max,
            multiplier: multiplier.max(1.0),
            jitter: true,
        }
    }

    /// Disable jitter (deterministic delays).
    pub fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }

    /// Delay to sleep before the next poll. Advances the schedule.
    pub fn next_delay(&mut self) -> Duration {
        let base = self.current;
        let grown = Duration::from_secs_f64(base.as_secs_f64() * self.multiplier);
        self.current = grown.min(self.max);

        if self.jitter {
            // 0.5x to 1.5x, never above the cap
            let factor = rand::thread_rng().gen_range(0.5..1.5);
            Duration::from_secs_f64(base.as_secs_f64() * factor).clamp(MIN_DELAY, self.max)
        } else {
            base
        }
    }

    pub async fn wait(&mut self) {
        let delay = self.next_delay();
        tokio::time::sleep(delay).await;
    }
}
