//! Periodic background work that stops when its handle is dropped.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

/// Shortest accepted tick period.
pub const MIN_PERIOD: Duration = Duration::from_millis(1);

pub struct Ticker {
    handle: JoinHandle<()>,
}

impl Ticker {
    /// Calls `tick` immediately and then every `period` with the tick number.
    /// Periods below [`MIN_PERIOD`] are raised to it.
    /// Must be called from inside a tokio runtime.
    pub fn spawn<F, Fut>(period: Duration, mut tick: F) -> Self
    where
        F: FnMut(u64) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            let mut interval = time::interval(period.max(MIN_PERIOD));
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut n = 0u64;
            loop {
                interval.tick().await;
                tick(n).await;
                n += 1;
            }
        });
        Self { handle }
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    pub fn stop(self) {}
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Elapsed time since a session or break started.
#[derive(Debug, Clone, Copy)]
pub struct ElapsedClock {
    started: Instant,
}

impl ElapsedClock {
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn display(&self) -> String {
        format_elapsed(self.elapsed())
    }
}

/// `HH:MM:SS`, hours not wrapped at 24.
pub fn format_elapsed(d: Duration) -> String {
    let secs = d.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn ticks_until_dropped() {
        let count = Arc::new(AtomicU64::new(0));
        let c = count.clone();
        let ticker = Ticker::spawn(Duration::from_secs(30), move |_| {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
            }
        });
        time::sleep(Duration::from_secs(95)).await;
        assert_eq!(count.load(Ordering::SeqCst), 4);
        assert!(ticker.is_running());

        drop(ticker);
        time::sleep(Duration::from_secs(120)).await;
        assert_eq!(count.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_period_still_ticks() {
        let count = Arc::new(AtomicU64::new(0));
        let c = count.clone();
        let ticker = Ticker::spawn(Duration::ZERO, move |_| {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
            }
        });
        time::sleep(Duration::from_millis(10)).await;
        assert!(ticker.is_running());
        assert!(count.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn clock_formats() {
        let clock = ElapsedClock::start();
        time::advance(Duration::from_secs(3 * 3600 + 7 * 60 + 5)).await;
        assert_eq!(clock.display(), "03:07:05");
        assert_eq!(format_elapsed(Duration::from_secs(26 * 3600)), "26:00:00");
    }
}
