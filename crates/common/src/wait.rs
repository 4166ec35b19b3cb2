//! Poll-until-deadline primitive and the completion waiter built on it
//!
//! The page gives no callback when a run finishes; the only signal is the
//! `#run_info` text changing to something like `Run in 12ms (OK)`. Callers
//! clear the signal before triggering a run, then wait here:
//!
//! ```text
//! CLEARED ──▶ POLLING ──┬──▶ COMPLETED
//!                ▲  │   │
//!                └──┘   └──▶ TIMED_OUT
//! ```
//!
//! Time is taken from a [`Clock`], so the loop can be driven by
//! [`ManualClock`] in tests instead of a real browser and wall time.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, warn};

/// Marker the editor writes into `#run_info` once a run has finished
pub const DEFAULT_MARKER: &str = "Run in ";

/// Default deadline for a single run
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default delay between two probes
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Source of time for polling loops
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;

    async fn sleep(&self, duration: Duration);
}

/// Wall clock backed by `tokio::time`
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Virtual clock: `sleep` returns at once and moves time forward
#[derive(Debug, Clone)]
pub struct ManualClock {
    origin: Instant,
    elapsed: Arc<Mutex<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            elapsed: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    /// Move time forward without sleeping
    pub fn advance(&self, duration: Duration) {
        *self.elapsed.lock() += duration;
    }

    /// Virtual time passed since creation
    pub fn elapsed(&self) -> Duration {
        *self.elapsed.lock()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

/// Delay strategy between probes
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Pacing {
    Fixed(Duration),
    Backoff {
        initial: Duration,
        factor: f64,
        max: Duration,
    },
}

impl Default for Pacing {
    fn default() -> Self {
        Pacing::Fixed(DEFAULT_POLL_INTERVAL)
    }
}

impl Pacing {
    /// Delay after the given (1-based) failed attempt
    pub fn delay(&self, attempt: u32) -> Duration {
        match *self {
            Pacing::Fixed(interval) => interval,
            Pacing::Backoff {
                initial,
                factor,
                max,
            } => {
                let exponent = attempt.saturating_sub(1).min(32) as i32;
                let scaled = initial.as_secs_f64() * factor.max(1.0).powi(exponent);
                if scaled >= max.as_secs_f64() {
                    max
                } else {
                    Duration::from_secs_f64(scaled)
                }
            }
        }
    }
}

/// Outcome of a polling loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome<T> {
    Completed {
        value: T,
        attempts: u32,
        elapsed: Duration,
    },
    TimedOut {
        /// Last probed value, if any probe ran
        last: Option<T>,
        attempts: u32,
        elapsed: Duration,
    },
}

impl<T> WaitOutcome<T> {
    pub fn is_completed(&self) -> bool {
        matches!(self, WaitOutcome::Completed { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            WaitOutcome::Completed { attempts, .. } | WaitOutcome::TimedOut { attempts, .. } => {
                *attempts
            }
        }
    }

    /// The completed value, or `None` on timeout
    pub fn completed(self) -> Option<T> {
        match self {
            WaitOutcome::Completed { value, .. } => Some(value),
            WaitOutcome::TimedOut { .. } => None,
        }
    }
}

/// Probe until `predicate` holds or `timeout` passes.
///
/// The probe runs at least once, even with a zero timeout. A probe error
/// ends the wait and is returned unchanged. The loop never sleeps past the
/// deadline; one last probe is taken when it is reached. A timeout too
/// large to represent as an instant means no deadline.
///
/// A probe that doesn't return is abandoned once the deadline plus one
/// pacing delay has passed, and the wait times out with the last value
/// seen before it.
pub async fn poll_until<C, P, Fut, T, E, F>(
    clock: &C,
    pacing: &Pacing,
    timeout: Duration,
    mut probe: P,
    predicate: F,
) -> Result<WaitOutcome<T>, E>
where
    C: Clock + ?Sized,
    P: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    F: Fn(&T) -> bool,
{
    let start = clock.now();
    let deadline = start.checked_add(timeout);
    let mut attempts = 0u32;
    let mut last = None;

    loop {
        attempts += 1;
        let value = match deadline {
            None => probe().await?,
            Some(deadline) => {
                let budget = deadline
                    .saturating_duration_since(clock.now())
                    .saturating_add(pacing.delay(attempts));
                tokio::select! {
                    biased;
                    value = probe() => value?,
                    _ = clock.sleep(budget) => {
                        let now = clock.now();
                        warn!(attempts, ?budget, "probe did not return before the deadline");
                        return Ok(WaitOutcome::TimedOut {
                            last,
                            attempts,
                            elapsed: now.saturating_duration_since(start),
                        });
                    }
                }
            }
        };
        let now = clock.now();

        if predicate(&value) {
            return Ok(WaitOutcome::Completed {
                value,
                attempts,
                elapsed: now.saturating_duration_since(start),
            });
        }

        let remaining = match deadline {
            Some(deadline) if now >= deadline => {
                return Ok(WaitOutcome::TimedOut {
                    last: Some(value),
                    attempts,
                    elapsed: now.saturating_duration_since(start),
                });
            }
            Some(deadline) => Some(deadline.saturating_duration_since(now)),
            None => None,
        };
        last = Some(value);

        let delay = match remaining {
            Some(remaining) => pacing.delay(attempts).min(remaining),
            None => pacing.delay(attempts),
        };
        debug!(attempts, ?delay, "condition not met yet");
        clock.sleep(delay).await;
    }
}

/// Waits for the completion marker to appear in the signal text
#[derive(Debug, Clone)]
pub struct CompletionWaiter {
    pub marker: String,
    pub timeout: Duration,
    pub pacing: Pacing,
}

impl Default for CompletionWaiter {
    fn default() -> Self {
        Self {
            marker: DEFAULT_MARKER.to_string(),
            timeout: DEFAULT_TIMEOUT,
            pacing: Pacing::default(),
        }
    }
}

impl CompletionWaiter {
    pub fn new(marker: impl Into<String>, timeout: Duration) -> Self {
        Self {
            marker: marker.into(),
            timeout,
            ..Default::default()
        }
    }

    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    /// Whether `signal` shows a finished run
    pub fn is_complete(&self, signal: &str) -> bool {
        signal.contains(&self.marker)
    }

    /// Poll the signal text until it carries the marker.
    ///
    /// On success the full signal text is returned. The signal must have
    /// been cleared before the run was triggered, otherwise a marker left
    /// from the previous run completes the wait at once.
    pub async fn wait<C, P, Fut, E>(&self, clock: &C, read_signal: P) -> Result<WaitOutcome<String>, E>
    where
        C: Clock + ?Sized,
        P: FnMut() -> Fut,
        Fut: Future<Output = Result<String, E>>,
    {
        poll_until(clock, &self.pacing, self.timeout, read_signal, |signal| {
            self.is_complete(signal)
        })
        .await
    }
}
