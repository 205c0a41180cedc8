//! Cancellable poll-until-ready primitive.
//!
//! The loop checks a probe, then sleeps for the poll interval, until the
//! probe yields a value, the deadline passes, or the cancellation token
//! fires. The final sleep is clamped so the loop never overshoots the
//! deadline.

use std::future::Future;
use std::time::Duration;

use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;

/// Interval between status checks.
pub const POLL_INTERVAL: Duration = Duration::from_secs(5);
/// Budget for a freshly created server to become ready.
pub const CREATE_TIMEOUT: Duration = Duration::from_secs(300);
/// Budget for a rebooted server to become ready again.
pub const REBOOT_TIMEOUT: Duration = Duration::from_secs(600);

/// Timeout and interval for one wait.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct WaitPolicy {
    /// Total time allowed before giving up.
    pub timeout: Duration,
    /// Delay between probes. Must be non-zero.
    pub poll_interval: Duration,
}

impl WaitPolicy {
    /// Policy applied after a create request.
    pub const CREATE: Self = Self {
        timeout: CREATE_TIMEOUT,
        poll_interval: POLL_INTERVAL,
    };

    /// Policy applied after a reboot request.
    pub const REBOOT: Self = Self {
        timeout: REBOOT_TIMEOUT,
        poll_interval: POLL_INTERVAL,
    };

    /// Builds a policy, substituting one millisecond for a zero interval.
    #[must_use]
    pub fn new(timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            timeout,
            poll_interval: poll_interval.max(Duration::from_millis(1)),
        }
    }
}

/// Reasons a wait ended without the probe succeeding.
#[derive(Debug, Eq, PartialEq)]
pub enum WaitError<E> {
    /// The deadline passed.
    TimedOut {
        /// Time spent waiting.
        waited: Duration,
        /// Number of probes issued.
        attempts: u32,
    },
    /// The cancellation token fired.
    Cancelled,
    /// The probe itself failed.
    Probe(E),
}

/// Polls `probe` until it returns `Some`, the policy times out, or `cancel`
/// fires.
///
/// The probe runs at least once, even with a zero timeout.
///
/// # Errors
///
/// Returns [`WaitError::TimedOut`] when the deadline passes,
/// [`WaitError::Cancelled`] when the token fires, and [`WaitError::Probe`]
/// as soon as the probe fails.
pub async fn poll_until<T, E, F, Fut>(
    policy: WaitPolicy,
    cancel: &CancellationToken,
    mut probe: F,
) -> Result<T, WaitError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, E>>,
{
    let started = Instant::now();
    let deadline = started + policy.timeout;
    let mut attempts: u32 = 0;

    loop {
        if cancel.is_cancelled() {
            return Err(WaitError::Cancelled);
        }

        attempts = attempts.saturating_add(1);
        if let Some(value) = probe().await.map_err(WaitError::Probe)? {
            return Ok(value);
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(WaitError::TimedOut {
                waited: now.duration_since(started),
                attempts,
            });
        }

        let pause = policy.poll_interval.min(deadline.duration_since(now));
        tokio::select! {
            () = cancel.cancelled() => return Err(WaitError::Cancelled),
            () = sleep(pause) => {}
        }
    }
}
