//! Host quiescence detection based on the one-minute load average.

use std::time::{Duration, Instant};
use sysinfo::System;

/// Source of the host's one-minute load average.
pub trait LoadProbe {
    fn one_minute_load(&self) -> f64;
}

/// Live host load via `sysinfo`.
#[derive(Clone, Copy, Debug, Default)]
pub struct HostLoad;

impl LoadProbe for HostLoad {
    fn one_minute_load(&self) -> f64 {
        System::load_average().one
    }
}

/// Monotonic time plus blocking sleep.
pub trait Clock {
    /// Time since an arbitrary fixed origin.
    fn now(&self) -> Duration;
    fn sleep(&self, duration: Duration);

    fn since(&self, start: Duration) -> Duration {
        self.now().saturating_sub(start)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Polls load average until it drops below a threshold or a timeout expires.
///
/// Load average is smoothed and lags the real CPU burst of a boot, so idle is never
/// declared before `grace` has elapsed.
#[derive(Clone, Copy, Debug)]
pub struct IdleDetector {
    pub grace: Duration,
    pub poll_interval: Duration,
}

impl Default for IdleDetector {
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(10),
            poll_interval: Duration::from_secs(3),
        }
    }
}

impl IdleDetector {
    /// Returns the time spent waiting. Reaching the timeout is not an error; the two
    /// outcomes are only distinguished in the log.
    pub fn wait_for_idle<P, K>(
        &self,
        probe: &P,
        clock: &K,
        threshold: f64,
        timeout: Duration,
    ) -> Duration
    where
        P: LoadProbe + ?Sized,
        K: Clock + ?Sized,
    {
        let start = clock.now();
        loop {
            let elapsed = clock.since(start);
            if elapsed >= timeout {
                tracing::info!(
                    elapsed_ms = elapsed.as_millis() as u64,
                    threshold,
                    "idle wait timed out"
                );
                return elapsed;
            }

            let load = probe.one_minute_load();
            if load < threshold && elapsed > self.grace {
                tracing::info!(elapsed_ms = elapsed.as_millis() as u64, load, "host idle");
                return elapsed;
            }

            tracing::debug!(
                load,
                threshold,
                elapsed_s = elapsed.as_secs(),
                "waiting for idle"
            );
            clock.sleep(self.poll_interval);
        }
    }
}
