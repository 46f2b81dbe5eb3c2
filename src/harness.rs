use std::time::Duration;

use crate::schema::BenchmarkResult;
use crate::BootMode;

/// Fixed knobs of the measurement lifecycle.
#[derive(Clone, Debug)]
pub struct RunnerConfig {
    /// Pause between repetitions so the previous boot's load can decay.
    pub stabilization_window: Duration,
    /// How often host load is sampled (and logged) during stabilization.
    pub stabilization_sample: Duration,
    pub idle_grace: Duration,
    pub idle_poll_interval: Duration,
    /// App launched after boot as the usability check.
    pub baseline_bundle_id: String,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            stabilization_window: Duration::from_secs(60),
            stabilization_sample: Duration::from_secs(10),
            idle_grace: Duration::from_secs(10),
            idle_poll_interval: Duration::from_secs(3),
            baseline_bundle_id: "com.apple.Preferences".to_string(),
        }
    }
}

/// Knobs shared by every combination of one invocation.
#[derive(Clone, Debug)]
pub struct RequestOptions {
    pub run_count: u32,
    pub idle_load_threshold: f64,
    pub idle_timeout_secs: u64,
    pub post_boot_commands: Vec<String>,
    pub boot_mode: BootMode,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            run_count: 3,
            idle_load_threshold: 2.0,
            idle_timeout_secs: 120,
            post_boot_commands: Vec::new(),
            boot_mode: BootMode::Cold,
        }
    }
}

/// One `(version, device)` combination to measure.
#[derive(Clone, Debug)]
pub struct BenchmarkRequest {
    pub version_spec: String,
    pub device_name: String,
    pub run_count: u32,
    pub idle_load_threshold: f64,
    pub idle_timeout_secs: u64,
    pub post_boot_commands: Vec<String>,
    pub boot_mode: BootMode,
}

impl BenchmarkRequest {
    pub fn new(version_spec: &str, device_name: &str, opts: &RequestOptions) -> Self {
        Self {
            version_spec: version_spec.to_string(),
            device_name: device_name.to_string(),
            run_count: opts.run_count,
            idle_load_threshold: opts.idle_load_threshold,
            idle_timeout_secs: opts.idle_timeout_secs,
            post_boot_commands: opts.post_boot_commands.clone(),
            boot_mode: opts.boot_mode,
        }
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    /// A zero timeout disables the idle wait entirely.
    pub fn waits_for_idle(&self) -> bool {
        self.idle_timeout_secs > 0
    }
}

/// Every version crossed with every device, version-major.
pub fn plan(
    versions: &[String],
    devices: &[String],
    opts: &RequestOptions,
) -> Vec<BenchmarkRequest> {
    let mut requests = Vec::with_capacity(versions.len() * devices.len());
    for version in versions {
        for device in devices {
            requests.push(BenchmarkRequest::new(version, device, opts));
        }
    }
    requests
}

/// Timings of a single repetition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunMeasurement {
    /// Boot call through successful baseline launch.
    pub boot_time: Duration,
    /// Boot time plus idle wait; `None` when the idle wait is disabled.
    pub time_to_idle: Option<Duration>,
}

#[derive(Clone, Debug, Default)]
pub struct Accumulator {
    runs: u32,
    boot_total: Duration,
    idle_total: Duration,
    idle_runs: u32,
}

impl Accumulator {
    pub fn push(&mut self, m: RunMeasurement) {
        self.runs += 1;
        self.boot_total += m.boot_time;
        if let Some(idle) = m.time_to_idle {
            self.idle_total += idle;
            self.idle_runs += 1;
        }
    }

    /// Arithmetic means over the pushed repetitions; `None` if nothing was pushed.
    pub fn finish(&self, request: &BenchmarkRequest) -> Option<BenchmarkResult> {
        if self.runs == 0 {
            return None;
        }

        let avg_boot_time_ms = mean_ms(self.boot_total, self.runs);
        let avg_time_to_idle_ms =
            (self.idle_runs > 0).then(|| mean_ms(self.idle_total, self.idle_runs));

        Some(BenchmarkResult {
            version: request.version_spec.clone(),
            device: request.device_name.clone(),
            boot_mode: request.boot_mode.as_str().to_string(),
            avg_boot_time_ms,
            avg_time_to_idle_ms,
            runs: self.runs,
        })
    }
}

fn mean_ms(total: Duration, count: u32) -> f64 {
    let denom = count.max(1) as f64;
    (total.as_secs_f64() * 1000.0) / denom
}
