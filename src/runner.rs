//! Measurement lifecycle of one `(version, device)` combination.
//!
//! Per repetition: erase (cold mode only), boot, post-boot commands, baseline app
//! launch, idle wait, shutdown. Repetitions after the first are preceded by a
//! stabilization pause. Everything is strictly sequential: the idle signal is the
//! host-wide load average, so overlapping boots would corrupt each other's numbers.

use std::collections::HashMap;
use std::time::Duration;

use crate::error::{BenchError, ControlError, LifecycleOp};
use crate::harness::{Accumulator, BenchmarkRequest, RunMeasurement, RunnerConfig};
use crate::idle::{Clock, IdleDetector, LoadProbe};
use crate::resolver::DeviceResolver;
use crate::schema::BenchmarkResult;
use crate::simctl::{InstanceControl, ACTIVE_INSTANCE};
use crate::BootMode;

pub struct BenchmarkRunner<C, P, K> {
    control: C,
    probe: P,
    clock: K,
    config: RunnerConfig,
    resolver: DeviceResolver,
    idle: IdleDetector,
    // instance id -> (version spec, device name) that first resolved to it
    claims: HashMap<String, (String, String)>,
}

impl<C, P, K> BenchmarkRunner<C, P, K>
where
    C: InstanceControl,
    P: LoadProbe,
    K: Clock,
{
    pub fn new(control: C, probe: P, clock: K, config: RunnerConfig) -> Self {
        let idle = IdleDetector {
            grace: config.idle_grace,
            poll_interval: config.idle_poll_interval,
        };
        Self {
            control,
            probe,
            clock,
            config,
            resolver: DeviceResolver::new(),
            idle,
            claims: HashMap::new(),
        }
    }

    pub fn control(&self) -> &C {
        &self.control
    }

    /// Run every request in order.
    ///
    /// Skipped combinations are simply absent from the output. Only an unexpected
    /// error stops the loop.
    pub fn run_benchmarks(
        &mut self,
        requests: &[BenchmarkRequest],
    ) -> Result<Vec<BenchmarkResult>, BenchError> {
        let mut results = Vec::with_capacity(requests.len());
        for (idx, request) in requests.iter().enumerate() {
            tracing::info!(
                combination = idx + 1,
                total = requests.len(),
                version = %request.version_spec,
                device = %request.device_name,
                "starting combination"
            );
            if let Some(result) = self.run(request)? {
                results.push(result);
            }
        }
        Ok(results)
    }

    /// Measure one combination.
    ///
    /// `Ok(None)` means the combination was skipped (recoverable or fatal failure);
    /// `Err` is reserved for unexpected failures.
    pub fn run(
        &mut self,
        request: &BenchmarkRequest,
    ) -> Result<Option<BenchmarkResult>, BenchError> {
        let span = tracing::info_span!(
            "combination",
            version = %request.version_spec,
            device = %request.device_name
        );
        let _enter = span.enter();

        match self.measure(request) {
            Ok(result) => {
                tracing::info!(
                    runs = result.runs,
                    avg_boot_ms = result.avg_boot_time_ms,
                    avg_idle_ms = ?result.avg_time_to_idle_ms,
                    "combination complete"
                );
                Ok(Some(result))
            }
            Err(BenchError::Recoverable(reason)) => {
                tracing::warn!(%reason, "skipping combination");
                Ok(None)
            }
            Err(err @ BenchError::Fatal { .. }) => {
                tracing::error!(error = %err, "combination aborted");
                self.recover();
                Ok(None)
            }
            Err(err) => {
                tracing::error!(error = %err, "unexpected failure, aborting benchmark run");
                Err(err)
            }
        }
    }

    fn measure(&mut self, request: &BenchmarkRequest) -> Result<BenchmarkResult, BenchError> {
        if request.run_count == 0 {
            return Err(BenchError::Recoverable(
                "run count must be at least 1".to_string(),
            ));
        }

        let instance_id = self.claim(request)?;

        let mut acc = Accumulator::default();
        for i in 0..request.run_count {
            if i > 0 {
                self.stabilize();
            }
            tracing::info!(run = i + 1, total = request.run_count, %instance_id, "repetition");
            let m = self.repetition(request, &instance_id)?;
            tracing::info!(
                run = i + 1,
                boot_ms = m.boot_time.as_millis() as u64,
                idle_ms = m.time_to_idle.map(|d| d.as_millis() as u64),
                "repetition measured"
            );
            acc.push(m);
        }

        acc.finish(request)
            .ok_or_else(|| BenchError::Recoverable("no runs completed".into()))
    }

    /// Resolve the instance and make sure no other combination already used it.
    fn claim(&mut self, request: &BenchmarkRequest) -> Result<String, BenchError> {
        let instance_id = self
            .resolver
            .resolve(&self.control, &request.version_spec, &request.device_name)?;

        let pair = (request.version_spec.clone(), request.device_name.clone());
        match self.claims.get(&instance_id) {
            Some(owner) if *owner != pair => Err(BenchError::Recoverable(format!(
                "instance {instance_id} was already benchmarked as ({}, {})",
                owner.0, owner.1
            ))),
            Some(_) => Ok(instance_id),
            None => {
                self.claims.insert(instance_id.clone(), pair);
                Ok(instance_id)
            }
        }
    }

    fn repetition(
        &self,
        request: &BenchmarkRequest,
        instance_id: &str,
    ) -> Result<RunMeasurement, BenchError> {
        if request.boot_mode == BootMode::Cold {
            self.control
                .erase(instance_id)
                .map_err(|e| BenchError::lifecycle(LifecycleOp::Erase, e))?;
        }

        let start = self.clock.now();
        self.control
            .boot(instance_id)
            .map_err(|e| BenchError::lifecycle(LifecycleOp::Boot, e))?;

        for command in &request.post_boot_commands {
            self.spawn_command(instance_id, command, true)?;
        }

        self.control
            .launch(instance_id, &self.config.baseline_bundle_id)
            .map_err(|e| BenchError::lifecycle(LifecycleOp::Launch, e))?;
        let boot_time = self.clock.since(start);

        let time_to_idle = if request.waits_for_idle() {
            let waited = self.idle.wait_for_idle(
                &self.probe,
                &self.clock,
                request.idle_load_threshold,
                request.idle_timeout(),
            );
            Some(boot_time + waited)
        } else {
            None
        };

        self.control
            .shutdown(instance_id)
            .map_err(|e| BenchError::lifecycle(LifecycleOp::Shutdown, e))?;

        Ok(RunMeasurement {
            boot_time,
            time_to_idle,
        })
    }

    /// Run an ad-hoc command inside the instance.
    ///
    /// The command is split into argv with POSIX shell quoting rules. A command that
    /// cannot be split, or exits non-zero, aborts the combination only when
    /// `critical` is set; otherwise it is logged and ignored.
    pub fn spawn_command(
        &self,
        instance_id: &str,
        command: &str,
        critical: bool,
    ) -> Result<(), BenchError> {
        let Some(argv) = shlex::split(command) else {
            if !critical {
                tracing::warn!(%command, "ignoring command with unbalanced quotes");
                return Ok(());
            }
            return Err(BenchError::Fatal {
                op: LifecycleOp::PostBootCommand,
                message: format!("cannot parse `{command}`: unbalanced quotes"),
            });
        };
        if argv.is_empty() {
            tracing::warn!("ignoring empty command");
            return Ok(());
        }

        match self.control.spawn(instance_id, &argv) {
            Ok(out) => {
                tracing::debug!(%command, stdout = %out.stdout.trim(), "command finished");
                Ok(())
            }
            Err(err @ ControlError::Failed { .. }) if !critical => {
                tracing::warn!(%command, error = %err, "non-critical command failed");
                Ok(())
            }
            Err(err) => Err(BenchError::lifecycle(LifecycleOp::PostBootCommand, err)),
        }
    }

    fn stabilize(&self) {
        let window = self.config.stabilization_window;
        let sample = self
            .config
            .stabilization_sample
            .max(Duration::from_millis(1));
        tracing::info!(
            window_s = window.as_secs(),
            "stabilizing before next repetition"
        );

        let start = self.clock.now();
        loop {
            let elapsed = self.clock.since(start);
            if elapsed >= window {
                break;
            }
            tracing::info!(
                load = self.probe.one_minute_load(),
                remaining_s = (window - elapsed).as_secs(),
                "stabilizing"
            );
            self.clock.sleep(sample.min(window - elapsed));
        }
    }

    /// Best-effort shutdown of whatever instance is still booted.
    fn recover(&self) {
        match self.control.shutdown(ACTIVE_INSTANCE) {
            Ok(()) => tracing::info!("recovery shutdown succeeded"),
            Err(err) => tracing::warn!(error = %err, "recovery shutdown failed"),
        }
    }
}
