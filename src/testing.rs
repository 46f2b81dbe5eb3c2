//! Fakes shared by unit tests: a manual clock, scripted load readings, a scripted
//! process runner and an in-memory instance-control utility.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::io;
use std::rc::Rc;
use std::time::Duration;

use crate::catalog::{self, DeviceGroup, Runtime};
use crate::error::ControlError;
use crate::idle::{Clock, LoadProbe};
use crate::simctl::{CommandOutput, CommandRunner, InstanceControl};

pub const RUNTIMES_JSON: &str = r#"{
  "runtimes": [
    {"identifier": "com.apple.CoreSimulator.SimRuntime.watchOS-10-0", "name": "watchOS 10.0", "version": "10.0", "isAvailable": true},
    {"identifier": "com.apple.CoreSimulator.SimRuntime.iOS-16-4", "name": "iOS 16.4", "version": "16.4", "isAvailable": true, "buildversion": "20E247"},
    {"identifier": "com.apple.CoreSimulator.SimRuntime.iOS-17-0", "name": "iOS 17.0", "version": "17.0", "isAvailable": true},
    {"identifier": "com.apple.CoreSimulator.SimRuntime.iOS-17-2", "name": "iOS 17.2", "version": "17.2", "isAvailable": true}
  ]
}"#;

pub const DEVICES_JSON: &str = r#"{
  "devices": {
    "com.apple.CoreSimulator.SimRuntime.iOS-16-4": [
      {"name": "iPhone 11", "udid": "ABC", "state": "Shutdown", "isAvailable": true}
    ],
    "com.apple.CoreSimulator.SimRuntime.iOS-17-0": [
      {"name": "iPhone 15", "udid": "DEF", "state": "Shutdown", "isAvailable": false},
      {"name": "iPhone 15 Pro", "udid": "GHI", "state": "Shutdown", "isAvailable": true}
    ],
    "iOS 17.2 (21C62)": [
      {"name": "iPhone 15", "udid": "JKL", "state": "Booted", "isAvailable": true}
    ]
  }
}"#;

/// Manual clock; `sleep` advances time instantly.
#[derive(Clone, Debug, Default)]
pub struct FakeClock {
    now: Rc<Cell<Duration>>,
    sleeps: Rc<RefCell<Vec<Duration>>>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, d: Duration) {
        self.now.set(self.now.get() + d);
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.borrow().clone()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Duration {
        self.now.get()
    }

    fn sleep(&self, duration: Duration) {
        self.sleeps.borrow_mut().push(duration);
        self.advance(duration);
    }
}

/// Load readings served in order; the last one repeats forever.
#[derive(Debug)]
pub struct ScriptedLoad {
    readings: RefCell<VecDeque<f64>>,
    taken: Cell<usize>,
}

impl ScriptedLoad {
    pub fn constant(load: f64) -> Self {
        Self::sequence(&[load])
    }

    pub fn sequence(readings: &[f64]) -> Self {
        Self {
            readings: RefCell::new(readings.iter().copied().collect()),
            taken: Cell::new(0),
        }
    }

    pub fn samples_taken(&self) -> usize {
        self.taken.get()
    }
}

impl LoadProbe for ScriptedLoad {
    fn one_minute_load(&self) -> f64 {
        self.taken.set(self.taken.get() + 1);
        let mut readings = self.readings.borrow_mut();
        if readings.len() > 1 {
            readings.pop_front().unwrap_or_default()
        } else {
            readings.front().copied().unwrap_or_default()
        }
    }
}

/// Process runner answering from a script keyed by argument substrings.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    responses: Vec<(String, CommandOutput)>,
    missing: bool,
    calls: RefCell<Vec<String>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, needle: &str, stdout: &str) -> Self {
        self.responses.push((
            needle.to_string(),
            CommandOutput {
                success: true,
                status: "exit status: 0".to_string(),
                stdout: stdout.to_string(),
                stderr: String::new(),
            },
        ));
        self
    }

    pub fn fail(mut self, needle: &str, stderr: &str) -> Self {
        self.responses.push((
            needle.to_string(),
            CommandOutput {
                success: false,
                status: "exit status: 1".to_string(),
                stdout: String::new(),
                stderr: stderr.to_string(),
            },
        ));
        self
    }

    pub fn missing_program(mut self) -> Self {
        self.missing = true;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, program: &str, args: &[String]) -> io::Result<CommandOutput> {
        let joined = args.join(" ");
        self.calls.borrow_mut().push(format!("{program} {joined}"));
        if self.missing {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                "No such file or directory",
            ));
        }
        Ok(self
            .responses
            .iter()
            .find(|(needle, _)| joined.contains(needle.as_str()))
            .map(|(_, out)| out.clone())
            .unwrap_or_else(|| CommandOutput {
                success: true,
                status: "exit status: 0".to_string(),
                ..Default::default()
            }))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FailKind {
    Exit,
    Spawn,
}

struct Failure {
    op: &'static str,
    instance_id: Option<String>,
    kind: FailKind,
}

/// In-memory control utility serving the canned catalog.
pub struct FakeControl {
    runtimes_json: String,
    devices_json: String,
    calls: RefCell<Vec<String>>,
    failures: RefCell<Vec<Failure>>,
    clock: Option<FakeClock>,
    boot_delays: RefCell<VecDeque<Duration>>,
    spawned: RefCell<Vec<Vec<String>>>,
}

impl FakeControl {
    pub fn new() -> Self {
        Self {
            runtimes_json: RUNTIMES_JSON.to_string(),
            devices_json: DEVICES_JSON.to_string(),
            calls: RefCell::new(Vec::new()),
            failures: RefCell::new(Vec::new()),
            clock: None,
            boot_delays: RefCell::new(VecDeque::new()),
            spawned: RefCell::new(Vec::new()),
        }
    }

    pub fn with_clock(mut self, clock: FakeClock) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Successive boots advance the shared clock by these many milliseconds.
    pub fn boot_delays(self, millis: &[u64]) -> Self {
        *self.boot_delays.borrow_mut() =
            millis.iter().map(|ms| Duration::from_millis(*ms)).collect();
        self
    }

    /// Every call of `op` exits non-zero.
    pub fn fail(&self, op: &'static str) {
        self.push_failure(op, None, FailKind::Exit);
    }

    /// Calls of `op` on `instance_id` exit non-zero.
    pub fn fail_for(&self, op: &'static str, instance_id: &str) {
        self.push_failure(op, Some(instance_id.to_string()), FailKind::Exit);
    }

    /// Every call of `op` fails to start.
    pub fn fail_spawn(&self, op: &'static str) {
        self.push_failure(op, None, FailKind::Spawn);
    }

    fn push_failure(&self, op: &'static str, instance_id: Option<String>, kind: FailKind) {
        self.failures.borrow_mut().push(Failure {
            op,
            instance_id,
            kind,
        });
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    /// Calls other than catalog listings.
    pub fn lifecycle_calls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| !c.starts_with("list_"))
            .collect()
    }

    /// Argv of every `spawn`, exactly as received.
    pub fn spawned(&self) -> Vec<Vec<String>> {
        self.spawned.borrow().clone()
    }

    pub fn count_calls(&self, prefix: &str) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    fn record(&self, op: &'static str, detail: &str) -> Result<(), ControlError> {
        let call = if detail.is_empty() {
            op.to_string()
        } else {
            format!("{op} {detail}")
        };
        self.calls.borrow_mut().push(call.clone());

        let instance_id = detail.split_whitespace().next().unwrap_or_default();
        let failures = self.failures.borrow();
        let hit = failures.iter().find(|f| {
            f.op == op && f.instance_id.iter().all(|id| id == instance_id)
        });
        match hit.map(|f| f.kind) {
            None => Ok(()),
            Some(FailKind::Exit) => Err(ControlError::Failed {
                command: format!("xcrun simctl {call}"),
                status: "exit status: 1".to_string(),
                stderr: format!("{op} refused"),
            }),
            Some(FailKind::Spawn) => Err(ControlError::Spawn {
                program: "xcrun".to_string(),
                source: io::Error::new(io::ErrorKind::NotFound, "No such file or directory"),
            }),
        }
    }
}

impl InstanceControl for FakeControl {
    fn list_runtimes(&self) -> Result<Vec<Runtime>, ControlError> {
        self.record("list_runtimes", "")?;
        catalog::parse_runtimes(&self.runtimes_json).map_err(|source| ControlError::Catalog {
            what: "runtime",
            source,
        })
    }

    fn list_devices(&self) -> Result<Vec<DeviceGroup>, ControlError> {
        self.record("list_devices", "")?;
        catalog::parse_devices(&self.devices_json).map_err(|source| ControlError::Catalog {
            what: "device",
            source,
        })
    }

    fn erase(&self, instance_id: &str) -> Result<(), ControlError> {
        self.record("erase", instance_id)
    }

    fn boot(&self, instance_id: &str) -> Result<(), ControlError> {
        self.record("boot", instance_id)?;
        if let Some(clock) = &self.clock {
            if let Some(delay) = self.boot_delays.borrow_mut().pop_front() {
                clock.advance(delay);
            }
        }
        Ok(())
    }

    fn launch(&self, instance_id: &str, bundle_id: &str) -> Result<(), ControlError> {
        self.record("launch", &format!("{instance_id} {bundle_id}"))
    }

    fn spawn(&self, instance_id: &str, argv: &[String]) -> Result<CommandOutput, ControlError> {
        self.spawned.borrow_mut().push(argv.to_vec());
        self.record("spawn", &format!("{instance_id} {}", argv.join(" ")))?;
        Ok(CommandOutput {
            success: true,
            status: "exit status: 0".to_string(),
            ..Default::default()
        })
    }

    fn shutdown(&self, instance_id: &str) -> Result<(), ControlError> {
        self.record("shutdown", instance_id)
    }
}
