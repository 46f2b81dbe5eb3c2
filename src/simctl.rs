//! Thin wrapper over `xcrun simctl`, the only way we touch simulator instances.
//!
//! Every call is synchronous: spawn, wait for exit, capture output. A non-zero exit
//! status is the only failure signal; stderr is carried along for diagnostics.

use crate::catalog::{self, DeviceGroup, Runtime};
use crate::error::ControlError;
use std::io;
use std::process::Command;

/// Instance id `simctl` understands as "whatever is booted right now".
pub const ACTIVE_INSTANCE: &str = "booted";

/// Captured result of one external process run.
#[derive(Clone, Debug, Default)]
pub struct CommandOutput {
    pub success: bool,
    pub status: String,
    pub stdout: String,
    pub stderr: String,
}

/// Runs an external program to completion.
pub trait CommandRunner {
    fn run(&self, program: &str, args: &[String]) -> io::Result<CommandOutput>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessRunner;

impl CommandRunner for ProcessRunner {
    fn run(&self, program: &str, args: &[String]) -> io::Result<CommandOutput> {
        let output = Command::new(program).args(args).output()?;
        Ok(CommandOutput {
            success: output.status.success(),
            status: output.status.to_string(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Logical operations of the instance-control utility.
pub trait InstanceControl {
    fn list_runtimes(&self) -> Result<Vec<Runtime>, ControlError>;
    fn list_devices(&self) -> Result<Vec<DeviceGroup>, ControlError>;
    fn erase(&self, instance_id: &str) -> Result<(), ControlError>;
    /// Boot and block until the instance reports it has finished booting.
    fn boot(&self, instance_id: &str) -> Result<(), ControlError>;
    fn launch(&self, instance_id: &str, bundle_id: &str) -> Result<(), ControlError>;
    fn spawn(&self, instance_id: &str, argv: &[String]) -> Result<CommandOutput, ControlError>;
    fn shutdown(&self, instance_id: &str) -> Result<(), ControlError>;
}

#[derive(Clone, Debug)]
pub struct SimctlClient<R = ProcessRunner> {
    xcrun: String,
    runner: R,
}

impl SimctlClient<ProcessRunner> {
    pub fn new(xcrun: impl Into<String>) -> Self {
        Self::with_runner(xcrun, ProcessRunner)
    }
}

impl<R: CommandRunner> SimctlClient<R> {
    pub fn with_runner(xcrun: impl Into<String>, runner: R) -> Self {
        Self {
            xcrun: xcrun.into(),
            runner,
        }
    }

    pub fn xcrun(&self) -> &str {
        &self.xcrun
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    fn simctl(&self, args: &[&str]) -> Result<CommandOutput, ControlError> {
        let mut argv = Vec::with_capacity(args.len() + 1);
        argv.push("simctl".to_string());
        argv.extend(args.iter().map(|a| a.to_string()));

        let command = format!("{} {}", self.xcrun, argv.join(" "));
        tracing::debug!(%command, "invoking control utility");

        let output = self
            .runner
            .run(&self.xcrun, &argv)
            .map_err(|source| ControlError::Spawn {
                program: self.xcrun.clone(),
                source,
            })?;

        if !output.success {
            return Err(ControlError::Failed {
                command,
                status: output.status,
                stderr: output.stderr.trim().to_string(),
            });
        }
        Ok(output)
    }
}

impl<R: CommandRunner> InstanceControl for SimctlClient<R> {
    fn list_runtimes(&self) -> Result<Vec<Runtime>, ControlError> {
        let out = self.simctl(&["list", "runtimes", "--json"])?;
        catalog::parse_runtimes(&out.stdout).map_err(|source| ControlError::Catalog {
            what: "runtime",
            source,
        })
    }

    fn list_devices(&self) -> Result<Vec<DeviceGroup>, ControlError> {
        let out = self.simctl(&["list", "devices", "--json"])?;
        catalog::parse_devices(&out.stdout).map_err(|source| ControlError::Catalog {
            what: "device",
            source,
        })
    }

    fn erase(&self, instance_id: &str) -> Result<(), ControlError> {
        self.simctl(&["erase", instance_id]).map(drop)
    }

    fn boot(&self, instance_id: &str) -> Result<(), ControlError> {
        self.simctl(&["boot", instance_id])?;
        self.simctl(&["bootstatus", instance_id]).map(drop)
    }

    fn launch(&self, instance_id: &str, bundle_id: &str) -> Result<(), ControlError> {
        self.simctl(&["launch", instance_id, bundle_id]).map(drop)
    }

    fn spawn(&self, instance_id: &str, argv: &[String]) -> Result<CommandOutput, ControlError> {
        let mut args: Vec<&str> = vec!["spawn", instance_id];
        args.extend(argv.iter().map(String::as_str));
        self.simctl(&args)
    }

    fn shutdown(&self, instance_id: &str) -> Result<(), ControlError> {
        self.simctl(&["shutdown", instance_id]).map(drop)
    }
}
