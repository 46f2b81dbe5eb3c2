use std::fmt;
use std::io;
use thiserror::Error;

/// Instance lifecycle step a control-utility call belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleOp {
    Erase,
    Boot,
    PostBootCommand,
    Launch,
    Shutdown,
}

impl LifecycleOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleOp::Erase => "erase",
            LifecycleOp::Boot => "boot",
            LifecycleOp::PostBootCommand => "post-boot command",
            LifecycleOp::Launch => "launch",
            LifecycleOp::Shutdown => "shutdown",
        }
    }
}

impl fmt::Display for LifecycleOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure talking to the instance-control utility.
#[derive(Debug, Error)]
pub enum ControlError {
    /// The utility could not be started at all.
    #[error("failed to invoke `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    /// The utility ran and exited non-zero.
    #[error("`{command}` exited with {status}: {stderr}")]
    Failed {
        command: String,
        status: String,
        stderr: String,
    },

    /// A catalog listing came back in a shape we cannot read.
    #[error("could not parse {what} catalog: {source}")]
    Catalog {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Severity-tagged benchmark failure.
///
/// `Recoverable` and `Fatal` are contained at the combination level by the runner;
/// only `Unexpected` escapes and aborts the whole invocation.
#[derive(Debug, Error)]
pub enum BenchError {
    /// Runtime or device could not be resolved. No instance was touched.
    #[error("{0}")]
    Recoverable(String),

    /// An instance lifecycle operation failed.
    #[error("{op} failed: {message}")]
    Fatal { op: LifecycleOp, message: String },

    /// Anything the runner does not know how to contain.
    #[error("{0}")]
    Unexpected(#[source] ControlError),
}

impl BenchError {
    /// Classify a control failure raised while performing `op`.
    ///
    /// A non-zero exit is the operation failing; anything else means the
    /// environment itself is broken.
    pub fn lifecycle(op: LifecycleOp, err: ControlError) -> Self {
        match err {
            ControlError::Failed { .. } => BenchError::Fatal {
                op,
                message: err.to_string(),
            },
            other => BenchError::Unexpected(other),
        }
    }

    pub fn is_recoverable(&self) -> bool {
        matches!(self, BenchError::Recoverable(_))
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, BenchError::Fatal { .. })
    }
}
