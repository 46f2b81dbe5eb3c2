//! Display-only host information for report headers.

use crate::schema::HostMeta;
use crate::simctl::CommandRunner;
use sysinfo::System;

/// Best-effort host description. Missing pieces are left as `None`.
pub fn collect_host_meta<R: CommandRunner>(runner: &R, xcrun: &str) -> HostMeta {
    HostMeta {
        os_version: System::long_os_version(),
        xcode_version: xcode_version(runner, xcrun),
    }
}

/// First line of `xcrun xcodebuild -version`, e.g. `Xcode 15.2`.
pub fn xcode_version<R: CommandRunner>(runner: &R, xcrun: &str) -> Option<String> {
    let args = ["xcodebuild".to_string(), "-version".to_string()];
    match runner.run(xcrun, &args) {
        Ok(out) if out.success => out
            .stdout
            .lines()
            .next()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string),
        Ok(out) => {
            tracing::debug!(stderr = %out.stderr.trim(), "xcodebuild -version failed");
            None
        }
        Err(err) => {
            tracing::debug!(error = %err, "xcodebuild not available");
            None
        }
    }
}
