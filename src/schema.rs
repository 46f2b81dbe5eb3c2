use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkResult {
    pub version: String,
    pub device: String,
    pub boot_mode: String,

    pub avg_boot_time_ms: f64,
    pub avg_time_to_idle_ms: Option<f64>,
    pub runs: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostMeta {
    pub os_version: Option<String>,
    pub xcode_version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMeta {
    pub schema_version: u32,
    pub bench_version: String,
    pub timestamp_utc: String,
    pub boot_mode: String,
    pub host: HostMeta,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootBenchReport {
    pub run: RunMeta,
    pub results: Vec<BenchmarkResult>,
}

impl BootBenchReport {
    pub fn to_json(&self) -> io::Result<String> {
        serde_json::to_string_pretty(self).map_err(io::Error::other)
    }

    pub fn write_to(&self, path: &Path) -> io::Result<()> {
        fs::write(path, self.to_json()?)
    }
}
