//! Grouping and plain-text rendering of benchmark results.

use crate::schema::BenchmarkResult;
use crate::GroupBy;

/// Printed instead of a table when nothing succeeded.
pub const NO_RESULTS: &str = "No results: every combination failed or was skipped.";

/// Printed in place of a time-to-idle value that was not measured.
pub const UNAVAILABLE: &str = "n/a";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Grouping {
    Device,
    Version,
}

impl Grouping {
    /// `Auto` groups by device only when more than one device was requested.
    pub fn resolve(group_by: GroupBy, device_count: usize) -> Self {
        match group_by {
            GroupBy::Device => Grouping::Device,
            GroupBy::Version => Grouping::Version,
            GroupBy::Auto if device_count > 1 => Grouping::Device,
            GroupBy::Auto => Grouping::Version,
        }
    }
}

#[derive(Debug)]
pub struct ResultGroup<'a> {
    pub key: &'a str,
    pub rows: Vec<&'a BenchmarkResult>,
}

/// Group results by the chosen key, in first-seen order.
pub fn group_results(results: &[BenchmarkResult], grouping: Grouping) -> Vec<ResultGroup<'_>> {
    let mut groups: Vec<ResultGroup<'_>> = Vec::new();
    for r in results {
        let key = match grouping {
            Grouping::Device => r.device.as_str(),
            Grouping::Version => r.version.as_str(),
        };
        match groups.iter_mut().find(|g| g.key == key) {
            Some(group) => group.rows.push(r),
            None => groups.push(ResultGroup { key, rows: vec![r] }),
        }
    }
    groups
}

fn seconds(ms: f64) -> String {
    format!("{:.1}s", ms / 1000.0)
}

/// Render grouped results as fixed-width tables, or [`NO_RESULTS`].
pub fn render_table(results: &[BenchmarkResult], grouping: Grouping) -> String {
    if results.is_empty() {
        return format!("{NO_RESULTS}\n");
    }

    let label = match grouping {
        Grouping::Device => "Version",
        Grouping::Version => "Device",
    };

    let mut out = String::new();
    for group in group_results(results, grouping) {
        let rows: Vec<(&str, String, String)> = group
            .rows
            .iter()
            .map(|r| {
                let name = match grouping {
                    Grouping::Device => r.version.as_str(),
                    Grouping::Version => r.device.as_str(),
                };
                let idle = r
                    .avg_time_to_idle_ms
                    .map(seconds)
                    .unwrap_or_else(|| UNAVAILABLE.to_string());
                (name, seconds(r.avg_boot_time_ms), idle)
            })
            .collect();

        let width = rows
            .iter()
            .map(|(name, _, _)| name.len())
            .chain(std::iter::once(label.len()))
            .max()
            .unwrap_or(label.len());

        out.push_str(&format!("{}\n", group.key));
        let (boot, idle) = ("Boot", "Time to idle");
        out.push_str(&format!("  {label:<width$}  {boot:>10}  {idle:>12}\n"));
        for (name, boot, idle) in rows {
            out.push_str(&format!("  {name:<width$}  {boot:>10}  {idle:>12}\n"));
        }
        out.push('\n');
    }
    out
}
