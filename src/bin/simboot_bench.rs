use anyhow::{Context, Result};
use clap::Parser;
use simboot_bench::harness::{plan, RequestOptions, RunnerConfig};
use simboot_bench::host::collect_host_meta;
use simboot_bench::idle::{HostLoad, SystemClock};
use simboot_bench::report::{render_table, Grouping};
use simboot_bench::runner::BenchmarkRunner;
use simboot_bench::schema::{BootBenchReport, RunMeta};
use simboot_bench::simctl::SimctlClient;
use simboot_bench::{BootMode, GroupBy};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "simboot-bench")]
#[command(about = "Boot-time and time-to-idle benchmarks for iOS simulators")]
#[command(version)]
struct Args {
    /// iOS version(s) to benchmark, e.g. `17`, `17.2` or `iOS 17.2`.
    #[arg(
        long = "ios",
        value_name = "VERSION",
        num_args = 1..,
        action = clap::ArgAction::Append,
        default_value = "17"
    )]
    versions: Vec<String>,

    /// Device name(s) as listed by `simctl list devices`.
    #[arg(
        long = "device",
        value_name = "NAME",
        num_args = 1..,
        action = clap::ArgAction::Append,
        default_value = "iPhone 15"
    )]
    devices: Vec<String>,

    /// Repetitions per (version, device) combination.
    #[arg(
        long,
        default_value_t = 3,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    runs: u32,

    /// One-minute load average below which the host counts as idle.
    #[arg(long, default_value_t = 2.0)]
    idle_threshold: f64,

    /// Seconds to wait for idle before giving up; 0 skips the idle wait.
    #[arg(long, default_value_t = 120)]
    idle_timeout: u64,

    /// Command to run inside the simulator right after boot. Can be repeated.
    #[arg(
        long = "spawn-after-boot",
        value_name = "CMD",
        action = clap::ArgAction::Append
    )]
    spawn_after_boot: Vec<String>,

    /// Erase before each boot (cold) or boot the existing state (warm).
    #[arg(long, value_enum, default_value_t = BootMode::Cold)]
    mode: BootMode,

    /// How to group the summary table.
    #[arg(long, value_enum, default_value_t = GroupBy::Auto)]
    group_by: GroupBy,

    /// Program used to reach `simctl` and `xcodebuild`.
    #[arg(long, default_value = "xcrun")]
    xcrun: String,

    /// Where to write the JSON report.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Debug-level logging.
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let level = if verbose {
        "simboot_bench=debug"
    } else {
        "simboot_bench=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn now_utc() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    format!("unix:{secs}")
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let client = SimctlClient::new(args.xcrun.clone());
    let host = collect_host_meta(client.runner(), client.xcrun());

    tracing::info!(
        os = host.os_version.as_deref().unwrap_or("unknown"),
        xcode = host.xcode_version.as_deref().unwrap_or("unknown"),
        mode = args.mode.as_str(),
        runs = args.runs,
        idle_threshold = args.idle_threshold,
        idle_timeout_s = args.idle_timeout,
        "starting boot benchmarks"
    );

    let opts = RequestOptions {
        run_count: args.runs,
        idle_load_threshold: args.idle_threshold,
        idle_timeout_secs: args.idle_timeout,
        post_boot_commands: args.spawn_after_boot.clone(),
        boot_mode: args.mode,
    };
    let requests = plan(&args.versions, &args.devices, &opts);

    let config = RunnerConfig::default();
    let mut runner = BenchmarkRunner::new(client, HostLoad, SystemClock::new(), config);
    let results = runner
        .run_benchmarks(&requests)
        .context("benchmark run aborted")?;

    let grouping = Grouping::resolve(args.group_by, args.devices.len());
    print!("{}", render_table(&results, grouping));

    if let Some(out) = &args.out {
        let report = BootBenchReport {
            run: RunMeta {
                schema_version: 1,
                bench_version: env!("CARGO_PKG_VERSION").to_string(),
                timestamp_utc: now_utc(),
                boot_mode: args.mode.as_str().to_string(),
                host,
            },
            results,
        };
        report
            .write_to(out)
            .with_context(|| format!("writing report to {}", out.display()))?;
        tracing::info!(path = %out.display(), "report written");
    }

    Ok(())
}
