use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(about, long_about = None)]
pub struct HarnessCli {
    #[command(subcommand)]
    pub command: HarnessCommand,
}

#[derive(Subcommand)]
pub enum HarnessCommand {
    /// Capture a baseline, drive the attacker and victim workloads concurrently, capture the
    /// post-attack state and write a comparison report.
    Run(RunArgs),
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// A connection string for the target database
    #[clap(short, long)]
    pub connection_string: String,

    /// The workload to drive at high frequency
    #[clap(long)]
    pub attacker: String,

    /// The workloads making up the mixed victim traffic, comma separated.
    ///
    /// Each name must refer to a workload registered by the scenario. The mix is selected
    /// weighted-random using the weights on the workload definitions, so the traffic resembles
    /// production rather than a fixed rotation.
    #[clap(long, value_delimiter = ',')]
    pub victims: Vec<String>,

    /// The number of seconds to drive load for
    #[clap(long)]
    pub duration: Option<u64>,

    /// The number of seconds of baseline to capture before any load starts
    #[clap(long, default_value = "10")]
    pub baseline: u64,

    /// Seconds between contention metric samples
    #[clap(long, default_value = "2")]
    pub sample_interval: u64,

    /// Stop the attacker after this many executions in total, instead of when the load window
    /// ends. The budget is shared across all attacker workers.
    #[clap(long)]
    pub iterations: Option<u64>,

    /// The number of concurrent attacker workers
    #[clap(long, default_value = "8")]
    pub workers: usize,

    /// Milliseconds between victim calls.
    ///
    /// The victim cadence is fixed for the whole run. It is deliberately not adjusted when
    /// latency climbs, so the degradation is observed rather than absorbed.
    #[clap(long, default_value = "250")]
    pub victim_pacing_ms: u64,

    /// Drain the attack early when the attacker's failure rate crosses this fraction
    #[clap(long, default_value = "0.5")]
    pub failure_threshold: f64,

    /// Call count above which a workload is flagged as a high-frequency root-cause candidate
    #[clap(long, default_value = "1000")]
    pub high_frequency_threshold: u64,

    /// Append the comparison report to this file as a JSON line
    #[clap(long)]
    pub out: Option<PathBuf>,

    /// Unique id for this run. Generated when not provided.
    #[clap(long)]
    pub run_id: Option<String>,

    /// Do not show a progress bar on the CLI.
    ///
    /// This is recommended for CI/CD environments where the progress bar isn't being looked at by
    /// anyone and is just adding noise to the logs.
    #[clap(long, default_value = "false")]
    pub no_progress: bool,
}
