use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use grindstone_core::prelude::SetupFailureError;

use crate::cli::RunArgs;
use crate::target::{ContentionProbe, QueryTarget};
use crate::workload::{ExecutionPolicy, WorkloadDefinition};

/// The builder for a run definition.
///
/// A scenario registers its workload catalogue and the target bindings here, then hands the
/// builder to [crate::run::run]. Everything the CLI references by name is resolved and
/// validated once, at build time; a run that would be unable to produce a comparison is
/// rejected before any phase starts.
pub struct RunDefinitionBuilder {
    /// The name of the scenario, which should be unique within the test suite.
    ///
    /// Recommended value is `env!("CARGO_PKG_NAME")`.
    name: String,
    cli: RunArgs,
    target: Option<Arc<dyn QueryTarget>>,
    probe: Option<Arc<dyn ContentionProbe>>,
    workloads: Vec<WorkloadDefinition>,
    default_duration_s: Option<u64>,
}

pub(crate) struct RunDefinition {
    pub(crate) name: String,
    pub(crate) run_id: String,
    pub(crate) attacker: WorkloadDefinition,
    pub(crate) victims: Vec<WorkloadDefinition>,
    pub(crate) duration: u64,
    pub(crate) baseline: u64,
    pub(crate) sample_interval: u64,
    pub(crate) workers: usize,
    pub(crate) victim_pacing: Duration,
    pub(crate) failure_threshold: f64,
    pub(crate) high_frequency_threshold: u64,
    pub(crate) out: Option<PathBuf>,
    pub(crate) no_progress: bool,
    pub(crate) target: Arc<dyn QueryTarget>,
    pub(crate) probe: Arc<dyn ContentionProbe>,
}

impl RunDefinitionBuilder {
    /// Initialise a new run definition from the scenario name and command line arguments.
    pub fn new(name: &str, cli: RunArgs) -> Self {
        Self {
            name: name.to_string(),
            cli,
            target: None,
            probe: None,
            workloads: Vec::new(),
            default_duration_s: None,
        }
    }

    /// Set the query target that all workloads execute against.
    pub fn use_target(mut self, target: Arc<dyn QueryTarget>) -> Self {
        self.target = Some(target);
        self
    }

    /// Set the probe the metric sampler reads contention counters from.
    pub fn use_probe(mut self, probe: Arc<dyn ContentionProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Add a workload to the catalogue that `--attacker` and `--victims` can refer to.
    pub fn register_workload(mut self, workload: WorkloadDefinition) -> Self {
        if self.workloads.iter().any(|w| w.name() == workload.name()) {
            panic!("Workload [{}] is already registered", workload.name());
        }
        self.workloads.push(workload);
        self
    }

    /// Set the duration to use when the CLI does not specify one.
    pub fn with_default_duration_s(mut self, duration_s: u64) -> Self {
        self.default_duration_s = Some(duration_s);
        self
    }

    pub(crate) fn build(self) -> Result<RunDefinition, SetupFailureError> {
        let cli = self.cli;

        if cli.sample_interval == 0 {
            return Err(SetupFailureError::new("The sample interval must be non-zero"));
        }
        if cli.baseline < cli.sample_interval {
            return Err(SetupFailureError::new(
                "The baseline window must cover at least one sample interval",
            ));
        }
        let duration = match cli.duration.or(self.default_duration_s) {
            Some(duration) if duration > 0 => duration,
            Some(_) => return Err(SetupFailureError::new("The duration must be non-zero")),
            None => {
                return Err(SetupFailureError::new(
                    "No duration given and the scenario has no default",
                ))
            }
        };
        if cli.workers == 0 {
            return Err(SetupFailureError::new("At least one attacker worker is required"));
        }
        if !(cli.failure_threshold > 0.0 && cli.failure_threshold <= 1.0) {
            return Err(SetupFailureError::new(
                "The failure threshold must be a fraction in (0, 1]",
            ));
        }

        let target = self
            .target
            .ok_or_else(|| SetupFailureError::new("No query target configured"))?;
        let probe = self
            .probe
            .ok_or_else(|| SetupFailureError::new("No contention probe configured"))?;

        let find = |name: &str| {
            self.workloads
                .iter()
                .find(|w| w.name() == name)
                .cloned()
                .ok_or_else(|| {
                    SetupFailureError::new(format!("Unknown workload [{name}] requested"))
                })
        };

        let mut attacker = find(&cli.attacker)?;
        if let Some(iterations) = cli.iterations {
            attacker = attacker.with_policy(ExecutionPolicy::Iterations(iterations));
        }

        if cli.victims.is_empty() {
            return Err(SetupFailureError::new("At least one victim workload is required"));
        }
        let victims = cli
            .victims
            .iter()
            .map(|name| find(name))
            .collect::<Result<Vec<_>, _>>()?;
        if victims.iter().any(|w| w.weight() == 0) {
            return Err(SetupFailureError::new("Victim workload weights must be non-zero"));
        }

        Ok(RunDefinition {
            name: self.name,
            run_id: cli.run_id.unwrap_or_else(|| nanoid::nanoid!()),
            attacker,
            victims,
            duration,
            baseline: cli.baseline,
            sample_interval: cli.sample_interval,
            workers: cli.workers,
            victim_pacing: Duration::from_millis(cli.victim_pacing_ms),
            failure_threshold: cli.failure_threshold,
            high_frequency_threshold: cli.high_frequency_threshold,
            out: cli.out,
            no_progress: cli.no_progress,
            target,
            probe,
        })
    }
}
