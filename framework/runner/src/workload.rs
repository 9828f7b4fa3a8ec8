use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;

use crate::target::SqlValue;

/// Generates bound parameter values for one execution of a workload's statement.
pub type ParamGenerator = Arc<dyn Fn(&mut StdRng) -> Vec<SqlValue> + Send + Sync>;

/// How long a workload keeps executing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionPolicy {
    /// Run until the load window ends.
    Sustained,
    /// Stop after this many executions in total, shared across the driver's workers.
    Iterations(u64),
}

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// A named query and how to drive it.
///
/// Definitions are immutable once a run starts: the victim runner holds read-only references to
/// its rotation and the load driver owns exactly one.
#[derive(Clone)]
pub struct WorkloadDefinition {
    name: String,
    statement: String,
    params: Option<ParamGenerator>,
    policy: ExecutionPolicy,
    weight: u32,
    timeout: Duration,
}

impl WorkloadDefinition {
    pub fn new(name: &str, statement: &str) -> Self {
        Self {
            name: name.to_string(),
            statement: statement.to_string(),
            params: None,
            policy: ExecutionPolicy::Sustained,
            weight: 1,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set the parameter generator for this workload's statement.
    pub fn with_params(
        mut self,
        params: impl Fn(&mut StdRng) -> Vec<SqlValue> + Send + Sync + 'static,
    ) -> Self {
        self.params = Some(Arc::new(params));
        self
    }

    pub fn with_policy(mut self, policy: ExecutionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Relative likelihood of this workload being picked for a victim tick.
    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = weight;
        self
    }

    /// Deadline for one execution. A call that overruns it is recorded as a timeout, never
    /// allowed to block its worker indefinitely.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn statement(&self) -> &str {
        &self.statement
    }

    pub fn policy(&self) -> ExecutionPolicy {
        self.policy
    }

    pub fn weight(&self) -> u32 {
        self.weight
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub(crate) fn generate_params(&self, rng: &mut StdRng) -> Vec<SqlValue> {
        match &self.params {
            Some(params) => params(rng),
            None => Vec::new(),
        }
    }
}

impl fmt::Debug for WorkloadDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkloadDefinition")
            .field("name", &self.name)
            .field("statement", &self.statement)
            .field("policy", &self.policy)
            .field("weight", &self.weight)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn params_default_to_empty() {
        let workload = WorkloadDefinition::new("probe", "SELECT 1");
        let mut rng = StdRng::seed_from_u64(7);
        assert!(workload.generate_params(&mut rng).is_empty());
    }

    #[test]
    fn param_generator_is_invoked_per_call() {
        use rand::Rng;

        let workload = WorkloadDefinition::new("lookup", "SELECT * FROM t WHERE id = $1")
            .with_params(|rng| vec![SqlValue::Int(rng.gen_range(1..=10))]);

        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            match workload.generate_params(&mut rng).as_slice() {
                [SqlValue::Int(id)] => assert!((1..=10).contains(id)),
                other => panic!("Unexpected params: {other:?}"),
            }
        }
    }
}
