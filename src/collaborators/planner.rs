use crate::collaborators::BackfillPlanner;
use crate::models::{Execution, Plan, SampleTime};

/// Planner that never compresses: every sample time is its own execution.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPlanner;

impl BackfillPlanner for NoopPlanner {
    fn plan(&self, sample_times: &[SampleTime], _repository: &str) -> Plan {
        Plan {
            executions: sample_times.iter().copied().map(Execution::at).collect(),
        }
    }
}
