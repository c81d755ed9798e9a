
pub mod agent;
pub mod benchmark;
pub mod hashlist;
pub mod job;
pub mod messages;
pub mod potfile;
pub mod settings;
pub mod task;

pub use agent::{Agent, AgentStatus, AgentEngagement, DeviceMetric, SyncStatus};
pub use benchmark::{AgentBenchmark, BenchmarkKey, BenchmarkRequest, BenchmarkRequestStatus};
pub use hashlist::Hashlist;
pub use job::{
    AttackConfiguration, AttackMode, IncrementMode, JobExecution, JobIncrementLayer, JobStatus,
};
pub use messages::{
    AgentDirective, BenchmarkRequestPayload, BenchmarkResultReport, CrackReport,
    JobAssignmentPayload, JobStopPayload, SyncFilesPayload, TaskCompletedReport,
    TaskFailedReport, TaskProgressReport, TaskStopAck,
};
pub use potfile::{PotfileDigestObservation, PotfileStagingEntry, WordlistMetadata};
pub use settings::{OverflowAllocationMode, SchedulerSettings};
pub use task::{JobTask, TaskStatus};
