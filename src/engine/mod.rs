mod orchestrator;
mod pool;

pub use orchestrator::{Orchestrator, RunReport, SourceOutcome, SourceStatus};
pub use pool::{gather, PoolState, Task, TaskPool, DEFAULT_WORKERS, MAX_WORKERS, QUEUE_FACTOR};
