//! Detection orchestration
//!
//! Per-chunk state machine, retry/backoff, the concurrency cap and the
//! dispatcher that ties them to the job ledger.

pub mod coordinator;
pub mod limiter;
pub mod outcome;
pub mod retry;

pub use coordinator::{DetectionOrchestrator, OrchestrationOutcome, OrchestratorConfig};
pub use limiter::{ChunkPermit, ConcurrencyLimiter};
pub use outcome::{ChunkOutcome, ChunkResult, ChunkStatus};
pub use retry::{Backoff, RetryPolicy};
