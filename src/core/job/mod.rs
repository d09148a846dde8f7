//! Masking job coordination
//!
//! [`MaskingCoordinator`] is the trigger boundary of the pipeline: it takes
//! a parsed table and job parameters and returns masked rows plus a
//! [`JobSummary`].

pub mod coordinator;
pub mod summary;

pub use coordinator::{MaskingCoordinator, MaskingOutcome, MaskingParams};
pub use summary::{JobError, JobErrorType, JobSummary};
