//! Job ledger: job lifecycle and per-chunk outcomes
//!
//! - [`record`] - job and chunk records with their state rules
//! - [`store`] - memory and JSON file persistence
//! - [`manager`] - [`JobLedger`], the serialized writer used by the pipeline

pub mod manager;
pub mod record;
pub mod store;

pub use manager::JobLedger;
pub use record::{ChunkRecord, JobRecord, JobRecordBuilder, JobState};
pub use store::{create_ledger_store, FileLedgerStore, InMemoryLedgerStore, LedgerStore};
