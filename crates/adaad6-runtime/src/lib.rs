//! ADAAD-6 Runtime - Three-stage execution over a plan
//!
//! Each step walks precheck → execute → postcheck; the first crash halts
//! the run and every successor is recorded as skipped. The recording
//! executor wraps the walk in ledger events whose payloads embed a
//! content hash, with artifact events chained by `parent_hash`.

pub mod boot;
pub mod executor;
pub mod failure;
pub mod health;

pub use boot::{boot_sequence, BootReport};
pub use executor::{
    execute_and_record, execute_plan, ExecuteOptions, ExecutionLog, ExecutorError, StageLog,
    StepLog, ARTIFACT_INLINE_MAX_BYTES,
};
pub use failure::OrchestrationFailure;
