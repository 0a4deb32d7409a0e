//! ADAAD-6 Kernel - Admissibility proofs and refusal semantics
//!
//! The kernel decides whether an evidence DAG authorizes an action. It
//! never acts itself: it resolves a content-addressed bundle, verifies
//! every node re-hashes to its address, and answers with admissibility or
//! a refusal mode. Refusal is an outcome, not an error.
//!
//! Crashes are the other half of the contract: every failure the kernel
//! can produce is classified by a fixed [`CrashCode`], and ordinary errors
//! map onto those codes deterministically.

pub mod admissibility;
pub mod context;
pub mod failures;
pub mod record;
pub mod schema;
pub mod vectors;

pub use admissibility::{is_admissible, refusal_mode, NodeResolver, RefusalMode};
pub use context::{ArtifactRegistry, ConfigSnapshot, ContextError, KernelContext, WorkspacePaths};
pub use failures::{CrashCode, KernelCrash, Outcome};
pub use record::make_refusal_record;
pub use vectors::{refusal_vector, RefusalVector};
