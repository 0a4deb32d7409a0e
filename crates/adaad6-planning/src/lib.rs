//! ADAAD-6 Planning - Action specs, planner, and the typed action registry
//!
//! The planner produces immutable [`ActionSpec`] values under a step cap
//! and a wall clock; exceeded budgets mark the plan's meta rather than
//! erroring. Actions are trait objects registered through a typed factory,
//! and the executor consumes them as a (validate, run, postcheck) triple.

pub mod actions;
pub mod planner;
pub mod registry;
pub mod spec;

pub use actions::{builtin_catalog, BUILTIN_ACTION_NAMES};
pub use planner::{make_plan, Plan, PlanError};
pub use registry::{ensure_actions_dir, Action, ActionCatalog, RegistryError};
pub use spec::{is_mutation_step, validate_action_spec, ActionSpec, SpecError};
