//! Hierarchical task network domains, the world-state facts the planner
//! reasons over, and the depth-bounded planner itself.

mod domain;
mod error;
mod hook;
mod loader;
mod planner;
mod registry;
mod world_state;

pub use domain::{Domain, Method, MethodId, Operator, OperatorId, Task, TaskId};
pub use error::HtnError;
pub use hook::{HookError, PreconditionHook, StaticHookTable};
pub use loader::{load_domain_file, parse_domain};
pub use planner::{Planner, PlannedAction};
pub use registry::Registry;
pub use world_state::{CombatantFact, CombatantKind, WorldState};
