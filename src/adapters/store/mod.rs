//! Job bookkeeping adapters
//!
//! - `memory`: in-process job store with operator controls
//! - `plan`: JSON hand-off of the re-entry plan

mod memory;
mod plan;

pub use memory::{BuybackEntry, JobEntry, MemoryJobStore, StoreSnapshot};
pub use plan::{load_plan, save_plan, PlanFileError};
