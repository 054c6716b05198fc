//! Versioned stage contracts: `structure.v1`, `inventory.full.v1`,
//! `plan.v1`, and the diff report.

pub mod diff;
pub mod inventory;
pub mod plan;
pub mod structure;

pub use diff::DiffReport;
pub use inventory::InventoryFullV1;
pub use plan::{PlanOp, PlanV1};
pub use structure::StructureV1;
