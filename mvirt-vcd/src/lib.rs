//! mvirt-vcd: lifecycle reconciliation for VMware Cloud Director resources.
//!
//! Declared resources (independent disks, VDCs) are created, read, updated
//! and deleted through the VCD API. Mutations spawn remote tasks which are
//! tracked to completion before local state is written.

pub mod audit;
pub mod clients;
pub mod config;
pub mod context;
pub mod error;
pub mod reconciler;
pub mod resolver;
pub mod retry;
pub mod state;
pub mod task;
pub mod types;

#[cfg(test)]
mod test_util;

pub use context::VcdContext;
pub use error::{ApiError, Error, Result};
pub use reconciler::{ReadOutcome, Reconciler, ResourceKind, UpdateOutcome};
pub use state::{Fields, FileStateStore, LocalId, ResourceState};
