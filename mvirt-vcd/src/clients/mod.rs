//! Transport to the VCD API.
//!
//! `VcdApi` is the seam the reconciler talks through; `HttpClient` is the
//! production implementation.

pub mod vcd;

use async_trait::async_trait;

use crate::error::ApiError;
use crate::types::{CreateVdcParams, Disk, DiskCreateParams, Locator, Org, Task, Vdc};

pub use vcd::HttpClient;

/// Calls the reconciler needs from the remote system.
///
/// Mutating calls return the task they spawned. Lookups by locator return
/// `Ok(None)` when the object does not exist.
#[async_trait]
pub trait VcdApi: Send + Sync {
    /// Find an org by name.
    async fn get_org(&self, name: &str) -> Result<Option<Org>, ApiError>;

    /// Create an independent disk in a VDC.
    async fn create_disk(&self, vdc: &Locator, params: &DiskCreateParams)
    -> Result<Task, ApiError>;

    /// Get a disk by href.
    async fn get_disk(&self, disk: &Locator) -> Result<Option<Disk>, ApiError>;

    /// Update mutable disk properties in place.
    async fn update_disk(&self, disk: &Locator, update: &Disk) -> Result<Task, ApiError>;

    /// Delete a disk.
    async fn delete_disk(&self, disk: &Locator) -> Result<Task, ApiError>;

    /// Create a VDC in an org (admin href).
    async fn create_vdc(
        &self,
        admin_org: &Locator,
        params: &CreateVdcParams,
    ) -> Result<Task, ApiError>;

    /// Get a VDC by href.
    async fn get_vdc(&self, vdc: &Locator) -> Result<Option<Vdc>, ApiError>;

    /// Delete a VDC.
    async fn delete_vdc(&self, vdc: &Locator, force: bool, recursive: bool)
    -> Result<Task, ApiError>;

    /// Current state of a task.
    async fn get_task(&self, task: &Locator) -> Result<Task, ApiError>;
}
