//! Wire types of the VCD API (JSON representation).
//!
//! Optional fields are skipped when `None` so that an unset value is never
//! sent as an empty string or zero, which would overwrite server defaults.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque, server-assigned reference to a remote object (its `href`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Locator(String);

impl Locator {
    pub fn new(href: impl Into<String>) -> Self {
        Self(href.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Admin view of an org href (`/api/org/..` -> `/api/admin/org/..`).
    pub fn to_admin(&self) -> Locator {
        Locator(self.0.replacen("/api/org/", "/api/admin/org/", 1))
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reference to another entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reference {
    pub href: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl Reference {
    pub fn to_href(href: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            name: None,
            media_type: None,
            id: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Link {
    pub rel: String,
    pub href: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
}

/// Error body returned by the API, also embedded in failed tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub major_error_code: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minor_error_code: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskStatus {
    Queued,
    PreRunning,
    Running,
    Success,
    Error,
    Aborted,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Success | TaskStatus::Error | TaskStatus::Aborted
        )
    }
}

/// Server-side asynchronous operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub href: String,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<String>,
    /// The object the task acts on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<Reference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RemoteError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<u32>,
}

impl Task {
    pub fn locator(&self) -> Locator {
        Locator::new(self.href.clone())
    }

    pub fn owner_locator(&self) -> Option<Locator> {
        self.owner.as_ref().map(|o| Locator::new(o.href.clone()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TasksInProgress {
    #[serde(default)]
    pub task: Vec<Task>,
}

// =============================================================================
// Org
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrgList {
    #[serde(default)]
    pub org: Vec<Reference>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Org {
    pub href: String,
    pub name: String,
    #[serde(default)]
    pub link: Vec<Link>,
}

pub const VDC_MEDIA_TYPE: &str = "application/vnd.vmware.vcloud.vdc+json";

impl Org {
    pub fn locator(&self) -> Locator {
        Locator::new(self.href.clone())
    }

    /// Href of the VDC with the given name, from the org's link list.
    pub fn vdc_href(&self, name: &str) -> Option<Locator> {
        self.link
            .iter()
            .find(|l| {
                l.media_type.as_deref() == Some(VDC_MEDIA_TYPE) && l.name.as_deref() == Some(name)
            })
            .map(|l| Locator::new(l.href.clone()))
    }
}

// =============================================================================
// Independent disk
// =============================================================================

/// Independent disk, used both as request body and as response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Disk {
    pub name: String,
    pub size: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tasks: Option<TasksInProgress>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiskCreateParams {
    pub disk: Disk,
}

pub const DISK_CREATE_MEDIA_TYPE: &str = "application/vnd.vmware.vcloud.diskCreateParams+json";
pub const DISK_MEDIA_TYPE: &str = "application/vnd.vmware.vcloud.disk+json";

// =============================================================================
// Virtual datacenter
// =============================================================================

/// One capacity dimension (CPU or memory) of a VDC.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapacityWithUsage {
    pub units: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allocated: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reserved: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub used: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overhead: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputeCapacity {
    pub cpu: CapacityWithUsage,
    pub memory: CapacityWithUsage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VdcStorageProfileParams {
    pub enabled: bool,
    pub units: String,
    pub limit: i64,
    pub default: bool,
    pub provider_vdc_storage_profile: Reference,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateVdcParams {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub allocation_model: String,
    pub compute_capacity: ComputeCapacity,
    pub vdc_storage_profile: Vec<VdcStorageProfileParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_pool_reference: Option<Reference>,
    pub provider_vdc_reference: Reference,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_thin_provision: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uses_fast_provisioning: Option<bool>,
}

pub const CREATE_VDC_MEDIA_TYPE: &str = "application/vnd.vmware.admin.createVdcParams+json";

/// Virtual datacenter as returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vdc {
    pub href: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allocation_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tasks: Option<TasksInProgress>,
}
