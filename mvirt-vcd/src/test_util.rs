//! In-memory VCD used by unit tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::clients::VcdApi;
use crate::error::ApiError;
use crate::types::{
    CreateVdcParams, Disk, DiskCreateParams, Link, Locator, Org, Reference, RemoteError, Task,
    TaskStatus, VDC_MEDIA_TYPE, Vdc,
};

pub const HOST: &str = "https://host/api";

/// How the next spawned task behaves when polled.
#[derive(Debug, Clone)]
pub enum TaskPlan {
    /// Report success on the n-th poll.
    SucceedAfter(u32),
    /// Report failure with the message on the n-th poll.
    FailAfter(u32, String),
    /// Never finish.
    Hang,
}

#[derive(Debug)]
enum Effect {
    InsertDisk(Disk),
    UpdateDisk(Disk),
    RemoveDisk(String),
    InsertVdc(Vdc),
    RemoveVdc(String),
}

struct PendingTask {
    plan: TaskPlan,
    polls: u32,
    owner: Reference,
    effect: Option<Effect>,
}

#[derive(Default)]
struct Inner {
    org_name: String,
    org_href: String,
    vdcs: BTreeMap<String, Vdc>,
    disks: BTreeMap<String, Disk>,
    tasks: HashMap<String, PendingTask>,
    next_plan: Option<TaskPlan>,
    next_disk_href: Option<String>,
    reject: Option<ApiError>,
    lookup_failure: Option<ApiError>,
    failing_polls: u32,
    counter: u64,
    task_polls: u32,
    mutations: u32,
    payloads: Vec<serde_json::Value>,
    delete_flags: Option<(bool, bool)>,
}

impl Inner {
    fn next_id(&mut self) -> u64 {
        self.counter += 1;
        self.counter
    }

    fn spawn_task(&mut self, operation: &str, owner: Reference, effect: Effect) -> Task {
        let href = format!("{}/task/{}", HOST, self.next_id());
        let plan = self
            .next_plan
            .take()
            .unwrap_or(TaskPlan::SucceedAfter(1));
        self.tasks.insert(
            href.clone(),
            PendingTask {
                plan,
                polls: 0,
                owner: owner.clone(),
                effect: Some(effect),
            },
        );
        Task {
            href,
            status: TaskStatus::Running,
            operation: None,
            operation_name: Some(operation.to_string()),
            owner: Some(owner),
            error: None,
            progress: Some(0),
        }
    }

    fn apply(&mut self, effect: Effect) {
        match effect {
            Effect::InsertDisk(disk) => {
                let href = disk.href.clone().unwrap_or_default();
                self.disks.insert(href, disk);
            }
            Effect::UpdateDisk(disk) => {
                if let Some(existing) = disk.href.as_ref().and_then(|h| self.disks.get_mut(h)) {
                    existing.description = disk.description;
                }
            }
            Effect::RemoveDisk(href) => {
                self.disks.remove(&href);
            }
            Effect::InsertVdc(vdc) => {
                self.vdcs.insert(vdc.href.clone(), vdc);
            }
            Effect::RemoveVdc(href) => {
                self.vdcs.remove(&href);
            }
        }
    }
}

/// Scriptable stand-in for a VCD endpoint.
#[derive(Default)]
pub struct FakeVcd {
    inner: Mutex<Inner>,
}

impl FakeVcd {
    /// A fake with one org containing one VDC.
    pub fn with_scope(org: &str, vdc: &str) -> Arc<Self> {
        let fake = FakeVcd::default();
        {
            let mut inner = fake.inner.lock().unwrap();
            inner.org_name = org.to_string();
            inner.org_href = format!("{}/org/1", HOST);
            let href = format!("{}/vdc/{}", HOST, inner.next_id());
            inner.vdcs.insert(href.clone(), vdc_entity(&href, vdc));
        }
        Arc::new(fake)
    }

    pub fn vdc_href(&self, name: &str) -> Locator {
        let inner = self.inner.lock().unwrap();
        let vdc = inner
            .vdcs
            .values()
            .find(|v| v.name == name)
            .expect("vdc exists in fake");
        Locator::new(vdc.href.clone())
    }

    pub fn plan_next_task(&self, plan: TaskPlan) {
        self.inner.lock().unwrap().next_plan = Some(plan);
    }

    pub fn next_disk_href(&self, href: &str) {
        self.inner.lock().unwrap().next_disk_href = Some(href.to_string());
    }

    /// Reject the next create/delete call before any task exists.
    pub fn reject_next_mutation(&self, error: ApiError) {
        self.inner.lock().unwrap().reject = Some(error);
    }

    /// Make disk/VDC lookups fail until cleared.
    pub fn fail_lookups(&self, error: Option<ApiError>) {
        self.inner.lock().unwrap().lookup_failure = error;
    }

    /// Fail the next `n` task polls with a transport error.
    pub fn fail_task_polls(&self, n: u32) {
        self.inner.lock().unwrap().failing_polls = n;
    }

    /// Remove a disk behind the reconciler's back.
    pub fn remove_disk_out_of_band(&self, href: &Locator) {
        self.inner.lock().unwrap().disks.remove(href.as_str());
    }

    pub fn remove_vdc_out_of_band(&self, href: &Locator) {
        self.inner.lock().unwrap().vdcs.remove(href.as_str());
    }

    pub fn disk_exists(&self, href: &Locator) -> bool {
        self.inner.lock().unwrap().disks.contains_key(href.as_str())
    }

    pub fn vdc_exists(&self, href: &Locator) -> bool {
        self.inner.lock().unwrap().vdcs.contains_key(href.as_str())
    }

    pub fn disk(&self, href: &Locator) -> Option<Disk> {
        self.inner.lock().unwrap().disks.get(href.as_str()).cloned()
    }

    pub fn disk_count(&self) -> usize {
        self.inner.lock().unwrap().disks.len()
    }

    pub fn task_polls(&self) -> u32 {
        self.inner.lock().unwrap().task_polls
    }

    /// Create/delete calls that reached the API (rejected ones included).
    pub fn mutations(&self) -> u32 {
        self.inner.lock().unwrap().mutations
    }

    /// Last request body sent to a create call, as JSON.
    pub fn last_payload(&self) -> Option<serde_json::Value> {
        self.inner.lock().unwrap().payloads.last().cloned()
    }

    pub fn last_delete_flags(&self) -> Option<(bool, bool)> {
        self.inner.lock().unwrap().delete_flags
    }
}

fn vdc_entity(href: &str, name: &str) -> Vdc {
    Vdc {
        href: href.to_string(),
        name: name.to_string(),
        description: None,
        allocation_model: Some("AllocationVApp".to_string()),
        is_enabled: Some(true),
        status: Some(1),
        tasks: None,
    }
}

#[async_trait]
impl VcdApi for FakeVcd {
    async fn get_org(&self, name: &str) -> Result<Option<Org>, ApiError> {
        let inner = self.inner.lock().unwrap();
        if let Some(err) = &inner.lookup_failure {
            return Err(err.clone());
        }
        if inner.org_name != name {
            return Ok(None);
        }
        let link = inner
            .vdcs
            .values()
            .map(|v| Link {
                rel: "down".to_string(),
                href: v.href.clone(),
                name: Some(v.name.clone()),
                media_type: Some(VDC_MEDIA_TYPE.to_string()),
            })
            .collect();
        Ok(Some(Org {
            href: inner.org_href.clone(),
            name: inner.org_name.clone(),
            link,
        }))
    }

    async fn create_disk(
        &self,
        vdc: &Locator,
        params: &DiskCreateParams,
    ) -> Result<Task, ApiError> {
        let mut inner = self.inner.lock().unwrap();
        inner.mutations += 1;
        inner
            .payloads
            .push(serde_json::to_value(params).expect("payload serializes"));
        if let Some(err) = inner.reject.take() {
            return Err(err);
        }
        if !inner.vdcs.contains_key(vdc.as_str()) {
            return Err(ApiError::Http {
                status: 403,
                message: format!("No access to entity \"{}\"", vdc),
            });
        }

        let href = match inner.next_disk_href.take() {
            Some(href) => href,
            None => format!("{}/disk/{}", HOST, inner.next_id()),
        };
        let disk = Disk {
            href: Some(href.clone()),
            status: Some(1),
            tasks: None,
            ..params.disk.clone()
        };
        let owner = Reference {
            name: Some(disk.name.clone()),
            ..Reference::to_href(href)
        };
        Ok(inner.spawn_task("vdcCreateDisk", owner, Effect::InsertDisk(disk)))
    }

    async fn get_disk(&self, disk: &Locator) -> Result<Option<Disk>, ApiError> {
        let inner = self.inner.lock().unwrap();
        if let Some(err) = &inner.lookup_failure {
            return Err(err.clone());
        }
        Ok(inner.disks.get(disk.as_str()).cloned())
    }

    async fn update_disk(&self, disk: &Locator, update: &Disk) -> Result<Task, ApiError> {
        let mut inner = self.inner.lock().unwrap();
        inner.mutations += 1;
        inner
            .payloads
            .push(serde_json::to_value(update).expect("payload serializes"));
        if let Some(err) = inner.reject.take() {
            return Err(err);
        }
        if !inner.disks.contains_key(disk.as_str()) {
            return Err(ApiError::Http {
                status: 404,
                message: "disk not found".to_string(),
            });
        }
        let owner = Reference {
            name: Some(update.name.clone()),
            ..Reference::to_href(disk.as_str())
        };
        let change = Disk {
            href: Some(disk.as_str().to_string()),
            ..update.clone()
        };
        Ok(inner.spawn_task("vdcUpdateDisk", owner, Effect::UpdateDisk(change)))
    }

    async fn delete_disk(&self, disk: &Locator) -> Result<Task, ApiError> {
        let mut inner = self.inner.lock().unwrap();
        inner.mutations += 1;
        if let Some(err) = inner.reject.take() {
            return Err(err);
        }
        let Some(existing) = inner.disks.get(disk.as_str()).cloned() else {
            return Err(ApiError::Http {
                status: 404,
                message: "disk not found".to_string(),
            });
        };
        let owner = Reference {
            name: Some(existing.name),
            ..Reference::to_href(disk.as_str())
        };
        Ok(inner.spawn_task(
            "vdcDeleteDisk",
            owner,
            Effect::RemoveDisk(disk.as_str().to_string()),
        ))
    }

    async fn create_vdc(
        &self,
        admin_org: &Locator,
        params: &CreateVdcParams,
    ) -> Result<Task, ApiError> {
        let mut inner = self.inner.lock().unwrap();
        inner.mutations += 1;
        inner
            .payloads
            .push(serde_json::to_value(params).expect("payload serializes"));
        if let Some(err) = inner.reject.take() {
            return Err(err);
        }
        let expected = Locator::new(inner.org_href.clone()).to_admin();
        if *admin_org != expected {
            return Err(ApiError::Http {
                status: 403,
                message: format!("No access to entity \"{}\"", admin_org),
            });
        }

        let href = format!("{}/vdc/{}", HOST, inner.next_id());
        let mut vdc = vdc_entity(&href, &params.name);
        vdc.description = params.description.clone();
        vdc.allocation_model = Some(params.allocation_model.clone());
        vdc.is_enabled = params.is_enabled;
        let owner = Reference {
            name: Some(params.name.clone()),
            ..Reference::to_href(href)
        };
        Ok(inner.spawn_task("vdcCreateVdc", owner, Effect::InsertVdc(vdc)))
    }

    async fn get_vdc(&self, vdc: &Locator) -> Result<Option<Vdc>, ApiError> {
        let inner = self.inner.lock().unwrap();
        if let Some(err) = &inner.lookup_failure {
            return Err(err.clone());
        }
        Ok(inner.vdcs.get(vdc.as_str()).cloned())
    }

    async fn delete_vdc(
        &self,
        vdc: &Locator,
        force: bool,
        recursive: bool,
    ) -> Result<Task, ApiError> {
        let mut inner = self.inner.lock().unwrap();
        inner.mutations += 1;
        inner.delete_flags = Some((force, recursive));
        if let Some(err) = inner.reject.take() {
            return Err(err);
        }
        let Some(existing) = inner.vdcs.get(vdc.as_str()).cloned() else {
            return Err(ApiError::Http {
                status: 404,
                message: "vdc not found".to_string(),
            });
        };
        let owner = Reference {
            name: Some(existing.name),
            ..Reference::to_href(vdc.as_str())
        };
        Ok(inner.spawn_task(
            "vdcDeleteVdc",
            owner,
            Effect::RemoveVdc(vdc.as_str().to_string()),
        ))
    }

    async fn get_task(&self, task: &Locator) -> Result<Task, ApiError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.failing_polls > 0 {
            inner.failing_polls -= 1;
            return Err(ApiError::Transport("connection reset by peer".to_string()));
        }
        inner.task_polls += 1;

        let Some(pending) = inner.tasks.get_mut(task.as_str()) else {
            return Err(ApiError::Http {
                status: 404,
                message: "task not found".to_string(),
            });
        };
        pending.polls += 1;

        let (status, error) = match &pending.plan {
            TaskPlan::SucceedAfter(n) if pending.polls >= *n => (TaskStatus::Success, None),
            TaskPlan::FailAfter(n, message) if pending.polls >= *n => (
                TaskStatus::Error,
                Some(RemoteError {
                    message: message.clone(),
                    major_error_code: Some(500),
                    minor_error_code: Some("INTERNAL_SERVER_ERROR".to_string()),
                }),
            ),
            _ => (TaskStatus::Running, None),
        };
        let owner = pending.owner.clone();
        let effect = if status == TaskStatus::Success {
            pending.effect.take()
        } else {
            None
        };
        if let Some(effect) = effect {
            inner.apply(effect);
        }

        Ok(Task {
            href: task.as_str().to_string(),
            status,
            operation: None,
            operation_name: None,
            owner: Some(owner),
            error,
            progress: Some(if status.is_terminal() { 100 } else { 50 }),
        })
    }
}
