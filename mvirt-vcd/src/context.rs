//! Per-call context threaded through every lifecycle operation.
//!
//! Carries the transport, the task tracker and the default scope instead of
//! a process-wide session.

use std::sync::Arc;

use tracing::debug;

use crate::audit::VcdAuditLogger;
use crate::clients::VcdApi;
use crate::config::VcdConfig;
use crate::error::{Error, Result};
use crate::task::{TaskTracker, WaitOptions};
use crate::types::{Locator, Org};

#[derive(Clone)]
pub struct VcdContext {
    api: Arc<dyn VcdApi>,
    tasks: TaskTracker,
    audit: Arc<VcdAuditLogger>,
    default_org: Option<String>,
    default_vdc: Option<String>,
}

impl VcdContext {
    pub fn new(api: Arc<dyn VcdApi>, wait: WaitOptions, audit: Arc<VcdAuditLogger>) -> Self {
        Self {
            tasks: TaskTracker::new(Arc::clone(&api), wait),
            api,
            audit,
            default_org: None,
            default_vdc: None,
        }
    }

    /// Take the default org/VDC from a config.
    pub fn with_defaults(mut self, config: &VcdConfig) -> Self {
        self.default_org = config.default_org.clone();
        self.default_vdc = config.default_vdc.clone();
        self
    }

    pub fn api(&self) -> &dyn VcdApi {
        self.api.as_ref()
    }

    pub fn tasks(&self) -> &TaskTracker {
        &self.tasks
    }

    pub fn audit(&self) -> &VcdAuditLogger {
        &self.audit
    }

    pub fn default_org(&self) -> Option<&str> {
        self.default_org.as_deref()
    }

    pub fn default_vdc(&self) -> Option<&str> {
        self.default_vdc.as_deref()
    }

    /// Look up an org by name. A missing org is a scope error.
    pub async fn org(&self, name: &str) -> Result<Org> {
        debug!(org = %name, "Resolving org");
        self.api
            .get_org(name)
            .await?
            .ok_or_else(|| Error::ScopeNotFound {
                scope: "org",
                name: name.to_string(),
            })
    }

    /// Href of a VDC inside an org.
    pub async fn vdc_href(&self, org: &str, vdc: &str) -> Result<Locator> {
        let org = self.org(org).await?;
        org.vdc_href(vdc).ok_or_else(|| Error::ScopeNotFound {
            scope: "vdc",
            name: format!("{}/{}", org.name, vdc),
        })
    }
}
