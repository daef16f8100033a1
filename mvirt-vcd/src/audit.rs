//! Audit logging for lifecycle mutations.
//!
//! Audit records go to the `audit` tracing target so they can be routed
//! separately from diagnostic logs.

use tracing::{info, warn};

use crate::types::Locator;

/// Audit logger with domain-specific methods.
pub struct VcdAuditLogger {
    component: &'static str,
    enabled: bool,
}

impl VcdAuditLogger {
    pub fn new(component: &'static str) -> Self {
        Self {
            component,
            enabled: true,
        }
    }

    /// Logger that records nothing. Used by tests.
    pub fn new_noop() -> Self {
        Self {
            component: "noop",
            enabled: false,
        }
    }

    pub fn created(&self, kind: &str, name: &str, locator: &Locator) {
        if self.enabled {
            info!(target: "audit", component = self.component, kind, name, href = %locator, "Resource created");
        }
    }

    pub fn deleted(&self, kind: &str, name: &str, locator: &Locator) {
        if self.enabled {
            info!(target: "audit", component = self.component, kind, name, href = %locator, "Resource deleted");
        }
    }

    pub fn drift(&self, kind: &str, id: &str, locator: Option<&Locator>) {
        if self.enabled {
            let href = locator.map(Locator::as_str).unwrap_or("-");
            warn!(target: "audit", component = self.component, kind, id, href, "Resource gone from remote, removed from state");
        }
    }

    pub fn replacement_required(&self, kind: &str, id: &str, attributes: &[String]) {
        if self.enabled {
            info!(
                target: "audit",
                component = self.component,
                kind,
                id,
                attributes = %attributes.join(","),
                "Change requires replacement"
            );
        }
    }
}
