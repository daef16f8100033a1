//! Independent disks.

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use super::{IdentityMode, ResourceKind, UpdatePolicy};
use crate::clients::VcdApi;
use crate::context::VcdContext;
use crate::error::{ApiError, Error, Result};
use crate::state::Fields;
use crate::types::{Disk, DiskCreateParams, Locator, Task};

const KIND: &str = "disk";

/// Declared independent disk.
#[derive(Debug, Clone, PartialEq)]
pub struct DiskSpec {
    pub org: String,
    pub vdc: String,
    pub name: String,
    /// Size in MB.
    pub size: i64,
    pub description: Option<String>,
}

pub struct DiskKind;

fn scope(fields: &Fields, key: &str, default: Option<&str>) -> Result<String> {
    fields
        .opt_str(KIND, key)?
        .or_else(|| default.map(str::to_string))
        .ok_or_else(|| {
            Error::validation(KIND, format!("'{}' is required and no default is configured", key))
        })
}

#[async_trait]
impl ResourceKind for DiskKind {
    type Spec = DiskSpec;
    type Payload = DiskCreateParams;
    type Remote = Disk;

    const KIND: &'static str = KIND;
    // Disks have always been keyed by name in local state.
    const IDENTITY: IdentityMode = IdentityMode::LegacyName;

    fn spec_from_fields(&self, fields: &Fields, ctx: &VcdContext) -> Result<DiskSpec> {
        Ok(DiskSpec {
            org: scope(fields, "org", ctx.default_org())?,
            vdc: scope(fields, "vdc", ctx.default_vdc())?,
            name: fields.required_str(KIND, "name")?,
            size: fields.required_i64(KIND, "size")?,
            description: fields.opt_str(KIND, "description")?,
        })
    }

    fn translate(&self, spec: &DiskSpec) -> Result<DiskCreateParams> {
        if spec.name.trim().is_empty() {
            return Err(Error::validation(KIND, "name must not be empty"));
        }
        if spec.size <= 0 {
            return Err(Error::validation(
                KIND,
                format!("size must be positive, got {}", spec.size),
            ));
        }
        Ok(DiskCreateParams {
            disk: Disk {
                name: spec.name.clone(),
                size: spec.size,
                description: spec.description.clone(),
                href: None,
                status: None,
                tasks: None,
            },
        })
    }

    fn name<'a>(&self, spec: &'a DiskSpec) -> &'a str {
        &spec.name
    }

    fn attributes(&self, spec: &DiskSpec) -> Map<String, Value> {
        let mut attributes = Map::new();
        attributes.insert("org".to_string(), json!(spec.org));
        attributes.insert("vdc".to_string(), json!(spec.vdc));
        attributes.insert("name".to_string(), json!(spec.name));
        attributes.insert("size".to_string(), json!(spec.size));
        if let Some(description) = &spec.description {
            attributes.insert("description".to_string(), json!(description));
        }
        attributes
    }

    fn update_policy(&self, attribute: &str) -> UpdatePolicy {
        match attribute {
            "description" => UpdatePolicy::InPlace,
            // name is the local identity, so a rename is a new disk
            _ => UpdatePolicy::Replace,
        }
    }

    async fn parent(&self, ctx: &VcdContext, spec: &DiskSpec) -> Result<Locator> {
        ctx.vdc_href(&spec.org, &spec.vdc).await
    }

    async fn submit_create(
        &self,
        api: &dyn VcdApi,
        parent: &Locator,
        payload: &DiskCreateParams,
    ) -> std::result::Result<Task, ApiError> {
        api.create_disk(parent, payload).await
    }

    async fn fetch(
        &self,
        api: &dyn VcdApi,
        locator: &Locator,
    ) -> std::result::Result<Option<Disk>, ApiError> {
        api.get_disk(locator).await
    }

    async fn submit_update(
        &self,
        api: &dyn VcdApi,
        locator: &Locator,
        spec: &DiskSpec,
    ) -> std::result::Result<Task, ApiError> {
        let update = Disk {
            name: spec.name.clone(),
            size: spec.size,
            description: Some(spec.description.clone().unwrap_or_default()),
            href: None,
            status: None,
            tasks: None,
        };
        api.update_disk(locator, &update).await
    }

    async fn submit_delete(
        &self,
        api: &dyn VcdApi,
        locator: &Locator,
        _attributes: &Map<String, Value>,
    ) -> std::result::Result<Task, ApiError> {
        api.delete_disk(locator).await
    }
}
