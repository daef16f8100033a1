//! Virtual datacenters.
//!
//! Created through the admin org endpoint. `delete_force` and
//! `delete_recursive` only change how the VDC is torn down and are never
//! sent on create.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::debug;

use super::{IdentityMode, ResourceKind, UpdatePolicy};
use crate::clients::VcdApi;
use crate::context::VcdContext;
use crate::error::{ApiError, Error, Result};
use crate::resolver::{NameLookup, attribute};
use crate::state::Fields;
use crate::types::{
    CapacityWithUsage, ComputeCapacity, CreateVdcParams, Locator, Reference, Task, Vdc,
    VdcStorageProfileParams,
};

const KIND: &str = "vdc";

const ALLOCATION_MODELS: &[&str] = &["AllocationVApp", "AllocationPool", "ReservationPool", "Flex"];

/// Storage profile granted to a VDC.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageProfileSpec {
    /// Href of the provider VDC storage profile.
    pub provider: String,
    pub limit: i64,
    pub units: String,
    pub enabled: bool,
    pub default: bool,
}

/// Declared virtual datacenter.
#[derive(Debug, Clone, PartialEq)]
pub struct VdcSpec {
    pub org: String,
    pub name: String,
    pub description: Option<String>,
    pub allocation_model: String,
    /// Href of the provider VDC.
    pub provider_vdc: String,
    /// Href of the network pool.
    pub network_pool: Option<String>,
    pub compute_capacity: ComputeCapacity,
    pub storage_profiles: Vec<StorageProfileSpec>,
    pub is_enabled: Option<bool>,
    pub is_thin_provision: Option<bool>,
    pub uses_fast_provisioning: Option<bool>,
    pub delete_force: bool,
    pub delete_recursive: bool,
}

pub struct VdcKind;

fn capacity(fields: &Fields, key: &str) -> Result<CapacityWithUsage> {
    let block = fields
        .block(KIND, key)?
        .ok_or_else(|| Error::validation(KIND, format!("compute_capacity.{} is required", key)))?;
    Ok(CapacityWithUsage {
        units: block.required_str(KIND, "units")?,
        allocated: block.opt_i64(KIND, "allocated")?,
        limit: block.opt_i64(KIND, "limit")?,
        reserved: block.opt_i64(KIND, "reserved")?,
        used: block.opt_i64(KIND, "used")?,
        overhead: block.opt_i64(KIND, "overhead")?,
    })
}

fn storage_profile(fields: &Fields) -> Result<StorageProfileSpec> {
    Ok(StorageProfileSpec {
        provider: fields.required_str(KIND, "provider")?,
        limit: fields.required_i64(KIND, "limit")?,
        units: fields
            .opt_str(KIND, "units")?
            .unwrap_or_else(|| "MB".to_string()),
        enabled: fields.opt_bool(KIND, "enabled")?.unwrap_or(true),
        default: fields.opt_bool(KIND, "default")?.unwrap_or(false),
    })
}

fn flag(attributes: &Map<String, Value>, key: &str) -> bool {
    attributes.get(key).and_then(Value::as_bool).unwrap_or(false)
}

#[async_trait]
impl ResourceKind for VdcKind {
    type Spec = VdcSpec;
    type Payload = CreateVdcParams;
    type Remote = Vdc;

    const KIND: &'static str = KIND;
    const IDENTITY: IdentityMode = IdentityMode::Locator;

    fn spec_from_fields(&self, fields: &Fields, ctx: &VcdContext) -> Result<VdcSpec> {
        let org = fields
            .opt_str(KIND, "org")?
            .or_else(|| ctx.default_org().map(str::to_string))
            .ok_or_else(|| {
                Error::validation(KIND, "'org' is required and no default is configured")
            })?;
        let compute = fields
            .block(KIND, "compute_capacity")?
            .ok_or_else(|| Error::validation(KIND, "'compute_capacity' is required"))?;

        Ok(VdcSpec {
            org,
            name: fields.required_str(KIND, "name")?,
            description: fields.opt_str(KIND, "description")?,
            allocation_model: fields.required_str(KIND, "allocation_model")?,
            provider_vdc: fields.required_str(KIND, "provider_vdc")?,
            network_pool: fields.opt_str(KIND, "network_pool")?,
            compute_capacity: ComputeCapacity {
                cpu: capacity(&compute, "cpu")?,
                memory: capacity(&compute, "memory")?,
            },
            storage_profiles: fields
                .blocks(KIND, "storage_profile")?
                .iter()
                .map(storage_profile)
                .collect::<Result<_>>()?,
            is_enabled: fields.opt_bool(KIND, "is_enabled")?,
            is_thin_provision: fields.opt_bool(KIND, "is_thin_provision")?,
            uses_fast_provisioning: fields.opt_bool(KIND, "uses_fast_provisioning")?,
            delete_force: fields.opt_bool(KIND, "delete_force")?.unwrap_or(false),
            delete_recursive: fields.opt_bool(KIND, "delete_recursive")?.unwrap_or(false),
        })
    }

    fn translate(&self, spec: &VdcSpec) -> Result<CreateVdcParams> {
        if spec.name.trim().is_empty() {
            return Err(Error::validation(KIND, "name must not be empty"));
        }
        if !ALLOCATION_MODELS.contains(&spec.allocation_model.as_str()) {
            return Err(Error::validation(
                KIND,
                format!(
                    "unknown allocation model '{}', expected one of {}",
                    spec.allocation_model,
                    ALLOCATION_MODELS.join(", ")
                ),
            ));
        }
        if spec.storage_profiles.is_empty() {
            return Err(Error::validation(KIND, "at least one storage_profile is required"));
        }
        if spec.storage_profiles.iter().filter(|p| p.default).count() > 1 {
            return Err(Error::validation(KIND, "only one storage_profile can be the default"));
        }
        if let Some(profile) = spec.storage_profiles.iter().find(|p| p.limit < 0) {
            return Err(Error::validation(
                KIND,
                format!("storage_profile limit must not be negative, got {}", profile.limit),
            ));
        }

        Ok(CreateVdcParams {
            name: spec.name.clone(),
            description: spec.description.clone(),
            allocation_model: spec.allocation_model.clone(),
            compute_capacity: spec.compute_capacity.clone(),
            vdc_storage_profile: spec
                .storage_profiles
                .iter()
                .map(|p| VdcStorageProfileParams {
                    enabled: p.enabled,
                    units: p.units.clone(),
                    limit: p.limit,
                    default: p.default,
                    provider_vdc_storage_profile: Reference::to_href(p.provider.clone()),
                })
                .collect(),
            network_pool_reference: spec.network_pool.clone().map(Reference::to_href),
            provider_vdc_reference: Reference::to_href(spec.provider_vdc.clone()),
            is_enabled: spec.is_enabled,
            is_thin_provision: spec.is_thin_provision,
            uses_fast_provisioning: spec.uses_fast_provisioning,
        })
    }

    fn name<'a>(&self, spec: &'a VdcSpec) -> &'a str {
        &spec.name
    }

    fn attributes(&self, spec: &VdcSpec) -> Map<String, Value> {
        let mut attributes = Map::new();
        attributes.insert("org".to_string(), json!(spec.org));
        attributes.insert("name".to_string(), json!(spec.name));
        attributes.insert("allocation_model".to_string(), json!(spec.allocation_model));
        attributes.insert("provider_vdc".to_string(), json!(spec.provider_vdc));
        attributes.insert("compute_capacity".to_string(), json!(spec.compute_capacity));
        attributes.insert("storage_profile".to_string(), json!(spec.storage_profiles));
        attributes.insert("delete_force".to_string(), json!(spec.delete_force));
        attributes.insert("delete_recursive".to_string(), json!(spec.delete_recursive));

        let optional = [
            ("description", spec.description.as_ref().map(|v| json!(v))),
            ("network_pool", spec.network_pool.as_ref().map(|v| json!(v))),
            ("is_enabled", spec.is_enabled.map(|v| json!(v))),
            ("is_thin_provision", spec.is_thin_provision.map(|v| json!(v))),
            ("uses_fast_provisioning", spec.uses_fast_provisioning.map(|v| json!(v))),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                attributes.insert(key.to_string(), value);
            }
        }
        attributes
    }

    fn update_policy(&self, attribute: &str) -> UpdatePolicy {
        match attribute {
            "delete_force" | "delete_recursive" => UpdatePolicy::LocalOnly,
            _ => UpdatePolicy::Replace,
        }
    }

    async fn parent(&self, ctx: &VcdContext, spec: &VdcSpec) -> Result<Locator> {
        Ok(ctx.org(&spec.org).await?.locator().to_admin())
    }

    async fn submit_create(
        &self,
        api: &dyn VcdApi,
        parent: &Locator,
        payload: &CreateVdcParams,
    ) -> std::result::Result<Task, ApiError> {
        api.create_vdc(parent, payload).await
    }

    async fn fetch(
        &self,
        api: &dyn VcdApi,
        locator: &Locator,
    ) -> std::result::Result<Option<Vdc>, ApiError> {
        api.get_vdc(locator).await
    }

    async fn locate_by_name(
        &self,
        ctx: &VcdContext,
        attributes: &Map<String, Value>,
    ) -> Result<NameLookup> {
        let (Some(org), Some(name)) = (attribute(attributes, "org"), attribute(attributes, "name"))
        else {
            return Ok(NameLookup::Unsupported);
        };
        debug!(org = %org, vdc = %name, "Locating VDC by name");
        let org = match ctx.org(org).await {
            Ok(org) => org,
            Err(Error::ScopeNotFound { .. }) => return Ok(NameLookup::Missing),
            Err(e) => return Err(e),
        };
        Ok(match org.vdc_href(name) {
            Some(locator) => NameLookup::Found(locator),
            None => NameLookup::Missing,
        })
    }

    async fn submit_delete(
        &self,
        api: &dyn VcdApi,
        locator: &Locator,
        attributes: &Map<String, Value>,
    ) -> std::result::Result<Task, ApiError> {
        api.delete_vdc(
            locator,
            flag(attributes, "delete_force"),
            flag(attributes, "delete_recursive"),
        )
        .await
    }
}
