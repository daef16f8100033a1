//! Lifecycle reconcilers for VCD resource kinds.
//!
//! A [`ResourceKind`] knows how to translate its declared form into a
//! request and how to talk to the API for that kind. [`Reconciler`] drives
//! the generic create/read/update/delete protocol on top of it and owns the
//! rules for when local state changes.

pub mod disk;
pub mod vdc;

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::clients::VcdApi;
use crate::context::VcdContext;
use crate::error::{ApiError, Error, Result};
use crate::resolver::{self, NameLookup, Resolved};
use crate::state::{Fields, LocalId, ResourceState};
use crate::types::{Locator, Task};

pub use disk::{DiskKind, DiskSpec};
pub use vdc::{StorageProfileSpec, VdcKind, VdcSpec};

/// Attribute holding the remote href. Computed, never part of a diff.
pub const HREF_ATTRIBUTE: &str = "href";

/// How a changed attribute is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdatePolicy {
    /// The remote object must be destroyed and recreated.
    Replace,
    /// Only affects local behavior (e.g. delete flags); recorded, never sent.
    LocalOnly,
    /// Sent to the remote object without recreating it.
    InPlace,
}

/// What local state is keyed by after create.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityMode {
    /// The href returned by the remote system.
    Locator,
    /// The declared name. Kept for kinds that have always been keyed that way.
    LegacyName,
}

/// Per-kind behavior plugged into [`Reconciler`].
#[async_trait]
pub trait ResourceKind: Send + Sync {
    /// Declared form of the resource.
    type Spec: Send + Sync;
    /// Request body sent on create.
    type Payload: Send + Sync;
    /// Object returned by a lookup.
    type Remote: Send + Sync;

    const KIND: &'static str;
    const IDENTITY: IdentityMode;

    /// Build a spec from user-supplied fields, applying context defaults.
    fn spec_from_fields(&self, fields: &Fields, ctx: &VcdContext) -> Result<Self::Spec>;

    /// Pure translation of a spec into the create request. Optional fields
    /// that were not set are left out of the request.
    fn translate(&self, spec: &Self::Spec) -> Result<Self::Payload>;

    fn name<'a>(&self, spec: &'a Self::Spec) -> &'a str;

    /// Attributes mirrored into local state.
    fn attributes(&self, spec: &Self::Spec) -> Map<String, Value>;

    fn update_policy(&self, attribute: &str) -> UpdatePolicy;

    /// Href of the scope the resource is created in.
    async fn parent(&self, ctx: &VcdContext, spec: &Self::Spec) -> Result<Locator>;

    async fn submit_create(
        &self,
        api: &dyn VcdApi,
        parent: &Locator,
        payload: &Self::Payload,
    ) -> std::result::Result<Task, ApiError>;

    async fn fetch(
        &self,
        api: &dyn VcdApi,
        locator: &Locator,
    ) -> std::result::Result<Option<Self::Remote>, ApiError>;

    /// Reconstruct a locator from the scope and name recorded in state.
    async fn locate_by_name(
        &self,
        _ctx: &VcdContext,
        _attributes: &Map<String, Value>,
    ) -> Result<NameLookup> {
        Ok(NameLookup::Unsupported)
    }

    /// Push in-place changes. Only called when some changed attribute has
    /// the [`UpdatePolicy::InPlace`] policy.
    async fn submit_update(
        &self,
        _api: &dyn VcdApi,
        _locator: &Locator,
        _spec: &Self::Spec,
    ) -> std::result::Result<Task, ApiError> {
        Err(ApiError::Http {
            status: 405,
            message: format!("{} does not support in-place updates", Self::KIND),
        })
    }

    /// `attributes` is the state mirror, for kinds whose delete request
    /// depends on local-only settings.
    async fn submit_delete(
        &self,
        api: &dyn VcdApi,
        locator: &Locator,
        attributes: &Map<String, Value>,
    ) -> std::result::Result<Task, ApiError>;
}

/// Result of a read.
#[derive(Debug)]
pub enum ReadOutcome<R> {
    Present(R),
    /// The remote object no longer exists; local state has been cleared.
    Gone,
}

/// Result of an update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    Unchanged,
    /// These attributes were applied.
    Updated(Vec<String>),
    /// These attributes cannot change in place. Nothing was modified; the
    /// caller has to delete and create.
    ReplacementRequired(Vec<String>),
}

/// Drives the lifecycle of one resource kind.
pub struct Reconciler<K> {
    kind: K,
}

impl<K: ResourceKind> Reconciler<K> {
    pub fn new(kind: K) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> &K {
        &self.kind
    }

    /// Create the remote object and record it in `state`.
    ///
    /// `state` is only written once the remote task has succeeded.
    pub async fn create(
        &self,
        ctx: &VcdContext,
        spec: &K::Spec,
        state: &mut ResourceState,
    ) -> Result<Locator> {
        let name = self.kind.name(spec);
        let payload = self.kind.translate(spec)?;
        let parent = self.kind.parent(ctx, spec).await?;

        info!("Creating {} {} in {}", K::KIND, name, parent);
        let operation = format!("create {} {}", K::KIND, name);
        let locator = ctx
            .tasks()
            .submit_and_await(
                &operation,
                self.kind.submit_create(ctx.api(), &parent, &payload),
            )
            .await?;

        let id = match K::IDENTITY {
            IdentityMode::Locator => LocalId::Locator(locator.clone()),
            IdentityMode::LegacyName => {
                debug!(kind = K::KIND, name, "Tracking by name (legacy identity)");
                LocalId::Name(name.to_string())
            }
        };
        let mut attributes = self.kind.attributes(spec);
        attributes.insert(
            HREF_ATTRIBUTE.to_string(),
            Value::String(locator.to_string()),
        );
        *state = ResourceState {
            id: Some(id),
            locator: Some(locator.clone()),
            attributes,
            updated_at: Some(Utc::now()),
        };

        ctx.audit().created(K::KIND, name, &locator);
        info!("Created {} {} ({})", K::KIND, name, locator);
        Ok(locator)
    }

    /// Refresh `state` from the remote object.
    ///
    /// A missing object clears `state` and is not an error. Transport
    /// failures leave `state` untouched.
    pub async fn read(
        &self,
        ctx: &VcdContext,
        state: &mut ResourceState,
    ) -> Result<ReadOutcome<K::Remote>> {
        let Some(id) = state.id.clone() else {
            return Ok(ReadOutcome::Gone);
        };

        let locator = match resolver::locate(&self.kind, ctx, state).await? {
            NameLookup::Found(locator) => locator,
            NameLookup::Missing => {
                ctx.audit().drift(K::KIND, id.as_str(), None);
                state.clear();
                return Ok(ReadOutcome::Gone);
            }
            NameLookup::Unsupported => {
                return Err(Error::MissingLocator {
                    kind: K::KIND,
                    id: id.to_string(),
                });
            }
        };

        match resolver::resolve(&self.kind, ctx, &locator).await? {
            Resolved::Found(remote) => {
                state.attributes.insert(
                    HREF_ATTRIBUTE.to_string(),
                    Value::String(locator.to_string()),
                );
                state.locator = Some(locator);
                Ok(ReadOutcome::Present(remote))
            }
            Resolved::NotFound => {
                warn!("{} {} no longer exists, removing from state", K::KIND, id);
                ctx.audit().drift(K::KIND, id.as_str(), Some(&locator));
                state.clear();
                Ok(ReadOutcome::Gone)
            }
        }
    }

    /// Apply the difference between `spec` and the attributes in `state`.
    pub async fn update(
        &self,
        ctx: &VcdContext,
        spec: &K::Spec,
        state: &mut ResourceState,
    ) -> Result<UpdateOutcome> {
        let Some(id) = state.id.clone() else {
            return Err(Error::NotTracked { kind: K::KIND });
        };
        let desired = self.kind.attributes(spec);

        let changed: BTreeSet<&String> = desired
            .keys()
            .chain(state.attributes.keys())
            .filter(|key| key.as_str() != HREF_ATTRIBUTE)
            .filter(|key| desired.get(key.as_str()) != state.attributes.get(key.as_str()))
            .collect();
        if changed.is_empty() {
            debug!("{} {} is up to date", K::KIND, id);
            return Ok(UpdateOutcome::Unchanged);
        }

        let mut replace = Vec::new();
        let mut in_place = false;
        for key in &changed {
            match self.kind.update_policy(key) {
                UpdatePolicy::Replace => replace.push(key.to_string()),
                UpdatePolicy::InPlace => in_place = true,
                UpdatePolicy::LocalOnly => {}
            }
        }
        if !replace.is_empty() {
            ctx.audit().replacement_required(K::KIND, id.as_str(), &replace);
            return Ok(UpdateOutcome::ReplacementRequired(replace));
        }

        if in_place {
            let locator = match resolver::locate(&self.kind, ctx, state).await? {
                NameLookup::Found(locator) => locator,
                NameLookup::Missing | NameLookup::Unsupported => {
                    return Err(Error::MissingLocator {
                        kind: K::KIND,
                        id: id.to_string(),
                    });
                }
            };
            info!("Updating {} {} in place", K::KIND, id);
            let operation = format!("update {} {}", K::KIND, id);
            ctx.tasks()
                .submit_and_await(
                    &operation,
                    self.kind.submit_update(ctx.api(), &locator, spec),
                )
                .await?;
        }

        let applied: Vec<String> = changed.into_iter().cloned().collect();
        for key in &applied {
            match desired.get(key) {
                Some(value) => {
                    state.attributes.insert(key.clone(), value.clone());
                }
                None => {
                    state.attributes.remove(key);
                }
            }
        }
        state.updated_at = Some(Utc::now());
        Ok(UpdateOutcome::Updated(applied))
    }

    /// Delete the remote object and clear `state`.
    ///
    /// Deleting something that is already gone succeeds.
    pub async fn delete(&self, ctx: &VcdContext, state: &mut ResourceState) -> Result<()> {
        let Some(id) = state.id.clone() else {
            debug!("{} not tracked, nothing to delete", K::KIND);
            return Ok(());
        };

        let locator = match resolver::locate(&self.kind, ctx, state).await? {
            NameLookup::Found(locator) => locator,
            NameLookup::Missing => {
                state.clear();
                return Ok(());
            }
            NameLookup::Unsupported => {
                return Err(Error::MissingLocator {
                    kind: K::KIND,
                    id: id.to_string(),
                });
            }
        };

        if let Resolved::NotFound = resolver::resolve(&self.kind, ctx, &locator).await? {
            info!("{} {} already deleted", K::KIND, id);
            state.clear();
            return Ok(());
        }

        info!("Deleting {} {} ({})", K::KIND, id, locator);
        let operation = format!("delete {} {}", K::KIND, id);
        let result = ctx
            .tasks()
            .submit_and_await(
                &operation,
                self.kind.submit_delete(ctx.api(), &locator, &state.attributes),
            )
            .await;
        match result {
            Ok(_) => {}
            Err(Error::Submission { source, .. }) if source.is_not_found() => {
                info!("{} {} vanished before delete", K::KIND, id);
            }
            Err(e) => return Err(e),
        }

        ctx.audit().deleted(K::KIND, id.as_str(), &locator);
        state.clear();
        Ok(())
    }

    /// Whether the object tracked in `state` still exists remotely.
    pub async fn exists(&self, ctx: &VcdContext, state: &ResourceState) -> Result<bool> {
        if state.id.is_none() {
            return Ok(false);
        }
        match resolver::locate(&self.kind, ctx, state).await? {
            NameLookup::Found(locator) => Ok(resolver::resolve(&self.kind, ctx, &locator)
                .await?
                .is_found()),
            NameLookup::Missing => Ok(false),
            NameLookup::Unsupported => Err(Error::MissingLocator {
                kind: K::KIND,
                id: state.id.as_ref().map(|id| id.to_string()).unwrap_or_default(),
            }),
        }
    }
}
