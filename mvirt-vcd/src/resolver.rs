//! Remote handle resolution.
//!
//! A missing object is reported as `Resolved::NotFound`; every other
//! failure stays an error so valid state is not dropped on a network blip.

use serde_json::{Map, Value};
use tracing::debug;

use crate::context::VcdContext;
use crate::error::Result;
use crate::reconciler::ResourceKind;
use crate::state::{LocalId, ResourceState};
use crate::types::Locator;

#[derive(Debug, Clone, PartialEq)]
pub enum Resolved<T> {
    Found(T),
    NotFound,
}

impl<T> Resolved<T> {
    pub fn is_found(&self) -> bool {
        matches!(self, Resolved::Found(_))
    }
}

/// Result of reconstructing a locator from scope and name.
#[derive(Debug, Clone, PartialEq)]
pub enum NameLookup {
    /// The kind cannot be located by name.
    Unsupported,
    Found(Locator),
    Missing,
}

/// Fetch the live object behind `locator`.
pub async fn resolve<K: ResourceKind>(
    kind: &K,
    ctx: &VcdContext,
    locator: &Locator,
) -> Result<Resolved<K::Remote>> {
    match kind.fetch(ctx.api(), locator).await {
        Ok(Some(remote)) => Ok(Resolved::Found(remote)),
        Ok(None) => {
            debug!(kind = K::KIND, href = %locator, "Remote object not found");
            Ok(Resolved::NotFound)
        }
        Err(e) if e.is_not_found() => {
            debug!(kind = K::KIND, href = %locator, "Remote object not found");
            Ok(Resolved::NotFound)
        }
        Err(e) => Err(e.into()),
    }
}

/// Locator for a tracked resource: the recorded one, an href identity, else
/// a name lookup.
pub async fn locate<K: ResourceKind>(
    kind: &K,
    ctx: &VcdContext,
    state: &ResourceState,
) -> Result<NameLookup> {
    if let Some(locator) = &state.locator {
        return Ok(NameLookup::Found(locator.clone()));
    }
    if let Some(LocalId::Locator(locator)) = &state.id {
        return Ok(NameLookup::Found(locator.clone()));
    }
    kind.locate_by_name(ctx, &state.attributes).await
}

/// String attribute from a state mirror.
pub(crate) fn attribute<'a>(attributes: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    attributes.get(key).and_then(Value::as_str)
}
