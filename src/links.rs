//! Link management
//!
//! Backends use this to maintain 1:1 auxiliary relations on a resource: a
//! compute instance has exactly one default network attachment and exactly
//! one console endpoint of each flavor, no matter how often retrieve runs.
//! The link set is keyed by target kind, so repeated upserts refresh
//! attributes instead of stacking duplicates.

use crate::error::{Error, Result};
use crate::model::{Category, Entity, ATTR_CORE_ID};
use crate::registry::Registry;

/// Target side of an upsert: the kind, the core id, and attributes written
/// when this call ends up creating the target resource.
pub struct LinkTarget {
    pub kind: Category,
    pub core_id: String,
    pub attributes: Vec<(String, String)>,
}

impl LinkTarget {
    pub fn new(kind: Category, core_id: impl Into<String>) -> Self {
        Self {
            kind,
            core_id: core_id.into(),
            attributes: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((key.into(), value.into()));
        self
    }
}

/// Idempotently ensure `owner` carries exactly one link of `link_kind` to a
/// target of `target.kind`.
///
/// If such a link already exists its attributes are overwritten with the
/// freshly evaluated output of `attributes`; otherwise the target resource is
/// created and registered if absent, a link entity is registered and appended
/// to the owner's link set. Two consecutive calls with the same target kind
/// never produce two links.
pub fn upsert<F>(
    registry: &Registry,
    owner: &mut Entity,
    link_kind: Category,
    target: LinkTarget,
    tenant: Option<&str>,
    attributes: F,
) -> Result<()>
where
    F: FnOnce() -> Vec<(String, String)>,
{
    let attributes = attributes();

    if let Some(existing) = owner
        .links
        .iter_mut()
        .find(|l| l.rel().map(|r| r.target_kind == target.kind).unwrap_or(false))
    {
        for (key, value) in &attributes {
            existing.write_attribute(key, value.clone())?;
        }
        registry.update_resource(existing.clone(), tenant)?;
        return Ok(());
    }

    // Targets may be shared (the default network): create only when absent.
    let target_identifier = format!("{}{}", target.kind.location(), target.core_id);
    let target_entity = match registry.get_resource(&target_identifier, tenant) {
        Ok(entity) => entity,
        Err(Error::NotFound(_)) => {
            let mut entity = Entity::resource(target.kind.clone())?;
            entity.write_attribute(ATTR_CORE_ID, &target.core_id)?;
            for (key, value) in &target.attributes {
                entity.write_attribute(key, value.clone())?;
            }
            let id = registry.add_resource(entity, tenant)?;
            registry.get_resource(&id, tenant)?
        }
        Err(err) => return Err(err),
    };

    let owner_core = owner
        .core_id()
        .ok_or_else(|| Error::bad_request("link owner has no core id"))?;

    let mut link = Entity::link(link_kind, owner, &target_entity)?;
    link.write_attribute(
        ATTR_CORE_ID,
        format!("{}-{}", owner_core, target.kind.term()),
    )?;
    for (key, value) in &attributes {
        link.write_attribute(key, value.clone())?;
    }

    let id = registry.add_resource(link.clone(), tenant)?;
    link.set_identifier(id);
    owner.links.push(link);
    Ok(())
}
