//! Category and resource catalog
//!
//! The registry binds every category to its backend, stores live entities
//! keyed by canonical identifier, and filters both by tenant. It is an
//! explicit instance owned by the hosting process and threaded through every
//! call; there is no module-level state.
//!
//! All lookups are local and synchronous. Absence is a
//! permanent-until-registered condition, never retried here. Writers are
//! serialized by the interior lock; no snapshot isolation is provided across
//! a multi-step operation, so two concurrent operations on the same
//! identifier can interleave and the last write-back wins.

use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::model::{Category, Entity};

struct Binding {
    category: Category,
    backend: Backend,
    owner: Option<String>,
}

struct Stored {
    entity: Entity,
    owner: Option<String>,
}

#[derive(Default)]
struct Inner {
    /// Category identity string -> binding.
    categories: HashMap<String, Binding>,
    /// Canonical identifier -> stored entity.
    resources: HashMap<String, Stored>,
    /// Identifiers of deleted resources. Never reused within a process
    /// lifetime.
    retired: HashSet<String>,
}

/// Tenant-partitioned catalog of categories, backends and live entities.
pub struct Registry {
    inner: RwLock<Inner>,
}

/// Whether a stored owner is visible to the calling tenant. Ownerless entries
/// are visible to everyone; owned entries are visible to their owner and to
/// privileged callers with no tenant scoping.
fn visible(owner: Option<&str>, tenant: Option<&str>) -> bool {
    match (owner, tenant) {
        (None, _) => true,
        (Some(_), None) => true,
        (Some(o), Some(t)) => o == t,
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Inner>> {
        self.inner
            .read()
            .map_err(|e: PoisonError<_>| Error::upstream(format!("registry lock poisoned: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>> {
        self.inner
            .write()
            .map_err(|e: PoisonError<_>| Error::upstream(format!("registry lock poisoned: {}", e)))
    }

    // =========================================================================
    // Categories
    // =========================================================================

    /// Bind a category to a backend. Idempotent per category identity:
    /// registering the same scheme+term again replaces the binding, which is
    /// how the catalog tracks orchestrator changes (new images, flavors,
    /// security groups). An owner tenant makes the category visible to that
    /// tenant only, plus privileged callers.
    pub fn register(
        &self,
        category: Category,
        backend: Backend,
        owner: Option<&str>,
    ) -> Result<()> {
        tracing::debug!("register: category={}, owner={:?}", category, owner);
        let mut inner = self.write()?;
        inner.categories.insert(
            category.id(),
            Binding {
                category,
                backend,
                owner: owner.map(str::to_string),
            },
        );
        Ok(())
    }

    /// Resolve the backend bound to a category.
    pub fn lookup(&self, category: &Category) -> Result<Backend> {
        self.binding(category).map(|(_, backend)| backend)
    }

    /// Resolve a category to its registered definition and backend. Category
    /// equality covers identity only, so a caller-supplied copy may carry a
    /// different related set or attribute schema; hooks must act on the
    /// definition returned here, never on the copy.
    pub fn binding(&self, category: &Category) -> Result<(Category, Backend)> {
        let inner = self.read()?;
        inner
            .categories
            .get(&category.id())
            .map(|b| (b.category.clone(), b.backend.clone()))
            .ok_or_else(|| Error::not_found(format!("category {} is not registered", category)))
    }

    /// All categories visible to the tenant: ownerless ones plus those owned
    /// by the tenant. A privileged caller (no tenant) sees everything.
    pub fn visible_categories(&self, tenant: Option<&str>) -> Result<Vec<Category>> {
        let inner = self.read()?;
        Ok(inner
            .categories
            .values()
            .filter(|b| visible(b.owner.as_deref(), tenant))
            .map(|b| b.category.clone())
            .collect())
    }

    /// Find a visible category by its location prefix, for callers resolving
    /// request paths to types.
    pub fn category_at(&self, location: &str, tenant: Option<&str>) -> Result<Option<Category>> {
        let inner = self.read()?;
        Ok(inner
            .categories
            .values()
            .filter(|b| visible(b.owner.as_deref(), tenant))
            .find(|b| b.category.location() == location)
            .map(|b| b.category.clone()))
    }

    // =========================================================================
    // Resources
    // =========================================================================

    /// Store an entity under its canonical identifier, composed from the kind
    /// location and the core id assigned by the backend's create hook.
    pub fn add_resource(&self, mut entity: Entity, tenant: Option<&str>) -> Result<String> {
        let core_id = entity
            .core_id()
            .ok_or_else(|| Error::bad_request("entity has no core id"))?;
        let identifier = format!("{}{}", entity.kind().location(), core_id);

        let mut inner = self.write()?;
        if inner.retired.contains(&identifier) {
            return Err(Error::bad_request(format!(
                "identifier {} was previously used and cannot be reused",
                identifier
            )));
        }
        if inner.resources.contains_key(&identifier) {
            return Err(Error::bad_request(format!(
                "identifier {} is already in use",
                identifier
            )));
        }

        entity.set_identifier(identifier.clone());
        tracing::debug!("add_resource: id={}, owner={:?}", identifier, tenant);
        inner.resources.insert(
            identifier.clone(),
            Stored {
                entity,
                owner: tenant.map(str::to_string),
            },
        );
        Ok(identifier)
    }

    /// Fetch a copy of a stored entity, enforcing tenant visibility.
    pub fn get_resource(&self, identifier: &str, tenant: Option<&str>) -> Result<Entity> {
        let inner = self.read()?;
        let stored = inner
            .resources
            .get(identifier)
            .ok_or_else(|| Error::not_found(format!("resource {}", identifier)))?;
        if !visible(stored.owner.as_deref(), tenant) {
            return Err(Error::forbidden(format!(
                "resource {} belongs to another tenant",
                identifier
            )));
        }
        Ok(stored.entity.clone())
    }

    /// Write back a mutated entity. The stored owner is preserved.
    pub fn update_resource(&self, entity: Entity, tenant: Option<&str>) -> Result<()> {
        let mut inner = self.write()?;
        let stored = inner
            .resources
            .get_mut(entity.identifier())
            .ok_or_else(|| Error::not_found(format!("resource {}", entity.identifier())))?;
        if !visible(stored.owner.as_deref(), tenant) {
            return Err(Error::forbidden(format!(
                "resource {} belongs to another tenant",
                entity.identifier()
            )));
        }
        stored.entity = entity;
        Ok(())
    }

    /// Remove a stored entity and retire its identifier.
    pub fn delete_resource(&self, identifier: &str, tenant: Option<&str>) -> Result<()> {
        let mut inner = self.write()?;
        let stored = inner
            .resources
            .get(identifier)
            .ok_or_else(|| Error::not_found(format!("resource {}", identifier)))?;
        if !visible(stored.owner.as_deref(), tenant) {
            return Err(Error::forbidden(format!(
                "resource {} belongs to another tenant",
                identifier
            )));
        }
        tracing::debug!("delete_resource: id={}", identifier);
        inner.resources.remove(identifier);
        inner.retired.insert(identifier.to_string());
        Ok(())
    }

    /// Remove a link record after its owning resource was deleted. The
    /// target goes too when it is tenant-owned and no surviving resource
    /// still links to it; shared ownerless targets are kept. Missing records
    /// are ignored, so the cleanup is idempotent.
    pub fn delete_link(&self, link: &Entity, tenant: Option<&str>) -> Result<()> {
        let rel = link
            .rel()
            .ok_or_else(|| Error::bad_request(format!("{} is not a link", link.identifier())))?;
        let mut inner = self.write()?;

        if let Some(stored) = inner.resources.get(link.identifier()) {
            if !visible(stored.owner.as_deref(), tenant) {
                return Err(Error::forbidden(format!(
                    "resource {} belongs to another tenant",
                    link.identifier()
                )));
            }
            tracing::debug!("delete_link: id={}", link.identifier());
            inner.resources.remove(link.identifier());
            inner.retired.insert(link.identifier().to_string());
        }

        let target_owned = inner
            .resources
            .get(&rel.target)
            .map(|s| s.owner.is_some())
            .unwrap_or(false);
        if target_owned {
            let points_at = |e: &Entity| e.rel().map(|r| r.target == rel.target).unwrap_or(false);
            let still_referenced = inner
                .resources
                .values()
                .any(|s| points_at(&s.entity) || s.entity.links.iter().any(points_at));
            if !still_referenced {
                tracing::debug!("delete_link: orphaned target id={}", rel.target);
                inner.resources.remove(&rel.target);
                inner.retired.insert(rel.target.clone());
            }
        }
        Ok(())
    }

    /// Identifiers of all resources visible to the tenant.
    pub fn resource_ids(&self, tenant: Option<&str>) -> Result<Vec<String>> {
        let inner = self.read()?;
        Ok(inner
            .resources
            .values()
            .filter(|s| visible(s.owner.as_deref(), tenant))
            .map(|s| s.entity.identifier().to_string())
            .collect())
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
