//! Operation dispatch
//!
//! The dispatcher is the single entry point for entity operations. It owns
//! the hook ordering contract:
//!
//! - create: kind hook first, then the mixin hook of each attached mixin in
//!   attachment order
//! - retrieve: kind hook only; mixins observe, they do not re-fire
//! - update: kind hook, then the hook of the (at most one) changed mixin
//! - delete: mixin hooks in reverse attachment order, kind hook last
//! - action: legality is checked locally against the entity's current verb
//!   set before anything is called
//!
//! Mutations are written back to the registry after the hooks have run, so a
//! failed remote call leaves the stored entity untouched.

use std::sync::Arc;

use crate::backend::{Backend, Context};
use crate::error::{Error, Result};
use crate::model::{Category, Entity};
use crate::registry::Registry;

pub struct Dispatcher {
    registry: Arc<Registry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    fn context(&self, tenant: Option<&str>) -> Context {
        match tenant {
            Some(t) => Context::new(self.registry.clone(), t),
            None => Context::privileged(self.registry.clone()),
        }
    }

    /// Resolve the kind handler of an entity, failing before any remote call
    /// if the kind or any attached mixin is unregistered. The registered
    /// category definitions are substituted into the entity, so hooks never
    /// see a caller-supplied related set or attribute schema.
    fn resolve(&self, entity: &mut Entity) -> Result<Backend> {
        let (kind, backend) = self.registry.binding(entity.kind())?;
        entity.set_kind(kind);
        for mixin in entity.mixins().to_vec() {
            let (canonical, _) = self.registry.binding(&mixin)?;
            entity.replace_mixin(canonical);
        }
        Ok(backend)
    }

    /// Create an entity: run the kind hook, then each mixin hook in
    /// attachment order, then store the result. Returns the canonical
    /// identifier.
    pub async fn create(&self, mut entity: Entity, tenant: Option<&str>) -> Result<String> {
        let backend = self.resolve(&mut entity)?;
        let handler = backend.kind_handler().cloned().ok_or_else(|| {
            Error::bad_request(format!("{} has no kind handler", entity.kind()))
        })?;
        let ctx = self.context(tenant);

        tracing::debug!("create: kind={}, tenant={:?}", entity.kind(), tenant);
        handler.create(&mut entity, &ctx).await?;
        for mixin in entity.mixins().to_vec() {
            let backend = self.registry.lookup(&mixin)?;
            if let Some(hook) = backend.mixin_handler().cloned() {
                hook.create(&mut entity, &mixin, &ctx).await?;
            }
        }
        self.registry.add_resource(entity, tenant)
    }

    /// Fetch an entity refreshed from orchestrator truth. The refreshed
    /// projection is written back before it is returned.
    pub async fn retrieve(&self, identifier: &str, tenant: Option<&str>) -> Result<Entity> {
        let mut entity = self.registry.get_resource(identifier, tenant)?;
        let backend = self.resolve(&mut entity)?;
        let ctx = self.context(tenant);

        if let Some(hook) = backend.kind_handler().cloned() {
            hook.retrieve(&mut entity, &ctx).await?;
        }
        self.registry.update_resource(entity.clone(), tenant)?;
        Ok(entity)
    }

    /// Apply a client-supplied replacement entity: attribute changes go
    /// through the kind hook, and at most one mixin may be attached or
    /// detached per update. The changed mixin's hook runs after the kind
    /// hook.
    pub async fn update(
        &self,
        identifier: &str,
        new: &Entity,
        tenant: Option<&str>,
    ) -> Result<Entity> {
        let mut old = self.registry.get_resource(identifier, tenant)?;
        let backend = self.resolve(&mut old)?;
        for mixin in new.mixins() {
            self.registry.lookup(mixin)?;
        }

        let added: Vec<Category> = new
            .mixins()
            .iter()
            .filter(|m| !old.mixins().contains(m))
            .cloned()
            .collect();
        let removed: Vec<Category> = old
            .mixins()
            .iter()
            .filter(|m| !new.mixins().contains(m))
            .cloned()
            .collect();
        if added.len() + removed.len() > 1 {
            return Err(Error::bad_request(
                "at most one mixin may be attached or detached per update",
            ));
        }

        let ctx = self.context(tenant);
        tracing::debug!("update: id={}, tenant={:?}", identifier, tenant);
        if let Some(hook) = backend.kind_handler().cloned() {
            hook.update(&mut old, new, &ctx).await?;
        }
        for mixin in removed {
            if let Some(hook) = self.registry.lookup(&mixin)?.mixin_handler().cloned() {
                hook.delete(&mut old, &mixin, &ctx).await?;
            }
            old.detach_mixin(&mixin);
        }
        for mixin in added {
            // Attach the registered definition, not the client's copy.
            let (mixin, backend) = self.registry.binding(&mixin)?;
            old.attach_mixin(mixin.clone())?;
            if let Some(hook) = backend.mixin_handler().cloned() {
                hook.create(&mut old, &mixin, &ctx).await?;
            }
        }

        self.registry.update_resource(old.clone(), tenant)?;
        Ok(old)
    }

    /// Delete an entity: mixin hooks in reverse attachment order, then the
    /// kind hook, then the identifier is retired together with the entity's
    /// links.
    pub async fn delete(&self, identifier: &str, tenant: Option<&str>) -> Result<()> {
        let mut entity = self.registry.get_resource(identifier, tenant)?;
        let backend = self.resolve(&mut entity)?;
        let ctx = self.context(tenant);

        tracing::debug!("delete: id={}, tenant={:?}", identifier, tenant);
        for mixin in entity.mixins().to_vec().into_iter().rev() {
            if let Some(hook) = self.registry.lookup(&mixin)?.mixin_handler().cloned() {
                hook.delete(&mut entity, &mixin, &ctx).await?;
            }
        }
        if let Some(hook) = backend.kind_handler().cloned() {
            hook.delete(&mut entity, &ctx).await?;
        }
        self.registry.delete_resource(identifier, tenant)?;
        // Links die with their owner, along with targets nothing else uses.
        for link in &entity.links {
            self.registry.delete_link(link, tenant)?;
        }
        Ok(())
    }

    /// Invoke a verb on an entity. Legality is decided locally, from the verb
    /// set of the last reconciliation: an illegal verb is rejected without
    /// any orchestrator call.
    pub async fn action(
        &self,
        identifier: &str,
        action: &Category,
        tenant: Option<&str>,
    ) -> Result<Entity> {
        let mut entity = self.registry.get_resource(identifier, tenant)?;
        if !entity.action_is_legal(action) {
            return Err(Error::forbidden(format!(
                "verb {} is not applicable to {} in its current state",
                action, identifier
            )));
        }
        let backend = self.registry.lookup(action)?;
        let handler = backend.action_handler().cloned().ok_or_else(|| {
            Error::bad_request(format!("{} has no action handler", action))
        })?;
        let ctx = self.context(tenant);

        tracing::debug!("action: id={}, verb={}, tenant={:?}", identifier, action.term(), tenant);
        handler.action(&mut entity, action, &ctx).await?;
        self.registry.update_resource(entity.clone(), tenant)?;
        Ok(entity)
    }
}
