//! Backend capability traits
//!
//! A backend implements category-specific behavior against the orchestrator.
//! One concrete backend may take several roles (type handler, mixin handler,
//! action handler); each role is a separate trait, and a [`Backend`] handle
//! records which traits a registered handler satisfies. The dispatcher checks
//! the handle instead of relying on any type hierarchy.
//!
//! - [`compute`] - virtual machine instances
//! - [`network`] - networks, network interfaces, public addressing
//! - [`storage`] - volumes and volume attachments

pub mod compute;
pub mod network;
pub mod storage;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{Category, Entity};
use crate::registry::Registry;

/// Per-operation call context: the registry instance the operation runs
/// against and the tenant on whose behalf it runs. A context without a tenant
/// is privileged (internal callers) and bypasses visibility filtering.
#[derive(Clone)]
pub struct Context {
    registry: Arc<Registry>,
    tenant: Option<String>,
}

impl Context {
    pub fn new(registry: Arc<Registry>, tenant: impl Into<String>) -> Self {
        Self {
            registry,
            tenant: Some(tenant.into()),
        }
    }

    /// A context with no tenant scoping.
    pub fn privileged(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            tenant: None,
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn tenant(&self) -> Option<&str> {
        self.tenant.as_deref()
    }
}

/// Lifecycle hooks for entities of a kind. All hooks default to no-ops so a
/// backend only spells out the operations its kind supports.
#[async_trait]
pub trait KindHandler: Send + Sync {
    async fn create(&self, entity: &mut Entity, ctx: &Context) -> Result<()> {
        let _ = (entity, ctx);
        Ok(())
    }

    /// Refresh the entity from orchestrator truth. For compute-like kinds
    /// this is where the state reconciler and link manager run.
    async fn retrieve(&self, entity: &mut Entity, ctx: &Context) -> Result<()> {
        let _ = (entity, ctx);
        Ok(())
    }

    async fn update(&self, old: &mut Entity, new: &Entity, ctx: &Context) -> Result<()> {
        let _ = (old, new, ctx);
        Ok(())
    }

    async fn delete(&self, entity: &mut Entity, ctx: &Context) -> Result<()> {
        let _ = (entity, ctx);
        Ok(())
    }
}

/// Hooks run when a mixin is attached to or removed from an entity. The
/// triggering mixin is passed in because one handler instance commonly serves
/// a whole family of categories (every sizing profile, every image).
#[async_trait]
pub trait MixinHandler: Send + Sync {
    async fn create(&self, entity: &mut Entity, mixin: &Category, ctx: &Context) -> Result<()> {
        let _ = (entity, mixin, ctx);
        Ok(())
    }

    async fn delete(&self, entity: &mut Entity, mixin: &Category, ctx: &Context) -> Result<()> {
        let _ = (entity, mixin, ctx);
        Ok(())
    }
}

/// Hook invoked for a verb that passed the dispatcher's legality check.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    async fn action(&self, entity: &mut Entity, action: &Category, ctx: &Context) -> Result<()>;
}

/// Last path segment of a canonical identifier, i.e. the core id the
/// orchestrator knows the resource by.
pub(crate) fn core_of(identifier: &str) -> &str {
    identifier.rsplit('/').next().unwrap_or(identifier)
}

/// Kind handler with only the default no-op hooks, for kinds whose entities
/// are maintained entirely by other backends (console resources, base types).
pub struct Passive;

#[async_trait]
impl KindHandler for Passive {}

/// Handle binding a registered category to the capability set of its handler.
#[derive(Clone, Default)]
pub struct Backend {
    kind: Option<Arc<dyn KindHandler>>,
    mixin: Option<Arc<dyn MixinHandler>>,
    action: Option<Arc<dyn ActionHandler>>,
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backend")
            .field("kind", &self.kind.is_some())
            .field("mixin", &self.mixin.is_some())
            .field("action", &self.action.is_some())
            .finish()
    }
}

impl Backend {
    pub fn for_kind(handler: Arc<dyn KindHandler>) -> Self {
        Self {
            kind: Some(handler),
            ..Default::default()
        }
    }

    pub fn for_mixin(handler: Arc<dyn MixinHandler>) -> Self {
        Self {
            mixin: Some(handler),
            ..Default::default()
        }
    }

    pub fn for_action(handler: Arc<dyn ActionHandler>) -> Self {
        Self {
            action: Some(handler),
            ..Default::default()
        }
    }

    /// Add the action role to a kind or mixin handle.
    pub fn with_action(mut self, handler: Arc<dyn ActionHandler>) -> Self {
        self.action = Some(handler);
        self
    }

    pub fn kind_handler(&self) -> Option<&Arc<dyn KindHandler>> {
        self.kind.as_ref()
    }

    pub fn mixin_handler(&self) -> Option<&Arc<dyn MixinHandler>> {
        self.mixin.as_ref()
    }

    pub fn action_handler(&self) -> Option<&Arc<dyn ActionHandler>> {
        self.action.as_ref()
    }
}
