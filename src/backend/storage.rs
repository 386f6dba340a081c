//! Storage backend
//!
//! Volumes and their attachments. Volume create is the one operation that
//! observes the orchestrator response synchronously: a volume that lands in
//! an error status right away is reported as an upstream failure instead of
//! being stored.

use std::sync::Arc;

use async_trait::async_trait;

use crate::backend::{core_of, ActionHandler, Context, KindHandler};
use crate::catalog;
use crate::error::{Error, Result};
use crate::model::{Category, Entity, ATTR_CORE_ID, ATTR_TITLE};
use crate::orchestrator::{Orchestrator, Volume};
use crate::state::{self, LifecycleState};

pub struct StorageBackend {
    driver: Arc<dyn Orchestrator>,
}

impl StorageBackend {
    pub fn new(driver: Arc<dyn Orchestrator>) -> Self {
        Self { driver }
    }

    fn core_id(entity: &Entity) -> Result<&str> {
        entity
            .core_id()
            .ok_or_else(|| Error::bad_request("storage entity has no core id"))
    }

    fn reconcile(&self, entity: &mut Entity, volume: &Volume) -> Result<()> {
        let infra = catalog::infra();
        let projection = state::project(
            &state::VOLUME_STATES,
            &infra.volume_verbs(),
            &volume.status,
        );
        entity.write_attribute("storage.size", volume.size_gb.to_string())?;
        entity.write_attribute("storage.state", projection.state.as_str())?;
        entity.actions = projection.actions;
        Ok(())
    }
}

#[async_trait]
impl KindHandler for StorageBackend {
    async fn create(&self, entity: &mut Entity, _ctx: &Context) -> Result<()> {
        let size: f64 = entity
            .attribute("storage.size")
            .ok_or_else(|| Error::bad_request("storage.size must be set to create a volume"))?
            .parse()
            .map_err(|_| Error::bad_request("storage.size must be a number of gigabytes"))?;
        if size <= 0.0 {
            return Err(Error::bad_request("storage.size must be positive"));
        }
        let name = entity.attribute(ATTR_TITLE).unwrap_or("stratus-volume");

        let volume = self.driver.create_volume(size, name).await?;
        if volume.status == "error" {
            return Err(Error::upstream(format!(
                "volume {} entered error status during creation",
                volume.id
            )));
        }
        entity.write_attribute(ATTR_CORE_ID, &volume.id)?;
        tracing::info!("created volume {}", volume.id);
        self.reconcile(entity, &volume)
    }

    async fn retrieve(&self, entity: &mut Entity, _ctx: &Context) -> Result<()> {
        let id = Self::core_id(entity)?.to_string();
        let volume = self.driver.volume(&id).await?;
        self.reconcile(entity, &volume)
    }

    async fn update(&self, old: &mut Entity, new: &Entity, _ctx: &Context) -> Result<()> {
        for (key, value) in new.attributes() {
            if old.attribute(key) != Some(value.as_str()) {
                old.set_attribute(key, value.clone())?;
            }
        }
        Ok(())
    }

    async fn delete(&self, entity: &mut Entity, _ctx: &Context) -> Result<()> {
        let id = Self::core_id(entity)?;
        self.driver.delete_volume(id).await?;
        tracing::info!("deleted volume {}", id);
        Ok(())
    }
}

#[async_trait]
impl ActionHandler for StorageBackend {
    async fn action(&self, entity: &mut Entity, action: &Category, _ctx: &Context) -> Result<()> {
        let infra = catalog::infra();
        let id = Self::core_id(entity)?.to_string();

        if *action == infra.storage_online {
            // No orchestrator operation backs the online/offline flip; the
            // projection is adjusted and re-derived on the next retrieve.
            entity.write_attribute("storage.state", LifecycleState::Active.as_str())?;
            entity.actions = infra.volume_verbs().running;
        } else if *action == infra.storage_offline {
            entity.write_attribute("storage.state", LifecycleState::Inactive.as_str())?;
            entity.actions = infra.volume_verbs().stopped;
        } else if *action == infra.storage_backup {
            let name = format!(
                "{}-backup-{}",
                entity.attribute(ATTR_TITLE).unwrap_or("volume"),
                uuid::Uuid::new_v4()
            );
            self.driver.snapshot_volume(&id, &name).await?;
        } else if *action == infra.storage_snapshot {
            let name = entity
                .attribute("storage.snapshot.name")
                .ok_or_else(|| {
                    Error::bad_request("storage.snapshot.name must be set for this verb")
                })?
                .to_string();
            self.driver.snapshot_volume(&id, &name).await?;
        } else if *action == infra.storage_resize {
            return Err(Error::bad_request(
                "the orchestrator does not support resizing volumes",
            ));
        } else {
            return Err(Error::bad_request(format!(
                "verb {} does not apply to volumes",
                action
            )));
        }
        tracing::info!("acknowledged {} on volume {}", action.term(), id);
        Ok(())
    }
}

/// Kind handler for volume attachment links. Creating the link performs the
/// attach, deleting it detaches.
pub struct StorageLinkBackend {
    driver: Arc<dyn Orchestrator>,
}

impl StorageLinkBackend {
    pub fn new(driver: Arc<dyn Orchestrator>) -> Self {
        Self { driver }
    }

    fn endpoints(entity: &Entity) -> Result<(String, String)> {
        let rel = entity
            .rel()
            .ok_or_else(|| Error::bad_request("a volume attachment must be a link"))?;
        Ok((
            core_of(&rel.source).to_string(),
            core_of(&rel.target).to_string(),
        ))
    }
}

#[async_trait]
impl KindHandler for StorageLinkBackend {
    async fn create(&self, entity: &mut Entity, _ctx: &Context) -> Result<()> {
        let (instance, volume) = Self::endpoints(entity)?;
        let mountpoint = entity
            .attribute("storagelink.mountpoint")
            .ok_or_else(|| {
                Error::bad_request("storagelink.mountpoint must be set to attach a volume")
            })?
            .to_string();

        self.driver
            .attach_volume(&instance, &volume, &mountpoint)
            .await?;
        entity.write_attribute("storagelink.state", "active")?;
        tracing::info!(
            "attached volume {} to instance {} at {}",
            volume,
            instance,
            mountpoint
        );
        Ok(())
    }

    async fn delete(&self, entity: &mut Entity, _ctx: &Context) -> Result<()> {
        let (_, volume) = Self::endpoints(entity)?;
        self.driver.detach_volume(&volume).await?;
        tracing::info!("detached volume {}", volume);
        Ok(())
    }
}
