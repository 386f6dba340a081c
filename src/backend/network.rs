//! Network backend
//!
//! Networks themselves are orchestrator-managed: they cannot be created or
//! deleted through the model, only observed. What tenants do control is
//! public addressing, via the floating-address mixin on a network interface
//! link, and security group membership, via group mixins on an instance.

use std::sync::Arc;

use async_trait::async_trait;

use crate::backend::{core_of, ActionHandler, Context, KindHandler, MixinHandler};
use crate::catalog;
use crate::error::{Error, Result};
use crate::model::{Category, Entity};
use crate::orchestrator::Orchestrator;
use crate::state;

pub struct NetworkBackend {
    driver: Arc<dyn Orchestrator>,
}

impl NetworkBackend {
    pub fn new(driver: Arc<dyn Orchestrator>) -> Self {
        Self { driver }
    }
}

#[async_trait]
impl KindHandler for NetworkBackend {
    async fn create(&self, _entity: &mut Entity, _ctx: &Context) -> Result<()> {
        Err(Error::bad_request(
            "networks are provisioned by the orchestrator and cannot be created here",
        ))
    }

    async fn retrieve(&self, entity: &mut Entity, _ctx: &Context) -> Result<()> {
        let infra = catalog::infra();
        let networks = self.driver.networks().await?;
        // The default network stands for whatever single network the
        // orchestrator reports; other network resources resolve by id.
        let id = core_of(entity.identifier());
        let reported = if id == catalog::DEFAULT_NETWORK_ID {
            networks.first()
        } else {
            networks.iter().find(|n| n.id == id)
        }
        .ok_or_else(|| Error::not_found(format!("network {}", id)))?;

        let projection = state::project(
            &state::NETWORK_STATES,
            &infra.network_verbs(),
            &reported.state,
        );
        entity.write_attribute("network.label", &reported.label)?;
        entity.write_attribute("network.address", &reported.cidr)?;
        entity.write_attribute("network.gateway", &reported.gateway)?;
        entity.write_attribute("network.state", projection.state.as_str())?;
        entity.actions = projection.actions;
        Ok(())
    }

    async fn update(&self, _old: &mut Entity, _new: &Entity, _ctx: &Context) -> Result<()> {
        Err(Error::bad_request("networks are read-only"))
    }

    async fn delete(&self, _entity: &mut Entity, _ctx: &Context) -> Result<()> {
        Err(Error::bad_request(
            "networks are provisioned by the orchestrator and cannot be deleted here",
        ))
    }
}

#[async_trait]
impl ActionHandler for NetworkBackend {
    async fn action(&self, _entity: &mut Entity, action: &Category, _ctx: &Context) -> Result<()> {
        // Up/down are part of the vocabulary but no orchestrator operation
        // backs them.
        Err(Error::bad_request(format!(
            "network state is managed by the orchestrator, {} is not available",
            action.term()
        )))
    }
}

/// Kind handler for network interface links. The links are derived from
/// orchestrator truth during compute retrieve; clients manipulate them only
/// through mixins.
pub struct NetworkInterfaceBackend;

#[async_trait]
impl KindHandler for NetworkInterfaceBackend {
    async fn create(&self, _entity: &mut Entity, _ctx: &Context) -> Result<()> {
        Err(Error::bad_request(
            "network interfaces are derived from the instance and cannot be created directly",
        ))
    }

    // update and delete stay no-ops: mixin hooks carry the behavior.
}

/// Attaching this mixin to a network interface link allocates a floating
/// address and associates it with the link's instance; detaching reverses
/// both steps.
pub struct PublicAddressMixin {
    driver: Arc<dyn Orchestrator>,
}

impl PublicAddressMixin {
    pub fn new(driver: Arc<dyn Orchestrator>) -> Self {
        Self { driver }
    }

    fn instance_of(entity: &Entity) -> Result<String> {
        let rel = entity
            .rel()
            .ok_or_else(|| Error::bad_request("public addressing applies to links only"))?;
        Ok(core_of(&rel.source).to_string())
    }
}

#[async_trait]
impl MixinHandler for PublicAddressMixin {
    async fn create(&self, entity: &mut Entity, mixin: &Category, _ctx: &Context) -> Result<()> {
        if !mixin.applies_to(entity.kind()) {
            return Err(Error::bad_request(format!(
                "mixin {} cannot be applied to {}",
                mixin,
                entity.kind()
            )));
        }
        let instance = Self::instance_of(entity)?;
        let pool = entity
            .attribute("networkinterface.pool")
            .map(str::to_string);

        let allocated = self.driver.allocate_address(pool.as_deref()).await?;
        if let Err(err) = self
            .driver
            .associate_address(&instance, &allocated.address)
            .await
        {
            // Do not leak the allocation when association fails.
            if let Err(release_err) = self.driver.release_address(&allocated.address).await {
                tracing::error!(
                    "failed to release {} after association error: {}",
                    allocated.address,
                    release_err
                );
            }
            return Err(err);
        }

        entity.write_attribute("networkinterface.address", &allocated.address)?;
        entity.write_attribute("networkinterface.pool", &allocated.pool)?;
        entity.write_attribute("networkinterface.allocation", "static")?;
        tracing::info!("associated {} with instance {}", allocated.address, instance);
        Ok(())
    }

    async fn delete(&self, entity: &mut Entity, _mixin: &Category, _ctx: &Context) -> Result<()> {
        let Some(address) = entity
            .attribute("networkinterface.address")
            .map(str::to_string)
        else {
            return Ok(());
        };
        self.driver.disassociate_address(&address).await?;
        self.driver.release_address(&address).await?;
        entity.write_attribute("networkinterface.address", "")?;
        entity.write_attribute("networkinterface.allocation", "dhcp")?;
        tracing::info!("released floating address {}", address);
        Ok(())
    }
}

/// Mixin handler for concrete security groups. Membership is consumed at
/// provisioning time by the compute create hook, so attach and detach only
/// validate applicability.
pub struct SecurityGroupHandler;

#[async_trait]
impl MixinHandler for SecurityGroupHandler {
    async fn create(&self, entity: &mut Entity, mixin: &Category, _ctx: &Context) -> Result<()> {
        let infra = catalog::infra();
        if !entity.kind().satisfies(&infra.compute) {
            return Err(Error::bad_request(format!(
                "security group {} applies to compute instances only",
                mixin.term()
            )));
        }
        Ok(())
    }
}
