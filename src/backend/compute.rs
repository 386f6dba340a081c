//! Compute backend
//!
//! Translates compute lifecycle operations into orchestrator calls and keeps
//! the entity's projection in sync: the state attribute, the legal verb set,
//! the default network attachment and the SSH console link.

use std::sync::Arc;

use async_trait::async_trait;

use crate::backend::{ActionHandler, Context, KindHandler, MixinHandler};
use crate::catalog::{self, DEFAULT_NETWORK_ID};
use crate::error::{Error, Result};
use crate::links::{self, LinkTarget};
use crate::model::{Category, Entity, ATTR_CORE_ID, ATTR_TITLE};
use crate::orchestrator::{Instance, InstanceSpec, Orchestrator};
use crate::state::{self, LifecycleState};

pub struct ComputeBackend {
    driver: Arc<dyn Orchestrator>,
}

impl ComputeBackend {
    pub fn new(driver: Arc<dyn Orchestrator>) -> Self {
        Self { driver }
    }

    fn core_id(entity: &Entity) -> Result<&str> {
        entity
            .core_id()
            .ok_or_else(|| Error::bad_request("compute entity has no core id"))
    }

    /// Rewrite the projection from what the orchestrator reports.
    fn reconcile(&self, entity: &mut Entity, instance: &Instance) -> Result<()> {
        let infra = catalog::infra();
        let projection = state::project(
            &state::COMPUTE_STATES,
            &infra.compute_verbs(),
            &instance.state,
        );
        entity.write_attribute("compute.state", projection.state.as_str())?;
        if !instance.hostname.is_empty() {
            entity.write_attribute("compute.hostname", &instance.hostname)?;
        }
        if instance.vcpus > 0 {
            entity.write_attribute("compute.cores", instance.vcpus.to_string())?;
        }
        if instance.memory_mb > 0 {
            entity.write_attribute(
                "compute.memory",
                format!("{}", instance.memory_mb as f64 / 1024.0),
            )?;
        }
        entity.actions = projection.actions;
        Ok(())
    }

    /// A lifecycle transition was acknowledged but has not completed. Until
    /// the next retrieve observes a steady state, nothing is legal.
    fn mark_transitional(entity: &mut Entity) -> Result<()> {
        entity.write_attribute("compute.state", LifecycleState::Inactive.as_str())?;
        entity.actions.clear();
        Ok(())
    }

    /// Maintain the instance's default network attachment and SSH console
    /// link from its first reported adapter.
    async fn refresh_links(&self, entity: &mut Entity, ctx: &Context) -> Result<()> {
        let infra = catalog::infra();
        let id = Self::core_id(entity)?.to_string();
        let adapters = self.driver.instance_adapters(&id).await?;
        let Some(adapter) = adapters.first() else {
            return Ok(());
        };

        let network_target = LinkTarget::new(infra.network.clone(), DEFAULT_NETWORK_ID)
            .with_attribute("network.label", "default")
            .with_attribute("network.state", "up")
            .with_attribute("network.allocation", &adapter.allocation);
        links::upsert(
            ctx.registry(),
            entity,
            infra.network_interface.clone(),
            network_target,
            ctx.tenant(),
            || {
                vec![
                    ("networkinterface.address".into(), adapter.address.clone()),
                    ("networkinterface.gateway".into(), adapter.gateway.clone()),
                    (
                        "networkinterface.allocation".into(),
                        adapter.allocation.clone(),
                    ),
                    ("networkinterface.mac".into(), adapter.mac.clone()),
                    ("networkinterface.state".into(), "active".into()),
                ]
            },
        )?;

        if !adapter.address.is_empty() {
            let console_target =
                LinkTarget::new(infra.ssh_console.clone(), format!("{}-ssh", id))
                    .with_attribute("console.ssh.uri", format!("ssh://{}", adapter.address));
            links::upsert(
                ctx.registry(),
                entity,
                infra.console_link.clone(),
                console_target,
                ctx.tenant(),
                Vec::new,
            )?;
        }
        Ok(())
    }
}

/// Split the entity's mixin set into the template and group terms relevant to
/// provisioning. At most one sizing profile and one image may be present.
fn provisioning_mixins(entity: &Entity) -> Result<(Option<String>, Option<String>, Vec<String>)> {
    let infra = catalog::infra();
    let mut flavor = None;
    let mut image = None;
    let mut groups = Vec::new();
    for mixin in entity.mixins() {
        // The bases themselves carry no provisioning payload.
        if *mixin == infra.flavor_template
            || *mixin == infra.os_template
            || *mixin == infra.security_group
        {
            continue;
        }
        if mixin.satisfies(&infra.flavor_template) {
            if flavor.replace(mixin.term().to_string()).is_some() {
                return Err(Error::bad_request(
                    "more than one sizing profile mixin supplied",
                ));
            }
        } else if mixin.satisfies(&infra.os_template) {
            if image.replace(mixin.term().to_string()).is_some() {
                return Err(Error::bad_request("more than one image mixin supplied"));
            }
        } else if mixin.satisfies(&infra.security_group) {
            groups.push(mixin.term().to_string());
        }
    }
    Ok((flavor, image, groups))
}

#[async_trait]
impl KindHandler for ComputeBackend {
    async fn create(&self, entity: &mut Entity, _ctx: &Context) -> Result<()> {
        let (flavor, image, groups) = provisioning_mixins(entity)?;
        let image = image
            .ok_or_else(|| Error::bad_request("an image mixin is required to create an instance"))?;
        if flavor.is_none() {
            tracing::warn!("no sizing profile supplied, orchestrator default applies");
        }

        let name = entity
            .attribute(ATTR_TITLE)
            .unwrap_or("stratus-instance")
            .to_string();
        let mut spec = InstanceSpec::new(name, image);
        spec.flavor = flavor;
        spec.security_groups = if groups.is_empty() {
            vec!["default".to_string()]
        } else {
            groups
        };

        let instances = self.driver.create_instances(spec).await?;
        let instance = instances
            .first()
            .ok_or_else(|| Error::upstream("orchestrator returned no instances"))?;
        entity.write_attribute(ATTR_CORE_ID, &instance.id)?;
        tracing::info!("created instance {}", instance.id);
        self.reconcile(entity, instance)
    }

    async fn retrieve(&self, entity: &mut Entity, ctx: &Context) -> Result<()> {
        let id = Self::core_id(entity)?.to_string();
        let instance = self.driver.instance(&id).await?;
        self.reconcile(entity, &instance)?;
        self.refresh_links(entity, ctx).await
    }

    async fn update(&self, old: &mut Entity, new: &Entity, _ctx: &Context) -> Result<()> {
        // Template swaps arrive as mixin changes and are handled by the
        // template handler; the kind hook merges attribute changes.
        for (key, value) in new.attributes() {
            if old.attribute(key) != Some(value.as_str()) {
                old.set_attribute(key, value.clone())?;
            }
        }
        Ok(())
    }

    async fn delete(&self, entity: &mut Entity, _ctx: &Context) -> Result<()> {
        let id = Self::core_id(entity)?;
        self.driver.delete_instance(id).await?;
        tracing::info!("deleted instance {}", id);
        Ok(())
    }
}

#[async_trait]
impl ActionHandler for ComputeBackend {
    async fn action(&self, entity: &mut Entity, action: &Category, _ctx: &Context) -> Result<()> {
        let infra = catalog::infra();
        let id = Self::core_id(entity)?.to_string();

        if *action == infra.start {
            self.driver.start_instance(&id).await?;
        } else if *action == infra.stop {
            self.driver.stop_instance(&id).await?;
        } else if *action == infra.suspend {
            self.driver.suspend_instance(&id).await?;
        } else if *action == infra.restart {
            // Absent or graceful/warm means a soft reboot; only an explicit
            // cold request power-cycles.
            let hard = match entity.attribute("compute.restart.method") {
                None | Some("graceful") | Some("warm") => false,
                Some("cold") => true,
                Some(other) => {
                    return Err(Error::bad_request(format!(
                        "unknown restart method {:?}",
                        other
                    )))
                }
            };
            self.driver.restart_instance(&id, hard).await?;
        } else if *action == infra.change_password {
            let password = entity
                .attribute("compute.credentials.password")
                .ok_or_else(|| {
                    Error::bad_request("compute.credentials.password must be set for this verb")
                })?
                .to_string();
            self.driver.set_admin_password(&id, &password).await?;
        } else if *action == infra.snapshot_compute {
            let name = entity
                .attribute("compute.snapshot.name")
                .ok_or_else(|| {
                    Error::bad_request("compute.snapshot.name must be set for this verb")
                })?
                .to_string();
            self.driver.snapshot_instance(&id, &name).await?;
        } else {
            return Err(Error::bad_request(format!(
                "verb {} does not apply to compute instances",
                action
            )));
        }

        tracing::info!("acknowledged {} on instance {}", action.term(), id);
        Self::mark_transitional(entity)
    }
}

/// Mixin handler for sizing profile and image templates. At creation time the
/// templates are consumed by [`ComputeBackend::create`]; attached to a live
/// instance they trigger a resize or rebuild. Detaching a template on its own
/// does nothing remote, the swap happens when the replacement is attached.
pub struct TemplateHandler {
    driver: Arc<dyn Orchestrator>,
}

impl TemplateHandler {
    pub fn new(driver: Arc<dyn Orchestrator>) -> Self {
        Self { driver }
    }
}

#[async_trait]
impl MixinHandler for TemplateHandler {
    async fn create(&self, entity: &mut Entity, mixin: &Category, _ctx: &Context) -> Result<()> {
        let infra = catalog::infra();
        if !entity.kind().satisfies(&infra.compute) {
            return Err(Error::bad_request(format!(
                "template mixin {} applies to compute instances only",
                mixin
            )));
        }
        if entity.identifier().is_empty() {
            // Creation in flight; the create hook already consumed the mixin.
            return Ok(());
        }

        let id = entity
            .core_id()
            .ok_or_else(|| Error::bad_request("compute entity has no core id"))?
            .to_string();
        let family = if mixin.satisfies(&infra.flavor_template) {
            self.driver.resize_instance(&id, mixin.term()).await?;
            tracing::info!("resizing instance {} to {}", id, mixin.term());
            &infra.flavor_template
        } else {
            self.driver.rebuild_instance(&id, mixin.term()).await?;
            tracing::info!("rebuilding instance {} from {}", id, mixin.term());
            &infra.os_template
        };

        // Replace the previous template of the same family.
        let stale: Vec<Category> = entity
            .mixins()
            .iter()
            .filter(|m| *m != mixin && m.satisfies(family))
            .cloned()
            .collect();
        for m in stale {
            entity.detach_mixin(&m);
        }
        ComputeBackend::mark_transitional(entity)
    }
}
