//! Built-in category vocabulary and catalog bootstrap
//!
//! The fixed vocabulary (kinds, verbs, mixin bases) is process-wide and
//! immutable, so it lives behind a [`OnceLock`] accessor. Everything the
//! orchestrator contributes at runtime (sizing profiles, images, security
//! groups) is registered as concrete mixins by [`refresh_templates`], which
//! leans on the registry's replace-on-reregister semantics to track catalog
//! drift.

use std::sync::{Arc, OnceLock};

use crate::backend::compute::{ComputeBackend, TemplateHandler};
use crate::backend::network::{
    NetworkBackend, NetworkInterfaceBackend, PublicAddressMixin, SecurityGroupHandler,
};
use crate::backend::storage::{StorageBackend, StorageLinkBackend};
use crate::backend::{Backend, Passive};
use crate::error::{Error, Result};
use crate::model::{Category, CategoryClass, Entity, Mutability, ATTR_CORE_ID, ATTR_TITLE};
use crate::orchestrator::Orchestrator;
use crate::registry::Registry;
use crate::state::{project, VerbSet, NETWORK_STATES};

// ===== scheme URLs =====

pub const SCHEME_INFRA: &str = "http://schemas.stratus.dev/infrastructure#";
pub const SCHEME_COMPUTE_ACTION: &str =
    "http://schemas.stratus.dev/infrastructure/compute/action#";
pub const SCHEME_NETWORK_ACTION: &str =
    "http://schemas.stratus.dev/infrastructure/network/action#";
pub const SCHEME_STORAGE_ACTION: &str =
    "http://schemas.stratus.dev/infrastructure/storage/action#";
/// Concrete sizing profiles reported by the orchestrator.
pub const SCHEME_FLAVOR_TEMPLATE: &str = "http://schemas.stratus.dev/template/flavor#";
/// Concrete bootable images reported by the orchestrator.
pub const SCHEME_OS_TEMPLATE: &str = "http://schemas.stratus.dev/template/os#";
/// Tenant-owned security groups.
pub const SCHEME_SECURITY_GROUP: &str = "http://schemas.stratus.dev/security/group#";

/// Core id of the shared default network resource.
pub const DEFAULT_NETWORK_ID: &str = "default-network";

/// The fixed category vocabulary.
pub struct Infra {
    // base kinds
    pub resource: Category,
    pub link: Category,
    // kinds
    pub compute: Category,
    pub network: Category,
    pub storage: Category,
    pub network_interface: Category,
    pub storage_link: Category,
    pub console_link: Category,
    pub ssh_console: Category,
    pub vnc_console: Category,
    // compute verbs
    pub start: Category,
    pub stop: Category,
    pub restart: Category,
    pub suspend: Category,
    pub change_password: Category,
    pub snapshot_compute: Category,
    // network verbs
    pub network_up: Category,
    pub network_down: Category,
    // storage verbs
    pub storage_online: Category,
    pub storage_offline: Category,
    pub storage_backup: Category,
    pub storage_snapshot: Category,
    pub storage_resize: Category,
    // mixin bases
    pub flavor_template: Category,
    pub os_template: Category,
    pub security_group: Category,
    // concrete mixins
    pub public_address: Category,
}

fn kind(term: &'static str, location: &str) -> Category {
    Category::builtin(SCHEME_INFRA, term, CategoryClass::Kind)
        .with_location(location)
        .with_attribute(ATTR_CORE_ID, Mutability::Immutable)
        .with_attribute(ATTR_TITLE, Mutability::Mutable)
}

fn verb(scheme: &'static str, term: &'static str, title: &str) -> Category {
    Category::builtin(scheme, term, CategoryClass::Action).with_title(title)
}

impl Infra {
    fn build() -> Self {
        let resource = kind("resource", "/").with_title("Base resource type");
        let link = kind("link", "/link/").with_title("Base link type");

        let compute = kind("compute", "/compute/")
            .with_title("Virtual machine")
            .with_related(resource.clone())
            .with_attribute("compute.hostname", Mutability::Mutable)
            .with_attribute("compute.architecture", Mutability::Immutable)
            .with_attribute("compute.cores", Mutability::Mutable)
            .with_attribute("compute.memory", Mutability::Mutable)
            .with_attribute("compute.state", Mutability::Immutable)
            .with_attribute("compute.restart.method", Mutability::Mutable)
            .with_attribute("compute.credentials.password", Mutability::Mutable)
            .with_attribute("compute.snapshot.name", Mutability::Mutable);

        let network = kind("network", "/network/")
            .with_title("L2/L3 network")
            .with_related(resource.clone())
            .with_attribute("network.label", Mutability::Mutable)
            .with_attribute("network.address", Mutability::Mutable)
            .with_attribute("network.gateway", Mutability::Mutable)
            .with_attribute("network.allocation", Mutability::Mutable)
            .with_attribute("network.state", Mutability::Immutable);

        let storage = kind("storage", "/storage/")
            .with_title("Block storage volume")
            .with_related(resource.clone())
            .with_attribute("storage.size", Mutability::Mutable)
            .with_attribute("storage.state", Mutability::Immutable)
            .with_attribute("storage.snapshot.name", Mutability::Mutable);

        let network_interface = kind("networkinterface", "/link/networkinterface/")
            .with_title("Network adapter")
            .with_related(link.clone())
            .with_attribute("networkinterface.mac", Mutability::Immutable)
            .with_attribute("networkinterface.address", Mutability::Mutable)
            .with_attribute("networkinterface.gateway", Mutability::Mutable)
            .with_attribute("networkinterface.allocation", Mutability::Mutable)
            .with_attribute("networkinterface.pool", Mutability::Mutable)
            .with_attribute("networkinterface.state", Mutability::Immutable);

        let storage_link = kind("storagelink", "/link/storagelink/")
            .with_title("Volume attachment")
            .with_related(link.clone())
            .with_attribute("storagelink.mountpoint", Mutability::Mutable)
            .with_attribute("storagelink.state", Mutability::Immutable);

        let console_link = kind("consolelink", "/link/console/")
            .with_title("Console access")
            .with_related(link.clone());

        let ssh_console = kind("ssh-console", "/compute/console/ssh/")
            .with_title("SSH console")
            .with_related(resource.clone())
            .with_attribute("console.ssh.uri", Mutability::Immutable);

        let vnc_console = kind("vnc-console", "/compute/console/vnc/")
            .with_title("VNC console")
            .with_related(resource.clone())
            .with_attribute("console.vnc.uri", Mutability::Immutable);

        Self {
            resource,
            link,
            compute,
            network,
            storage,
            network_interface,
            storage_link,
            console_link,
            ssh_console,
            vnc_console,
            start: verb(SCHEME_COMPUTE_ACTION, "start", "Start instance"),
            stop: verb(SCHEME_COMPUTE_ACTION, "stop", "Stop instance"),
            restart: verb(SCHEME_COMPUTE_ACTION, "restart", "Restart instance"),
            suspend: verb(SCHEME_COMPUTE_ACTION, "suspend", "Suspend instance"),
            change_password: verb(
                SCHEME_COMPUTE_ACTION,
                "change-password",
                "Change admin password",
            ),
            snapshot_compute: verb(SCHEME_COMPUTE_ACTION, "snapshot", "Snapshot instance"),
            network_up: verb(SCHEME_NETWORK_ACTION, "up", "Bring network up"),
            network_down: verb(SCHEME_NETWORK_ACTION, "down", "Take network down"),
            storage_online: verb(SCHEME_STORAGE_ACTION, "online", "Bring volume online"),
            storage_offline: verb(SCHEME_STORAGE_ACTION, "offline", "Take volume offline"),
            storage_backup: verb(SCHEME_STORAGE_ACTION, "backup", "Back volume up"),
            storage_snapshot: verb(SCHEME_STORAGE_ACTION, "snapshot", "Snapshot volume"),
            storage_resize: verb(SCHEME_STORAGE_ACTION, "resize", "Resize volume"),
            flavor_template: Category::builtin(SCHEME_INFRA, "flavor-template", CategoryClass::Mixin)
                .with_title("Sizing profile base"),
            os_template: Category::builtin(SCHEME_INFRA, "os-template", CategoryClass::Mixin)
                .with_title("Bootable image base"),
            security_group: Category::builtin(SCHEME_INFRA, "security-group", CategoryClass::Mixin)
                .with_title("Security group base"),
            public_address: Category::builtin(SCHEME_INFRA, "public-address", CategoryClass::Mixin)
                .with_title("Floating public address"),
        }
    }

    /// Verbs a compute instance offers per steady state.
    pub fn compute_verbs(&self) -> VerbSet {
        VerbSet {
            running: vec![
                self.stop.clone(),
                self.suspend.clone(),
                self.restart.clone(),
                self.change_password.clone(),
                self.snapshot_compute.clone(),
            ],
            stopped: vec![self.start.clone()],
            suspended: vec![self.start.clone()],
        }
    }

    /// Verbs a network offers per steady state.
    pub fn network_verbs(&self) -> VerbSet {
        VerbSet {
            running: vec![self.network_down.clone()],
            stopped: vec![self.network_up.clone()],
            suspended: Vec::new(),
        }
    }

    /// Verbs a volume offers per steady state.
    pub fn volume_verbs(&self) -> VerbSet {
        VerbSet {
            running: vec![
                self.storage_offline.clone(),
                self.storage_backup.clone(),
                self.storage_snapshot.clone(),
                self.storage_resize.clone(),
            ],
            stopped: vec![self.storage_online.clone()],
            suspended: Vec::new(),
        }
    }
}

/// The process-wide vocabulary instance. The `public_address` mixin needs the
/// interface kind in its related set, which is why it is patched in here
/// rather than in [`Infra::build`].
pub fn infra() -> &'static Infra {
    static INFRA: OnceLock<Infra> = OnceLock::new();
    INFRA.get_or_init(|| {
        let mut infra = Infra::build();
        infra.public_address = infra
            .public_address
            .clone()
            .with_related(infra.network_interface.clone());
        infra
    })
}

/// Register the fixed vocabulary plus the shared default network resource.
/// Runs once at startup with a privileged scope; safe to run again (bindings
/// are replaced, the default network is kept).
pub async fn bootstrap(registry: &Arc<Registry>, driver: Arc<dyn Orchestrator>) -> Result<()> {
    let infra = infra();

    let compute = Arc::new(ComputeBackend::new(driver.clone()));
    let network = Arc::new(NetworkBackend::new(driver.clone()));
    let storage = Arc::new(StorageBackend::new(driver.clone()));
    let templates = Arc::new(TemplateHandler::new(driver.clone()));
    let passive = Arc::new(Passive);

    registry.register(infra.resource.clone(), Backend::for_kind(passive.clone()), None)?;
    registry.register(infra.link.clone(), Backend::for_kind(passive.clone()), None)?;

    registry.register(
        infra.compute.clone(),
        Backend::for_kind(compute.clone()).with_action(compute.clone()),
        None,
    )?;
    for action in [
        &infra.start,
        &infra.stop,
        &infra.restart,
        &infra.suspend,
        &infra.change_password,
        &infra.snapshot_compute,
    ] {
        registry.register(action.clone(), Backend::for_action(compute.clone()), None)?;
    }

    registry.register(
        infra.network.clone(),
        Backend::for_kind(network.clone()).with_action(network.clone()),
        None,
    )?;
    for action in [&infra.network_up, &infra.network_down] {
        registry.register(action.clone(), Backend::for_action(network.clone()), None)?;
    }
    registry.register(
        infra.network_interface.clone(),
        Backend::for_kind(Arc::new(NetworkInterfaceBackend)),
        None,
    )?;
    registry.register(
        infra.public_address.clone(),
        Backend::for_mixin(Arc::new(PublicAddressMixin::new(driver.clone()))),
        None,
    )?;

    registry.register(
        infra.storage.clone(),
        Backend::for_kind(storage.clone()).with_action(storage.clone()),
        None,
    )?;
    for action in [
        &infra.storage_online,
        &infra.storage_offline,
        &infra.storage_backup,
        &infra.storage_snapshot,
        &infra.storage_resize,
    ] {
        registry.register(action.clone(), Backend::for_action(storage.clone()), None)?;
    }
    registry.register(
        infra.storage_link.clone(),
        Backend::for_kind(Arc::new(StorageLinkBackend::new(driver.clone()))),
        None,
    )?;

    registry.register(infra.console_link.clone(), Backend::for_kind(passive.clone()), None)?;
    registry.register(infra.ssh_console.clone(), Backend::for_kind(passive.clone()), None)?;
    registry.register(infra.vnc_console.clone(), Backend::for_kind(passive.clone()), None)?;

    registry.register(
        infra.flavor_template.clone(),
        Backend::for_mixin(templates.clone()),
        None,
    )?;
    registry.register(
        infra.os_template.clone(),
        Backend::for_mixin(templates.clone()),
        None,
    )?;
    registry.register(
        infra.security_group.clone(),
        Backend::for_mixin(Arc::new(SecurityGroupHandler)),
        None,
    )?;

    seed_default_network(registry, driver.as_ref()).await
}

/// Register the shared, ownerless default network resource backends link
/// instances to. Instances attach to whatever network the orchestrator puts
/// them on; this resource stands for it in the model.
async fn seed_default_network(registry: &Arc<Registry>, driver: &dyn Orchestrator) -> Result<()> {
    let infra = infra();
    let identifier = format!("{}{}", infra.network.location(), DEFAULT_NETWORK_ID);
    match registry.get_resource(&identifier, None) {
        Ok(_) => return Ok(()),
        Err(Error::NotFound(_)) => {}
        Err(err) => return Err(err),
    }

    let networks = driver.networks().await?;
    let Some(reported) = networks.first() else {
        tracing::warn!("orchestrator reports no networks, default network not seeded");
        return Ok(());
    };
    if networks.len() > 1 {
        tracing::warn!(
            "orchestrator reports {} networks, seeding only {}",
            networks.len(),
            reported.id
        );
    }

    let mut entity = Entity::resource(infra.network.clone())?;
    entity.write_attribute(ATTR_CORE_ID, DEFAULT_NETWORK_ID)?;
    entity.write_attribute(ATTR_TITLE, "Default network")?;
    entity.write_attribute("network.label", &reported.label)?;
    entity.write_attribute("network.address", &reported.cidr)?;
    entity.write_attribute("network.gateway", &reported.gateway)?;
    entity.write_attribute("network.allocation", "dhcp")?;
    let projection = project(&NETWORK_STATES, &infra.network_verbs(), &reported.state);
    entity.write_attribute("network.state", projection.state.as_str())?;
    entity.actions = projection.actions;
    let id = registry.add_resource(entity, None)?;
    tracing::info!("seeded default network as {}", id);
    Ok(())
}

/// Refresh the orchestrator-derived part of the catalog for one tenant:
/// sizing profiles and images become shared template mixins, security groups
/// become mixins owned by the tenant. Registration replaces stale bindings.
pub async fn refresh_templates(
    registry: &Arc<Registry>,
    driver: Arc<dyn Orchestrator>,
    tenant: &str,
) -> Result<()> {
    let infra = infra();
    let templates = Arc::new(TemplateHandler::new(driver.clone()));

    let (flavors, images, groups) = futures::try_join!(
        driver.flavors(),
        driver.images(),
        driver.security_groups(tenant),
    )?;

    for flavor in &flavors {
        let mixin = Category::mixin(SCHEME_FLAVOR_TEMPLATE, &flavor.name)?
            .with_title(format!(
                "{} vCPUs, {} MB RAM, {} GB disk",
                flavor.vcpus,
                flavor.memory_mb,
                flavor.root_gb + flavor.ephemeral_gb
            ))
            .with_related(infra.flavor_template.clone())
            .with_location(format!("/template/flavor/{}/", flavor.name));
        registry.register(mixin, Backend::for_mixin(templates.clone()), None)?;
    }

    // Kernel and ramdisk images are boot plumbing, not something an instance
    // is created from.
    for image in images.iter().filter(|i| i.format == "machine") {
        let mixin = Category::mixin(SCHEME_OS_TEMPLATE, &image.id)?
            .with_title(&image.name)
            .with_related(infra.os_template.clone())
            .with_location(format!("/template/os/{}/", image.id));
        registry.register(mixin, Backend::for_mixin(templates.clone()), None)?;
    }

    for group in &groups {
        if group.name.contains(char::is_whitespace) {
            return Err(Error::bad_request(format!(
                "security group name {:?} contains whitespace and cannot form a category term",
                group.name
            )));
        }
        let mixin = Category::mixin(SCHEME_SECURITY_GROUP, &group.name)?
            .with_title(&group.name)
            .with_related(infra.security_group.clone())
            .with_location(format!("/security/group/{}/", group.name));
        registry.register(
            mixin,
            Backend::for_mixin(Arc::new(SecurityGroupHandler)),
            Some(tenant),
        )?;
    }

    tracing::info!(
        "refreshed templates for {}: {} flavors, {} images, {} security groups",
        tenant,
        flavors.len(),
        images.len(),
        groups.len()
    );
    Ok(())
}
