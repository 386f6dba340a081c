//! End-to-end dispatch tests against a scripted in-memory orchestrator.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use stratus::catalog::{self, SCHEME_FLAVOR_TEMPLATE, SCHEME_OS_TEMPLATE, SCHEME_SECURITY_GROUP};
use stratus::model::{ATTR_CORE_ID, ATTR_TITLE};
use stratus::orchestrator::{
    Address, Flavor, Image, Instance, InstanceSpec, Network, NetworkAdapter, Orchestrator,
    SecurityGroup, Volume,
};
use stratus::{Category, Dispatcher, Entity, Error, Registry, Result};

const TENANT: &str = "tenant-a";

#[derive(Default)]
struct StubOrchestrator {
    calls: Mutex<Vec<String>>,
    instance_state: Mutex<String>,
    volume_status: Mutex<String>,
    group_names: Vec<String>,
    quota_on_create: AtomicBool,
}

impl StubOrchestrator {
    fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            instance_state: Mutex::new("building".to_string()),
            volume_status: Mutex::new("creating".to_string()),
            group_names: vec!["default".to_string(), "web".to_string()],
            quota_on_create: AtomicBool::new(false),
        }
    }

    fn log(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn set_instance_state(&self, state: &str) {
        *self.instance_state.lock().unwrap() = state.to_string();
    }

    fn set_volume_status(&self, status: &str) {
        *self.volume_status.lock().unwrap() = status.to_string();
    }
}

#[async_trait]
impl Orchestrator for StubOrchestrator {
    async fn create_instances(&self, spec: InstanceSpec) -> Result<Vec<Instance>> {
        self.log(format!(
            "create_instances image={} flavor={:?} groups={:?}",
            spec.image, spec.flavor, spec.security_groups
        ));
        if self.quota_on_create.load(Ordering::SeqCst) {
            return Err(Error::QuotaExceeded {
                message: "instance quota exhausted".to_string(),
                retry_after: Some(0),
            });
        }
        Ok(vec![Instance {
            id: "vm-1".to_string(),
            name: "web".to_string(),
            hostname: "web-1".to_string(),
            state: self.instance_state.lock().unwrap().clone(),
            vcpus: 1,
            memory_mb: 2048,
            flavor: spec.flavor.unwrap_or_default(),
            image: spec.image,
        }])
    }

    async fn instance(&self, id: &str) -> Result<Instance> {
        self.log(format!("instance {}", id));
        Ok(Instance {
            id: id.to_string(),
            name: "web".to_string(),
            hostname: "web-1".to_string(),
            state: self.instance_state.lock().unwrap().clone(),
            vcpus: 1,
            memory_mb: 2048,
            flavor: "m1.small".to_string(),
            image: "img-1".to_string(),
        })
    }

    async fn delete_instance(&self, id: &str) -> Result<()> {
        self.log(format!("delete_instance {}", id));
        Ok(())
    }

    async fn start_instance(&self, id: &str) -> Result<()> {
        self.log(format!("start {}", id));
        Ok(())
    }

    async fn stop_instance(&self, id: &str) -> Result<()> {
        self.log(format!("stop {}", id));
        Ok(())
    }

    async fn restart_instance(&self, id: &str, hard: bool) -> Result<()> {
        self.log(format!("restart {} hard={}", id, hard));
        Ok(())
    }

    async fn suspend_instance(&self, id: &str) -> Result<()> {
        self.log(format!("suspend {}", id));
        Ok(())
    }

    async fn resize_instance(&self, id: &str, flavor: &str) -> Result<()> {
        self.log(format!("resize {} {}", id, flavor));
        Ok(())
    }

    async fn rebuild_instance(&self, id: &str, image: &str) -> Result<()> {
        self.log(format!("rebuild {} {}", id, image));
        Ok(())
    }

    async fn set_admin_password(&self, id: &str, _password: &str) -> Result<()> {
        self.log(format!("set_admin_password {}", id));
        Ok(())
    }

    async fn snapshot_instance(&self, id: &str, name: &str) -> Result<()> {
        self.log(format!("snapshot_instance {} {}", id, name));
        Ok(())
    }

    async fn instance_adapters(&self, id: &str) -> Result<Vec<NetworkAdapter>> {
        self.log(format!("instance_adapters {}", id));
        Ok(vec![NetworkAdapter {
            network_id: "net-1".to_string(),
            address: "10.0.0.5".to_string(),
            gateway: "10.0.0.1".to_string(),
            allocation: "dhcp".to_string(),
            mac: "aa:bb:cc:dd:ee:ff".to_string(),
        }])
    }

    async fn allocate_address(&self, pool: Option<&str>) -> Result<Address> {
        self.log(format!("allocate_address {:?}", pool));
        Ok(Address {
            address: "203.0.113.7".to_string(),
            pool: pool.unwrap_or("public").to_string(),
        })
    }

    async fn release_address(&self, address: &str) -> Result<()> {
        self.log(format!("release_address {}", address));
        Ok(())
    }

    async fn associate_address(&self, instance: &str, address: &str) -> Result<()> {
        self.log(format!("associate_address {} {}", instance, address));
        Ok(())
    }

    async fn disassociate_address(&self, address: &str) -> Result<()> {
        self.log(format!("disassociate_address {}", address));
        Ok(())
    }

    async fn address_pools(&self) -> Result<Vec<String>> {
        Ok(vec!["public".to_string()])
    }

    async fn networks(&self) -> Result<Vec<Network>> {
        Ok(vec![Network {
            id: "net-1".to_string(),
            label: "default".to_string(),
            cidr: "10.0.0.0/24".to_string(),
            gateway: "10.0.0.1".to_string(),
            state: "up".to_string(),
        }])
    }

    async fn create_volume(&self, size_gb: f64, name: &str) -> Result<Volume> {
        self.log(format!("create_volume {} {}", size_gb, name));
        Ok(Volume {
            id: "vol-1".to_string(),
            name: name.to_string(),
            size_gb,
            status: self.volume_status.lock().unwrap().clone(),
        })
    }

    async fn volume(&self, id: &str) -> Result<Volume> {
        self.log(format!("volume {}", id));
        Ok(Volume {
            id: id.to_string(),
            name: "data".to_string(),
            size_gb: 10.0,
            status: self.volume_status.lock().unwrap().clone(),
        })
    }

    async fn delete_volume(&self, id: &str) -> Result<()> {
        self.log(format!("delete_volume {}", id));
        Ok(())
    }

    async fn attach_volume(&self, instance: &str, volume: &str, mountpoint: &str) -> Result<()> {
        self.log(format!("attach_volume {} {} {}", instance, volume, mountpoint));
        Ok(())
    }

    async fn detach_volume(&self, volume: &str) -> Result<()> {
        self.log(format!("detach_volume {}", volume));
        Ok(())
    }

    async fn snapshot_volume(&self, volume: &str, name: &str) -> Result<()> {
        self.log(format!("snapshot_volume {} {}", volume, name));
        Ok(())
    }

    async fn images(&self) -> Result<Vec<Image>> {
        Ok(vec![
            Image {
                id: "img-1".to_string(),
                name: "Ubuntu 22.04".to_string(),
                format: "machine".to_string(),
            },
            Image {
                id: "krn-1".to_string(),
                name: "vmlinuz".to_string(),
                format: "kernel".to_string(),
            },
        ])
    }

    async fn flavors(&self) -> Result<Vec<Flavor>> {
        Ok(vec![
            Flavor {
                name: "m1.small".to_string(),
                vcpus: 1,
                memory_mb: 2048,
                root_gb: 20,
                ephemeral_gb: 0,
                swap_mb: 0,
            },
            Flavor {
                name: "m1.large".to_string(),
                vcpus: 4,
                memory_mb: 8192,
                root_gb: 80,
                ephemeral_gb: 40,
                swap_mb: 0,
            },
        ])
    }

    async fn security_groups(&self, _tenant: &str) -> Result<Vec<SecurityGroup>> {
        Ok(self
            .group_names
            .iter()
            .enumerate()
            .map(|(i, name)| SecurityGroup {
                id: format!("sg-{}", i),
                name: name.clone(),
            })
            .collect())
    }
}

async fn setup() -> (Arc<Registry>, Arc<StubOrchestrator>, Dispatcher) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
    let registry = Arc::new(Registry::new());
    let driver = Arc::new(StubOrchestrator::new());
    catalog::bootstrap(&registry, driver.clone()).await.unwrap();
    catalog::refresh_templates(&registry, driver.clone(), TENANT)
        .await
        .unwrap();
    let dispatcher = Dispatcher::new(registry.clone());
    (registry, driver, dispatcher)
}

fn find_mixin(registry: &Registry, scheme: &str, term: &str) -> Category {
    registry
        .visible_categories(Some(TENANT))
        .unwrap()
        .into_iter()
        .find(|c| c.scheme() == scheme && c.term() == term)
        .unwrap_or_else(|| panic!("{}{} not in catalog", scheme, term))
}

fn instance_request(registry: &Registry) -> Entity {
    let infra = catalog::infra();
    let mut vm = Entity::resource(infra.compute.clone()).unwrap();
    vm.set_attribute(ATTR_TITLE, "web").unwrap();
    vm.attach_mixin(find_mixin(registry, SCHEME_OS_TEMPLATE, "img-1"))
        .unwrap();
    vm.attach_mixin(find_mixin(registry, SCHEME_FLAVOR_TEMPLATE, "m1.small"))
        .unwrap();
    vm.attach_mixin(find_mixin(registry, SCHEME_SECURITY_GROUP, "web"))
        .unwrap();
    vm
}

#[tokio::test]
async fn instance_lifecycle() {
    let (registry, driver, dispatcher) = setup().await;

    // Create: the provisioning request is assembled from the mixins.
    let id = dispatcher
        .create(instance_request(&registry), Some(TENANT))
        .await
        .unwrap();
    assert_eq!(id, "/compute/vm-1");
    assert!(driver.calls().iter().any(|c| c
        == "create_instances image=img-1 flavor=Some(\"m1.small\") groups=[\"web\"]"));

    // Freshly created means in transition: inactive, nothing legal.
    let stored = registry.get_resource(&id, Some(TENANT)).unwrap();
    assert_eq!(stored.attribute("compute.state"), Some("inactive"));
    assert!(stored.actions.is_empty());

    // An illegal verb is rejected locally, before any orchestrator call.
    let infra = catalog::infra();
    let before = driver.calls().len();
    let err = dispatcher
        .action(&id, &infra.start, Some(TENANT))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Forbidden(_)));
    assert_eq!(driver.calls().len(), before);

    // Once the orchestrator reports a steady running state, retrieve projects
    // it and derives the running verb set.
    driver.set_instance_state("running");
    let vm = dispatcher.retrieve(&id, Some(TENANT)).await.unwrap();
    assert_eq!(vm.attribute("compute.state"), Some("active"));
    assert_eq!(vm.attribute("compute.hostname"), Some("web-1"));
    assert!(vm.action_is_legal(&infra.stop));
    assert!(vm.action_is_legal(&infra.suspend));
    assert!(vm.action_is_legal(&infra.restart));
    assert!(!vm.action_is_legal(&infra.start));

    // Retrieve materialized the default network attachment and the SSH
    // console link, and seeded links are registered resources.
    assert_eq!(vm.links.len(), 2);
    assert!(registry
        .get_resource("/network/default-network", Some(TENANT))
        .is_ok());
    let ssh = vm
        .links
        .iter()
        .find(|l| l.rel().unwrap().target_kind == infra.ssh_console)
        .unwrap();
    let console_id = ssh.rel().unwrap().target.clone();
    let console = registry.get_resource(&console_id, Some(TENANT)).unwrap();
    assert_eq!(console.attribute("console.ssh.uri"), Some("ssh://10.0.0.5"));

    // Retrieve is idempotent on the link set.
    let vm = dispatcher.retrieve(&id, Some(TENANT)).await.unwrap();
    assert_eq!(vm.links.len(), 2);

    // Stop is legal while running; it acknowledges and goes transitional.
    let vm = dispatcher
        .action(&id, &infra.stop, Some(TENANT))
        .await
        .unwrap();
    assert!(driver.calls().iter().any(|c| c == "stop vm-1"));
    assert_eq!(vm.attribute("compute.state"), Some("inactive"));
    assert!(vm.actions.is_empty());

    // The orchestrator settles on stopped: still inactive, but now with
    // start as the only legal verb.
    driver.set_instance_state("stopped");
    let vm = dispatcher.retrieve(&id, Some(TENANT)).await.unwrap();
    assert_eq!(vm.attribute("compute.state"), Some("inactive"));
    assert_eq!(vm.actions, vec![infra.start.clone()]);

    // Another tenant cannot see the instance.
    let err = dispatcher.retrieve(&id, Some("tenant-b")).await.unwrap_err();
    assert!(matches!(err, Error::Forbidden(_)));

    // Delete reaches the orchestrator and retires the identifier.
    dispatcher.delete(&id, Some(TENANT)).await.unwrap();
    assert!(driver.calls().iter().any(|c| c == "delete_instance vm-1"));
    let err = registry.get_resource(&id, Some(TENANT)).unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));

    // The instance's links and its private console target go with it; the
    // shared default network stays.
    for link in &vm.links {
        let err = registry
            .get_resource(link.identifier(), Some(TENANT))
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
    let err = registry
        .get_resource(&console_id, Some(TENANT))
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
    assert!(registry
        .get_resource("/network/default-network", Some(TENANT))
        .is_ok());

    // The identifier is never handed out again.
    let err = dispatcher
        .create(instance_request(&registry), Some(TENANT))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::BadRequest(_)));
}

#[tokio::test]
async fn create_without_image_is_rejected_locally() {
    let (registry, driver, dispatcher) = setup().await;
    let infra = catalog::infra();

    let mut vm = Entity::resource(infra.compute.clone()).unwrap();
    vm.attach_mixin(find_mixin(&registry, SCHEME_FLAVOR_TEMPLATE, "m1.small"))
        .unwrap();

    let before = driver.calls().len();
    let err = dispatcher.create(vm, Some(TENANT)).await.unwrap_err();
    assert!(matches!(err, Error::BadRequest(_)));
    assert_eq!(driver.calls().len(), before);
}

#[tokio::test]
async fn quota_errors_propagate_and_store_nothing() {
    let (registry, driver, dispatcher) = setup().await;
    driver.quota_on_create.store(true, Ordering::SeqCst);

    let err = dispatcher
        .create(instance_request(&registry), Some(TENANT))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::QuotaExceeded {
            retry_after: Some(0),
            ..
        }
    ));
    let ids = registry.resource_ids(Some(TENANT)).unwrap();
    assert!(!ids.iter().any(|id| id.starts_with("/compute/")));
}

#[tokio::test]
async fn flavor_swap_resizes_and_replaces_the_mixin() {
    let (registry, driver, dispatcher) = setup().await;
    let id = dispatcher
        .create(instance_request(&registry), Some(TENANT))
        .await
        .unwrap();

    let mut replacement = registry.get_resource(&id, Some(TENANT)).unwrap();
    replacement
        .attach_mixin(find_mixin(&registry, SCHEME_FLAVOR_TEMPLATE, "m1.large"))
        .unwrap();

    let updated = dispatcher
        .update(&id, &replacement, Some(TENANT))
        .await
        .unwrap();
    assert!(driver.calls().iter().any(|c| c == "resize vm-1 m1.large"));

    let terms: Vec<&str> = updated
        .mixins()
        .iter()
        .filter(|m| m.scheme() == SCHEME_FLAVOR_TEMPLATE)
        .map(|m| m.term())
        .collect();
    assert_eq!(terms, vec!["m1.large"]);
    assert_eq!(updated.attribute("compute.state"), Some("inactive"));
    assert!(updated.actions.is_empty());
}

#[tokio::test]
async fn more_than_one_mixin_change_per_update_is_rejected() {
    let (registry, driver, dispatcher) = setup().await;
    let id = dispatcher
        .create(instance_request(&registry), Some(TENANT))
        .await
        .unwrap();

    let mut replacement = registry.get_resource(&id, Some(TENANT)).unwrap();
    let image = find_mixin(&registry, SCHEME_OS_TEMPLATE, "img-1");
    replacement.detach_mixin(&image);
    replacement
        .attach_mixin(find_mixin(&registry, SCHEME_FLAVOR_TEMPLATE, "m1.large"))
        .unwrap();

    let before = driver.calls().len();
    let err = dispatcher
        .update(&id, &replacement, Some(TENANT))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::BadRequest(_)));
    assert_eq!(driver.calls().len(), before);
}

#[tokio::test]
async fn kernel_images_do_not_become_templates() {
    let (registry, _driver, _dispatcher) = setup().await;
    let visible = registry.visible_categories(Some(TENANT)).unwrap();
    assert!(visible
        .iter()
        .any(|c| c.scheme() == SCHEME_OS_TEMPLATE && c.term() == "img-1"));
    assert!(!visible
        .iter()
        .any(|c| c.scheme() == SCHEME_OS_TEMPLATE && c.term() == "krn-1"));
}

#[tokio::test]
async fn tenant_owned_groups_stay_invisible_to_others() {
    let (registry, _driver, _dispatcher) = setup().await;
    let other = registry.visible_categories(Some("tenant-b")).unwrap();
    assert!(!other.iter().any(|c| c.scheme() == SCHEME_SECURITY_GROUP));
}

#[tokio::test]
async fn volume_lifecycle_and_attachment() {
    let (registry, driver, dispatcher) = setup().await;
    let infra = catalog::infra();

    let mut volume = Entity::resource(infra.storage.clone()).unwrap();
    volume.set_attribute(ATTR_TITLE, "data").unwrap();
    volume.set_attribute("storage.size", "10").unwrap();
    let vol_id = dispatcher.create(volume, Some(TENANT)).await.unwrap();
    assert_eq!(vol_id, "/storage/vol-1");

    // Still creating: no verbs.
    let stored = registry.get_resource(&vol_id, Some(TENANT)).unwrap();
    assert_eq!(stored.attribute("storage.state"), Some("inactive"));
    assert!(stored.actions.is_empty());

    driver.set_volume_status("available");
    let vol = dispatcher.retrieve(&vol_id, Some(TENANT)).await.unwrap();
    assert_eq!(vol.attribute("storage.state"), Some("active"));
    assert!(vol.action_is_legal(&infra.storage_offline));
    assert!(vol.action_is_legal(&infra.storage_snapshot));

    // Attach the volume to an instance through a storage link.
    let vm_id = dispatcher
        .create(instance_request(&registry), Some(TENANT))
        .await
        .unwrap();
    let vm = registry.get_resource(&vm_id, Some(TENANT)).unwrap();
    let mut link = Entity::link(infra.storage_link.clone(), &vm, &vol).unwrap();
    link.set_attribute(ATTR_CORE_ID, "att-1").unwrap();
    link.set_attribute("storagelink.mountpoint", "/dev/vdb").unwrap();
    let link_id = dispatcher.create(link, Some(TENANT)).await.unwrap();
    assert_eq!(link_id, "/link/storagelink/att-1");
    assert!(driver
        .calls()
        .iter()
        .any(|c| c == "attach_volume vm-1 vol-1 /dev/vdb"));

    dispatcher.delete(&link_id, Some(TENANT)).await.unwrap();
    assert!(driver.calls().iter().any(|c| c == "detach_volume vol-1"));
}

#[tokio::test]
async fn volume_snapshot_requires_a_name() {
    let (registry, driver, dispatcher) = setup().await;
    let infra = catalog::infra();

    let mut volume = Entity::resource(infra.storage.clone()).unwrap();
    volume.set_attribute("storage.size", "10").unwrap();
    let vol_id = dispatcher.create(volume, Some(TENANT)).await.unwrap();

    driver.set_volume_status("available");
    dispatcher.retrieve(&vol_id, Some(TENANT)).await.unwrap();

    let err = dispatcher
        .action(&vol_id, &infra.storage_snapshot, Some(TENANT))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::BadRequest(_)));

    let mut named = registry.get_resource(&vol_id, Some(TENANT)).unwrap();
    named
        .set_attribute("storage.snapshot.name", "nightly")
        .unwrap();
    dispatcher.update(&vol_id, &named, Some(TENANT)).await.unwrap();
    dispatcher
        .action(&vol_id, &infra.storage_snapshot, Some(TENANT))
        .await
        .unwrap();
    assert!(driver
        .calls()
        .iter()
        .any(|c| c == "snapshot_volume vol-1 nightly"));
}

#[tokio::test]
async fn public_address_mixin_round_trip() {
    let (registry, driver, dispatcher) = setup().await;
    let infra = catalog::infra();

    let vm_id = dispatcher
        .create(instance_request(&registry), Some(TENANT))
        .await
        .unwrap();
    driver.set_instance_state("running");
    let vm = dispatcher.retrieve(&vm_id, Some(TENANT)).await.unwrap();
    let iface_id = vm
        .links
        .iter()
        .find(|l| l.rel().unwrap().target_kind == infra.network)
        .unwrap()
        .identifier()
        .to_string();

    // Attaching the mixin allocates and associates a floating address.
    let mut with_address = registry.get_resource(&iface_id, Some(TENANT)).unwrap();
    with_address
        .attach_mixin(infra.public_address.clone())
        .unwrap();
    let updated = dispatcher
        .update(&iface_id, &with_address, Some(TENANT))
        .await
        .unwrap();
    assert!(driver
        .calls()
        .iter()
        .any(|c| c == "associate_address vm-1 203.0.113.7"));
    assert_eq!(
        updated.attribute("networkinterface.address"),
        Some("203.0.113.7")
    );

    // Detaching reverses both steps.
    let mut without = updated.clone();
    without.detach_mixin(&infra.public_address);
    dispatcher
        .update(&iface_id, &without, Some(TENANT))
        .await
        .unwrap();
    assert!(driver
        .calls()
        .iter()
        .any(|c| c == "disassociate_address 203.0.113.7"));
    assert!(driver
        .calls()
        .iter()
        .any(|c| c == "release_address 203.0.113.7"));
}

#[tokio::test]
async fn handcrafted_mixin_copies_get_the_registered_definition() {
    let (registry, driver, dispatcher) = setup().await;
    let infra = catalog::infra();

    // A storage link between an instance and a volume.
    let mut volume = Entity::resource(infra.storage.clone()).unwrap();
    volume.set_attribute("storage.size", "10").unwrap();
    let vol_id = dispatcher.create(volume, Some(TENANT)).await.unwrap();
    let vol = registry.get_resource(&vol_id, Some(TENANT)).unwrap();
    let vm_id = dispatcher
        .create(instance_request(&registry), Some(TENANT))
        .await
        .unwrap();
    let vm = registry.get_resource(&vm_id, Some(TENANT)).unwrap();
    let mut link = Entity::link(infra.storage_link.clone(), &vm, &vol).unwrap();
    link.set_attribute(ATTR_CORE_ID, "att-1").unwrap();
    link.set_attribute("storagelink.mountpoint", "/dev/vdb").unwrap();
    let link_id = dispatcher.create(link, Some(TENANT)).await.unwrap();

    // A bare identity-equal copy of the public-address mixin declares no
    // applicability constraint of its own. The dispatcher must substitute
    // the registered definition and reject the attachment before any
    // address is allocated.
    let mut replacement = registry.get_resource(&link_id, Some(TENANT)).unwrap();
    let bare = Category::mixin(catalog::SCHEME_INFRA, "public-address").unwrap();
    replacement.attach_mixin(bare).unwrap();

    let before = driver.calls().len();
    let err = dispatcher
        .update(&link_id, &replacement, Some(TENANT))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::BadRequest(_)));
    let calls = driver.calls();
    assert!(!calls[before..]
        .iter()
        .any(|c| c.starts_with("allocate_address") || c.starts_with("associate_address")));
}

#[tokio::test]
async fn seeded_default_network_uses_the_projected_vocabulary() {
    let (registry, _driver, _dispatcher) = setup().await;
    let infra = catalog::infra();

    // The stub reports the native "up"; the stored resource carries the
    // projected state and verb set, like every other reconciled entity.
    let network = registry
        .get_resource("/network/default-network", Some(TENANT))
        .unwrap();
    assert_eq!(network.attribute("network.state"), Some("active"));
    assert!(network.action_is_legal(&infra.network_down));
    assert!(!network.action_is_legal(&infra.network_up));
}

#[tokio::test]
async fn whitespace_in_group_names_is_rejected() {
    let registry = Arc::new(Registry::new());
    let mut driver = StubOrchestrator::new();
    driver.group_names = vec!["bad name".to_string()];
    let driver = Arc::new(driver);
    catalog::bootstrap(&registry, driver.clone()).await.unwrap();

    let err = catalog::refresh_templates(&registry, driver, TENANT)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::BadRequest(_)));
}
