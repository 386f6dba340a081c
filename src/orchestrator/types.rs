//! Orchestrator wire types
//!
//! The one place where orchestrator field names are spelled out. Backends and
//! the reconciler only see these structs, so an orchestrator schema change
//! stays contained here.

use serde::{Deserialize, Serialize};

/// Request payload for provisioning instances.
#[derive(Debug, Clone, Serialize)]
pub struct InstanceSpec {
    pub name: String,
    /// Sizing profile name. The orchestrator picks its default when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flavor: Option<String>,
    /// Image reference. Required.
    pub image: String,
    pub count: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub security_groups: Vec<String>,
}

impl InstanceSpec {
    pub fn new(name: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            flavor: None,
            image: image.into(),
            count: 1,
            security_groups: Vec::new(),
        }
    }
}

/// A virtual machine as the orchestrator reports it.
#[derive(Debug, Clone, Deserialize)]
pub struct Instance {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub hostname: String,
    /// Native lifecycle state, fed to the state reconciler.
    pub state: String,
    #[serde(default)]
    pub vcpus: u32,
    #[serde(default)]
    pub memory_mb: u64,
    #[serde(default)]
    pub flavor: String,
    #[serde(default)]
    pub image: String,
}

/// One network adapter of an instance.
#[derive(Debug, Clone, Deserialize)]
pub struct NetworkAdapter {
    pub network_id: String,
    pub address: String,
    #[serde(default)]
    pub gateway: String,
    #[serde(default = "default_allocation")]
    pub allocation: String,
    #[serde(default)]
    pub mac: String,
}

fn default_allocation() -> String {
    "dhcp".to_string()
}

/// A floating address.
#[derive(Debug, Clone, Deserialize)]
pub struct Address {
    pub address: String,
    #[serde(default)]
    pub pool: String,
}

/// An L2/L3 network.
#[derive(Debug, Clone, Deserialize)]
pub struct Network {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub cidr: String,
    #[serde(default)]
    pub gateway: String,
    #[serde(default = "default_network_state")]
    pub state: String,
}

fn default_network_state() -> String {
    "up".to_string()
}

/// A block storage volume.
#[derive(Debug, Clone, Deserialize)]
pub struct Volume {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub size_gb: f64,
    /// Native status, fed to the state reconciler.
    pub status: String,
}

/// A bootable image from the orchestrator catalog.
#[derive(Debug, Clone, Deserialize)]
pub struct Image {
    pub id: String,
    pub name: String,
    /// `machine`, `kernel` or `ramdisk`; only machine images become
    /// template mixins.
    #[serde(default = "default_image_format")]
    pub format: String,
}

fn default_image_format() -> String {
    "machine".to_string()
}

/// A sizing profile from the orchestrator catalog.
#[derive(Debug, Clone, Deserialize)]
pub struct Flavor {
    pub name: String,
    pub vcpus: u32,
    pub memory_mb: u64,
    #[serde(default)]
    pub root_gb: u64,
    #[serde(default)]
    pub ephemeral_gb: u64,
    #[serde(default)]
    pub swap_mb: u64,
}

/// A tenant-scoped firewall rule group.
#[derive(Debug, Clone, Deserialize)]
pub struct SecurityGroup {
    pub id: String,
    pub name: String,
}
