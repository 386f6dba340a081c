//! Orchestrator contract
//!
//! The orchestrator is the external compute/network/storage system that is
//! the actual source of truth for resource state. This layer consumes it
//! through the [`Orchestrator`] trait only; the orchestrator's own
//! asynchronous lifecycle machinery is out of scope.
//!
//! Every call is a blocking remote call from this layer's perspective: it
//! returns once the orchestrator *acknowledges* the request, not once the
//! underlying transition completes. The projection is only refreshed on the
//! next retrieve.
//!
//! - [`types`] - wire types, the single field-mapping boundary
//! - [`http`] - reqwest-backed implementation

pub mod http;
pub mod types;

use async_trait::async_trait;

use crate::error::Result;
pub use http::HttpOrchestrator;
pub use types::{
    Address, Flavor, Image, Instance, InstanceSpec, Network, NetworkAdapter, SecurityGroup, Volume,
};

/// Operation contract of the backend orchestrator.
#[async_trait]
pub trait Orchestrator: Send + Sync {
    // =========================================================================
    // Compute
    // =========================================================================

    async fn create_instances(&self, spec: InstanceSpec) -> Result<Vec<Instance>>;
    async fn instance(&self, id: &str) -> Result<Instance>;
    async fn delete_instance(&self, id: &str) -> Result<()>;
    async fn start_instance(&self, id: &str) -> Result<()>;
    async fn stop_instance(&self, id: &str) -> Result<()>;
    /// `hard` requests an ungraceful reboot.
    async fn restart_instance(&self, id: &str, hard: bool) -> Result<()>;
    async fn suspend_instance(&self, id: &str) -> Result<()>;
    async fn resize_instance(&self, id: &str, flavor: &str) -> Result<()>;
    async fn rebuild_instance(&self, id: &str, image: &str) -> Result<()>;
    async fn set_admin_password(&self, id: &str, password: &str) -> Result<()>;
    async fn snapshot_instance(&self, id: &str, name: &str) -> Result<()>;
    async fn instance_adapters(&self, id: &str) -> Result<Vec<NetworkAdapter>>;

    // =========================================================================
    // Network
    // =========================================================================

    async fn allocate_address(&self, pool: Option<&str>) -> Result<Address>;
    async fn release_address(&self, address: &str) -> Result<()>;
    async fn associate_address(&self, instance: &str, address: &str) -> Result<()>;
    async fn disassociate_address(&self, address: &str) -> Result<()>;
    async fn address_pools(&self) -> Result<Vec<String>>;
    async fn networks(&self) -> Result<Vec<Network>>;

    // =========================================================================
    // Storage
    // =========================================================================

    async fn create_volume(&self, size_gb: f64, name: &str) -> Result<Volume>;
    async fn volume(&self, id: &str) -> Result<Volume>;
    async fn delete_volume(&self, id: &str) -> Result<()>;
    async fn attach_volume(&self, instance: &str, volume: &str, mountpoint: &str) -> Result<()>;
    async fn detach_volume(&self, volume: &str) -> Result<()>;
    async fn snapshot_volume(&self, volume: &str, name: &str) -> Result<()>;

    // =========================================================================
    // Catalog
    // =========================================================================

    async fn images(&self) -> Result<Vec<Image>>;
    async fn flavors(&self) -> Result<Vec<Flavor>>;
    async fn security_groups(&self, tenant: &str) -> Result<Vec<SecurityGroup>>;
}
