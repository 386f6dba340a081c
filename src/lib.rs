//! Category-based cloud resource layer
//!
//! This crate models cloud resources as typed entities: every resource and
//! link carries a [`model::Category`] kind, optional mixins that extend its
//! attribute schema, and a verb set derived from orchestrator truth. The
//! [`registry::Registry`] binds categories to backends and stores live
//! entities per tenant, the [`dispatch::Dispatcher`] runs the hook ordering
//! for each operation, and [`catalog`] provides the built-in vocabulary plus
//! the orchestrator-derived template mixins.
//!
//! The orchestrator itself stays behind the [`orchestrator::Orchestrator`]
//! trait; [`orchestrator::HttpOrchestrator`] is the reqwest-backed
//! implementation.

pub mod backend;
pub mod catalog;
pub mod dispatch;
pub mod error;
pub mod links;
pub mod model;
pub mod orchestrator;
pub mod registry;
pub mod state;

pub use backend::{ActionHandler, Backend, Context, KindHandler, MixinHandler};
pub use dispatch::Dispatcher;
pub use error::{Error, Result};
pub use model::{Category, CategoryClass, Entity, Mutability};
pub use orchestrator::{HttpOrchestrator, Orchestrator};
pub use registry::Registry;
