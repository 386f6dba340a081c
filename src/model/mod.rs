//! Core resource model
//!
//! The model is deliberately behavior-free: a [`Category`] is type identity
//! plus an attribute contract, an [`Entity`] is a typed bag of attributes with
//! relations to other entities. All behavior lives in backends resolved
//! through the registry.
//!
//! - [`category`] - Kind/Mixin/Action identity and attribute schemas
//! - [`entity`] - resources and links, with schema-validated attributes

mod category;
mod entity;

pub use category::{Category, CategoryClass, Mutability};
pub use entity::{Attributes, Entity, LinkRel};

/// Attribute holding the orchestrator-assigned core id of an entity. The
/// canonical identifier is `kind.location + core id`.
pub const ATTR_CORE_ID: &str = "core.id";

/// Attribute holding a human-readable title.
pub const ATTR_TITLE: &str = "core.title";
