//! Entities: resources and the links between them.

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::model::category::{Category, CategoryClass, Mutability};
use crate::model::ATTR_CORE_ID;

/// Open attribute map. Keys are validated against the schemas of the entity's
/// kind and mixins, so "open" means extensible through categories, not
/// unchecked.
pub type Attributes = BTreeMap<String, String>;

/// Relation data carried by link entities.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkRel {
    /// Identifier of the owning (source) resource.
    pub source: String,
    /// Identifier of the target resource.
    pub target: String,
    /// Kind of the target resource, kept here so link sets can be scanned
    /// without dereferencing targets through the registry.
    pub target_kind: Category,
}

/// A resource or link instance: the unit the registry stores and the
/// dispatcher operates on.
///
/// The `actions` list is the *currently legal* verb set as of the last
/// reconciliation, not authoritative truth; the orchestrator remains the
/// source of truth and the list is re-derived on every retrieve.
#[derive(Debug, Clone)]
pub struct Entity {
    /// Canonical identifier, `kind.location + core id`. Empty until the
    /// entity has been added to the registry.
    identifier: String,
    kind: Category,
    mixins: Vec<Category>,
    attributes: Attributes,
    pub actions: Vec<Category>,
    /// Links owned by this resource, in creation order.
    pub links: Vec<Entity>,
    rel: Option<LinkRel>,
}

impl Entity {
    /// Construct a resource of the given kind.
    pub fn resource(kind: Category) -> Result<Self> {
        if kind.class() != CategoryClass::Kind {
            return Err(Error::bad_request(format!(
                "{} is not a kind and cannot type a resource",
                kind
            )));
        }
        Ok(Self {
            identifier: String::new(),
            kind,
            mixins: Vec::new(),
            attributes: Attributes::new(),
            actions: Vec::new(),
            links: Vec::new(),
            rel: None,
        })
    }

    /// Construct a link of the given kind between two resources.
    pub fn link(kind: Category, source: &Entity, target: &Entity) -> Result<Self> {
        let mut link = Self::resource(kind)?;
        link.rel = Some(LinkRel {
            source: source.identifier.clone(),
            target: target.identifier.clone(),
            target_kind: target.kind.clone(),
        });
        Ok(link)
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub(crate) fn set_identifier(&mut self, identifier: String) {
        self.identifier = identifier;
    }

    /// Substitute the registered definition for a caller-supplied kind copy.
    pub(crate) fn set_kind(&mut self, kind: Category) {
        self.kind = kind;
    }

    /// Swap an attached mixin for an identity-equal replacement. No-op when
    /// the mixin is not attached.
    pub(crate) fn replace_mixin(&mut self, mixin: Category) {
        if let Some(slot) = self.mixins.iter_mut().find(|m| **m == mixin) {
            *slot = mixin;
        }
    }

    pub fn kind(&self) -> &Category {
        &self.kind
    }

    pub fn mixins(&self) -> &[Category] {
        &self.mixins
    }

    pub fn rel(&self) -> Option<&LinkRel> {
        self.rel.as_ref()
    }

    pub fn is_link(&self) -> bool {
        self.rel.is_some()
    }

    /// Attach a mixin. Attachment order is preserved; it drives the hook
    /// ordering on create and delete.
    pub fn attach_mixin(&mut self, mixin: Category) -> Result<()> {
        if mixin.class() != CategoryClass::Mixin {
            return Err(Error::bad_request(format!("{} is not a mixin", mixin)));
        }
        if !self.mixins.contains(&mixin) {
            self.mixins.push(mixin);
        }
        Ok(())
    }

    pub fn detach_mixin(&mut self, mixin: &Category) {
        self.mixins.retain(|m| m != mixin);
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(|v| v.as_str())
    }

    /// Mutability declared for a key by the kind or any attached mixin.
    pub fn declared(&self, key: &str) -> Option<Mutability> {
        if let Some(m) = self.kind.attributes().get(key) {
            return Some(*m);
        }
        self.mixins
            .iter()
            .find_map(|mixin| mixin.attributes().get(key).copied())
    }

    /// Client-side attribute write. The key must be declared by the kind or
    /// an attached mixin, and once the entity has been registered, writes to
    /// immutable keys are rejected.
    pub fn set_attribute(&mut self, key: &str, value: impl Into<String>) -> Result<()> {
        match self.declared(key) {
            None => Err(Error::bad_request(format!(
                "attribute {} is not declared by {} or its mixins",
                key, self.kind
            ))),
            Some(Mutability::Immutable) if !self.identifier.is_empty() => Err(Error::bad_request(
                format!("attribute {} is immutable", key),
            )),
            Some(_) => {
                self.attributes.insert(key.to_string(), value.into());
                Ok(())
            }
        }
    }

    /// Provider-side attribute write: still schema-checked, but exempt from
    /// the immutability rule. Backends use this for derived values such as
    /// the projected state.
    pub fn write_attribute(&mut self, key: &str, value: impl Into<String>) -> Result<()> {
        if self.declared(key).is_none() {
            return Err(Error::bad_request(format!(
                "attribute {} is not declared by {} or its mixins",
                key, self.kind
            )));
        }
        self.attributes.insert(key.to_string(), value.into());
        Ok(())
    }

    pub fn core_id(&self) -> Option<&str> {
        self.attribute(ATTR_CORE_ID)
    }

    /// Whether a verb is currently legal for this entity.
    pub fn action_is_legal(&self, action: &Category) -> bool {
        self.actions.contains(action)
    }
}
