//! Category identity and attribute contracts.

use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::{Error, Result};

/// Whether an attribute may be rewritten after the entity has been created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutability {
    Immutable,
    Mutable,
}

/// What flavor of type a category describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryClass {
    /// The single primary type of an entity.
    Kind,
    /// An additive capability attached to an entity.
    Mixin,
    /// A verb applicable to an entity.
    Action,
}

/// Type identity: a `(scheme, term)` pair plus the attribute contract the
/// category brings to an entity.
///
/// Two categories are equal iff scheme and term match; everything else
/// (title, related set, schema) is carried along but does not participate in
/// identity. Subtype and applicability checks are structural, by membership
/// in `related`, not by any inheritance mechanism.
#[derive(Debug, Clone)]
pub struct Category {
    scheme: String,
    term: String,
    class: CategoryClass,
    title: String,
    related: Vec<Category>,
    /// Path prefix used to compose entity identifiers. Only kinds carry one.
    location: Option<String>,
    attributes: BTreeMap<String, Mutability>,
}

impl Category {
    fn new(
        scheme: impl Into<String>,
        term: impl Into<String>,
        class: CategoryClass,
        location: Option<String>,
    ) -> Result<Self> {
        let scheme = scheme.into();
        let term = term.into();
        if scheme.is_empty() || term.is_empty() {
            return Err(Error::bad_request(
                "category scheme and term must be non-empty",
            ));
        }
        Ok(Self {
            scheme,
            term,
            class,
            title: String::new(),
            related: Vec::new(),
            location,
            attributes: BTreeMap::new(),
        })
    }

    /// Construct a kind. The location prefix is the identifier namespace of
    /// entities of this kind, e.g. `/compute/`.
    pub fn kind(
        scheme: impl Into<String>,
        term: impl Into<String>,
        location: impl Into<String>,
    ) -> Result<Self> {
        Self::new(scheme, term, CategoryClass::Kind, Some(location.into()))
    }

    pub fn mixin(scheme: impl Into<String>, term: impl Into<String>) -> Result<Self> {
        Self::new(scheme, term, CategoryClass::Mixin, None)
    }

    pub fn action(scheme: impl Into<String>, term: impl Into<String>) -> Result<Self> {
        Self::new(scheme, term, CategoryClass::Action, None)
    }

    /// Infallible constructor for the built-in vocabulary, whose identifiers
    /// are compile-time constants and never empty.
    pub(crate) fn builtin(scheme: &'static str, term: &'static str, class: CategoryClass) -> Self {
        Self {
            scheme: scheme.to_string(),
            term: term.to_string(),
            class,
            title: String::new(),
            related: Vec::new(),
            location: None,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_related(mut self, related: Category) -> Self {
        self.related.push(related);
        self
    }

    /// Declare an attribute this category contributes to entities.
    pub fn with_attribute(mut self, name: impl Into<String>, mutability: Mutability) -> Self {
        self.attributes.insert(name.into(), mutability);
        self
    }

    /// Mixins may carry a location as well (template mixins are browsable).
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn term(&self) -> &str {
        &self.term
    }

    pub fn class(&self) -> CategoryClass {
        self.class
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn related(&self) -> &[Category] {
        &self.related
    }

    pub fn location(&self) -> &str {
        self.location.as_deref().unwrap_or("")
    }

    /// Stable identity string, used as catalog key.
    pub fn id(&self) -> String {
        format!("{}{}", self.scheme, self.term)
    }

    pub fn attributes(&self) -> &BTreeMap<String, Mutability> {
        &self.attributes
    }

    /// Structural subtype check: a category satisfies another when it is that
    /// category or lists it among its related categories.
    pub fn satisfies(&self, other: &Category) -> bool {
        self == other || self.related.iter().any(|r| r == other)
    }

    /// Whether a mixin declares applicability to the given kind. A mixin with
    /// no kind-class entries in its related set applies to any kind.
    pub fn applies_to(&self, kind: &Category) -> bool {
        let mut saw_kind_constraint = false;
        for rel in &self.related {
            if rel.class == CategoryClass::Kind {
                saw_kind_constraint = true;
                if kind.satisfies(rel) {
                    return true;
                }
            }
        }
        !saw_kind_constraint
    }
}

impl PartialEq for Category {
    fn eq(&self, other: &Self) -> bool {
        self.scheme == other.scheme && self.term == other.term
    }
}

impl Eq for Category {}

impl Hash for Category {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.scheme.hash(state);
        self.term.hash(state);
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.scheme, self.term)
    }
}
