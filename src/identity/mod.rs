//! Identity discovery: who can be referenced by RBAC policies, and where
//! that knowledge lives.

pub mod querier;
pub mod query;
pub mod registry;

use std::fmt;

use crate::kinds::Kind;

pub use querier::Querier;
pub use query::Query;
pub use registry::Registry;

/// Describes where an Identity was found, e.g. a RoleBinding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentitySource {
    pub kind: Kind,
    pub name: String,
    pub namespace: String,
}

impl fmt::Display for IdentitySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.name)?;
        if !self.namespace.is_empty() {
            write!(f, " of namespace {}", self.namespace)?;
        }
        Ok(())
    }
}

/// An object which may have RBAC grants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Kind string, e.g. "User". Kept as a string because binding subjects
    /// carry free-form kinds upstream; queriers substitute their own kind
    /// whenever the upstream value is empty.
    pub kind: String,
    pub name: String,
    pub namespace: String,

    /// The object (if any) in which this identity was found.
    pub source: Option<IdentitySource>,

    /// Label of the querier which produced this value, stamped by the
    /// resolution engine.
    pub querier: &'static str,
}

impl Identity {
    pub fn new(kind: Kind, name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Identity {
            kind: kind.as_str().to_string(),
            name: name.into(),
            namespace: namespace.into(),
            source: None,
            querier: "",
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Some list result objects contain an empty Kind value upstream.
        let kind = if self.kind.is_empty() {
            "<empty Kind>"
        } else {
            &self.kind
        };

        write!(f, "{} {}", kind, self.name)?;
        if !self.namespace.is_empty() {
            write!(f, " of namespace {}", self.namespace)?;
        }
        if let Some(source) = &self.source {
            write!(f, " (from {source})")?;
        }
        write!(f, " via [{}] querier", self.querier)
    }
}

/// A collection of Identity values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityList {
    pub items: Vec<Identity>,
}

impl IdentityList {
    /// Appends a new list item.
    pub fn add(
        &mut self,
        kind: impl Into<String>,
        name: impl Into<String>,
        namespace: impl Into<String>,
        source: Option<IdentitySource>,
    ) {
        self.items.push(Identity {
            kind: kind.into(),
            name: name.into(),
            namespace: namespace.into(),
            source,
            querier: "",
        });
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}
