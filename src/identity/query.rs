use kube::config::Kubeconfig;

use crate::kinds::Kind;

/// Facets which limit an identity query's result set.
///
/// A Query is built once per resolution call and read concurrently by the
/// queriers; it is never mutated after construction.
#[derive(Debug, Clone, Default)]
pub struct Query {
    /// Restricts which queriers run to those supporting this kind.
    /// `None` means any kind.
    pub kind: Option<Kind>,

    /// Limits which identities are returned. A candidate is included when it
    /// matches this name or when the name is empty.
    pub name: String,

    /// Limits which identities are returned by namespace. For example, if a
    /// querier consumes a RoleBinding list, only bindings from this namespace
    /// are considered. Empty means all namespaces.
    pub namespace: String,

    /// Snapshot of the kubectl config from which to seek query matches.
    /// Its presence makes the kubeconfig-context querier eligible.
    pub config: Option<Kubeconfig>,
}

impl Query {
    pub fn new() -> Self {
        Query::default()
    }

    pub fn kind(mut self, kind: Kind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn config(mut self, config: &Kubeconfig) -> Self {
        self.config = Some(config.clone());
        self
    }
}
