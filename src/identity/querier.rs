//! Querier implementations, each covering one place identities can live.
//!
//! This decomposition trades more types for the ability to define the
//! sub-queries independently.

use async_trait::async_trait;
use k8s_openapi::api::rbac::v1 as rbacv1;
use tokio_util::sync::CancellationToken;

use crate::cluster::Clientset;
use crate::error::{Error, Result};
use crate::identity::query::Query;
use crate::identity::{Identity, IdentityList, IdentitySource};
use crate::kinds::Kind;
use crate::names::{parse_service_account, ServiceAccountName};

/// A strategy that produces identities from one specific source.
#[async_trait]
pub trait Querier: Send + Sync {
    /// Returns a unique description of the type of result provided by the
    /// querier.
    fn label(&self) -> &'static str;

    /// Returns true if the implementation can serve the query.
    ///
    /// For example, a query may ask for Group identities while the querier
    /// only knows how to find User identities. Never performs I/O.
    fn compatible(&self, query: &Query) -> bool;

    /// Performs the query.
    async fn query(
        &self,
        cancel: &CancellationToken,
        clientset: &Clientset,
        query: &Query,
    ) -> Result<IdentityList>;
}

fn check_cancelled(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(Error::Cancelled("query"));
    }
    Ok(())
}

/// When the queried name parsed as a service account with an embedded
/// namespace, confirm the namespace agrees with the query's and exists in
/// the cluster.
async fn validate_parsed_namespace(
    cancel: &CancellationToken,
    clientset: &Clientset,
    query: &Query,
    parsed: &ServiceAccountName,
) -> Result<()> {
    if parsed.namespace.is_empty() {
        return Ok(());
    }

    if !query.namespace.is_empty() && parsed.namespace != query.namespace {
        return Err(Error::Conflict(format!(
            "query's namespace [{}] does not match query service account [{}]'s namespace [{}]",
            query.namespace, query.name, parsed.namespace
        )));
    }

    check_cancelled(cancel)?;
    if clientset.namespaces.get(&parsed.namespace).await?.is_none() {
        return Err(Error::NotFound(format!(
            "service account [{}] namespace [{}] not found",
            query.name, parsed.namespace
        )));
    }

    Ok(())
}

/// Queries a kubectl context for its user value.
pub struct ConfigUserQuerier;

#[async_trait]
impl Querier for ConfigUserQuerier {
    fn label(&self) -> &'static str {
        "kubeconfig context"
    }

    fn compatible(&self, query: &Query) -> bool {
        matches!(query.kind, None | Some(Kind::User))
    }

    async fn query(
        &self,
        cancel: &CancellationToken,
        _clientset: &Clientset,
        query: &Query,
    ) -> Result<IdentityList> {
        let Some(config) = &query.config else {
            return Err(Error::Input(format!(
                "[{}] querier received no kubeconfig document",
                self.label()
            )));
        };

        check_cancelled(cancel)?;

        let mut found = IdentityList::default();

        for named in &config.contexts {
            let Some(context) = &named.context else {
                continue;
            };

            let namespace = context.namespace.clone().unwrap_or_default();
            if !query.namespace.is_empty() && query.namespace != namespace {
                continue;
            }

            if query.name.is_empty() || query.name == context.user {
                found
                    .items
                    .push(Identity::new(Kind::User, context.user.clone(), namespace));
            }
        }

        Ok(found)
    }
}

// Hard-coded names enumerated in the API server source. They are string
// literals instead of imported constants to avoid k8s.io/apiserver's
// transitive dependency set:
// https://github.com/kubernetes/apiserver/blob/kubernetes-1.17.0/pkg/authentication/user/user.go#L69
const CORE_USERS: [&str; 5] = [
    "system:anonymous",
    "system:apiserver",
    "system:kube-proxy",
    "system:kube-controller-manager",
    "system:kube-scheduler",
];

const CORE_GROUPS: [&str; 4] = [
    "system:masters",
    "system:nodes",
    "system:unauthenticated",
    "system:authenticated",
];

/// Queries the hard-coded set of system-defined user names.
pub struct CoreUserQuerier;

#[async_trait]
impl Querier for CoreUserQuerier {
    fn label(&self) -> &'static str {
        "system-defined user"
    }

    fn compatible(&self, query: &Query) -> bool {
        matches!(query.kind, None | Some(Kind::User))
    }

    async fn query(
        &self,
        cancel: &CancellationToken,
        _clientset: &Clientset,
        query: &Query,
    ) -> Result<IdentityList> {
        check_cancelled(cancel)?;

        let mut found = IdentityList::default();
        for name in CORE_USERS {
            if query.name.is_empty() || query.name == name {
                found.items.push(Identity::new(Kind::User, name, ""));
            }
        }

        Ok(found)
    }
}

/// Queries the hard-coded set of system-defined group names.
pub struct CoreGroupQuerier;

#[async_trait]
impl Querier for CoreGroupQuerier {
    fn label(&self) -> &'static str {
        "system-defined group"
    }

    fn compatible(&self, query: &Query) -> bool {
        matches!(query.kind, None | Some(Kind::Group))
    }

    async fn query(
        &self,
        cancel: &CancellationToken,
        _clientset: &Clientset,
        query: &Query,
    ) -> Result<IdentityList> {
        check_cancelled(cancel)?;

        let mut found = IdentityList::default();
        for name in CORE_GROUPS {
            if query.name.is_empty() || query.name == name {
                found.items.push(Identity::new(Kind::Group, name, ""));
            }
        }

        Ok(found)
    }
}

/// Decides whether a binding subject satisfies the query.
fn subject_matches(query: &Query, parsed: &ServiceAccountName, subject: &rbacv1::Subject) -> bool {
    if query.name.is_empty() {
        return true;
    }

    if parsed.is_valid {
        if parsed.is_group {
            return subject.kind == Kind::Group.as_str() && subject.name == query.name;
        }
        return subject.kind == Kind::ServiceAccount.as_str() && subject.name == parsed.basename;
    }

    let kind_agrees = match query.kind {
        None => true,
        Some(kind) => subject.kind == kind.as_str(),
    };
    kind_agrees && subject.name == query.name
}

/// Scans one binding's subjects into the result list, attaching the binding
/// as the source. The source kind is supplied by the caller because list
/// results carry empty kinds for contained items.
fn collect_subjects(
    found: &mut IdentityList,
    query: &Query,
    parsed: &ServiceAccountName,
    source_kind: Kind,
    binding_name: &str,
    binding_namespace: &str,
    subjects: &[rbacv1::Subject],
) {
    for subject in subjects {
        let subject_namespace = subject.namespace.clone().unwrap_or_default();
        if !query.namespace.is_empty() && query.namespace != subject_namespace {
            continue;
        }

        if !subject_matches(query, parsed, subject) {
            continue;
        }

        // Subject kinds are also sometimes empty upstream; substitute the
        // queried kind so results always identify themselves.
        let kind = if subject.kind.is_empty() {
            query
                .kind
                .map(|kind| kind.as_str().to_string())
                .unwrap_or_default()
        } else {
            subject.kind.clone()
        };

        found.add(
            kind,
            subject.name.clone(),
            subject_namespace,
            Some(IdentitySource {
                kind: source_kind,
                name: binding_name.to_string(),
                namespace: binding_namespace.to_string(),
            }),
        );
    }
}

/// Queries the API for role binding subjects.
pub struct RoleSubjectQuerier;

#[async_trait]
impl Querier for RoleSubjectQuerier {
    fn label(&self) -> &'static str {
        "role binding subject"
    }

    fn compatible(&self, query: &Query) -> bool {
        matches!(query.kind, None | Some(Kind::User) | Some(Kind::Group))
    }

    async fn query(
        &self,
        cancel: &CancellationToken,
        clientset: &Clientset,
        query: &Query,
    ) -> Result<IdentityList> {
        check_cancelled(cancel)?;

        let parsed = parse_service_account(&query.name);
        if parsed.is_valid {
            validate_parsed_namespace(cancel, clientset, query, &parsed).await?;
        }

        // Scan role bindings for subjects which match the queried name,
        // applying the queried namespace if provided.
        check_cancelled(cancel)?;
        let bindings = clientset.role_bindings.list(&query.namespace).await?;

        let mut found = IdentityList::default();
        for binding in &bindings {
            let Some(subjects) = &binding.subjects else {
                continue;
            };
            collect_subjects(
                &mut found,
                query,
                &parsed,
                Kind::RoleBinding,
                binding.metadata.name.as_deref().unwrap_or_default(),
                binding.metadata.namespace.as_deref().unwrap_or_default(),
                subjects,
            );
        }

        Ok(found)
    }
}

/// Queries the API for cluster role binding subjects.
pub struct ClusterRoleSubjectQuerier;

#[async_trait]
impl Querier for ClusterRoleSubjectQuerier {
    fn label(&self) -> &'static str {
        "cluster role binding subject"
    }

    fn compatible(&self, query: &Query) -> bool {
        matches!(query.kind, None | Some(Kind::User) | Some(Kind::Group))
    }

    async fn query(
        &self,
        cancel: &CancellationToken,
        clientset: &Clientset,
        query: &Query,
    ) -> Result<IdentityList> {
        check_cancelled(cancel)?;

        let parsed = parse_service_account(&query.name);
        if parsed.is_valid {
            validate_parsed_namespace(cancel, clientset, query, &parsed).await?;
        }

        check_cancelled(cancel)?;
        let bindings = clientset.cluster_role_bindings.list().await?;

        let mut found = IdentityList::default();
        for binding in &bindings {
            let Some(subjects) = &binding.subjects else {
                continue;
            };
            collect_subjects(
                &mut found,
                query,
                &parsed,
                Kind::ClusterRoleBinding,
                binding.metadata.name.as_deref().unwrap_or_default(),
                binding.metadata.namespace.as_deref().unwrap_or_default(),
                subjects,
            );
        }

        Ok(found)
    }
}

/// Queries the API for service account based users.
pub struct ServiceAccountUserQuerier;

#[async_trait]
impl Querier for ServiceAccountUserQuerier {
    fn label(&self) -> &'static str {
        "service account based user"
    }

    fn compatible(&self, query: &Query) -> bool {
        matches!(
            query.kind,
            None | Some(Kind::User) | Some(Kind::ServiceAccount)
        )
    }

    async fn query(
        &self,
        cancel: &CancellationToken,
        clientset: &Clientset,
        query: &Query,
    ) -> Result<IdentityList> {
        check_cancelled(cancel)?;

        let mut found = IdentityList::default();

        let parsed = parse_service_account(&query.name);
        if !parsed.is_valid || parsed.is_group {
            return Ok(found);
        }

        validate_parsed_namespace(cancel, clientset, query, &parsed).await?;

        check_cancelled(cancel)?;
        let accounts = clientset
            .service_accounts
            .list(
                &parsed.namespace,
                &format!("metadata.name={}", parsed.basename),
            )
            .await?;

        for account in accounts {
            found.items.push(Identity::new(
                Kind::ServiceAccount,
                account.metadata.name.unwrap_or_default(),
                account.metadata.namespace.unwrap_or_default(),
            ));
        }

        Ok(found)
    }
}

/// Detects valid names of service account based groups and validates their
/// namespaces if needed. If all checks pass, the group itself is the result;
/// no list call is involved.
pub struct ServiceAccountGroupQuerier;

#[async_trait]
impl Querier for ServiceAccountGroupQuerier {
    fn label(&self) -> &'static str {
        "service account based group"
    }

    fn compatible(&self, query: &Query) -> bool {
        matches!(query.kind, None | Some(Kind::Group))
    }

    async fn query(
        &self,
        cancel: &CancellationToken,
        clientset: &Clientset,
        query: &Query,
    ) -> Result<IdentityList> {
        check_cancelled(cancel)?;

        let mut found = IdentityList::default();

        if query.name.is_empty() {
            return Ok(found);
        }

        let parsed = parse_service_account(&query.name);
        if !parsed.is_valid || !parsed.is_group {
            return Ok(found);
        }

        validate_parsed_namespace(cancel, clientset, query, &parsed).await?;

        found.items.push(Identity::new(
            Kind::Group,
            query.name.clone(),
            parsed.namespace,
        ));

        Ok(found)
    }
}
