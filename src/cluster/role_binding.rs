use async_trait::async_trait;
use k8s_openapi::api::rbac::v1 as rbacv1;
use k8s_openapi::apimachinery::pkg::apis::meta::v1 as metav1;
use kube::api::{Api, ListParams, PostParams};
use kube::Client;
#[cfg(test)]
use mockall::automock;

use crate::error::{is_already_exists, is_not_found, Error, Result};
use crate::kinds::{Kind, EMPTY_NAMESPACE};

/// Access to role bindings.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RoleBindingClient: Send + Sync {
    /// Lists bindings in the namespace, or across all namespaces when the
    /// namespace is empty. Not-found yields an empty list.
    async fn list(&self, namespace: &str) -> Result<Vec<rbacv1::RoleBinding>>;

    /// Binds the role to a single subject. An already-exists rejection is
    /// surfaced as-is so callers can branch on it.
    async fn create(
        &self,
        namespace: &str,
        name: &str,
        role: &str,
        subject: rbacv1::Subject,
    ) -> Result<rbacv1::RoleBinding>;
}

pub struct DefaultClient {
    client: Client,
}

impl DefaultClient {
    pub fn new(client: Client) -> Self {
        DefaultClient { client }
    }

    fn api(&self, namespace: &str) -> Api<rbacv1::RoleBinding> {
        if namespace.is_empty() {
            Api::all(self.client.clone())
        } else {
            Api::namespaced(self.client.clone(), namespace)
        }
    }
}

#[async_trait]
impl RoleBindingClient for DefaultClient {
    async fn list(&self, namespace: &str) -> Result<Vec<rbacv1::RoleBinding>> {
        match self.api(namespace).list(&ListParams::default()).await {
            Ok(list) => Ok(list.items),
            Err(err) if is_not_found(&err) => Ok(Vec::new()),
            Err(source) => Err(Error::api(
                format!("failed to list role bindings in namespace [{namespace}]"),
                source,
            )),
        }
    }

    async fn create(
        &self,
        namespace: &str,
        name: &str,
        role: &str,
        subject: rbacv1::Subject,
    ) -> Result<rbacv1::RoleBinding> {
        let binding = rbacv1::RoleBinding {
            metadata: metav1::ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                ..Default::default()
            },
            role_ref: rbacv1::RoleRef {
                api_group: "rbac.authorization.k8s.io".to_string(),
                kind: Kind::Role.as_str().to_string(),
                name: role.to_string(),
            },
            subjects: Some(vec![subject.clone()]),
        };

        self.api(namespace)
            .create(&PostParams::default(), &binding)
            .await
            .map_err(|source| {
                if is_already_exists(&source) {
                    // Leave the rejection recognizable for the caller.
                    return Error::api("create role binding", source);
                }

                let subject_ns = subject.namespace.as_deref().unwrap_or(EMPTY_NAMESPACE);
                Error::api(
                    format!(
                        "failed to bind role [{role}] to subject [{}] (kind: {} ns: {subject_ns}) in namespace [{namespace}]",
                        subject.name, subject.kind,
                    ),
                    source,
                )
            })
    }
}
