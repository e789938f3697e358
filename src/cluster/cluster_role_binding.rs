use async_trait::async_trait;
use k8s_openapi::api::rbac::v1 as rbacv1;
use k8s_openapi::apimachinery::pkg::apis::meta::v1 as metav1;
use kube::api::{Api, ListParams, PostParams};
use kube::Client;
#[cfg(test)]
use mockall::automock;

use crate::error::{is_already_exists, is_not_found, Error, Result};
use crate::kinds::{Kind, EMPTY_NAMESPACE};

/// Access to cluster role bindings.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterRoleBindingClient: Send + Sync {
    /// Lists all cluster role bindings. Not-found yields an empty list.
    async fn list(&self) -> Result<Vec<rbacv1::ClusterRoleBinding>>;

    /// Binds the cluster role to a single subject. An already-exists
    /// rejection is surfaced as-is so callers can branch on it.
    async fn create(
        &self,
        name: &str,
        role: &str,
        subject: rbacv1::Subject,
    ) -> Result<rbacv1::ClusterRoleBinding>;
}

pub struct DefaultClient {
    client: Client,
}

impl DefaultClient {
    pub fn new(client: Client) -> Self {
        DefaultClient { client }
    }
}

#[async_trait]
impl ClusterRoleBindingClient for DefaultClient {
    async fn list(&self) -> Result<Vec<rbacv1::ClusterRoleBinding>> {
        let api = Api::<rbacv1::ClusterRoleBinding>::all(self.client.clone());
        match api.list(&ListParams::default()).await {
            Ok(list) => Ok(list.items),
            Err(err) if is_not_found(&err) => Ok(Vec::new()),
            Err(source) => Err(Error::api("failed to list cluster role bindings", source)),
        }
    }

    async fn create(
        &self,
        name: &str,
        role: &str,
        subject: rbacv1::Subject,
    ) -> Result<rbacv1::ClusterRoleBinding> {
        let binding = rbacv1::ClusterRoleBinding {
            metadata: metav1::ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            role_ref: rbacv1::RoleRef {
                api_group: "rbac.authorization.k8s.io".to_string(),
                kind: Kind::ClusterRole.as_str().to_string(),
                name: role.to_string(),
            },
            subjects: Some(vec![subject.clone()]),
        };

        Api::<rbacv1::ClusterRoleBinding>::all(self.client.clone())
            .create(&PostParams::default(), &binding)
            .await
            .map_err(|source| {
                if is_already_exists(&source) {
                    return Error::api("create cluster role binding", source);
                }

                let subject_ns = subject.namespace.as_deref().unwrap_or(EMPTY_NAMESPACE);
                Error::api(
                    format!(
                        "failed to bind cluster role [{role}] to subject [{}] (kind: {} ns: {subject_ns})",
                        subject.name, subject.kind,
                    ),
                    source,
                )
            })
    }
}
