use async_trait::async_trait;
use k8s_openapi::api::rbac::v1 as rbacv1;
use kube::api::Api;
use kube::Client;
#[cfg(test)]
use mockall::automock;

use crate::error::{Error, Result};

/// Read access to namespaced roles.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RoleClient: Send + Sync {
    /// Returns the object if found or `None` if it does not exist.
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<rbacv1::Role>>;
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
impl RoleClient for DefaultClient {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<rbacv1::Role>> {
        Api::<rbacv1::Role>::namespaced(self.client.clone(), namespace)
            .get_opt(name)
            .await
            .map_err(|source| {
                Error::api(
                    format!("failed to get role [{name}] in namespace [{namespace}]"),
                    source,
                )
            })
    }
}
