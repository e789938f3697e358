use async_trait::async_trait;
use k8s_openapi::api::rbac::v1 as rbacv1;
use kube::api::Api;
use kube::Client;
#[cfg(test)]
use mockall::automock;

use crate::error::{Error, Result};

/// Read access to cluster roles.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterRoleClient: Send + Sync {
    /// Returns the object if found or `None` if it does not exist.
    async fn get(&self, name: &str) -> Result<Option<rbacv1::ClusterRole>>;
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
impl ClusterRoleClient for DefaultClient {
    async fn get(&self, name: &str) -> Result<Option<rbacv1::ClusterRole>> {
        Api::<rbacv1::ClusterRole>::all(self.client.clone())
            .get_opt(name)
            .await
            .map_err(|source| Error::api(format!("failed to get cluster role [{name}]"), source))
    }
}
